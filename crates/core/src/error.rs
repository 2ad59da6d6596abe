//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (missing records,
/// illegal transitions, stock shortfalls). `Internal` is the escape hatch
/// store implementations use to surface backend faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A transition was attempted on a record in a terminal state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A reservation would take a product's stock below zero.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// An order update omitted a product the order currently contains.
    #[error("missing quantity for product {product_id}")]
    MissingLine { product_id: String },

    /// Malformed input (dates, identifiers, names, quantities).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A record with the same unique name already exists.
    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },

    /// Backend failure outside domain control.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn insufficient_stock(product_id: impl ToString, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            product_id: product_id.to_string(),
            requested,
            available,
        }
    }

    pub fn missing_line(product_id: impl ToString) -> Self {
        Self::MissingLine {
            product_id: product_id.to_string(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn already_exists(entity: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            name: name.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

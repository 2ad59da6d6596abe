use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ProductId};

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub stock: i64,
    pub price: Decimal,
    pub cost_price: Decimal,
}

/// Partial update of catalog fields.
///
/// Stock is deliberately absent: on-hand quantity only moves through order
/// reservations, never through catalog edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
}

/// A catalog product.
///
/// `stock` is the on-hand quantity available for new reservations. It is
/// mutated exclusively through [`Product::adjust_stock`], which refuses to
/// take it below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub stock: i64,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a product from a draft, validating it first.
    pub fn new(draft: ProductDraft) -> DomainResult<Self> {
        validate_name(&draft.name)?;
        validate_price("price", draft.price)?;
        validate_price("cost_price", draft.cost_price)?;
        if draft.stock < 0 {
            return Err(DomainError::invalid_argument("stock must not be negative"));
        }

        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            name: draft.name,
            description: draft.description,
            stock: draft.stock,
            price: draft.price,
            cost_price: draft.cost_price,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update of catalog fields.
    pub fn update(&mut self, patch: ProductPatch) -> DomainResult<()> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(price) = patch.price {
            validate_price("price", price)?;
        }
        if let Some(cost_price) = patch.cost_price {
            validate_price("cost_price", cost_price)?;
        }

        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(cost_price) = patch.cost_price {
            self.cost_price = cost_price;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Apply a signed stock delta; negative reserves, positive returns.
    ///
    /// Fails without mutating when the result would be negative.
    pub fn adjust_stock(&mut self, delta: i64) -> DomainResult<()> {
        let next = self.stock + delta;
        if next < 0 {
            return Err(DomainError::insufficient_stock(self.id, -delta, self.stock));
        }
        self.stock = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Margin per unit (`price - cost_price`).
    pub fn unit_margin(&self) -> Decimal {
        self.price - self.cost_price
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::invalid_argument("product name must not be empty"));
    }
    Ok(())
}

fn validate_price(field: &str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::invalid_argument(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}

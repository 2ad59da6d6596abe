use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, OrderId, ProductId, UserId};

/// Order status lifecycle.
///
/// `Stable` is the only state that permits edits; `Completed` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Stable,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Stable => "stable",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Stable)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(OrderStatus::Stable),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invalid_argument(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Order line: product and reserved quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Outcome of re-quantifying one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChange {
    pub product_id: ProductId,
    pub old_quantity: i64,
    pub new_quantity: i64,
}

impl LineChange {
    /// Stock delta to apply to the product; positive returns units.
    pub fn stock_delta(&self) -> i64 {
        self.old_quantity - self.new_quantity
    }
}

/// One line joined with its order's status and update timestamp, as the
/// report aggregator consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacedLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub status: OrderStatus,
    pub order_updated_at: DateTime<Utc>,
}

/// A customer order holding stock reservations.
///
/// Quantities are reserved against the catalog the moment the order is
/// created and stay reserved until it reaches a terminal state: completion
/// keeps the units consumed, cancellation returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    /// Create a stable order from requested lines.
    ///
    /// Stock sufficiency is the engine's concern; this validates shape only:
    /// at least one line, positive quantities, no duplicate products.
    pub fn new(user_id: UserId, lines: Vec<OrderLine>) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::invalid_argument(
                "order must contain at least one line",
            ));
        }
        let mut seen = HashSet::new();
        for line in &lines {
            if line.quantity <= 0 {
                return Err(DomainError::invalid_argument(
                    "line quantity must be positive",
                ));
            }
            if !seen.insert(line.product_id) {
                return Err(DomainError::invalid_argument(format!(
                    "duplicate product in order: {}",
                    line.product_id
                )));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Stable,
            created_at: now,
            updated_at: now,
            lines,
        })
    }

    pub fn is_modifiable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Reserved quantity for one product, if the order carries it.
    pub fn line_quantity(&self, product_id: ProductId) -> Option<i64> {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }

    fn ensure_modifiable(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "order {} is {} and cannot be modified",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Mark the order completed. Reserved units stay consumed.
    pub fn complete(&mut self) -> DomainResult<()> {
        self.ensure_modifiable()?;
        self.status = OrderStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the order cancelled. The engine returns each line's units.
    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_modifiable()?;
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Re-quantify existing lines from a product → quantity map.
    ///
    /// Every product currently on the order must appear in `quantities`;
    /// entries for products not on the order are ignored. The line set
    /// itself never changes. Returns one [`LineChange`] per line so the
    /// caller can settle stock.
    pub fn requantify(
        &mut self,
        quantities: &HashMap<ProductId, i64>,
    ) -> DomainResult<Vec<LineChange>> {
        self.ensure_modifiable()?;

        let mut changes = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let new_quantity = *quantities
                .get(&line.product_id)
                .ok_or_else(|| DomainError::missing_line(line.product_id))?;
            if new_quantity <= 0 {
                return Err(DomainError::invalid_argument(
                    "line quantity must be positive",
                ));
            }
            changes.push(LineChange {
                product_id: line.product_id,
                old_quantity: line.quantity,
                new_quantity,
            });
        }

        for (line, change) in self.lines.iter_mut().zip(&changes) {
            line.quantity = change.new_quantity;
        }
        self.updated_at = Utc::now();
        Ok(changes)
    }
}

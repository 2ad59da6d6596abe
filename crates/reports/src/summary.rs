use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_catalog::Product;
use stockroom_core::ReportId;
use stockroom_orders::{OrderStatus, PlacedLine};

use crate::window::Window;

/// Persisted index record of a generated report.
///
/// `artifact` is the opaque location the rendered CSV was written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub id: ReportId,
    pub name: String,
    pub first_date: DateTime<Utc>,
    pub second_date: DateTime<Utc>,
    pub artifact: String,
    pub created_at: DateTime<Utc>,
}

impl SummaryReport {
    pub fn new(name: String, window: Window, artifact: String) -> Self {
        Self {
            id: ReportId::new(),
            name,
            first_date: window.first,
            second_date: window.second,
            artifact,
            created_at: Utc::now(),
        }
    }

    pub fn window(&self) -> Window {
        Window::new(self.first_date, self.second_date)
    }
}

/// One per-product row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub product: String,
    pub revenue: Decimal,
    pub profit: Decimal,
    pub sold: i64,
    pub returned: i64,
}

impl SummaryRow {
    pub fn zero(product: &str) -> Self {
        Self {
            product: product.to_string(),
            revenue: Decimal::ZERO,
            profit: Decimal::ZERO,
            sold: 0,
            returned: 0,
        }
    }
}

/// Aggregate order lines into one row per catalog product.
///
/// Rows come out in the catalog's listing order and every product gets a
/// row, zero-filled when it saw no activity. Completed lines count into
/// `sold`, `revenue` (`quantity * price`) and `profit`
/// (`quantity * (price - cost_price)`); cancelled lines count into
/// `returned`. Lines still on stable orders contribute nothing.
///
/// Prices are read from the catalog at aggregation time; lines carry no
/// price snapshot of their own.
pub fn summarize(products: &[Product], lines: &[PlacedLine]) -> Vec<SummaryRow> {
    products
        .iter()
        .map(|product| {
            let mut row = SummaryRow::zero(&product.name);
            for line in lines.iter().filter(|l| l.product_id == product.id) {
                match line.status {
                    OrderStatus::Completed => {
                        let quantity = Decimal::from(line.quantity);
                        row.sold += line.quantity;
                        row.revenue += quantity * product.price;
                        row.profit += quantity * product.unit_margin();
                    }
                    OrderStatus::Cancelled => row.returned += line.quantity,
                    OrderStatus::Stable => {}
                }
            }
            row
        })
        .collect()
}

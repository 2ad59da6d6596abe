//! Durable store contracts and their backends.
//!
//! Two implementations per store: an in-memory one (tests, local runs) and
//! a Postgres one. Both uphold the same contracts:
//!
//! - `save`/`save_all` are upserts; `save_all` is all-or-nothing
//! - listings come back in insertion order
//! - report names are unique, enforced at the store level

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_catalog::Product;
use stockroom_core::{DomainResult, OrderId, ProductId, ReportId};
use stockroom_orders::{Order, OrderStatus, PlacedLine};
use stockroom_reports::SummaryReport;

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryCatalogStore, InMemoryOrderStore, InMemoryReportStore};
pub use postgres::{PostgresCatalogStore, PostgresOrderStore, PostgresReportStore};

/// Filter for denormalized order-line queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFilter {
    pub product_id: Option<ProductId>,
    pub status: Option<OrderStatus>,
    /// Inclusive range over the owning order's `updated_at`.
    pub updated_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl LineFilter {
    pub fn matches(&self, line: &PlacedLine) -> bool {
        if let Some(product_id) = self.product_id {
            if line.product_id != product_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if line.status != status {
                return false;
            }
        }
        if let Some((first, second)) = self.updated_range {
            if line.order_updated_at < first || line.order_updated_at > second {
                return false;
            }
        }
        true
    }
}

/// Durable product catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one product; `NotFound` when absent.
    async fn get(&self, id: ProductId) -> DomainResult<Product>;

    /// Insert or replace one product.
    async fn save(&self, product: &Product) -> DomainResult<()>;

    /// Insert or replace a batch as one atomic write.
    async fn save_all(&self, products: &[Product]) -> DomainResult<()>;

    /// All products, in insertion order.
    async fn list(&self) -> DomainResult<Vec<Product>>;
}

/// Durable orders with their lines.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetch one order; `NotFound` when absent.
    async fn get(&self, id: OrderId) -> DomainResult<Order>;

    /// Persist the order and its lines as one unit.
    async fn save(&self, order: &Order) -> DomainResult<()>;

    /// All orders, in insertion order.
    async fn list(&self) -> DomainResult<Vec<Order>>;

    /// Denormalized lines joined with their order's status and update
    /// timestamp, restricted by `filter`.
    async fn list_lines(&self, filter: &LineFilter) -> DomainResult<Vec<PlacedLine>>;
}

/// Durable report index plus artifact storage.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Fetch one report record; `NotFound` when absent.
    async fn get(&self, id: ReportId) -> DomainResult<SummaryReport>;

    /// Fetch by unique name, `None` when absent.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<SummaryReport>>;

    /// Persist a report record; duplicate names fail with `AlreadyExists`.
    async fn save(&self, report: &SummaryReport) -> DomainResult<()>;

    /// All report records, in insertion order.
    async fn list(&self) -> DomainResult<Vec<SummaryReport>>;

    /// Write a rendered artifact under the report's name, returning the
    /// location to store on the record.
    async fn write_artifact(&self, name: &str, csv: &str) -> DomainResult<String>;

    /// Read an artifact back by location; `NotFound` when absent.
    async fn read_artifact(&self, location: &str) -> DomainResult<String>;
}

//! In-memory store backends for tests and single-process runs.
//!
//! Plain `RwLock<HashMap>` tables with a side vector preserving insertion
//! order. Locks are never held across an await point.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, DomainResult, OrderId, ProductId, ReportId};
use stockroom_orders::{Order, PlacedLine};
use stockroom_reports::SummaryReport;

use super::{CatalogStore, LineFilter, OrderStore, ReportStore};

#[derive(Debug, Default)]
struct CatalogInner {
    products: HashMap<ProductId, Product>,
    insertion: Vec<ProductId>,
}

/// In-memory [`CatalogStore`].
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<CatalogInner>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get(&self, id: ProductId) -> DomainResult<Product> {
        let inner = self.inner.read().unwrap();
        inner
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("product", id))
    }

    async fn save(&self, product: &Product) -> DomainResult<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.products.contains_key(&product.id) {
            inner.insertion.push(product.id);
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_all(&self, products: &[Product]) -> DomainResult<()> {
        // One write lock for the whole batch keeps it atomic.
        let mut inner = self.inner.write().unwrap();
        for product in products {
            if !inner.products.contains_key(&product.id) {
                inner.insertion.push(product.id);
            }
            inner.products.insert(product.id, product.clone());
        }
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Product>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .insertion
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }
}

#[derive(Debug, Default)]
struct OrdersInner {
    orders: HashMap<OrderId, Order>,
    insertion: Vec<OrderId>,
}

/// In-memory [`OrderStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<OrdersInner>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: OrderId) -> DomainResult<Order> {
        let inner = self.inner.read().unwrap();
        inner
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("order", id))
    }

    async fn save(&self, order: &Order) -> DomainResult<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.orders.contains_key(&order.id) {
            inner.insertion.push(order.id);
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Order>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .insertion
            .iter()
            .filter_map(|id| inner.orders.get(id).cloned())
            .collect())
    }

    async fn list_lines(&self, filter: &LineFilter) -> DomainResult<Vec<PlacedLine>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .insertion
            .iter()
            .filter_map(|id| inner.orders.get(id))
            .flat_map(|order| {
                order.lines.iter().map(|line| PlacedLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    status: order.status,
                    order_updated_at: order.updated_at,
                })
            })
            .filter(|line| filter.matches(line))
            .collect())
    }
}

#[derive(Debug, Default)]
struct ReportsInner {
    reports: HashMap<ReportId, SummaryReport>,
    insertion: Vec<ReportId>,
    artifacts: HashMap<String, String>,
}

/// In-memory [`ReportStore`].
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    inner: RwLock<ReportsInner>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn get(&self, id: ReportId) -> DomainResult<SummaryReport> {
        let inner = self.inner.read().unwrap();
        inner
            .reports
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("report", id))
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<SummaryReport>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.reports.values().find(|r| r.name == name).cloned())
    }

    async fn save(&self, report: &SummaryReport) -> DomainResult<()> {
        let mut inner = self.inner.write().unwrap();
        let conflict = inner
            .reports
            .values()
            .any(|r| r.name == report.name && r.id != report.id);
        if conflict {
            return Err(DomainError::already_exists("report", report.name.clone()));
        }
        if !inner.reports.contains_key(&report.id) {
            inner.insertion.push(report.id);
        }
        inner.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<SummaryReport>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .insertion
            .iter()
            .filter_map(|id| inner.reports.get(id).cloned())
            .collect())
    }

    async fn write_artifact(&self, name: &str, csv: &str) -> DomainResult<String> {
        let mut inner = self.inner.write().unwrap();
        let location = artifact_location(name);
        inner.artifacts.insert(location.clone(), csv.to_string());
        Ok(location)
    }

    async fn read_artifact(&self, location: &str) -> DomainResult<String> {
        let inner = self.inner.read().unwrap();
        inner
            .artifacts
            .get(location)
            .cloned()
            .ok_or_else(|| DomainError::not_found("artifact", location))
    }
}

/// Location key an artifact is filed under; shared by both backends.
pub(crate) fn artifact_location(name: &str) -> String {
    format!("reports/{name}.csv")
}

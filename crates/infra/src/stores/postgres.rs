//! Postgres-backed store implementations.
//!
//! Queries are runtime-bound (no compile-time checking) so the workspace
//! builds without a live database. Multi-row writes run inside a
//! transaction; everything else is a single statement.
//!
//! ## Expected schema
//!
//! ```sql
//! CREATE TABLE products (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     stock       BIGINT NOT NULL CHECK (stock >= 0),
//!     price       NUMERIC NOT NULL,
//!     cost_price  NUMERIC NOT NULL,
//!     position    BIGSERIAL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     updated_at  TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE orders (
//!     id         UUID PRIMARY KEY,
//!     user_id    UUID NOT NULL,
//!     status     TEXT NOT NULL,
//!     position   BIGSERIAL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE order_lines (
//!     order_id   UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
//!     product_id UUID NOT NULL REFERENCES products (id),
//!     quantity   BIGINT NOT NULL CHECK (quantity > 0),
//!     line_no    BIGINT NOT NULL,
//!     PRIMARY KEY (order_id, product_id)
//! );
//!
//! CREATE TABLE summary_reports (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL UNIQUE,
//!     first_date  TIMESTAMPTZ NOT NULL,
//!     second_date TIMESTAMPTZ NOT NULL,
//!     artifact    TEXT NOT NULL,
//!     position    BIGSERIAL,
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//!
//! CREATE TABLE report_artifacts (
//!     location   TEXT PRIMARY KEY,
//!     content    TEXT NOT NULL,
//!     written_at TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! `position` columns only exist to reproduce the insertion-order listing
//! contract of the in-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use stockroom_catalog::Product;
use stockroom_core::{DomainError, DomainResult, OrderId, ProductId, ReportId, UserId};
use stockroom_orders::{Order, OrderLine, OrderStatus, PlacedLine};
use stockroom_reports::SummaryReport;

use super::memory::artifact_location;
use super::{CatalogStore, LineFilter, OrderStore, ReportStore};

/// Postgres-backed [`CatalogStore`].
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get(&self, id: ProductId) -> DomainResult<Product> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, stock, price, cost_price, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        match row {
            Some(row) => ProductRow::from_row(&row)
                .map(Product::from)
                .map_err(|e| map_sqlx_error("decode_product", e)),
            None => Err(DomainError::not_found("product", id)),
        }
    }

    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn save(&self, product: &Product) -> DomainResult<()> {
        upsert_product(&self.pool, product)
            .await
            .map_err(|e| map_sqlx_error("save_product", e))
    }

    #[instrument(skip(self, products), fields(count = products.len()), err)]
    async fn save_all(&self, products: &[Product]) -> DomainResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for product in products {
            upsert_product(&mut *tx, product)
                .await
                .map_err(|e| map_sqlx_error("save_products", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> DomainResult<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, stock, price, cost_price, created_at, updated_at
            FROM products
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter()
            .map(|row| {
                ProductRow::from_row(row)
                    .map(Product::from)
                    .map_err(|e| map_sqlx_error("decode_product", e))
            })
            .collect()
    }
}

async fn upsert_product<'e, E>(executor: E, product: &Product) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO products (id, name, description, stock, price, cost_price, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            stock = EXCLUDED.stock,
            price = EXCLUDED.price,
            cost_price = EXCLUDED.cost_price,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(product.id.as_uuid())
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.stock)
    .bind(product.price)
    .bind(product.cost_price)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Postgres-backed [`OrderStore`].
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get(&self, id: OrderId) -> DomainResult<Order> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(row) = row else {
            return Err(DomainError::not_found("order", id));
        };
        let order = OrderRow::from_row(&row).map_err(|e| map_sqlx_error("decode_order", e))?;

        let line_rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM order_lines
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_order_lines", e))?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for line_row in &line_rows {
            let line = LineRow::from_row(line_row)
                .map_err(|e| map_sqlx_error("decode_order_line", e))?;
            lines.push(line.into());
        }

        order.into_order(lines)
    }

    #[instrument(skip(self, order), fields(order_id = %order.id), err)]
    async fn save(&self, order: &Order) -> DomainResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_order", e))?;

        // Lines are replaced wholesale; the set is small and this keeps the
        // write equivalent to the in-memory backend.
        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_order_lines", e))?;

        for (line_no, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, product_id, quantity, line_no)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(line_no as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("save_order_line", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> DomainResult<Vec<Order>> {
        let order_rows = sqlx::query(
            r#"
            SELECT id, user_id, status, created_at, updated_at
            FROM orders
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity
            FROM order_lines
            ORDER BY order_id, line_no ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_order_lines", e))?;

        let mut lines_by_order: HashMap<uuid::Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let order_id: uuid::Uuid = row
                .try_get("order_id")
                .map_err(|e| map_sqlx_error("decode_order_line", e))?;
            let line = LineRow::from_row(row)
                .map_err(|e| map_sqlx_error("decode_order_line", e))?;
            lines_by_order.entry(order_id).or_default().push(line.into());
        }

        let mut orders = Vec::with_capacity(order_rows.len());
        for row in &order_rows {
            let order = OrderRow::from_row(row).map_err(|e| map_sqlx_error("decode_order", e))?;
            let lines = lines_by_order.remove(&order.id).unwrap_or_default();
            orders.push(order.into_order(lines)?);
        }
        Ok(orders)
    }

    #[instrument(skip(self, filter), err)]
    async fn list_lines(&self, filter: &LineFilter) -> DomainResult<Vec<PlacedLine>> {
        let (first, second) = match filter.updated_range {
            Some((first, second)) => (Some(first), Some(second)),
            None => (None, None),
        };

        let rows = sqlx::query(
            r#"
            SELECT l.product_id, l.quantity, o.status, o.updated_at
            FROM order_lines l
            JOIN orders o ON o.id = l.order_id
            WHERE ($1::uuid IS NULL OR l.product_id = $1)
              AND ($2::text IS NULL OR o.status = $2)
              AND ($3::timestamptz IS NULL OR o.updated_at >= $3)
              AND ($4::timestamptz IS NULL OR o.updated_at <= $4)
            ORDER BY o.position, l.line_no ASC
            "#,
        )
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(first)
        .bind(second)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_lines", e))?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in &rows {
            let placed = PlacedRow::from_row(row)
                .map_err(|e| map_sqlx_error("decode_placed_line", e))?;
            lines.push(placed.into_placed_line()?);
        }
        Ok(lines)
    }
}

/// Postgres-backed [`ReportStore`].
#[derive(Debug, Clone)]
pub struct PostgresReportStore {
    pool: PgPool,
}

impl PostgresReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for PostgresReportStore {
    #[instrument(skip(self), fields(report_id = %id), err)]
    async fn get(&self, id: ReportId) -> DomainResult<SummaryReport> {
        let row = sqlx::query(
            r#"
            SELECT id, name, first_date, second_date, artifact, created_at
            FROM summary_reports
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_report", e))?;

        match row {
            Some(row) => ReportRow::from_row(&row)
                .map(SummaryReport::from)
                .map_err(|e| map_sqlx_error("decode_report", e)),
            None => Err(DomainError::not_found("report", id)),
        }
    }

    #[instrument(skip(self), err)]
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<SummaryReport>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, first_date, second_date, artifact, created_at
            FROM summary_reports
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_report_by_name", e))?;

        row.map(|row| {
            ReportRow::from_row(&row)
                .map(SummaryReport::from)
                .map_err(|e| map_sqlx_error("decode_report", e))
        })
        .transpose()
    }

    #[instrument(skip(self, report), fields(report_id = %report.id, name = %report.name), err)]
    async fn save(&self, report: &SummaryReport) -> DomainResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO summary_reports (id, name, first_date, second_date, artifact, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                artifact = EXCLUDED.artifact
            "#,
        )
        .bind(report.id.as_uuid())
        .bind(&report.name)
        .bind(report.first_date)
        .bind(report.second_date)
        .bind(&report.artifact)
        .bind(report.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // The id conflict is absorbed above, so a unique violation can
            // only be the name constraint.
            Err(e) if is_unique_violation(&e) => Err(DomainError::already_exists(
                "report",
                report.name.clone(),
            )),
            Err(e) => Err(map_sqlx_error("save_report", e)),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> DomainResult<Vec<SummaryReport>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, first_date, second_date, artifact, created_at
            FROM summary_reports
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_reports", e))?;

        rows.iter()
            .map(|row| {
                ReportRow::from_row(row)
                    .map(SummaryReport::from)
                    .map_err(|e| map_sqlx_error("decode_report", e))
            })
            .collect()
    }

    #[instrument(skip(self, csv), fields(bytes = csv.len()), err)]
    async fn write_artifact(&self, name: &str, csv: &str) -> DomainResult<String> {
        let location = artifact_location(name);
        sqlx::query(
            r#"
            INSERT INTO report_artifacts (location, content, written_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (location) DO UPDATE SET
                content = EXCLUDED.content,
                written_at = EXCLUDED.written_at
            "#,
        )
        .bind(&location)
        .bind(csv)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("write_artifact", e))?;
        Ok(location)
    }

    #[instrument(skip(self), err)]
    async fn read_artifact(&self, location: &str) -> DomainResult<String> {
        let row = sqlx::query("SELECT content FROM report_artifacts WHERE location = $1")
            .bind(location)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_artifact", e))?;

        match row {
            Some(row) => row
                .try_get("content")
                .map_err(|e| map_sqlx_error("decode_artifact", e)),
            None => Err(DomainError::not_found("artifact", location)),
        }
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => DomainError::internal(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            DomainError::internal(format!("connection pool closed in {operation}"))
        }
        other => DomainError::internal(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    description: String,
    stock: i64,
    price: rust_decimal::Decimal,
    cost_price: rust_decimal::Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            stock: row.try_get("stock")?,
            price: row.try_get("price")?,
            cost_price: row.try_get("cost_price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            stock: row.stock,
            price: row.price,
            cost_price: row.cost_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug)]
struct OrderRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for OrderRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> DomainResult<Order> {
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines,
        })
    }
}

#[derive(Debug)]
struct LineRow {
    product_id: uuid::Uuid,
    quantity: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for LineRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LineRow {
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl From<LineRow> for OrderLine {
    fn from(row: LineRow) -> Self {
        OrderLine {
            product_id: ProductId::from_uuid(row.product_id),
            quantity: row.quantity,
        }
    }
}

#[derive(Debug)]
struct PlacedRow {
    product_id: uuid::Uuid,
    quantity: i64,
    status: String,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for PlacedRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(PlacedRow {
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            status: row.try_get("status")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl PlacedRow {
    fn into_placed_line(self) -> DomainResult<PlacedLine> {
        Ok(PlacedLine {
            product_id: ProductId::from_uuid(self.product_id),
            quantity: self.quantity,
            status: self.status.parse::<OrderStatus>()?,
            order_updated_at: self.updated_at,
        })
    }
}

#[derive(Debug)]
struct ReportRow {
    id: uuid::Uuid,
    name: String,
    first_date: DateTime<Utc>,
    second_date: DateTime<Utc>,
    artifact: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ReportRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReportRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            first_date: row.try_get("first_date")?,
            second_date: row.try_get("second_date")?,
            artifact: row.try_get("artifact")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<ReportRow> for SummaryReport {
    fn from(row: ReportRow) -> Self {
        SummaryReport {
            id: ReportId::from_uuid(row.id),
            name: row.name,
            first_date: row.first_date,
            second_date: row.second_date,
            artifact: row.artifact,
            created_at: row.created_at,
        }
    }
}

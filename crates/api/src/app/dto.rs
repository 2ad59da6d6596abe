use rust_decimal::Decimal;
use serde::Deserialize;

use stockroom_catalog::{Product, ProductDraft, ProductPatch};
use stockroom_orders::Order;
use stockroom_reports::SummaryReport;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub stock: i64,
    pub price: Decimal,
    pub cost_price: Decimal,
}

impl From<CreateProductRequest> for ProductDraft {
    fn from(body: CreateProductRequest) -> Self {
        ProductDraft {
            name: body.name,
            description: body.description,
            stock: body.stock,
            price: body.price,
            cost_price: body.cost_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateProductsRequest {
    pub products: Vec<CreateProductRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(body: UpdateProductRequest) -> Self {
        ProductPatch {
            name: body.name,
            description: body.description,
            price: body.price,
            cost_price: body.cost_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub lines: Vec<OrderLineRequest>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn product_to_json(product: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": product.id.to_string(),
        "name": product.name,
        "description": product.description,
        "stock": product.stock,
        "price": product.price,
        "cost_price": product.cost_price,
        "created_at": product.created_at.to_rfc3339(),
        "updated_at": product.updated_at.to_rfc3339(),
    })
}

pub fn order_to_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "id": order.id.to_string(),
        "user_id": order.user_id.to_string(),
        "status": order.status.as_str(),
        "created_at": order.created_at.to_rfc3339(),
        "updated_at": order.updated_at.to_rfc3339(),
        "lines": order
            .lines
            .iter()
            .map(|line| serde_json::json!({
                "product_id": line.product_id.to_string(),
                "quantity": line.quantity,
            }))
            .collect::<Vec<_>>(),
    })
}

pub fn report_to_json(report: &SummaryReport) -> serde_json::Value {
    serde_json::json!({
        "id": report.id.to_string(),
        "name": report.name,
        "first_date": report.first_date.to_rfc3339(),
        "second_date": report.second_date.to_rfc3339(),
        "artifact": report.artifact,
        "created_at": report.created_at.to_rfc3339(),
    })
}

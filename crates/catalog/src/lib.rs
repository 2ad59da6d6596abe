//! Product catalog domain: products, pricing, and the stock invariant.

pub mod product;

pub use product::{Product, ProductDraft, ProductPatch};

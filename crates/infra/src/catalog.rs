//! Catalog maintenance: product creation and field edits.
//!
//! Field edits run under the same per-product locks as the order engine,
//! otherwise an edit could read a product, lose the CPU while an order
//! reserves stock, and write the stale stock figure back.

use std::sync::Arc;

use tracing::{info, instrument};

use stockroom_catalog::{Product, ProductDraft, ProductPatch};
use stockroom_core::{DomainResult, ProductId};

use crate::locks::{LockKey, LockRegistry};
use crate::stores::CatalogStore;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    locks: Arc<LockRegistry>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, locks: Arc<LockRegistry>) -> Self {
        Self { store, locks }
    }

    /// Validate and persist a single new product.
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    pub async fn create(&self, draft: ProductDraft) -> DomainResult<Product> {
        let product = Product::new(draft)?;
        self.store.save(&product).await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Persist a batch of new products, all or none.
    ///
    /// Every draft is validated before the first write, so one bad entry
    /// rejects the whole batch.
    #[instrument(skip(self, drafts), fields(count = drafts.len()), err)]
    pub async fn create_bulk(&self, drafts: Vec<ProductDraft>) -> DomainResult<Vec<Product>> {
        let products = drafts
            .into_iter()
            .map(Product::new)
            .collect::<DomainResult<Vec<_>>>()?;
        self.store.save_all(&products).await?;
        info!(count = products.len(), "products created in bulk");
        Ok(products)
    }

    /// Apply a field patch to an existing product.
    ///
    /// Stock is not editable here; only the order engine moves it.
    #[instrument(skip(self, patch), fields(product_id = %product_id), err)]
    pub async fn update(&self, product_id: ProductId, patch: ProductPatch) -> DomainResult<Product> {
        let _guard = self
            .locks
            .acquire(vec![LockKey::Product(product_id)])
            .await;
        let mut product = self.store.get(product_id).await?;
        product.update(patch)?;
        self.store.save(&product).await?;
        info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    pub async fn get(&self, product_id: ProductId) -> DomainResult<Product> {
        self.store.get(product_id).await
    }

    pub async fn list(&self) -> DomainResult<Vec<Product>> {
        self.store.list().await
    }
}

//! Draft-enabled product service abstract Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{
    BatchDeleteResult, DraftRef, EntityKey, FieldChange, ListQuery, ProductRow, SubmitOutcome,
};

/// Backend enforcing one-editable-draft-per-entity semantics
///
/// Platform implementation:
/// - `InMemoryDraftBackend` (draft-orchestrator-app), used for demos and tests
/// - an OData transport supplied by the host
#[async_trait]
pub trait DraftBackend: Send + Sync {
    /// Service handshake; must succeed before any other call is made
    async fn load_metadata(&self) -> CoreResult<()>;

    /// Read the master list
    ///
    /// # Arguments
    /// * `query` - Search term, filters, sorters and grouping
    async fn list_products(&self, query: &ListQuery) -> CoreResult<Vec<ProductRow>>;

    /// Create a draft for a new product
    async fn create_draft(&self) -> CoreResult<DraftRef>;

    /// Create a draft for a new product prefilled from an existing one
    ///
    /// # Arguments
    /// * `product_id` - Product to copy
    async fn copy_to_draft(&self, product_id: &str) -> CoreResult<DraftRef>;

    /// Find the draft of the current user for a product, if any
    async fn find_editable_draft(&self, product_id: &str) -> CoreResult<Option<DraftRef>>;

    /// Create an edit draft for an active product
    ///
    /// Fails with `DraftLocked` when another user holds a draft for the product.
    async fn edit_draft(&self, product_id: &str) -> CoreResult<DraftRef>;

    /// Turn a draft into the active product and drop the draft
    ///
    /// Returns the id of the active product.
    async fn activate_draft(&self, draft: &DraftRef) -> CoreResult<String>;

    /// Delete a single entity
    async fn delete_entity(&self, key: &EntityKey) -> CoreResult<()>;

    /// Delete several entities in one batch
    async fn delete_entities(&self, keys: &[EntityKey]) -> CoreResult<BatchDeleteResult>;

    /// Submit pending field changes of drafts in one batch
    async fn submit_changes(&self, changes: &[FieldChange]) -> CoreResult<SubmitOutcome>;

    /// Re-read an active product, refreshing any cached copy
    async fn read_product(&self, product_id: &str) -> CoreResult<Option<ProductRow>>;
}

//! Ids currently being deleted

use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::types::EntityKey;

#[derive(Default)]
struct Sets {
    products: HashSet<String>,
    drafts: HashSet<String>,
}

impl Sets {
    fn for_key(&mut self, key: &EntityKey) -> &mut HashSet<String> {
        match key {
            EntityKey::Product { .. } => &mut self.products,
            EntityKey::Draft { .. } => &mut self.drafts,
        }
    }
}

/// Product and draft ids with a delete request in flight or completed.
///
/// Only the draft service marks and releases ids; other components read.
#[derive(Default)]
pub struct PendingDeletions {
    sets: RwLock<Sets>,
}

impl PendingDeletions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an entity as being deleted; `false` when it already was.
    pub(crate) async fn mark(&self, key: &EntityKey) -> bool {
        self.sets
            .write()
            .await
            .for_key(key)
            .insert(key.dedup_id().to_string())
    }

    /// Mark several entities at once, returning `(accepted, skipped)`.
    pub(crate) async fn mark_all(&self, keys: &[EntityKey]) -> (Vec<EntityKey>, Vec<EntityKey>) {
        let mut sets = self.sets.write().await;
        keys.iter()
            .cloned()
            .partition(|key| sets.for_key(key).insert(key.dedup_id().to_string()))
    }

    /// Forget a failed deletion so that it can be retried
    pub(crate) async fn release(&self, key: &EntityKey) {
        self.sets.write().await.for_key(key).remove(key.dedup_id());
    }

    pub async fn is_pending(&self, key: &EntityKey) -> bool {
        let sets = self.sets.read().await;
        match key {
            EntityKey::Product { product_id } => sets.products.contains(product_id),
            EntityKey::Draft { draft_id, .. } => sets.drafts.contains(draft_id),
        }
    }

    /// A draft id is valid as long as no deletion was requested for it
    pub async fn is_draft_id_valid(&self, draft_id: &str) -> bool {
        !self.sets.read().await.drafts.contains(draft_id)
    }

    pub async fn draft_ids(&self) -> HashSet<String> {
        self.sets.read().await.drafts.clone()
    }
}

//! In-memory draft-enabled product service
//!
//! Keeps active products and drafts in memory and enforces one editable draft
//! per product. Used for demos, headless hosts and tests.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use draft_orchestrator_core::error::{CoreError, CoreResult};
use draft_orchestrator_core::traits::DraftBackend;
use draft_orchestrator_core::types::{
    BatchDeleteFailure, BatchDeleteResult, DraftAdministrativeData, DraftRef, EntityKey,
    FieldChange, ListQuery, ProductRow, Sorter, SubmitOutcome,
};

/// Draft as stored by the service
#[derive(Debug, Clone)]
struct DraftRecord {
    /// Product id, reserved for new products
    product_id: String,
    /// An active product backs the draft
    has_active_entity: bool,
    owner: String,
    /// The owner is still editing; others cannot take the draft over
    locked: bool,
    created_at: DateTime<Utc>,
    last_changed_at: DateTime<Utc>,
    data: ProductRow,
}

struct Store {
    /// Active products in insertion order
    products: Vec<ProductRow>,
    /// Drafts by draft UUID
    drafts: HashMap<String, DraftRecord>,
    next_id: u32,
    metadata_available: bool,
    failures: HashMap<String, CoreError>,
    /// Ids (product or draft) rejected by the next batch deletes
    batch_rejects: HashSet<String>,
}

impl Store {
    fn reserve_product_id(&mut self) -> String {
        let id = format!("EPM-{:06}", self.next_id);
        self.next_id += 1;
        id
    }

    fn product(&self, product_id: &str) -> Option<&ProductRow> {
        self.products
            .iter()
            .find(|row| row.product_id() == Some(product_id))
    }

    fn draft_of(&self, product_id: &str) -> Option<(&String, &DraftRecord)> {
        self.drafts
            .iter()
            .find(|(_, d)| d.has_active_entity && d.product_id == product_id)
    }

    fn delete(&mut self, key: &EntityKey) -> CoreResult<()> {
        match key {
            EntityKey::Product { product_id } => {
                let before = self.products.len();
                self.products
                    .retain(|row| row.product_id() != Some(product_id.as_str()));
                if self.products.len() == before {
                    return Err(CoreError::ProductNotFound(product_id.clone()));
                }
                self.drafts
                    .retain(|_, d| !(d.has_active_entity && d.product_id == *product_id));
                Ok(())
            }
            EntityKey::Draft { draft_id, .. } => self
                .drafts
                .remove(draft_id)
                .map(|_| ())
                .ok_or_else(|| CoreError::DraftNotFound(draft_id.clone())),
        }
    }
}

/// In-memory implementation of [`DraftBackend`]
pub struct InMemoryDraftBackend {
    current_user: String,
    store: RwLock<Store>,
}

impl InMemoryDraftBackend {
    #[must_use]
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            store: RwLock::new(Store {
                products: Vec::new(),
                drafts: HashMap::new(),
                next_id: 1,
                metadata_available: true,
                failures: HashMap::new(),
                batch_rejects: HashSet::new(),
            }),
        }
    }

    /// Add active products
    #[must_use]
    pub fn with_products(mut self, products: impl IntoIterator<Item = ProductRow>) -> Self {
        self.store
            .get_mut()
            .products
            .extend(products.into_iter().map(|mut row| {
                row.is_active_entity = true;
                row.draft_uuid = None;
                row
            }));
        self
    }

    /// A small catalog for demos
    #[must_use]
    pub fn sample(current_user: impl Into<String>) -> Self {
        let product = |id: &str, name: &str, price: f64, main: &str, sub: &str, stock: &str| {
            let mut row = ProductRow::active(id, name)
                .with_price(price)
                .with_category(main, sub);
            row.currency = "EUR".to_string();
            row.availability = stock.to_string();
            row
        };
        Self::new(current_user).with_products([
            product("HT-1000", "Notebook Basic 15", 956.0, "Computer Systems", "Notebooks", "In Stock"),
            product("HT-1001", "Notebook Basic 17", 1249.0, "Computer Systems", "Notebooks", "In Stock"),
            product("HT-1010", "Notebook Professional 15", 1999.0, "Computer Systems", "Notebooks", "Out of Stock"),
            product("HT-1030", "Flat Future", 1230.0, "Computer Components", "Flat Screens", "Only 3 left"),
            product("HT-1050", "Laser Allround Pro", 349.0, "Printers & Scanners", "Laser Printers", "In Stock"),
            product("HT-1063", "Ergonomic Keyboard", 14.0, "Computer Components", "Keyboards", "In Stock"),
            product("HT-1068", "Cordless Bluetooth Keyboard", 29.0, "Computer Components", "Keyboards", "Out of Stock"),
            product("HT-1100", "Professional Video Camera", 620.0, "Digital Cameras", "Video Cameras", "Only 3 left"),
        ])
    }

    /// Fail the next call of `operation` with `err`
    pub async fn fail_next(&self, operation: &str, err: CoreError) {
        self.store
            .write()
            .await
            .failures
            .insert(operation.to_string(), err);
    }

    /// Let the metadata handshake fail until switched back on
    pub async fn set_metadata_available(&self, available: bool) {
        self.store.write().await.metadata_available = available;
    }

    /// Reject the entity with this product or draft id in batch deletes
    pub async fn reject_in_batch(&self, id: impl Into<String>) {
        self.store.write().await.batch_rejects.insert(id.into());
    }

    /// Put a draft of another user on a product
    pub async fn insert_foreign_draft(
        &self,
        product_id: &str,
        user: &str,
        locked: bool,
    ) -> CoreResult<String> {
        let mut store = self.store.write().await;
        let data = store
            .product(product_id)
            .cloned()
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let draft_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        store.drafts.insert(
            draft_id.clone(),
            DraftRecord {
                product_id: product_id.to_string(),
                has_active_entity: true,
                owner: user.to_string(),
                locked,
                created_at: now,
                last_changed_at: now + Duration::minutes(1),
                data,
            },
        );
        Ok(draft_id)
    }

    pub async fn product_count(&self) -> usize {
        self.store.read().await.products.len()
    }

    pub async fn draft_count(&self) -> usize {
        self.store.read().await.drafts.len()
    }

    async fn take_failure(&self, operation: &str) -> CoreResult<()> {
        match self.store.write().await.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn admin_data(&self, draft_id: &str, record: &DraftRecord) -> DraftAdministrativeData {
        DraftAdministrativeData {
            draft_uuid: draft_id.to_string(),
            creation_date_time: record.created_at,
            last_change_date_time: record.last_changed_at,
            draft_is_created_by_me: record.owner == self.current_user,
            in_process_by_user: if record.locked {
                record.owner.clone()
            } else {
                String::new()
            },
            last_changed_by_user: record.owner.clone(),
        }
    }

    fn draft_ref(&self, draft_id: &str, record: &DraftRecord) -> DraftRef {
        DraftRef {
            product_id: record
                .has_active_entity
                .then(|| record.product_id.clone()),
            draft_id: draft_id.to_string(),
            is_active: false,
            has_active_entity: record.has_active_entity,
            created_by_current_user: record.owner == self.current_user,
            created_at: record.created_at,
            last_changed_at: record.last_changed_at,
        }
    }

    fn new_record(&self, product_id: String, has_active_entity: bool, data: ProductRow) -> DraftRecord {
        let now = Utc::now();
        DraftRecord {
            product_id,
            has_active_entity,
            owner: self.current_user.clone(),
            locked: true,
            created_at: now,
            last_changed_at: now,
            data,
        }
    }

    /// Rows of the master list: active products (with their draft data) and
    /// the current user's drafts of new products
    fn list_rows(&self, store: &Store) -> Vec<ProductRow> {
        let mut rows: Vec<ProductRow> = store
            .products
            .iter()
            .map(|row| {
                let product_id = row.product_id().unwrap_or_default();
                match store.draft_of(product_id) {
                    Some((draft_id, record)) => row
                        .clone()
                        .with_administrative(self.admin_data(draft_id, record)),
                    None => row.clone(),
                }
            })
            .collect();
        rows.extend(
            store
                .drafts
                .iter()
                .filter(|(_, d)| !d.has_active_entity && d.owner == self.current_user)
                .map(|(draft_id, record)| {
                    let mut row = ProductRow::draft(None, draft_id.clone(), record.data.name.clone());
                    row.price = record.data.price;
                    row.currency.clone_from(&record.data.currency);
                    row.category.clone_from(&record.data.category);
                    row.main_category.clone_from(&record.data.main_category);
                    row.availability.clone_from(&record.data.availability);
                    row.with_administrative(self.admin_data(draft_id, record))
                }),
        );
        rows
    }
}

fn compare(a: &ProductRow, b: &ProductRow, sorter: &Sorter) -> Ordering {
    let ordering = match sorter.path.as_str() {
        "Price" => a
            .price
            .partial_cmp(&b.price)
            .unwrap_or(Ordering::Equal),
        "ProductCategory" => a.category.cmp(&b.category),
        "MainProductCategory" => a.main_category.cmp(&b.main_category),
        "StockAvailability" => a.availability.cmp(&b.availability),
        "Product" => a.relevant_id().cmp(&b.relevant_id()),
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    };
    if sorter.descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn apply_change(row: &mut ProductRow, change: &FieldChange) -> Result<(), String> {
    let text = || match &change.value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match change.field.as_str() {
        "Name" => row.name = text(),
        "Price" => {
            let price = match &change.value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse().ok(),
                Value::Null => None,
                _ => return Err(format!("Invalid price {}", change.value)),
            };
            row.price = price;
        }
        "Currency" => row.currency = text(),
        "ProductCategory" => row.category = text(),
        "MainProductCategory" => row.main_category = text(),
        "StockAvailability" => row.availability = text(),
        other => return Err(format!("Field {other} cannot be changed")),
    }
    Ok(())
}

#[async_trait]
impl DraftBackend for InMemoryDraftBackend {
    async fn load_metadata(&self) -> CoreResult<()> {
        self.take_failure("load_metadata").await?;
        if self.store.read().await.metadata_available {
            Ok(())
        } else {
            Err(CoreError::MetadataUnavailable(
                "service metadata could not be read".to_string(),
            ))
        }
    }

    async fn list_products(&self, query: &ListQuery) -> CoreResult<Vec<ProductRow>> {
        self.take_failure("list_products").await?;
        let store = self.store.read().await;
        let term = query.search_term.as_deref().map(str::to_lowercase);
        let mut rows: Vec<ProductRow> = self
            .list_rows(&store)
            .into_iter()
            .filter(|row| {
                term.as_deref()
                    .is_none_or(|term| row.name.to_lowercase().contains(term))
            })
            .filter(|row| query.filters.iter().all(|f| f.matches(row)))
            .collect();
        let sorters = query.effective_sorters();
        rows.sort_by(|a, b| {
            sorters
                .iter()
                .map(|s| compare(a, b, s))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(rows)
    }

    async fn create_draft(&self) -> CoreResult<DraftRef> {
        self.take_failure("create_draft").await?;
        let mut store = self.store.write().await;
        let product_id = store.reserve_product_id();
        let draft_id = uuid::Uuid::new_v4().to_string();
        let record = self.new_record(product_id, false, ProductRow::active("", ""));
        let draft = self.draft_ref(&draft_id, &record);
        store.drafts.insert(draft_id, record);
        Ok(draft)
    }

    async fn copy_to_draft(&self, product_id: &str) -> CoreResult<DraftRef> {
        self.take_failure("copy_to_draft").await?;
        let mut store = self.store.write().await;
        let data = store
            .product(product_id)
            .cloned()
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        let new_id = store.reserve_product_id();
        let draft_id = uuid::Uuid::new_v4().to_string();
        let record = self.new_record(new_id, false, data);
        let draft = self.draft_ref(&draft_id, &record);
        store.drafts.insert(draft_id, record);
        Ok(draft)
    }

    async fn find_editable_draft(&self, product_id: &str) -> CoreResult<Option<DraftRef>> {
        self.take_failure("find_editable_draft").await?;
        let store = self.store.read().await;
        Ok(store
            .draft_of(product_id)
            .filter(|(_, d)| d.owner == self.current_user)
            .map(|(id, d)| self.draft_ref(id, d)))
    }

    async fn edit_draft(&self, product_id: &str) -> CoreResult<DraftRef> {
        self.take_failure("edit_draft").await?;
        let mut store = self.store.write().await;
        let data = store
            .product(product_id)
            .cloned()
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        if let Some((draft_id, record)) = store.draft_of(product_id) {
            if record.owner == self.current_user {
                return Ok(self.draft_ref(draft_id, record));
            }
            if record.locked {
                return Err(CoreError::DraftLocked {
                    product: product_id.to_string(),
                    user: record.owner.clone(),
                });
            }
            // the other user's lock expired, their changes are dropped
            let stale = draft_id.clone();
            store.drafts.remove(&stale);
        }

        let draft_id = uuid::Uuid::new_v4().to_string();
        let record = self.new_record(product_id.to_string(), true, data);
        let draft = self.draft_ref(&draft_id, &record);
        store.drafts.insert(draft_id, record);
        Ok(draft)
    }

    async fn activate_draft(&self, draft: &DraftRef) -> CoreResult<String> {
        self.take_failure("activate_draft").await?;
        let mut store = self.store.write().await;
        let record = store
            .drafts
            .remove(&draft.draft_id)
            .ok_or_else(|| CoreError::DraftNotFound(draft.draft_id.clone()))?;

        let mut active = record.data;
        active.product = Some(record.product_id.clone());
        active.draft_uuid = None;
        active.is_active_entity = true;
        active.has_draft_entity = false;
        active.has_active_entity = false;
        active.administrative = None;

        match store
            .products
            .iter_mut()
            .find(|row| row.product_id() == Some(record.product_id.as_str()))
        {
            Some(existing) => *existing = active,
            None => store.products.push(active),
        }
        Ok(record.product_id)
    }

    async fn delete_entity(&self, key: &EntityKey) -> CoreResult<()> {
        self.take_failure("delete_entity").await?;
        self.store.write().await.delete(key)
    }

    async fn delete_entities(&self, keys: &[EntityKey]) -> CoreResult<BatchDeleteResult> {
        self.take_failure("delete_entities").await?;
        let mut store = self.store.write().await;
        let mut result = BatchDeleteResult::default();
        for key in keys {
            let outcome = if store.batch_rejects.contains(key.dedup_id()) {
                Err("rejected by the service".to_string())
            } else {
                store.delete(key).map_err(|e| e.to_string())
            };
            match outcome {
                Ok(()) => result.success_count += 1,
                Err(reason) => {
                    result.failed_count += 1;
                    result.failures.push(BatchDeleteFailure {
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(result)
    }

    async fn submit_changes(&self, changes: &[FieldChange]) -> CoreResult<SubmitOutcome> {
        self.take_failure("submit_changes").await?;
        let mut store = self.store.write().await;
        // a batch naming an unknown draft is rejected as a whole
        if let Some(missing) = changes
            .iter()
            .find(|change| !store.drafts.contains_key(&change.draft_id))
        {
            return Err(CoreError::DraftNotFound(missing.draft_id.clone()));
        }
        let mut messages = Vec::new();
        for change in changes {
            let record = store
                .drafts
                .get_mut(&change.draft_id)
                .ok_or_else(|| CoreError::DraftNotFound(change.draft_id.clone()))?;
            match apply_change(&mut record.data, change) {
                Ok(()) => {
                    // timestamps must differ from creation once something changed
                    let now = Utc::now();
                    record.last_changed_at = if now > record.created_at {
                        now
                    } else {
                        record.created_at + Duration::milliseconds(1)
                    };
                }
                Err(message) => messages.push(message),
            }
        }
        Ok(SubmitOutcome {
            message: (!messages.is_empty()).then(|| messages.join("\n")),
        })
    }

    async fn read_product(&self, product_id: &str) -> CoreResult<Option<ProductRow>> {
        self.take_failure("read_product").await?;
        Ok(self.store.read().await.product(product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draft_orchestrator_core::types::{EditingStatus, Filter, GroupBy, Grouping, PriceBand};

    fn backend() -> InMemoryDraftBackend {
        InMemoryDraftBackend::sample("ME")
    }

    #[tokio::test]
    async fn new_products_get_sequential_ids() {
        let backend = InMemoryDraftBackend::new("ME");
        let draft = backend.create_draft().await.unwrap();
        assert!(draft.product_id.is_none());
        assert!(!draft.is_dirty());
        assert_eq!(backend.activate_draft(&draft).await.unwrap(), "EPM-000001");

        let next = backend.create_draft().await.unwrap();
        assert_eq!(backend.activate_draft(&next).await.unwrap(), "EPM-000002");
        assert_eq!(backend.product_count().await, 2);
    }

    #[tokio::test]
    async fn one_draft_per_product() {
        let backend = backend();
        let first = backend.edit_draft("HT-1000").await.unwrap();
        let second = backend.edit_draft("HT-1000").await.unwrap();
        assert_eq!(first.draft_id, second.draft_id);
        assert_eq!(
            backend.find_editable_draft("HT-1000").await.unwrap(),
            Some(first)
        );
    }

    #[tokio::test]
    async fn foreign_locked_draft_blocks_editing() {
        let backend = backend();
        backend
            .insert_foreign_draft("HT-1000", "JOHN", true)
            .await
            .unwrap();
        let err = backend.edit_draft("HT-1000").await.unwrap_err();
        assert!(matches!(err, CoreError::DraftLocked { ref user, .. } if user == "JOHN"));

        backend
            .insert_foreign_draft("HT-1001", "JOHN", false)
            .await
            .unwrap();
        let draft = backend.edit_draft("HT-1001").await.unwrap();
        assert!(draft.created_by_current_user);
        assert_eq!(backend.draft_count().await, 2);
    }

    #[tokio::test]
    async fn activation_copies_changes() {
        let backend = backend();
        let draft = backend.edit_draft("HT-1000").await.unwrap();
        let outcome = backend
            .submit_changes(&[
                FieldChange::new(&draft.draft_id, "Name", "Notebook Basic 15 Plus"),
                FieldChange::new(&draft.draft_id, "Weight", 2),
            ])
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Field Weight cannot be changed"));

        let row = backend.list_products(&ListQuery::default()).await.unwrap();
        let edited = row.iter().find(|r| r.product_id() == Some("HT-1000")).unwrap();
        assert!(edited.has_draft_entity);
        assert_eq!(edited.name, "Notebook Basic 15");

        backend.activate_draft(&draft).await.unwrap();
        let product = backend.read_product("HT-1000").await.unwrap().unwrap();
        assert_eq!(product.name, "Notebook Basic 15 Plus");
        assert!(product.administrative.is_none());
        assert_eq!(backend.draft_count().await, 0);
    }

    #[tokio::test]
    async fn batch_with_unknown_draft_changes_nothing() {
        let backend = backend();
        let draft = backend.edit_draft("HT-1000").await.unwrap();
        let err = backend
            .submit_changes(&[
                FieldChange::new(&draft.draft_id, "Name", "Renamed"),
                FieldChange::new("no-such-draft", "Name", "Other"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DraftNotFound(ref id) if id == "no-such-draft"));

        backend.activate_draft(&draft).await.unwrap();
        let product = backend.read_product("HT-1000").await.unwrap().unwrap();
        assert_eq!(product.name, "Notebook Basic 15");
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let backend = backend();
        let mut query = ListQuery::default();
        query.filters.push(PriceBand::UpTo100.filter());
        let rows = backend.list_products(&query).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Cordless Bluetooth Keyboard", "Ergonomic Keyboard"]);

        let query = ListQuery {
            search_term: Some("notebook".to_string()),
            grouping: Some(Grouping {
                by: GroupBy::Price,
                descending: true,
            }),
            ..ListQuery::default()
        };
        let rows = backend.list_products(&query).await.unwrap();
        assert_eq!(rows[0].product_id(), Some("HT-1010"));
        assert_eq!(rows.len(), 3);

        backend.create_draft().await.unwrap();
        let query = ListQuery {
            filters: vec![EditingStatus::Draft.filter()],
            ..ListQuery::default()
        };
        let drafts = backend.list_products(&query).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].product_id().is_none());

        let query = ListQuery {
            filters: vec![Filter::eq("StockAvailability", "Only 3 left")],
            ..ListQuery::default()
        };
        assert_eq!(backend.list_products(&query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_delete_reports_rejected_entries() {
        let backend = backend();
        backend.reject_in_batch("HT-1001").await;
        let result = backend
            .delete_entities(&[
                EntityKey::product("HT-1000"),
                EntityKey::product("HT-1001"),
                EntityKey::product("NOPE"),
            ])
            .await
            .unwrap();
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_count, 2);
        assert_eq!(result.failures[0].key, EntityKey::product("HT-1001"));
        assert!(backend.read_product("HT-1000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_failure_hits_once() {
        let backend = backend();
        backend
            .fail_next("load_metadata", CoreError::MetadataUnavailable("503".to_string()))
            .await;
        assert!(backend.load_metadata().await.is_err());
        assert!(backend.load_metadata().await.is_ok());

        backend.set_metadata_available(false).await;
        assert!(backend.load_metadata().await.is_err());
    }
}

//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{watch, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::services::{PendingDeletions, ServiceContext};
use crate::state::AppStateStore;
use crate::traits::{DetailView, DraftBackend, MasterListView, NavigationHost, ViewRegistry};
use crate::types::{
    AppConfig, BatchDeleteFailure, BatchDeleteResult, DeviceSystem, DraftAdministrativeData,
    DraftRef, EntityKey, FieldChange, ListItemRef, ListQuery, NavigationRequest, ProductRow,
    SubmitOutcome,
};

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

// ===== MockDraftBackend =====

pub struct MockDraftBackend {
    calls: RwLock<Vec<String>>,
    failures: RwLock<HashMap<String, CoreError>>,
    /// Operations currently held at the gate
    gate: watch::Sender<HashSet<String>>,
    in_flight: RwLock<HashMap<String, (usize, usize)>>,
    rows: RwLock<Vec<ProductRow>>,
    last_query: RwLock<Option<ListQuery>>,
    drafts: RwLock<HashMap<String, DraftRef>>,
    next_draft: AtomicUsize,
    batch_failures: RwLock<HashSet<EntityKey>>,
    submitted: RwLock<Vec<Vec<FieldChange>>>,
    submit_message: RwLock<Option<String>>,
}

impl MockDraftBackend {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(HashSet::new());
        Self {
            calls: RwLock::new(Vec::new()),
            failures: RwLock::new(HashMap::new()),
            gate,
            in_flight: RwLock::new(HashMap::new()),
            rows: RwLock::new(Vec::new()),
            last_query: RwLock::new(None),
            drafts: RwLock::new(HashMap::new()),
            next_draft: AtomicUsize::new(1),
            batch_failures: RwLock::new(HashSet::new()),
            submitted: RwLock::new(Vec::new()),
            submit_message: RwLock::new(None),
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self, op: &str) -> usize {
        self.calls.read().await.iter().filter(|c| *c == op).count()
    }

    /// 下一次调用 `op` 时返回此错误
    pub async fn fail_next(&self, op: &str, err: CoreError) {
        self.failures.write().await.insert(op.to_string(), err);
    }

    /// Block calls of `op` until [`Self::release`]
    pub fn hold(&self, op: &str) {
        self.gate.send_modify(|held| {
            held.insert(op.to_string());
        });
    }

    pub fn release(&self, op: &str) {
        self.gate.send_modify(|held| {
            held.remove(op);
        });
    }

    /// Highest number of concurrent calls of `op` seen so far
    pub async fn max_in_flight(&self, op: &str) -> usize {
        self.in_flight.read().await.get(op).map_or(0, |(_, max)| *max)
    }

    pub async fn set_rows(&self, rows: Vec<ProductRow>) {
        *self.rows.write().await = rows;
    }

    pub async fn last_query(&self) -> Option<ListQuery> {
        self.last_query.read().await.clone()
    }

    pub async fn fail_batch_entry(&self, key: EntityKey) {
        self.batch_failures.write().await.insert(key);
    }

    /// Successfully submitted batches
    pub async fn submitted(&self) -> Vec<Vec<FieldChange>> {
        self.submitted.read().await.clone()
    }

    pub async fn set_submit_message(&self, message: Option<String>) {
        *self.submit_message.write().await = message;
    }

    /// Record the call, wait at the gate, then fail if requested
    async fn enter(&self, op: &str) -> CoreResult<()> {
        self.calls.write().await.push(op.to_string());
        {
            let mut in_flight = self.in_flight.write().await;
            let entry = in_flight.entry(op.to_string()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(entry.0);
        }
        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|held| !held.contains(op)).await;
        self.leave(op).await;
        match self.failures.write().await.remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn leave(&self, op: &str) {
        if let Some(entry) = self.in_flight.write().await.get_mut(op) {
            entry.0 -= 1;
        }
    }

    fn new_draft(&self, product_id: Option<&str>) -> DraftRef {
        let n = self.next_draft.fetch_add(1, Ordering::SeqCst);
        TestHarness::draft_ref(product_id, &format!("draft-{n}"))
    }
}

#[async_trait]
impl DraftBackend for MockDraftBackend {
    async fn load_metadata(&self) -> CoreResult<()> {
        self.enter("load_metadata").await
    }

    async fn list_products(&self, query: &ListQuery) -> CoreResult<Vec<ProductRow>> {
        self.enter("list_products").await?;
        *self.last_query.write().await = Some(query.clone());
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|row| {
                query
                    .search_term
                    .as_deref()
                    .is_none_or(|term| row.name.contains(term))
            })
            .cloned()
            .collect())
    }

    async fn create_draft(&self) -> CoreResult<DraftRef> {
        self.enter("create_draft").await?;
        Ok(self.new_draft(None))
    }

    async fn copy_to_draft(&self, _product_id: &str) -> CoreResult<DraftRef> {
        self.enter("copy_to_draft").await?;
        Ok(self.new_draft(None))
    }

    async fn find_editable_draft(&self, product_id: &str) -> CoreResult<Option<DraftRef>> {
        self.enter("find_editable_draft").await?;
        Ok(self.drafts.read().await.get(product_id).cloned())
    }

    async fn edit_draft(&self, product_id: &str) -> CoreResult<DraftRef> {
        self.enter("edit_draft").await?;
        let draft = self.new_draft(Some(product_id));
        self.drafts
            .write()
            .await
            .insert(product_id.to_string(), draft.clone());
        Ok(draft)
    }

    async fn activate_draft(&self, draft: &DraftRef) -> CoreResult<String> {
        self.enter("activate_draft").await?;
        let product_id = draft
            .product_id
            .clone()
            .unwrap_or_else(|| format!("HT-{}", 9000 + self.next_draft.load(Ordering::SeqCst)));
        self.drafts.write().await.remove(&product_id);
        Ok(product_id)
    }

    async fn delete_entity(&self, _key: &EntityKey) -> CoreResult<()> {
        self.enter("delete_entity").await
    }

    async fn delete_entities(&self, keys: &[EntityKey]) -> CoreResult<BatchDeleteResult> {
        self.enter("delete_entities").await?;
        let failing = self.batch_failures.read().await;
        let failures: Vec<BatchDeleteFailure> = keys
            .iter()
            .filter(|key| failing.contains(*key))
            .map(|key| BatchDeleteFailure {
                key: key.clone(),
                reason: "rejected".to_string(),
            })
            .collect();
        Ok(BatchDeleteResult {
            success_count: keys.len() - failures.len(),
            failed_count: failures.len(),
            failures,
        })
    }

    async fn submit_changes(&self, changes: &[FieldChange]) -> CoreResult<SubmitOutcome> {
        self.enter("submit_changes").await?;
        self.submitted.write().await.push(changes.to_vec());
        Ok(SubmitOutcome {
            message: self.submit_message.read().await.clone(),
        })
    }

    async fn read_product(&self, product_id: &str) -> CoreResult<Option<ProductRow>> {
        self.enter("read_product").await?;
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|row| row.product_id() == Some(product_id))
            .cloned())
    }
}

// ===== RecordingHost =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Navigate { hash: String, replace: bool },
    EmptyPage,
    HistoryBack,
    BackToMaster,
    ExitToShell,
}

pub struct RecordingHost {
    events: RwLock<Vec<HostEvent>>,
    history_available: RwLock<bool>,
    /// Last hash navigated to
    hash: RwLock<Option<String>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            history_available: RwLock::new(false),
            hash: RwLock::new(None),
        }
    }

    pub async fn events(&self) -> Vec<HostEvent> {
        self.events.read().await.clone()
    }

    pub async fn set_history_available(&self, available: bool) {
        *self.history_available.write().await = available;
    }

    async fn record(&self, event: HostEvent) {
        self.events.write().await.push(event);
    }
}

#[async_trait]
impl NavigationHost for RecordingHost {
    async fn navigate(&self, request: &NavigationRequest, replace: bool) -> bool {
        let hash = request.to_hash();
        let mut current = self.hash.write().await;
        let changed = current.as_deref() != Some(hash.as_str());
        *current = Some(hash.clone());
        drop(current);
        self.record(HostEvent::Navigate { hash, replace }).await;
        changed
    }

    async fn show_empty_page(&self) {
        self.record(HostEvent::EmptyPage).await;
    }

    async fn history_back(&self) -> bool {
        let available = *self.history_available.read().await;
        if available {
            self.record(HostEvent::HistoryBack).await;
        }
        available
    }

    async fn back_to_master(&self) {
        self.record(HostEvent::BackToMaster).await;
    }

    async fn exit_to_shell(&self) {
        self.record(HostEvent::ExitToShell).await;
    }
}

// ===== Views =====

#[derive(Default)]
pub struct RecordingView {
    changed: AtomicUsize,
    unbound: AtomicUsize,
}

impl RecordingView {
    pub fn changed(&self) -> usize {
        self.changed.load(Ordering::SeqCst)
    }

    pub fn unbound(&self) -> usize {
        self.unbound.load(Ordering::SeqCst)
    }
}

impl DetailView for RecordingView {
    fn product_changed(&self) {
        self.changed.fetch_add(1, Ordering::SeqCst);
    }

    fn unbind(&self) {
        self.unbound.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingListView {
    selected: StdMutex<Option<String>>,
    scrolls: StdMutex<Vec<Option<String>>>,
}

impl RecordingListView {
    pub fn selected(&self) -> Option<String> {
        self.selected.lock().unwrap().clone()
    }

    pub fn scrolls(&self) -> Vec<Option<String>> {
        self.scrolls.lock().unwrap().clone()
    }
}

impl MasterListView for RecordingListView {
    fn set_selected(&self, item: Option<&ListItemRef>) {
        *self.selected.lock().unwrap() = item.map(|i| i.id.clone());
    }

    fn scroll_to(&self, item: Option<&ListItemRef>) {
        self.scrolls.lock().unwrap().push(item.map(|i| i.id.clone()));
    }
}

// ===== TestHarness =====

/// 持有所有 mock，便于测试断言
pub struct TestHarness {
    pub backend: Arc<MockDraftBackend>,
    pub host: Arc<RecordingHost>,
    pub display: Arc<RecordingView>,
    pub edit: Arc<RecordingView>,
    pub list_view: Arc<RecordingListView>,
    pub state: Arc<AppStateStore>,
    pub config: Arc<AppConfig>,
    pub deletions: Arc<PendingDeletions>,
    ctx: Arc<ServiceContext>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_device(DeviceSystem::Desktop)
    }

    pub fn phone() -> Self {
        Self::with_device(DeviceSystem::Phone)
    }

    fn with_device(device: DeviceSystem) -> Self {
        let backend = Arc::new(MockDraftBackend::new());
        let host = Arc::new(RecordingHost::new());
        let display = Arc::new(RecordingView::default());
        let edit = Arc::new(RecordingView::default());
        let list_view = Arc::new(RecordingListView::default());
        let state = Arc::new(AppStateStore::new());
        let config = Arc::new(AppConfig {
            device,
            current_user: "ME".to_string(),
            ..AppConfig::default()
        });
        let views = ViewRegistry::new()
            .with_display(display.clone())
            .with_edit(edit.clone())
            .with_master_list(list_view.clone());
        let ctx = Arc::new(ServiceContext::new(
            backend.clone(),
            host.clone(),
            views,
            Arc::clone(&state),
            Arc::clone(&config),
        ));
        Self {
            backend,
            host,
            display,
            edit,
            list_view,
            state,
            config,
            deletions: Arc::new(PendingDeletions::new()),
            ctx,
        }
    }

    pub fn ctx(&self) -> Arc<ServiceContext> {
        Arc::clone(&self.ctx)
    }

    pub fn mark_metadata_ready(&self) {
        self.state
            .set_metadata_load_state(crate::types::MetadataLoadState::Ready);
    }

    /// Three active products in different price bands and one new-product draft
    pub fn sample_rows() -> Vec<ProductRow> {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        vec![
            ProductRow::active("HT-1000", "Notebook Basic 15")
                .with_price(50.0)
                .with_category("Computer Systems", "Notebooks"),
            ProductRow::active("HT-1001", "Notebook Basic 17")
                .with_price(250.0)
                .with_category("Computer Systems", "Notebooks"),
            ProductRow::active("HT-1002", "Ergo Screen")
                .with_price(750.0)
                .with_category("Computer Components", "Flat Screens"),
            ProductRow::draft(None, "draft-1", "New product").with_administrative(
                DraftAdministrativeData {
                    draft_uuid: "draft-1".to_string(),
                    creation_date_time: created,
                    last_change_date_time: created,
                    draft_is_created_by_me: true,
                    in_process_by_user: "ME".to_string(),
                    last_changed_by_user: "ME".to_string(),
                },
            ),
        ]
    }

    pub fn draft_ref(product_id: Option<&str>, draft_id: &str) -> DraftRef {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        DraftRef {
            product_id: product_id.map(ToString::to_string),
            draft_id: draft_id.to_string(),
            is_active: false,
            has_active_entity: product_id.is_some(),
            created_by_current_user: true,
            created_at: created,
            last_changed_at: created,
        }
    }
}

//! Platform-agnostic application bootstrap for Draft Orchestrator.
//!
//! Provides `Application` (service container and coordinator),
//! `ApplicationBuilder` (adapter injection) and `StartupParameters`.

pub mod adapters;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use draft_orchestrator_core::error::{CoreError, CoreResult};
use draft_orchestrator_core::services::{
    AfterUpdate, BackOutcome, BulkDeletePlan, DeleteOutcome, DraftService, FollowUp, ListOutcome,
    ListSynchronizer, MetadataLoader, NavigationService, PendingDeletions, ResumeDecision,
    RouteOutcome, ServiceContext,
};
use draft_orchestrator_core::state::AppStateStore;
use draft_orchestrator_core::traits::{
    DetailView, DraftBackend, MasterListView, NavigationHost, ViewRegistry,
};
use draft_orchestrator_core::types::{
    AppConfig, AppState, BatchDeleteReport, DraftRef, EntityKey, FieldChange, ListItemRef,
    NavigationRequest, ProductRow, QueryChange, RouteMatch, SubmitOutcome,
};

use adapters::HeadlessRouter;

/// Upper bound of route/list rounds in one `settle` call
const MAX_SETTLE_ROUNDS: usize = 16;

/// Startup parameters passed by the hosting shell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupParameters {
    /// Product to show first; only the first entry is used
    #[serde(rename = "Product", default)]
    pub product: Vec<String>,
}

impl StartupParameters {
    /// `display` route of the requested product, if any
    pub fn initial_route(&self) -> Option<NavigationRequest> {
        self.product
            .first()
            .filter(|id| !id.is_empty())
            .map(|id| NavigationRequest::display(id))
    }
}

/// Platform-agnostic application.
///
/// Holds all services and executes the follow-up navigation the list and draft
/// services ask for. Every frontend constructs this once at startup via
/// `ApplicationBuilder`.
pub struct Application {
    /// Service context (backend, host, views, state, config)
    pub ctx: Arc<ServiceContext>,
    pub metadata: MetadataLoader,
    pub navigation: NavigationService,
    pub list: Arc<ListSynchronizer>,
    pub drafts: DraftService,
    /// Set when the built-in router is used
    router: Option<Arc<HeadlessRouter>>,
}

impl Application {
    // ===== Startup =====

    /// Start routing and load the backend metadata.
    ///
    /// A failed handshake is not fatal: the error text is shown and
    /// [`Self::load_metadata`] retries.
    pub async fn start(&self, startup: &StartupParameters) {
        if let Some(router) = &self.router {
            let hash = match startup.initial_route() {
                Some(request) => request.to_hash(),
                None => router.hash().await,
            };
            router.initialize(&hash).await;
        } else if let Some(request) = startup.initial_route() {
            self.ctx.host.navigate(&request, true).await;
        }
        self.settle().await;
        if let Err(e) = self.reload_metadata().await {
            log::warn!("Starting without backend metadata: {e}");
        }
        self.settle().await;
    }

    /// Retry the metadata handshake
    pub async fn load_metadata(&self) -> CoreResult<()> {
        let result = self.reload_metadata().await;
        self.settle().await;
        result
    }

    async fn reload_metadata(&self) -> CoreResult<()> {
        match self.metadata.load().await {
            Ok(()) => {
                self.list.notify_data_changed().await;
                self.navigation.metadata_succeeded().await;
                self.navigation.after_navigate();
                Ok(())
            }
            Err(e) => {
                let text = self.ctx.state.read(|s| s.list_no_data_text.clone());
                self.navigation.metadata_failed(&text).await;
                Err(e)
            }
        }
    }

    // ===== Routing =====

    /// A route matched in the host's router
    pub async fn on_route_matched(&self, route_match: RouteMatch) -> RouteOutcome {
        let outcome = self.route(route_match).await;
        self.settle().await;
        outcome
    }

    /// The host's URL hash changed
    pub async fn on_hash_changed(&self, hash: &str) -> RouteOutcome {
        self.on_route_matched(NavigationRequest::match_hash(hash))
            .await
    }

    async fn route(&self, route_match: RouteMatch) -> RouteOutcome {
        let outcome = self.navigation.handle_route_match(route_match).await;
        if outcome == RouteOutcome::MetadataReloadRequested {
            if let Err(e) = self.reload_metadata().await {
                log::warn!("Metadata reload for pending route failed: {e}");
            }
        }
        self.navigation.after_navigate();
        outcome
    }

    /// Handle route matches of the built-in router and reload the list while
    /// it is due, until nothing changes any more.
    pub async fn settle(&self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            let mut progressed = false;
            if let Some(router) = &self.router {
                for route_match in router.take_route_matches().await {
                    self.route(route_match).await;
                    progressed = true;
                }
            }
            if self.list.refresh_due().await {
                // errors are logged by the list and leave it stale
                if let Ok(Some(outcome)) = self.list.refresh(false).await {
                    self.apply_list_outcome(outcome).await;
                    progressed = true;
                }
            }
            if !progressed {
                return;
            }
        }
        log::warn!("Navigation did not settle after {MAX_SETTLE_ROUNDS} rounds");
    }

    async fn apply_list_outcome(&self, outcome: ListOutcome) {
        match outcome {
            ListOutcome::Unchanged => {}
            ListOutcome::Navigate(row) => self.show_row(&row, false).await,
            ListOutcome::Empty(text) => self.navigation.navigate_to_empty_page(&text, true).await,
        }
    }

    async fn show_row(&self, row: &ProductRow, from_list: bool) {
        match (row.is_active_entity, row.product_id(), row.draft_id()) {
            (false, product_id, Some(draft_id)) => {
                self.navigation
                    .navigate_to_edit_draft(product_id, draft_id, from_list)
                    .await;
            }
            (_, Some(product_id), _) => {
                self.navigation
                    .navigate_to_display(product_id, from_list)
                    .await;
            }
            _ => log::warn!("List row without product or draft id: {}", row.name),
        }
    }

    // ===== Navigation =====

    /// The user picked an entry of the master list
    pub async fn select_list_item(&self, id: &str) -> CoreResult<()> {
        let row = self
            .list
            .row(id)
            .await
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
        self.show_row(&row, true).await;
        self.settle().await;
        Ok(())
    }

    pub async fn display_product(&self, product_id: &str) {
        self.navigation.navigate_to_display(product_id, false).await;
        self.settle().await;
    }

    pub async fn edit_product_draft(&self, product_id: Option<&str>, draft_id: &str) {
        self.navigation
            .navigate_to_edit_draft(product_id, draft_id, false)
            .await;
        self.settle().await;
    }

    pub async fn navigate_to_master(&self, pivot: Option<&str>, replacements: Option<Vec<String>>) {
        self.navigation.navigate_to_master(pivot, replacements).await;
        self.settle().await;
    }

    pub async fn navigate_to_empty_page(&self, text: &str, reset_url: bool) {
        self.navigation.navigate_to_empty_page(text, reset_url).await;
        self.settle().await;
    }

    pub async fn go_back(&self, prefer_history: bool, from_detail: bool) -> BackOutcome {
        let outcome = self.navigation.go_back(prefer_history, from_detail).await;
        self.settle().await;
        outcome
    }

    // ===== Drafts =====

    /// Create a new product and open its draft
    pub async fn create_product(&self) -> CoreResult<String> {
        let draft_id = self.drafts.create_draft().await?;
        self.edit_product_draft(None, &draft_id).await;
        Ok(draft_id)
    }

    /// Open the edit draft of a product
    pub async fn edit_product(&self, product_id: &str) -> CoreResult<String> {
        let (product_id, draft_id) = self.drafts.edit_draft_for_product(product_id).await?;
        self.edit_product_draft(Some(&product_id), &draft_id).await;
        Ok(draft_id)
    }

    /// Copy a product into a new-product draft and open it
    pub async fn copy_product(&self, product_id: &str) -> CoreResult<String> {
        let draft_id = self.drafts.copy_product(product_id).await?;
        self.edit_product_draft(None, &draft_id).await;
        Ok(draft_id)
    }

    pub async fn save_draft_field(&self, change: FieldChange) -> CoreResult<SubmitOutcome> {
        self.drafts.save_draft_field(change).await
    }

    /// Activate a draft and show the resulting product.
    ///
    /// On failure the draft stays open and nothing is navigated.
    pub async fn activate(&self, draft_id: &str) -> CoreResult<String> {
        let draft = self.find_draft(draft_id).await?;
        let product_id = self.drafts.activate(&draft).await?;
        log::info!("{}", self.ctx.config.texts.product_saved);
        self.list.notify_data_changed().await;
        self.display_product(&product_id).await;
        Ok(product_id)
    }

    async fn find_draft(&self, draft_id: &str) -> CoreResult<DraftRef> {
        if let Some(draft) = self.drafts.open_draft(draft_id).await {
            return Ok(draft);
        }
        self.list
            .row(draft_id)
            .await
            .and_then(|row| row.draft_ref())
            .ok_or_else(|| CoreError::DraftNotFound(draft_id.to_string()))
    }

    // ===== Deletion =====

    /// Delete an active product
    pub async fn delete_product(&self, product_id: &str) -> CoreResult<DeleteOutcome> {
        let outcome = self.drafts.delete_product(product_id).await?;
        if let DeleteOutcome::Deleted {
            follow_up: None, ..
        } = &outcome
        {
            self.list
                .prepare_reset_after_deletion(Some(product_id))
                .await;
        }
        self.after_delete(&outcome).await;
        Ok(outcome)
    }

    /// Discard a draft
    ///
    /// # Arguments
    /// * `draft_id` - Draft to discard
    /// * `is_dirty` - The user changed the draft
    pub async fn discard_draft(&self, draft_id: &str, is_dirty: bool) -> CoreResult<DeleteOutcome> {
        let draft = self.find_draft(draft_id).await?;
        let outcome = self.drafts.discard_draft(&draft, is_dirty).await?;
        self.after_delete(&outcome).await;
        Ok(outcome)
    }

    /// Delete the entity behind a key
    pub async fn delete(&self, key: &EntityKey) -> CoreResult<DeleteOutcome> {
        match key {
            EntityKey::Product { product_id } => self.delete_product(product_id).await,
            EntityKey::Draft { .. } => {
                let outcome = self.drafts.delete(key).await?;
                self.after_delete(&outcome).await;
                Ok(outcome)
            }
        }
    }

    /// Discard the user's own draft from the display view; the product stays shown
    pub async fn discard_for_resume(
        &self,
        product_id: &str,
        draft_id: &str,
        is_dirty: bool,
    ) -> CoreResult<DeleteOutcome> {
        let outcome = self
            .drafts
            .discard_from_resume(product_id, draft_id, is_dirty)
            .await?;
        self.after_delete(&outcome).await;
        Ok(outcome)
    }

    async fn after_delete(&self, outcome: &DeleteOutcome) {
        let DeleteOutcome::Deleted { follow_up, notice } = outcome else {
            return;
        };
        if let Some(notice) = notice {
            log::info!("{notice}");
        }
        match follow_up {
            Some(FollowUp::Master {
                pivot,
                replacements,
            }) => {
                self.navigation
                    .navigate_to_master(pivot.as_deref(), replacements.clone())
                    .await;
            }
            Some(FollowUp::Display { product_id }) => {
                self.navigation.navigate_to_display(product_id, false).await;
            }
            None => {}
        }
        self.list.notify_data_changed().await;
        self.settle().await;
    }

    /// Delete several entities in one batch
    pub async fn delete_batch(&self, keys: &[EntityKey]) -> CoreResult<BatchDeleteReport> {
        let report = self.drafts.delete_batch(keys).await?;
        self.list.notify_data_changed().await;
        self.settle().await;
        Ok(report)
    }

    /// Classify the list entries selected for deletion
    pub async fn plan_bulk_delete(&self, ids: &[String]) -> BulkDeletePlan {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.list.row(id).await {
                rows.push(row);
            }
        }
        self.drafts.plan_bulk_delete(&rows)
    }

    /// What the display view does with the current user's draft of a product
    pub async fn resume_decision(&self, product_id: &str) -> CoreResult<ResumeDecision> {
        let row = match self.list.row(product_id).await {
            Some(row) => Some(row),
            None => self.ctx.backend.read_product(product_id).await?,
        };
        match row {
            Some(row) => Ok(self.drafts.resume_decision(&row).await),
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    // ===== Master list =====

    /// Change search, filters, sorters or grouping and reload
    pub async fn apply_query_changes(
        &self,
        change: QueryChange,
        after_update: Option<AfterUpdate>,
    ) -> CoreResult<()> {
        if let Some(outcome) = self.list.apply_query_changes(change, after_update).await? {
            self.apply_list_outcome(outcome).await;
        }
        self.settle().await;
        Ok(())
    }

    /// User refresh, optionally with a new search term
    pub async fn refresh_list(&self, search_term: Option<String>) -> CoreResult<()> {
        if let Some(outcome) = self.list.explicit_refresh(search_term).await? {
            self.apply_list_outcome(outcome).await;
        }
        self.settle().await;
        Ok(())
    }

    pub async fn set_multi_select(&self, enabled: bool) {
        self.list.set_multi_select(enabled).await;
    }

    pub async fn list_items(&self) -> Vec<ListItemRef> {
        self.list.items().await
    }

    // ===== State =====

    pub fn state(&self) -> AppState {
        self.ctx.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.ctx.state.subscribe()
    }

    pub fn router(&self) -> Option<&Arc<HeadlessRouter>> {
        self.router.as_ref()
    }
}

/// Builder for constructing `Application` with platform-specific adapters.
///
/// # Required adapters
/// - `backend`: the draft-enabled product service
/// - `host` or `headless_router`: where navigation goes
///
/// # Optional
/// - views, defaults to none registered
/// - `config`, defaults to `AppConfig::default()`
/// - `state`, defaults to a fresh `AppStateStore`
pub struct ApplicationBuilder {
    backend: Option<Arc<dyn DraftBackend>>,
    host: Option<Arc<dyn NavigationHost>>,
    router: Option<Arc<HeadlessRouter>>,
    views: ViewRegistry,
    config: Option<AppConfig>,
    state: Option<Arc<AppStateStore>>,
}

impl ApplicationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: None,
            host: None,
            router: None,
            views: ViewRegistry::new(),
            config: None,
            state: None,
        }
    }

    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn DraftBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn host(mut self, host: Arc<dyn NavigationHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Use the built-in router; its route matches are handled by `settle`
    #[must_use]
    pub fn headless_router(mut self, router: Arc<HeadlessRouter>) -> Self {
        self.router = Some(router);
        self
    }

    #[must_use]
    pub fn display_view(mut self, view: Arc<dyn DetailView>) -> Self {
        self.views = self.views.with_display(view);
        self
    }

    #[must_use]
    pub fn edit_view(mut self, view: Arc<dyn DetailView>) -> Self {
        self.views = self.views.with_edit(view);
        self
    }

    #[must_use]
    pub fn master_list(mut self, view: Arc<dyn MasterListView>) -> Self {
        self.views = self.views.with_master_list(view);
        self
    }

    #[must_use]
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn state(mut self, state: Arc<AppStateStore>) -> Self {
        self.state = Some(state);
        self
    }

    /// Build the `Application`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if required adapters are missing.
    pub fn build(self) -> CoreResult<Application> {
        let backend = self
            .backend
            .ok_or_else(|| CoreError::ValidationError("backend is required".to_string()))?;
        let host: Arc<dyn NavigationHost> = match (&self.router, self.host) {
            (Some(router), None) => Arc::clone(router) as Arc<dyn NavigationHost>,
            (None, Some(host)) => host,
            (Some(_), Some(_)) => {
                return Err(CoreError::ValidationError(
                    "host and headless_router are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(CoreError::ValidationError(
                    "host or headless_router is required".to_string(),
                ))
            }
        };
        let state = self.state.unwrap_or_default();
        let config = Arc::new(self.config.unwrap_or_default());

        let ctx = Arc::new(ServiceContext::new(backend, host, self.views, state, config));
        let deletions = Arc::new(PendingDeletions::new());
        let list = Arc::new(ListSynchronizer::new(
            Arc::clone(&ctx),
            Arc::clone(&deletions),
        ));
        let navigation = NavigationService::new(Arc::clone(&ctx), Arc::clone(&list));
        let drafts = DraftService::new(Arc::clone(&ctx), deletions);
        let metadata = MetadataLoader::new(Arc::clone(&ctx));

        Ok(Application {
            ctx,
            metadata,
            navigation,
            list,
            drafts,
            router: self.router,
        })
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Shared application state container

use tokio::sync::watch;

use crate::types::{normalize_id, AppState, DraftIndicatorState, MetadataLoadState};

/// Holds the single [`AppState`] of a session.
///
/// Components mutate it through the setters; views observe it through
/// [`AppStateStore::subscribe`]. Subscribers are only woken when a setter
/// actually changes something.
pub struct AppStateStore {
    tx: watch::Sender<AppState>,
}

impl AppStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    #[must_use]
    pub fn with_state(state: AppState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.tx.borrow().clone()
    }

    /// Read the current state without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Apply several changes at once, notifying subscribers a single time.
    pub fn update(&self, f: impl FnOnce(&mut AppState)) {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    /// Set the current entity. Blank ids are stored as absent.
    pub fn set_ids(&self, product_id: Option<&str>, draft_id: Option<&str>) {
        self.update(|state| {
            state.product_id = normalize_id(product_id);
            state.draft_id = normalize_id(draft_id);
        });
    }

    pub fn set_preferred_ids(&self, ids: Vec<String>) {
        self.update(|state| state.preferred_ids = ids);
    }

    pub fn set_list_loading(&self, loading: bool) {
        self.update(|state| state.is_list_loading = loading);
    }

    pub fn set_multi_select(&self, multi_select: bool) {
        self.update(|state| state.is_multi_select = multi_select);
    }

    pub fn set_metadata_load_state(&self, load_state: MetadataLoadState) {
        self.update(|state| state.metadata_load_state = load_state);
    }

    pub fn set_app_busy(&self, busy: bool) {
        self.update(|state| state.is_app_busy = busy);
    }

    pub fn set_empty_text(&self, text: Option<String>) {
        self.update(|state| state.empty_text = text);
    }

    pub fn set_list_no_data_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.list_no_data_text = text);
    }

    pub fn set_draft_indicator(&self, indicator: DraftIndicatorState) {
        self.update(|state| state.draft_indicator = indicator);
    }

    pub fn metadata_load_state(&self) -> MetadataLoadState {
        self.tx.borrow().metadata_load_state
    }

    /// Id of the current entity, if any
    pub fn relevant_id(&self) -> Option<String> {
        self.tx.borrow().relevant_id().map(ToString::to_string)
    }

    pub fn preferred_ids(&self) -> Vec<String> {
        self.tx.borrow().preferred_ids.clone()
    }
}

impl Default for AppStateStore {
    fn default() -> Self {
        Self::new()
    }
}

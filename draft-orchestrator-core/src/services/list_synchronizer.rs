//! Master list synchronization
//!
//! Keeps selection and scroll position of the master list in line with the
//! entity shown in the detail area, and pauses automatic list refreshes while
//! a draft is being edited.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::CoreResult;
use crate::services::{PendingDeletions, ServiceContext};
use crate::types::{
    Grouping, ListItemRef, ListQuery, MetadataLoadState, ProductRow, QueryChange,
};

/// Callback run once after the next completed list load
pub type AfterUpdate = Box<dyn FnOnce() + Send>;

/// Automatic refresh state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshMode {
    /// Refresh on every relevant change
    Auto,
    /// Suspend requested while a fetch was in flight
    PrepareSuspend,
    /// Changes are buffered until automatic updates are enabled again
    Suspended,
}

/// What has to happen after a list load
#[derive(Debug, Clone, PartialEq)]
pub enum ListOutcome {
    /// The detail area keeps its entity (selection was refreshed)
    Unchanged,
    /// Nothing is shown yet; show this row
    Navigate(ProductRow),
    /// The list is empty; show the empty page with this text
    Empty(String),
}

struct ListEntry {
    item: ListItemRef,
    row: Option<ProductRow>,
}

struct ListInner {
    mode: RefreshMode,
    entries: Vec<ListEntry>,
    query: ListQuery,
    /// Pending selection request: `Some(scroll)`
    adapt: Option<bool>,
    /// Data changed since the last fetch
    stale: bool,
    after_update: Vec<AfterUpdate>,
}

impl ListInner {
    fn find(&self, id: &str) -> Option<&ListEntry> {
        if id.is_empty() {
            return None;
        }
        self.real_entries().find(|entry| entry.item.id == id)
    }

    fn real_entries(&self) -> impl Iterator<Item = &ListEntry> {
        self.entries.iter().filter(|entry| !entry.item.is_group_header)
    }

    fn ids(&self) -> Vec<String> {
        self.real_entries().map(|entry| entry.item.id.clone()).collect()
    }
}

/// Master list synchronizer
pub struct ListSynchronizer {
    ctx: Arc<ServiceContext>,
    deletions: Arc<PendingDeletions>,
    inner: Mutex<ListInner>,
}

impl ListSynchronizer {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, deletions: Arc<PendingDeletions>) -> Self {
        let query = ListQuery::new(ctx.config.default_sort.clone());
        Self {
            ctx,
            deletions,
            inner: Mutex::new(ListInner {
                mode: RefreshMode::Auto,
                entries: Vec::new(),
                query,
                adapt: None,
                stale: true,
                after_update: Vec::new(),
            }),
        }
    }

    pub async fn refresh_mode(&self) -> RefreshMode {
        self.inner.lock().await.mode
    }

    pub async fn items(&self) -> Vec<ListItemRef> {
        let inner = self.inner.lock().await;
        inner.entries.iter().map(|entry| entry.item.clone()).collect()
    }

    /// Row shown for a product or draft id
    pub async fn row(&self, id: &str) -> Option<ProductRow> {
        let inner = self.inner.lock().await;
        inner.find(id).and_then(|entry| entry.row.clone())
    }

    /// Whether buffered changes should be fetched now
    pub async fn refresh_due(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.stale && inner.mode == RefreshMode::Auto
    }

    /// Backend data changed; fetch on the next refresh (or when resumed).
    pub async fn notify_data_changed(&self) {
        self.inner.lock().await.stale = true;
    }

    /// Switch automatic list updates on or off.
    ///
    /// Returns `true` when re-enabling found buffered changes that should be
    /// fetched immediately.
    pub async fn set_automatic_update(&self, enabled: bool) -> bool {
        let mut inner = self.inner.lock().await;
        if enabled == (inner.mode == RefreshMode::Auto) {
            return false;
        }
        let from = inner.mode;
        inner.mode = if enabled {
            RefreshMode::Auto
        } else if self.ctx.state.read(|s| s.is_list_loading) {
            RefreshMode::PrepareSuspend
        } else {
            RefreshMode::Suspended
        };
        log::debug!("List refresh mode {from:?} -> {:?}", inner.mode);
        enabled && inner.stale
    }

    pub async fn enable_auto_update(&self) -> bool {
        self.set_automatic_update(true).await
    }

    pub async fn disable_auto_update(&self) {
        self.set_automatic_update(false).await;
    }

    /// Fetch the list unless fetching is suspended.
    ///
    /// An `explicit` refresh (user pull-to-refresh or search) is executed even
    /// while suspended; the list suspends again once it completes.
    /// Returns `None` when no fetch was made.
    pub async fn refresh(&self, explicit: bool) -> CoreResult<Option<ListOutcome>> {
        let Some(query) = self.begin_fetch(explicit).await else {
            return Ok(None);
        };
        let result = self.ctx.backend.list_products(&query).await;
        self.finish_fetch(result).await.map(Some)
    }

    /// User refresh from the search field. A changed search term is applied
    /// before fetching.
    pub async fn explicit_refresh(
        &self,
        search_term: Option<String>,
    ) -> CoreResult<Option<ListOutcome>> {
        {
            let mut inner = self.inner.lock().await;
            let term = search_term.filter(|term| !term.is_empty());
            if term != inner.query.search_term {
                log::debug!("Search term changed to {term:?}");
                inner.query.search_term = term;
            }
        }
        self.refresh(true).await
    }

    /// Rebuild the query from search, sort, filter and group settings and
    /// reload. `after_update` runs once the reload has completed.
    pub async fn apply_query_changes(
        &self,
        change: QueryChange,
        after_update: Option<AfterUpdate>,
    ) -> CoreResult<Option<ListOutcome>> {
        {
            let mut inner = self.inner.lock().await;
            inner.query.apply(change);
            inner.stale = true;
            if let Some(callback) = after_update {
                inner.after_update.push(callback);
            }
        }
        self.refresh(false).await
    }

    async fn begin_fetch(&self, explicit: bool) -> Option<ListQuery> {
        let mut inner = self.inner.lock().await;
        if self.ctx.state.metadata_load_state() != MetadataLoadState::Ready {
            inner.stale = true;
            return None;
        }
        if explicit {
            if inner.mode == RefreshMode::Suspended {
                inner.mode = RefreshMode::PrepareSuspend;
                log::debug!("Explicit refresh while suspended");
            }
        } else if inner.mode != RefreshMode::Auto {
            inner.stale = true;
            return None;
        }
        inner.stale = false;
        self.ctx.state.set_list_loading(true);
        Some(inner.query.clone())
    }

    async fn finish_fetch(&self, result: CoreResult<Vec<ProductRow>>) -> CoreResult<ListOutcome> {
        let mut inner = self.inner.lock().await;
        self.ctx.state.set_list_loading(false);
        if inner.mode == RefreshMode::PrepareSuspend {
            inner.mode = RefreshMode::Suspended;
            log::debug!("List refresh mode PrepareSuspend -> Suspended");
        }
        if self.ctx.state.metadata_load_state() != MetadataLoadState::Ready {
            return Ok(ListOutcome::Unchanged);
        }

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                inner.stale = true;
                e.log("Loading the master list failed");
                return Err(e);
            }
        };
        inner.entries = build_entries(rows, inner.query.grouping.as_ref());
        let count = inner.real_entries().count();
        log::debug!("Master list loaded with {count} entries");
        if count == 0 {
            let texts = &self.ctx.config.texts;
            let text = if inner.query.is_restricted() {
                &texts.no_data_after_search
            } else {
                &texts.no_data
            };
            self.ctx.state.set_list_no_data_text(text.clone());
        }

        let outcome = self.find_item(&mut inner).await;
        if inner.adapt.is_some() {
            self.select_current(&mut inner);
        }
        for callback in std::mem::take(&mut inner.after_update) {
            callback();
        }
        Ok(outcome)
    }

    /// Decide what the detail area shows after a load
    async fn find_item(&self, inner: &mut ListInner) -> ListOutcome {
        let state = self.ctx.state.snapshot();
        if self.ctx.is_phone() || state.has_detail_target() {
            self.select_current(inner);
            self.ctx.state.set_app_busy(false);
            return ListOutcome::Unchanged;
        }
        if inner.real_entries().next().is_none() {
            return ListOutcome::Empty(state.list_no_data_text);
        }
        for id in &state.preferred_ids {
            if !self.deletions.is_draft_id_valid(id).await {
                continue;
            }
            if let Some(row) = inner.find(id).and_then(|entry| entry.row.clone()) {
                return ListOutcome::Navigate(row);
            }
        }
        inner
            .real_entries()
            .find_map(|entry| entry.row.clone())
            .map_or(ListOutcome::Unchanged, ListOutcome::Navigate)
    }

    /// Align the list with the detail area: select (and optionally scroll to)
    /// the current entity. Deferred until the list has loaded.
    pub async fn adapt_to_detail_selection(&self, scroll: bool) {
        let mut inner = self.inner.lock().await;
        inner.adapt = Some(scroll);
        let ready = self.ctx.state.read(|s| {
            s.metadata_load_state == MetadataLoadState::Ready && !s.is_list_loading
        });
        if ready {
            self.select_current(&mut inner);
        }
    }

    /// Select the entry of the current entity right away
    pub async fn select_for_current_state(&self, scroll: bool) {
        let mut inner = self.inner.lock().await;
        inner.adapt = Some(scroll);
        self.select_current(&mut inner);
    }

    fn select_current(&self, inner: &mut ListInner) {
        let scroll = inner.adapt.take().unwrap_or(false);
        let (relevant_id, multi_select) = self.ctx.state.read(|s| {
            (s.relevant_id().map(ToString::to_string), s.is_multi_select)
        });
        if self.ctx.is_phone() || multi_select {
            return;
        }
        let Some(view) = &self.ctx.views.master_list else {
            return;
        };
        let entry = relevant_id.as_deref().and_then(|id| inner.find(id));
        view.set_selected(entry.map(|entry| &entry.item));
        if let Some(entry) = entry {
            if scroll && !view.is_fully_visible() {
                let first = inner.real_entries().next().map(|first| first.item.position);
                if first == Some(entry.item.position) {
                    view.scroll_to(None);
                } else {
                    view.scroll_to(Some(&entry.item));
                }
            }
        }
    }

    /// Switch multi-select mode. Turning it on clears the selection; turning
    /// it off selects the current entity again.
    pub async fn set_multi_select(&self, enabled: bool) {
        self.ctx.state.set_multi_select(enabled);
        if enabled {
            if let Some(view) = &self.ctx.views.master_list {
                view.set_selected(None);
            }
        } else {
            self.adapt_to_detail_selection(false).await;
        }
    }

    /// Order in which entries should be preferred once `pivot` is gone:
    /// `replacements` (or `pivot`), the entries after `pivot`, then the
    /// entries before it, nearest first. When `pivot` is not in the list all
    /// entries follow in reverse order.
    pub async fn preferred_successors(
        &self,
        pivot: &str,
        replacements: Option<Vec<String>>,
    ) -> Vec<String> {
        let ids = self.inner.lock().await.ids();
        successor_order(&ids, pivot, replacements)
    }

    /// Prepare for entries disappearing: store the list order anchored at
    /// `current_id` (including it) as preferred ids and clear the current entity.
    pub async fn prepare_reset_after_deletion(&self, current_id: Option<&str>) {
        let ids = self.inner.lock().await.ids();
        let position = current_id.and_then(|id| ids.iter().position(|other| other == id));
        let preferred = match position {
            Some(index) => {
                let mut preferred = ids[index..].to_vec();
                preferred.extend(ids[..index].iter().rev().cloned());
                preferred
            }
            None => ids.into_iter().rev().collect(),
        };
        self.ctx.state.update(|s| {
            s.preferred_ids = preferred;
            s.product_id = None;
            s.draft_id = None;
        });
    }
}

fn successor_order(ids: &[String], pivot: &str, replacements: Option<Vec<String>>) -> Vec<String> {
    let mut preferred = replacements.unwrap_or_else(|| vec![pivot.to_string()]);
    let mut before = Vec::new();
    let mut found = false;
    for id in ids {
        if id == pivot {
            found = true;
        } else if found {
            preferred.push(id.clone());
        } else {
            before.push(id.clone());
        }
    }
    preferred.extend(before.into_iter().rev());
    preferred
}

fn build_entries(rows: Vec<ProductRow>, grouping: Option<&Grouping>) -> Vec<ListEntry> {
    let mut entries: Vec<ListEntry> = Vec::with_capacity(rows.len());
    let mut current_group: Option<String> = None;
    for row in rows {
        let Some(id) = row.relevant_id().map(ToString::to_string) else {
            continue;
        };
        if let Some(grouping) = grouping {
            let (key, title) = grouping.group_of(&row);
            if current_group.as_ref() != Some(&key) {
                entries.push(ListEntry {
                    item: ListItemRef {
                        id: key.clone(),
                        position: entries.len(),
                        is_group_header: true,
                        title: Some(title),
                    },
                    row: None,
                });
                current_group = Some(key);
            }
        }
        entries.push(ListEntry {
            item: ListItemRef {
                id,
                position: entries.len(),
                is_group_header: false,
                title: None,
            },
            row: Some(row),
        });
    }
    entries
}

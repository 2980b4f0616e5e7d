//! Navigation state holder
//!
//! Maps route matches to [`AppState`](crate::types::AppState) and issues
//! programmatic navigation. It is the only component talking to the router.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::services::{ListSynchronizer, ServiceContext};
use crate::types::{normalize_id, MetadataLoadState, NavigationRequest, RouteMatch, RouteName};

/// Result of handling a route match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteOutcome {
    /// Metadata still loading; the route is kept until it is ready
    Deferred,
    /// Metadata failed; reload it, the route is replayed afterwards
    MetadataReloadRequested,
    Handled,
    /// No route pattern matched; the "not found" page is shown
    NotFound,
    /// Nothing was pending
    Idle,
}

/// Where `go_back` went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackOutcome {
    History,
    Master,
    Shell,
}

struct NavigationState {
    /// Most recent route match not handled yet
    pending_route: Option<RouteMatch>,
    /// The next route match results from our own navigation
    programmatic: bool,
    /// The detail view still has to be told about the new entity
    views_must_adapt: bool,
}

/// Navigation state holder
pub struct NavigationService {
    ctx: Arc<ServiceContext>,
    list: Arc<ListSynchronizer>,
    inner: Mutex<NavigationState>,
}

impl NavigationService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, list: Arc<ListSynchronizer>) -> Self {
        Self {
            ctx,
            list,
            inner: Mutex::new(NavigationState {
                pending_route: None,
                programmatic: false,
                views_must_adapt: true,
            }),
        }
    }

    /// Handle a route match reported by the router. Only the latest match is
    /// kept while metadata is not ready.
    pub async fn handle_route_match(&self, route_match: RouteMatch) -> RouteOutcome {
        log::debug!("Route matched: {route_match:?}");
        self.inner.lock().await.pending_route = Some(route_match);
        self.process_pending().await
    }

    /// Metadata became ready: replay the pending route, if any.
    pub async fn metadata_succeeded(&self) -> RouteOutcome {
        self.process_pending().await
    }

    /// Show the metadata error on the empty page (a phone without selection
    /// keeps the master page).
    pub async fn metadata_failed(&self, text: &str) {
        self.ctx.state.set_empty_text(Some(text.to_string()));
        let has_entity = self.ctx.state.relevant_id().is_some();
        if !self.ctx.is_phone() || has_entity {
            self.ctx.host.show_empty_page().await;
        }
    }

    pub async fn has_pending_route(&self) -> bool {
        self.inner.lock().await.pending_route.is_some()
    }

    async fn process_pending(&self) -> RouteOutcome {
        let mut inner = self.inner.lock().await;
        if inner.pending_route.is_none() {
            return RouteOutcome::Idle;
        }
        match self.ctx.state.metadata_load_state() {
            MetadataLoadState::Loading => return RouteOutcome::Deferred,
            MetadataLoadState::Failed => return RouteOutcome::MetadataReloadRequested,
            MetadataLoadState::Ready => {}
        }
        let Some(RouteMatch { route, args }) = inner.pending_route.take() else {
            return RouteOutcome::Idle;
        };
        let programmatic = std::mem::replace(&mut inner.programmatic, false);
        let views_must_adapt = std::mem::replace(&mut inner.views_must_adapt, true);

        let Some(route) = route else {
            self.on_bypassed().await;
            return RouteOutcome::NotFound;
        };

        let draft_route = route.is_draft_route();
        let product_id = if route.has_product_id() {
            args.decoded_product_id()
        } else {
            None
        };
        let draft_id = if draft_route { args.draft_uuid } else { None };
        self.ctx.state.update(|s| {
            s.product_id = normalize_id(product_id.as_deref());
            s.draft_id = normalize_id(draft_id.as_deref());
            s.item_not_found = false;
        });

        if product_id.is_some() || draft_route {
            if views_must_adapt {
                if let Some(view) = self.ctx.views.detail(draft_route) {
                    view.product_changed();
                }
            }
            self.list.adapt_to_detail_selection(!programmatic).await;
        }
        let phone = self.ctx.is_phone();
        self.ctx.state.update(|s| {
            if !programmatic {
                s.preferred_ids.clear();
            }
            s.detail_in_history = phone;
        });
        log::debug!("Route {route} handled (programmatic: {programmatic})");
        RouteOutcome::Handled
    }

    async fn on_bypassed(&self) {
        log::warn!("No route matched, showing the not found page");
        let text = self.ctx.config.texts.page_not_found.clone();
        self.ctx.state.update(|s| {
            s.empty_text = Some(text);
            s.product_id = None;
            s.draft_id = None;
            s.item_not_found = true;
        });
        self.list.adapt_to_detail_selection(false).await;
        self.ctx.state.set_preferred_ids(Vec::new());
    }

    /// Show an active product
    ///
    /// # Arguments
    /// * `product_id` - Product to show
    /// * `from_list` - Triggered by picking the product in the master list
    pub async fn navigate_to_display(&self, product_id: &str, from_list: bool) {
        self.ctx.state.update(|s| {
            s.product_id = normalize_id(Some(product_id));
            s.draft_id = None;
            s.item_not_found = false;
        });
        self.list.adapt_to_detail_selection(false).await;
        self.list.set_automatic_update(true).await;
        if let Some(view) = &self.ctx.views.display {
            view.product_changed();
        }
        let replace = !(from_list && self.ctx.is_phone());
        self.execute(NavigationRequest::display(product_id), replace)
            .await;
    }

    /// Edit a draft; `create` route when the draft has no product yet.
    pub async fn navigate_to_edit_draft(
        &self,
        product_id: Option<&str>,
        draft_id: &str,
        from_list: bool,
    ) {
        let product_id = product_id.filter(|id| !id.is_empty());
        let add_to_history = from_list && self.ctx.is_phone();
        self.ctx.state.update(|s| {
            s.product_id = normalize_id(product_id);
            s.draft_id = normalize_id(Some(draft_id));
            s.item_not_found = false;
            s.detail_in_history = add_to_history;
        });
        self.list.adapt_to_detail_selection(false).await;
        self.list.set_automatic_update(false).await;
        if let Some(view) = &self.ctx.views.edit {
            view.product_changed();
        }
        self.execute(NavigationRequest::draft(product_id, draft_id), !add_to_history)
            .await;
    }

    /// Back to the master route. With a `pivot`, its successors (or
    /// `replacements`) become the preferred ids; with replacements only they
    /// are taken as they are; otherwise the preferred ids are kept.
    pub async fn navigate_to_master(&self, pivot: Option<&str>, replacements: Option<Vec<String>>) {
        self.execute(NavigationRequest::master(), true).await;
        self.ctx.state.set_ids(None, None);
        match (pivot, replacements) {
            (Some(pivot), replacements) => {
                let preferred = self.list.preferred_successors(pivot, replacements).await;
                self.ctx.state.set_preferred_ids(preferred);
            }
            (None, Some(replacements)) => self.ctx.state.set_preferred_ids(replacements),
            (None, None) => {}
        }
        self.list.set_automatic_update(true).await;
    }

    /// Show the empty page with `text`, optionally resetting the URL to master.
    pub async fn navigate_to_empty_page(&self, text: &str, reset_url: bool) {
        self.ctx.state.update(|s| {
            s.empty_text = Some(text.to_string());
            s.draft_id = None;
        });
        self.list.set_automatic_update(true).await;
        if reset_url {
            self.execute(NavigationRequest::master(), true).await;
        }
        self.ctx.host.show_empty_page().await;
        self.ctx.state.set_preferred_ids(Vec::new());
    }

    /// Back navigation
    ///
    /// # Arguments
    /// * `prefer_history` - Use the browser history when there is one
    /// * `from_detail` - Called from the detail screen (phone)
    pub async fn go_back(&self, prefer_history: bool, from_detail: bool) -> BackOutcome {
        self.ctx.state.update(|s| {
            s.product_id = None;
            s.draft_id = None;
            s.preferred_ids.clear();
        });
        if prefer_history && self.ctx.host.history_back().await {
            return BackOutcome::History;
        }
        if from_detail {
            self.ctx.host.back_to_master().await;
            self.execute(NavigationRequest::master(), true).await;
            return BackOutcome::Master;
        }
        self.ctx.host.exit_to_shell().await;
        BackOutcome::Shell
    }

    /// Unbind detail views that are no longer visible
    pub fn after_navigate(&self) {
        let (has_product, has_draft) = self
            .ctx
            .state
            .read(|s| (s.product_id.is_some(), s.draft_id.is_some()));
        if !has_draft {
            if let Some(view) = &self.ctx.views.edit {
                view.unbind();
            }
        }
        if has_draft || !has_product {
            if let Some(view) = &self.ctx.views.display {
                view.unbind();
            }
        }
    }

    async fn execute(&self, request: NavigationRequest, replace: bool) {
        {
            let mut inner = self.inner.lock().await;
            inner.programmatic = true;
            let view = if request.route == RouteName::Display {
                &self.ctx.views.display
            } else {
                &self.ctx.views.edit
            };
            inner.views_must_adapt = view.is_none();
        }
        log::debug!("Navigating to {} (replace: {replace})", request.route);
        if !self.ctx.host.navigate(&request, replace).await {
            log::debug!("Hash unchanged, no route match follows");
            let mut inner = self.inner.lock().await;
            inner.programmatic = false;
            inner.views_must_adapt = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ids, HostEvent, TestHarness};
    use crate::types::RouteArgs;

    async fn service(harness: &TestHarness) -> NavigationService {
        let list = Arc::new(ListSynchronizer::new(
            harness.ctx(),
            Arc::clone(&harness.deletions),
        ));
        NavigationService::new(harness.ctx(), list)
    }

    fn display(product: &str) -> RouteMatch {
        RouteMatch::new(RouteName::Display, RouteArgs::for_product(product))
    }

    #[tokio::test]
    async fn display_route_sets_product_id() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        let nav = service(&harness).await;

        assert_eq!(nav.handle_route_match(display("HT-1001")).await, RouteOutcome::Handled);
        let state = harness.state.snapshot();
        assert_eq!(state.active_product_id(), "HT-1001");
        assert_eq!(state.active_draft_id(), "");
        assert_eq!(harness.display.changed(), 1);
    }

    #[tokio::test]
    async fn routes_wait_for_metadata_and_latest_wins() {
        let harness = TestHarness::new();
        let nav = service(&harness).await;

        assert_eq!(nav.handle_route_match(display("HT-1000")).await, RouteOutcome::Deferred);
        assert_eq!(nav.handle_route_match(display("HT-1002")).await, RouteOutcome::Deferred);
        assert_eq!(harness.state.snapshot().product_id, None);

        harness.mark_metadata_ready();
        assert_eq!(nav.metadata_succeeded().await, RouteOutcome::Handled);
        assert_eq!(harness.state.snapshot().active_product_id(), "HT-1002");
        assert_eq!(nav.metadata_succeeded().await, RouteOutcome::Idle);
    }

    #[tokio::test]
    async fn failed_metadata_requests_reload_and_keeps_route() {
        let harness = TestHarness::new();
        harness
            .state
            .set_metadata_load_state(MetadataLoadState::Failed);
        let nav = service(&harness).await;

        assert_eq!(
            nav.handle_route_match(display("HT-1000")).await,
            RouteOutcome::MetadataReloadRequested
        );
        assert!(nav.has_pending_route().await);
    }

    #[tokio::test]
    async fn edit_route_decodes_product_and_draft() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        let nav = service(&harness).await;

        let route = RouteMatch::new(
            RouteName::Edit,
            RouteArgs::for_product("HT 1000").with_draft("d-1"),
        );
        nav.handle_route_match(route).await;
        let state = harness.state.snapshot();
        assert_eq!(state.active_product_id(), "HT 1000");
        assert_eq!(state.active_draft_id(), "d-1");
        assert_eq!(harness.edit.changed(), 1);
        assert_eq!(harness.display.changed(), 0);
    }

    #[tokio::test]
    async fn bypassed_route_shows_not_found() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        harness.state.set_ids(Some("HT-1000"), None);
        harness.state.set_preferred_ids(ids(&["HT-1001"]));
        let nav = service(&harness).await;

        assert_eq!(
            nav.handle_route_match(RouteMatch::bypassed()).await,
            RouteOutcome::NotFound
        );
        let state = harness.state.snapshot();
        assert!(state.item_not_found);
        assert_eq!(state.relevant_id(), None);
        assert!(state.preferred_ids.is_empty());
        assert_eq!(state.empty_text, Some(harness.config.texts.page_not_found.clone()));
    }

    #[tokio::test]
    async fn programmatic_navigation_keeps_preferred_ids() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        let nav = service(&harness).await;

        nav.navigate_to_display("HT-1001", false).await;
        assert_eq!(
            harness.host.events().await,
            vec![HostEvent::Navigate {
                hash: "Products/HT-1001".to_string(),
                replace: true
            }]
        );
        harness.state.set_preferred_ids(ids(&["x"]));
        nav.handle_route_match(display("HT-1001")).await;
        assert_eq!(harness.state.preferred_ids(), ids(&["x"]));
        // the display view was told before navigating and not again
        assert_eq!(harness.display.changed(), 1);

        // a user navigation resets them
        nav.handle_route_match(display("HT-1000")).await;
        assert!(harness.state.preferred_ids().is_empty());
        assert_eq!(harness.display.changed(), 2);
    }

    #[tokio::test]
    async fn navigation_to_current_hash_leaves_next_match_to_the_user() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        let nav = service(&harness).await;

        nav.navigate_to_display("HT-1001", false).await;
        nav.handle_route_match(display("HT-1001")).await;
        // same hash again, the router stays silent
        nav.navigate_to_display("HT-1001", true).await;
        assert_eq!(harness.display.changed(), 2);

        harness.state.set_preferred_ids(ids(&["stale"]));
        nav.handle_route_match(display("HT-1000")).await;
        assert!(harness.state.preferred_ids().is_empty());
        assert_eq!(harness.display.changed(), 3);
    }

    #[tokio::test]
    async fn phone_list_navigation_pushes_history() {
        let harness = TestHarness::phone();
        harness.mark_metadata_ready();
        let nav = service(&harness).await;

        nav.navigate_to_display("HT-1001", true).await;
        nav.navigate_to_edit_draft(None, "d-1", true).await;
        assert!(harness.state.snapshot().detail_in_history);
        assert_eq!(
            harness.host.events().await,
            vec![
                HostEvent::Navigate {
                    hash: "Products/HT-1001".to_string(),
                    replace: false
                },
                HostEvent::Navigate {
                    hash: "Drafts/d-1".to_string(),
                    replace: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn edit_draft_suspends_list_updates() {
        let harness = TestHarness::new();
        harness.mark_metadata_ready();
        let list = Arc::new(ListSynchronizer::new(
            harness.ctx(),
            Arc::clone(&harness.deletions),
        ));
        let nav = NavigationService::new(harness.ctx(), Arc::clone(&list));

        nav.navigate_to_edit_draft(Some("HT-1000"), "d-1", false).await;
        assert_ne!(list.refresh_mode().await, crate::services::RefreshMode::Auto);
        assert_eq!(harness.edit.changed(), 1);

        nav.navigate_to_master(None, None).await;
        assert_eq!(list.refresh_mode().await, crate::services::RefreshMode::Auto);
        assert_eq!(harness.state.relevant_id(), None);
    }

    #[tokio::test]
    async fn master_with_only_replacements_takes_them() {
        let harness = TestHarness::new();
        let nav = service(&harness).await;
        nav.navigate_to_master(None, Some(ids(&["a", "b"]))).await;
        assert_eq!(harness.state.preferred_ids(), ids(&["a", "b"]));

        nav.navigate_to_master(Some("gone"), None).await;
        assert_eq!(harness.state.preferred_ids(), ids(&["gone"]));
    }

    #[tokio::test]
    async fn go_back_prefers_history_then_master_then_shell() {
        let harness = TestHarness::new();
        let nav = service(&harness).await;
        harness.state.set_ids(Some("HT-1000"), None);

        harness.host.set_history_available(true).await;
        assert_eq!(nav.go_back(true, true).await, BackOutcome::History);
        assert_eq!(harness.state.relevant_id(), None);

        harness.host.set_history_available(false).await;
        assert_eq!(nav.go_back(true, true).await, BackOutcome::Master);
        assert_eq!(nav.go_back(true, false).await, BackOutcome::Shell);
        assert_eq!(nav.go_back(false, false).await, BackOutcome::Shell);
        assert!(harness.host.events().await.contains(&HostEvent::ExitToShell));
    }

    #[tokio::test]
    async fn empty_page_resets_url_and_preferred() {
        let harness = TestHarness::new();
        harness.state.set_preferred_ids(ids(&["a"]));
        let nav = service(&harness).await;

        nav.navigate_to_empty_page("Nothing", true).await;
        let state = harness.state.snapshot();
        assert_eq!(state.empty_text.as_deref(), Some("Nothing"));
        assert!(state.preferred_ids.is_empty());
        assert_eq!(
            harness.host.events().await,
            vec![
                HostEvent::Navigate {
                    hash: String::new(),
                    replace: true
                },
                HostEvent::EmptyPage
            ]
        );
    }

    #[tokio::test]
    async fn metadata_failure_on_phone_without_selection_keeps_master() {
        let harness = TestHarness::phone();
        let nav = service(&harness).await;
        nav.metadata_failed("offline").await;
        assert!(harness.host.events().await.is_empty());
        assert_eq!(harness.state.snapshot().empty_text.as_deref(), Some("offline"));

        let harness = TestHarness::new();
        let nav = service(&harness).await;
        nav.metadata_failed("offline").await;
        assert_eq!(harness.host.events().await, vec![HostEvent::EmptyPage]);
    }

    #[tokio::test]
    async fn after_navigate_unbinds_hidden_views() {
        let harness = TestHarness::new();
        let nav = service(&harness).await;

        harness.state.set_ids(Some("HT-1000"), None);
        nav.after_navigate();
        assert_eq!(harness.edit.unbound(), 1);
        assert_eq!(harness.display.unbound(), 0);

        harness.state.set_ids(Some("HT-1000"), Some("d-1"));
        nav.after_navigate();
        assert_eq!(harness.edit.unbound(), 1);
        assert_eq!(harness.display.unbound(), 1);
    }
}

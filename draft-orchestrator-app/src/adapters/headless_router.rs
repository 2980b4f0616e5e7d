//! Router without a browser
//!
//! Keeps the URL hash and the history in memory. Every hash change produces a
//! route match that the [`Application`](crate::Application) picks up.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use draft_orchestrator_core::traits::NavigationHost;
use draft_orchestrator_core::types::{NavigationRequest, RouteMatch};

#[derive(Default)]
struct RouterState {
    hash: String,
    /// Previous hashes, most recent last
    history: Vec<String>,
    matches: VecDeque<RouteMatch>,
    initialized: bool,
    empty_pages: usize,
    master_shown: usize,
}

impl RouterState {
    /// Returns whether a route match was queued
    fn go_to(&mut self, hash: String, replace: bool) -> bool {
        if hash == self.hash && self.initialized {
            return false;
        }
        if !replace {
            let previous = std::mem::replace(&mut self.hash, hash);
            self.history.push(previous);
        } else {
            self.hash = hash;
        }
        self.emit()
    }

    fn emit(&mut self) -> bool {
        if self.initialized {
            self.matches.push_back(NavigationRequest::match_hash(&self.hash));
        }
        self.initialized
    }
}

/// In-memory hash router implementing [`NavigationHost`]
#[derive(Default)]
pub struct HeadlessRouter {
    state: Mutex<RouterState>,
}

impl HeadlessRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start routing at `hash`; its route match is reported right away.
    pub async fn initialize(&self, hash: &str) {
        let mut state = self.state.lock().await;
        state.hash = hash.to_string();
        state.initialized = true;
        state.emit();
    }

    /// The user changed the URL
    pub async fn set_hash(&self, hash: &str) {
        let _ = self.state.lock().await.go_to(hash.to_string(), false);
    }

    pub async fn hash(&self) -> String {
        self.state.lock().await.hash.clone()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    /// Route matches not yet handled, oldest first
    pub async fn take_route_matches(&self) -> Vec<RouteMatch> {
        self.state.lock().await.matches.drain(..).collect()
    }

    /// How often the empty page was shown
    pub async fn empty_pages(&self) -> usize {
        self.state.lock().await.empty_pages
    }

    /// How often the phone master page was shown
    pub async fn master_shown(&self) -> usize {
        self.state.lock().await.master_shown
    }
}

#[async_trait]
impl NavigationHost for HeadlessRouter {
    async fn navigate(&self, request: &NavigationRequest, replace: bool) -> bool {
        let hash = request.to_hash();
        log::debug!("Hash change to '{hash}' (replace: {replace})");
        self.state.lock().await.go_to(hash, replace)
    }

    async fn show_empty_page(&self) {
        self.state.lock().await.empty_pages += 1;
    }

    async fn history_back(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.history.pop() {
            Some(previous) => {
                state.hash = previous;
                state.emit();
                true
            }
            None => false,
        }
    }

    async fn back_to_master(&self) {
        self.state.lock().await.master_shown += 1;
    }

    async fn exit_to_shell(&self) {
        let mut state = self.state.lock().await;
        log::info!("Leaving to the shell from '{}'", state.hash);
        state.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draft_orchestrator_core::types::RouteName;

    #[tokio::test]
    async fn matches_are_reported_after_initialization() {
        let router = HeadlessRouter::new();
        assert!(
            !router
                .navigate(&NavigationRequest::display("HT-1000"), false)
                .await
        );
        assert!(router.take_route_matches().await.is_empty());

        router.initialize("Products/HT-1000").await;
        let matches = router.take_route_matches().await;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].route, Some(RouteName::Display));
    }

    #[tokio::test]
    async fn replace_keeps_history_short() {
        let router = HeadlessRouter::new();
        router.initialize("").await;
        router
            .navigate(&NavigationRequest::display("HT-1000"), true)
            .await;
        assert_eq!(router.history_len().await, 0);
        router
            .navigate(&NavigationRequest::draft(Some("HT-1000"), "d-1"), false)
            .await;
        assert_eq!(router.history_len().await, 1);

        assert!(router.history_back().await);
        assert_eq!(router.hash().await, "Products/HT-1000");
        assert!(!router.history_back().await);
        // initial, display, edit, back to display
        assert_eq!(router.take_route_matches().await.len(), 4);
    }

    #[tokio::test]
    async fn unchanged_hash_is_not_reported() {
        let router = HeadlessRouter::new();
        router.initialize("").await;
        router.take_route_matches().await;
        assert!(!router.navigate(&NavigationRequest::master(), true).await);
        assert!(router.take_route_matches().await.is_empty());

        router.set_hash("no/such/page").await;
        let matches = router.take_route_matches().await;
        assert!(matches[0].is_bypassed());
    }
}

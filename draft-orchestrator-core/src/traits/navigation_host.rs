//! Router / shell abstract Trait

use async_trait::async_trait;

use crate::types::NavigationRequest;

/// Host side of navigation: hash changes, detail targets and history
///
/// A route change triggered through [`NavigationHost::navigate`] comes back as a
/// route match, which the host reports to the navigation service.
#[async_trait]
pub trait NavigationHost: Send + Sync {
    /// Change the URL hash
    ///
    /// # Arguments
    /// * `request` - Target route and arguments
    /// * `replace` - Replace the current history entry instead of pushing one
    ///
    /// Returns `false` when no route match will follow, e.g. because the hash
    /// did not change.
    async fn navigate(&self, request: &NavigationRequest, replace: bool) -> bool;

    /// Show the empty page in the detail area
    async fn show_empty_page(&self);

    /// Go back in the browser history; `false` when there is no previous entry
    async fn history_back(&self) -> bool;

    /// Phone only: show the master page again
    async fn back_to_master(&self);

    /// Leave the app to the hosting shell
    async fn exit_to_shell(&self);
}

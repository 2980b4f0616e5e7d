//! Draft, master list and navigation services

mod draft_service;
mod list_synchronizer;
mod metadata_loader;
mod navigation_service;
mod pending_deletions;

pub use draft_service::{
    BulkDeleteEntry, BulkDeletePlan, DeleteOutcome, DraftService, FollowUp, ResumeDecision,
};
pub use list_synchronizer::{AfterUpdate, ListOutcome, ListSynchronizer, RefreshMode};
pub use metadata_loader::MetadataLoader;
pub use navigation_service::{BackOutcome, NavigationService, RouteOutcome};
pub use pending_deletions::PendingDeletions;

use std::sync::Arc;

use crate::state::AppStateStore;
use crate::traits::{DraftBackend, NavigationHost, ViewRegistry};
use crate::types::AppConfig;

/// Dependencies shared by the draft, list and navigation services
///
/// The host builds it once with its backend, router and views; the
/// `ApplicationBuilder` of the app crate does this for headless hosts.
pub struct ServiceContext {
    /// Draft-enabled product service
    pub backend: Arc<dyn DraftBackend>,
    /// Router / shell
    pub host: Arc<dyn NavigationHost>,
    /// Views registered at startup
    pub views: ViewRegistry,
    /// Session state
    pub state: Arc<AppStateStore>,
    pub config: Arc<AppConfig>,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        backend: Arc<dyn DraftBackend>,
        host: Arc<dyn NavigationHost>,
        views: ViewRegistry,
        state: Arc<AppStateStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            backend,
            host,
            views,
            state,
            config,
        }
    }

    pub fn is_phone(&self) -> bool {
        self.config.is_phone()
    }

    /// Set the busy flag, run `fut`, clear the flag again whatever the result.
    pub(crate) async fn while_busy<T>(
        &self,
        fut: impl std::future::Future<Output = T>,
    ) -> T {
        self.state.set_app_busy(true);
        let result = fut.await;
        self.state.set_app_busy(false);
        result
    }
}

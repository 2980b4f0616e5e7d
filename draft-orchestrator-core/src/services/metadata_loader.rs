//! Backend handshake

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::CoreResult;
use crate::services::ServiceContext;
use crate::types::MetadataLoadState;

/// Owns `metadata_load_state` and the retry of a failed handshake.
pub struct MetadataLoader {
    ctx: Arc<ServiceContext>,
    /// Serializes handshakes; a second caller waits and sees the result
    slot: Mutex<()>,
}

impl MetadataLoader {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            slot: Mutex::new(()),
        }
    }

    /// Run the handshake (again).
    ///
    /// On success the state becomes `Ready` and the list is flagged as loading.
    /// On failure the state becomes `Failed` and the error text is shown by the
    /// empty list.
    pub async fn load(&self) -> CoreResult<()> {
        let _slot = self.slot.lock().await;
        self.handshake().await
    }

    async fn handshake(&self) -> CoreResult<()> {
        let state = &self.ctx.state;
        state.set_metadata_load_state(MetadataLoadState::Loading);
        log::debug!("Loading backend metadata");

        match self.ctx.backend.load_metadata().await {
            Ok(()) => {
                state.update(|s| {
                    s.metadata_load_state = MetadataLoadState::Ready;
                    s.is_list_loading = true;
                });
                log::info!("Backend metadata loaded");
                Ok(())
            }
            Err(e) => {
                let text = format!("{}: {e}", self.ctx.config.texts.metadata_failed);
                state.update(|s| {
                    s.metadata_load_state = MetadataLoadState::Failed;
                    s.list_no_data_text = text;
                });
                e.log("Metadata handshake failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::test_utils::TestHarness;

    #[tokio::test]
    async fn success_marks_ready_and_list_loading() {
        let harness = TestHarness::new();
        let loader = MetadataLoader::new(harness.ctx());

        loader.load().await.unwrap();
        let state = harness.state.snapshot();
        assert_eq!(state.metadata_load_state, MetadataLoadState::Ready);
        assert!(state.is_list_loading);
    }

    #[tokio::test]
    async fn failure_is_retryable() {
        let harness = TestHarness::new();
        harness
            .backend
            .fail_next("load_metadata", CoreError::MetadataUnavailable("offline".to_string()))
            .await;
        let loader = MetadataLoader::new(harness.ctx());

        assert!(loader.load().await.is_err());
        let state = harness.state.snapshot();
        assert_eq!(state.metadata_load_state, MetadataLoadState::Failed);
        assert!(state.list_no_data_text.contains("offline"));

        loader.load().await.unwrap();
        assert_eq!(harness.state.metadata_load_state(), MetadataLoadState::Ready);
        assert_eq!(harness.backend.call_count("load_metadata").await, 2);
    }
}

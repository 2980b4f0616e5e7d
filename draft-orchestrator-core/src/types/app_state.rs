//! Global application state

use serde::{Deserialize, Serialize};

/// Backend metadata handshake state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataLoadState {
    /// Handshake in progress
    #[default]
    Loading,
    /// Service is reachable, navigation and list operations may proceed
    Ready,
    /// Handshake failed, a retry is required
    Failed,
}

/// Draft save indicator shown while editing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftIndicatorState {
    #[default]
    Clear,
    Saving,
    Saved,
}

/// Session-wide state shared by navigation, the master list and the detail views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Product currently displayed or edited
    pub product_id: Option<String>,
    /// Draft currently edited
    pub draft_id: Option<String>,
    /// Ids preferably shown next when the list has been reloaded
    pub preferred_ids: Vec<String>,
    /// Whether the master list is currently fetching
    pub is_list_loading: bool,
    /// Whether the master list is in multi-select mode
    pub is_multi_select: bool,
    pub metadata_load_state: MetadataLoadState,
    /// Busy state of the whole app
    pub is_app_busy: bool,
    /// Phone only: the detail page was pushed onto the history
    pub detail_in_history: bool,
    /// The requested item could not be resolved ("page not found")
    pub item_not_found: bool,
    /// Text shown on the empty detail page
    pub empty_text: Option<String>,
    /// Text shown by the master list when it is empty
    pub list_no_data_text: String,
    pub draft_indicator: DraftIndicatorState,
}

impl AppState {
    /// Id identifying the current entity: the product id, else the draft id.
    pub fn relevant_id(&self) -> Option<&str> {
        self.product_id.as_deref().or(self.draft_id.as_deref())
    }

    /// Whether the detail area is occupied, either by an entity or by the
    /// "not found" placeholder. The list does not pick a new item in that case.
    pub fn has_detail_target(&self) -> bool {
        self.relevant_id().is_some() || self.item_not_found
    }

    /// Active product id, `""` when none.
    pub fn active_product_id(&self) -> &str {
        self.product_id.as_deref().unwrap_or_default()
    }

    /// Active draft id, `""` when none.
    pub fn active_draft_id(&self) -> &str {
        self.draft_id.as_deref().unwrap_or_default()
    }
}

/// Normalize an id coming from a route or the backend: empty means absent.
pub fn normalize_id(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevant_id_prefers_product() {
        let state = AppState {
            product_id: Some("HT-1000".to_string()),
            draft_id: Some("d-1".to_string()),
            ..AppState::default()
        };
        assert_eq!(state.relevant_id(), Some("HT-1000"));

        let state = AppState {
            draft_id: Some("d-1".to_string()),
            ..AppState::default()
        };
        assert_eq!(state.relevant_id(), Some("d-1"));
        assert_eq!(state.active_product_id(), "");
    }

    #[test]
    fn not_found_counts_as_detail_target() {
        let state = AppState {
            item_not_found: true,
            ..AppState::default()
        };
        assert!(state.relevant_id().is_none());
        assert!(state.has_detail_target());
    }

    #[test]
    fn normalize_drops_blank_ids() {
        assert_eq!(normalize_id(Some("")), None);
        assert_eq!(normalize_id(Some(" ")), None);
        assert_eq!(normalize_id(None), None);
        assert_eq!(normalize_id(Some("HT-1")), Some("HT-1".to_string()));
    }
}

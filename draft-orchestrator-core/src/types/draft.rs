//! Draft related type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Draft UUID used by the backend to denote "no draft" (active entities, new products).
pub const NULL_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Whether a draft id denotes an actual draft.
pub fn is_real_draft_id(id: &str) -> bool {
    !id.is_empty() && id != NULL_UUID
}

/// Administrative data the backend keeps for every draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAdministrativeData {
    pub draft_uuid: String,
    pub creation_date_time: DateTime<Utc>,
    pub last_change_date_time: DateTime<Utc>,
    /// Draft was created by the current user
    pub draft_is_created_by_me: bool,
    /// User currently holding the lock, empty when the lock has expired
    #[serde(default)]
    pub in_process_by_user: String,
    #[serde(default)]
    pub last_changed_by_user: String,
}

impl DraftAdministrativeData {
    /// The backend sets both timestamps to the same value on creation, so any
    /// difference means the user changed something.
    pub fn is_clean(&self) -> bool {
        self.creation_date_time == self.last_change_date_time
    }

    pub fn is_locked(&self) -> bool {
        !self.in_process_by_user.is_empty()
    }
}

/// Reference to an opened draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRef {
    /// Product the draft belongs to (absent for a new product)
    pub product_id: Option<String>,
    pub draft_id: String,
    pub is_active: bool,
    /// An active product backs this draft
    #[serde(default)]
    pub has_active_entity: bool,
    pub created_by_current_user: bool,
    pub created_at: DateTime<Utc>,
    pub last_changed_at: DateTime<Utc>,
}

impl DraftRef {
    pub fn is_dirty(&self) -> bool {
        self.created_at != self.last_changed_at
    }
}

/// Key of an entity to delete
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityKey {
    /// Active product
    Product { product_id: String },
    /// Draft, with the product it belongs to (if any)
    Draft {
        product_id: Option<String>,
        draft_id: String,
    },
}

impl EntityKey {
    pub fn product(product_id: impl Into<String>) -> Self {
        Self::Product {
            product_id: product_id.into(),
        }
    }

    pub fn draft(product_id: Option<String>, draft_id: impl Into<String>) -> Self {
        Self::Draft {
            product_id,
            draft_id: draft_id.into(),
        }
    }

    /// Id used for deduplication: the product id for active entities, the
    /// draft id for drafts.
    pub fn dedup_id(&self) -> &str {
        match self {
            Self::Product { product_id } => product_id,
            Self::Draft { draft_id, .. } => draft_id,
        }
    }
}

impl From<&DraftRef> for EntityKey {
    fn from(draft: &DraftRef) -> Self {
        Self::draft(draft.product_id.clone(), draft.draft_id.clone())
    }
}

/// Single field edit on a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub draft_id: String,
    pub field: String,
    pub value: serde_json::Value,
}

impl FieldChange {
    pub fn new(
        draft_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            draft_id: draft_id.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Result of one `submit-pending-changes` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// Business message extracted from the batch responses, if any
    pub message: Option<String>,
}

/// Failure of a single entry in a batch delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteFailure {
    pub key: EntityKey,
    pub reason: String,
}

/// Result of a backend batch delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteResult {
    pub success_count: usize,
    pub failed_count: usize,
    pub failures: Vec<BatchDeleteFailure>,
}

/// What `delete_batch` did with every requested entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteReport {
    pub deleted: Vec<EntityKey>,
    /// Already pending or deleted, not sent again
    pub skipped: Vec<EntityKey>,
    pub failed: Vec<BatchDeleteFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn admin(changed_after: i64, in_process_by: &str) -> DraftAdministrativeData {
        let created = Utc::now();
        DraftAdministrativeData {
            draft_uuid: "d-1".to_string(),
            creation_date_time: created,
            last_change_date_time: created + Duration::seconds(changed_after),
            draft_is_created_by_me: true,
            in_process_by_user: in_process_by.to_string(),
            last_changed_by_user: String::new(),
        }
    }

    #[test]
    fn clean_draft_has_identical_timestamps() {
        assert!(admin(0, "").is_clean());
        assert!(!admin(5, "").is_clean());
    }

    #[test]
    fn lock_requires_processing_user() {
        assert!(admin(0, "JOHN").is_locked());
        assert!(!admin(0, "").is_locked());
    }

    #[test]
    fn null_uuid_is_not_a_draft() {
        assert!(!is_real_draft_id(NULL_UUID));
        assert!(!is_real_draft_id(""));
        assert!(is_real_draft_id("5b4e0c4e-6a8b-4b8c-9d6c-0f3c9a8f2b10"));
    }

    #[test]
    fn entity_key_dedup_id() {
        assert_eq!(EntityKey::product("HT-1000").dedup_id(), "HT-1000");
        assert_eq!(
            EntityKey::draft(Some("HT-1000".to_string()), "d-9").dedup_id(),
            "d-9"
        );
    }
}

//! Draft lifecycle management
//!
//! Creates, edits, activates and discards drafts. Field changes are coalesced
//! into one outstanding submission and delete requests are deduplicated by id.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::{CoreError, CoreResult};
use crate::services::{PendingDeletions, ServiceContext};
use crate::types::{
    BatchDeleteReport, DeletionClass, DraftIndicatorState, DraftRef, EntityKey, FieldChange,
    ProductRow, SubmitOutcome,
};

/// Navigation to perform once a deletion has succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "camelCase")]
pub enum FollowUp {
    Master {
        pivot: Option<String>,
        replacements: Option<Vec<String>>,
    },
    Display {
        product_id: String,
    },
}

/// Result of a single delete request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeleteOutcome {
    /// A delete for this id is pending or done already
    Skipped,
    Deleted {
        follow_up: Option<FollowUp>,
        /// Success message for the user
        notice: Option<String>,
    },
}

/// What the display view does with a draft of the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ResumeDecision {
    /// No own draft (or one that is being deleted)
    Nothing,
    /// Own draft without changes, discard it without asking
    DiscardSilently { draft_id: String },
    /// Own draft with changes, ask whether to resume editing
    AskToResume {
        draft_id: String,
        product_name: String,
        last_changed_at: DateTime<Utc>,
    },
}

/// Row selected for bulk deletion, with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteEntry {
    pub key: EntityKey,
    pub name: String,
    pub class: DeletionClass,
}

/// Rows of a bulk delete, split by classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeletePlan {
    pub locked: Vec<BulkDeleteEntry>,
    pub unsaved: Vec<BulkDeleteEntry>,
    pub deletable: Vec<BulkDeleteEntry>,
}

impl BulkDeletePlan {
    /// Keys to send; unsaved changes of other users only when confirmed
    pub fn keys(&self, include_unsaved: bool) -> Vec<EntityKey> {
        let unsaved = if include_unsaved {
            self.unsaved.as_slice()
        } else {
            &[]
        };
        self.deletable
            .iter()
            .chain(unsaved)
            .map(|entry| entry.key.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deletable.is_empty() && self.unsaved.is_empty()
    }
}

#[derive(Default)]
struct SubmitQueue {
    pending: Vec<FieldChange>,
    in_flight: bool,
}

/// Draft lifecycle manager
pub struct DraftService {
    ctx: Arc<ServiceContext>,
    deletions: Arc<PendingDeletions>,
    queue: Mutex<SubmitQueue>,
    /// `true` while no submission is in flight
    idle: watch::Sender<bool>,
    /// Serializes edit-draft requests so a product never gets two drafts
    edit_slot: Mutex<()>,
    /// Drafts opened in this session, by draft id
    open_drafts: RwLock<HashMap<String, DraftRef>>,
}

impl DraftService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, deletions: Arc<PendingDeletions>) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            ctx,
            deletions,
            queue: Mutex::new(SubmitQueue::default()),
            idle,
            edit_slot: Mutex::new(()),
            open_drafts: RwLock::new(HashMap::new()),
        }
    }

    /// Draft opened in this session
    pub async fn open_draft(&self, draft_id: &str) -> Option<DraftRef> {
        self.open_drafts.read().await.get(draft_id).cloned()
    }

    async fn remember(&self, draft: &DraftRef) {
        self.open_drafts
            .write()
            .await
            .insert(draft.draft_id.clone(), draft.clone());
    }

    /// Drop a draft that no longer exists, including its unsent changes
    async fn forget(&self, draft_id: &str) {
        self.open_drafts.write().await.remove(draft_id);
        let mut queue = self.queue.lock().await;
        let before = queue.pending.len();
        queue.pending.retain(|change| change.draft_id != draft_id);
        if queue.pending.len() < before {
            log::debug!(
                "Dropped {} unsent change(s) of draft {draft_id}",
                before - queue.pending.len()
            );
        }
    }

    // ===== Draft creation =====

    /// Create a draft for a new product
    pub async fn create_draft(&self) -> CoreResult<String> {
        let draft = self
            .ctx
            .while_busy(self.ctx.backend.create_draft())
            .await
            .inspect_err(|e| e.log("Creating a draft failed"))?;
        log::info!("Draft {} created", draft.draft_id);
        self.remember(&draft).await;
        Ok(draft.draft_id)
    }

    /// Create a new-product draft prefilled from `product_id`
    pub async fn copy_product(&self, product_id: &str) -> CoreResult<String> {
        let draft = self
            .ctx
            .while_busy(self.ctx.backend.copy_to_draft(product_id))
            .await
            .inspect_err(|e| e.log("Copying a product failed"))?;
        log::info!("Product {product_id} copied to draft {}", draft.draft_id);
        self.remember(&draft).await;
        Ok(draft.draft_id)
    }

    /// Open the edit draft of a product, reusing the user's existing draft.
    ///
    /// Returns `(product_id, draft_id)`.
    pub async fn edit_draft_for_product(&self, product_id: &str) -> CoreResult<(String, String)> {
        let _slot = self.edit_slot.lock().await;
        let draft = self
            .ctx
            .while_busy(self.open_edit_draft(product_id))
            .await
            .inspect_err(|e| e.log("Opening the edit draft failed"))?;
        self.remember(&draft).await;
        let resolved = draft
            .product_id
            .clone()
            .unwrap_or_else(|| product_id.to_string());
        Ok((resolved, draft.draft_id))
    }

    async fn open_edit_draft(&self, product_id: &str) -> CoreResult<DraftRef> {
        if let Some(draft) = self.ctx.backend.find_editable_draft(product_id).await? {
            if self.deletions.is_draft_id_valid(&draft.draft_id).await {
                log::debug!("Reusing draft {} of {product_id}", draft.draft_id);
                return Ok(draft);
            }
        }
        let draft = self.ctx.backend.edit_draft(product_id).await?;
        log::info!("Edit draft {} created for {product_id}", draft.draft_id);
        Ok(draft)
    }

    // ===== Field changes =====

    /// Queue a field change and submit it.
    ///
    /// Only one submission is in flight at a time; changes arriving meanwhile
    /// are sent together once it completes. Callers whose change was queued
    /// behind a running submission return right away.
    pub async fn save_draft_field(&self, change: FieldChange) -> CoreResult<SubmitOutcome> {
        if !self.deletions.is_draft_id_valid(&change.draft_id).await {
            log::debug!("Ignoring change of draft {} being deleted", change.draft_id);
            return Ok(SubmitOutcome::default());
        }
        self.ctx.state.set_draft_indicator(DraftIndicatorState::Saving);
        {
            let mut queue = self.queue.lock().await;
            queue.pending.push(change);
            if queue.in_flight {
                return Ok(SubmitOutcome::default());
            }
            queue.in_flight = true;
            self.idle.send_replace(false);
        }
        self.drain().await
    }

    /// Wait for the running submission and send whatever is still pending.
    pub async fn flush_pending(&self) -> CoreResult<()> {
        let mut idle = self.idle.subscribe();
        loop {
            {
                let mut queue = self.queue.lock().await;
                if !queue.in_flight {
                    if queue.pending.is_empty() {
                        return Ok(());
                    }
                    queue.in_flight = true;
                    self.idle.send_replace(false);
                    break;
                }
            }
            idle.wait_for(|idle| *idle)
                .await
                .map_err(|e| CoreError::SubmitFailed(e.to_string()))?;
        }
        self.drain().await.map(|_| ())
    }

    pub async fn has_pending_changes(&self) -> bool {
        let queue = self.queue.lock().await;
        queue.in_flight || !queue.pending.is_empty()
    }

    /// Submit batches until the queue is empty. Must only run with
    /// `in_flight` set by the caller.
    async fn drain(&self) -> CoreResult<SubmitOutcome> {
        let mut last = SubmitOutcome::default();
        let mut unsent = false;
        loop {
            let mut batch = {
                let mut queue = self.queue.lock().await;
                if queue.pending.is_empty() {
                    queue.in_flight = false;
                    self.idle.send_replace(true);
                    break;
                }
                std::mem::take(&mut queue.pending)
            };
            let deleted = self.deletions.draft_ids().await;
            batch.retain(|change| !deleted.contains(&change.draft_id));
            if batch.is_empty() {
                continue;
            }
            log::debug!("Submitting {} field change(s)", batch.len());

            match self.ctx.backend.submit_changes(&batch).await {
                Ok(outcome) => {
                    let stop = outcome.message.is_some();
                    last = outcome;
                    if stop {
                        // a business message ends the round, the rest waits for the next edit
                        let mut queue = self.queue.lock().await;
                        unsent = !queue.pending.is_empty();
                        queue.in_flight = false;
                        self.idle.send_replace(true);
                        break;
                    }
                }
                Err(e) => {
                    {
                        let mut queue = self.queue.lock().await;
                        let newer = std::mem::replace(&mut queue.pending, batch);
                        queue.pending.extend(newer);
                        queue.in_flight = false;
                        self.idle.send_replace(true);
                    }
                    self.ctx.state.set_draft_indicator(DraftIndicatorState::Clear);
                    e.log("Submitting draft changes failed");
                    return Err(CoreError::SubmitFailed(e.to_string()));
                }
            }
        }
        if let Some(message) = &last.message {
            log::warn!("Backend message after submit: {message}");
        }
        if unsent {
            // still Saving until the next round sends the rest
            return Ok(last);
        }
        self.ctx.state.update(|s| {
            if s.draft_indicator == DraftIndicatorState::Saving {
                s.draft_indicator = DraftIndicatorState::Saved;
            }
        });
        Ok(last)
    }

    // ===== Activation =====

    /// Save a draft as the active product.
    ///
    /// Pending submissions are sent first; the activation is not attempted
    /// when they fail. Returns the id of the active product.
    pub async fn activate(&self, draft: &DraftRef) -> CoreResult<String> {
        self.ctx.state.set_app_busy(true);
        let result = self.activate_inner(draft).await;
        self.ctx.state.set_app_busy(false);
        match result {
            Ok(product_id) => {
                log::info!("Draft {} activated as {product_id}", draft.draft_id);
                self.forget(&draft.draft_id).await;
                self.ctx.state.set_draft_indicator(DraftIndicatorState::Clear);
                Ok(product_id)
            }
            Err(e) => {
                e.log("Activating the draft failed");
                Err(e)
            }
        }
    }

    async fn activate_inner(&self, draft: &DraftRef) -> CoreResult<String> {
        self.flush_pending().await?;
        let product_id = self.ctx.backend.activate_draft(draft).await?;
        self.invalidate(&product_id).await;
        Ok(product_id)
    }

    /// Re-read an active product so that cached copies are refreshed
    async fn invalidate(&self, product_id: &str) {
        if let Err(e) = self.ctx.backend.read_product(product_id).await {
            e.log("Refreshing the product failed");
        }
    }

    // ===== Deletion =====

    pub async fn is_draft_id_valid(&self, draft_id: &str) -> bool {
        self.deletions.is_draft_id_valid(draft_id).await
    }

    /// Delete an entity by key
    pub async fn delete(&self, key: &EntityKey) -> CoreResult<DeleteOutcome> {
        match key {
            EntityKey::Product { product_id } => self.delete_product(product_id).await,
            EntityKey::Draft {
                product_id,
                draft_id,
            } => {
                let has_active_entity = self.has_active_entity(product_id.as_deref(), draft_id).await;
                self.discard(product_id.as_deref(), draft_id, has_active_entity, false)
                    .await
            }
        }
    }

    /// Whether a draft is backed by an active product. Drafts of new products
    /// may carry a reserved product id, so the id alone does not tell.
    async fn has_active_entity(&self, product_id: Option<&str>, draft_id: &str) -> bool {
        if let Some(draft) = self.open_draft(draft_id).await {
            return draft.has_active_entity;
        }
        let Some(product_id) = product_id else {
            return false;
        };
        match self.ctx.backend.read_product(product_id).await {
            Ok(row) => row.is_some_and(|row| row.is_active_entity),
            Err(e) => {
                e.log("Looking up the product of a draft failed");
                false
            }
        }
    }

    /// Delete an active product
    pub async fn delete_product(&self, product_id: &str) -> CoreResult<DeleteOutcome> {
        let key = EntityKey::product(product_id);
        if !self.deletions.mark(&key).await {
            log::debug!("Delete of {product_id} already requested");
            return Ok(DeleteOutcome::Skipped);
        }
        if let Err(e) = self
            .ctx
            .while_busy(self.ctx.backend.delete_entity(&key))
            .await
        {
            self.deletions.release(&key).await;
            e.log("Deleting the product failed");
            return Err(e);
        }
        log::info!("Product {product_id} deleted");
        let orphaned: Vec<String> = self
            .open_drafts
            .read()
            .await
            .values()
            .filter(|draft| draft.product_id.as_deref() == Some(product_id))
            .map(|draft| draft.draft_id.clone())
            .collect();
        for draft_id in orphaned {
            self.forget(&draft_id).await;
        }

        let follow_up = if self.ctx.is_phone() {
            self.invalidate(product_id).await;
            Some(FollowUp::Master {
                pivot: None,
                replacements: None,
            })
        } else {
            None
        };
        Ok(DeleteOutcome::Deleted {
            follow_up,
            notice: Some(format!("{} ({product_id})", self.ctx.config.texts.product_deleted)),
        })
    }

    /// Discard a draft from the edit view
    ///
    /// # Arguments
    /// * `draft` - Draft to discard
    /// * `is_dirty` - The user changed something; a notice is returned
    pub async fn discard_draft(&self, draft: &DraftRef, is_dirty: bool) -> CoreResult<DeleteOutcome> {
        self.discard(
            draft.product_id.as_deref(),
            &draft.draft_id,
            draft.has_active_entity,
            is_dirty,
        )
        .await
    }

    async fn discard(
        &self,
        product_id: Option<&str>,
        draft_id: &str,
        has_active_entity: bool,
        is_dirty: bool,
    ) -> CoreResult<DeleteOutcome> {
        let key = EntityKey::draft(product_id.map(ToString::to_string), draft_id);
        if !self.deletions.mark(&key).await {
            log::debug!("Discard of draft {draft_id} already requested");
            return Ok(DeleteOutcome::Skipped);
        }
        if let Err(e) = self
            .ctx
            .while_busy(self.ctx.backend.delete_entity(&key))
            .await
        {
            self.deletions.release(&key).await;
            e.log("Discarding the draft failed");
            return Err(e);
        }
        log::info!("Draft {draft_id} discarded");
        self.forget(draft_id).await;

        // decided on success, against the state at that time
        let follow_up = match product_id {
            Some(product_id) if has_active_entity => Some(FollowUp::Display {
                product_id: product_id.to_string(),
            }),
            Some(_) => Some(FollowUp::Master {
                pivot: None,
                replacements: None,
            }),
            None => self.ctx.state.read(|s| {
                (s.draft_id.as_deref() == Some(draft_id)).then(|| FollowUp::Master {
                    pivot: Some(draft_id.to_string()),
                    replacements: Some(s.preferred_ids.clone()),
                })
            }),
        };
        let notice = is_dirty.then(|| self.ctx.config.texts.draft_discarded.clone());
        Ok(DeleteOutcome::Deleted { follow_up, notice })
    }

    /// Discard the user's own draft from the display view's resume dialog.
    /// The display view stays where it is.
    pub async fn discard_from_resume(
        &self,
        product_id: &str,
        draft_id: &str,
        is_dirty: bool,
    ) -> CoreResult<DeleteOutcome> {
        let outcome = self.discard(Some(product_id), draft_id, true, is_dirty).await?;
        Ok(match outcome {
            DeleteOutcome::Deleted { notice, .. } => DeleteOutcome::Deleted {
                follow_up: None,
                notice,
            },
            DeleteOutcome::Skipped => DeleteOutcome::Skipped,
        })
    }

    /// Delete several entities in one backend batch.
    ///
    /// Entries already pending are skipped. Entries the backend reports as
    /// failed are released so that they can be retried.
    pub async fn delete_batch(&self, keys: &[EntityKey]) -> CoreResult<BatchDeleteReport> {
        let (accepted, skipped) = self.deletions.mark_all(keys).await;
        // after a multi delete nothing stays selected
        self.ctx.state.set_ids(None, None);
        if accepted.is_empty() {
            return Ok(BatchDeleteReport {
                deleted: Vec::new(),
                skipped,
                failed: Vec::new(),
            });
        }

        let result = match self
            .ctx
            .while_busy(self.ctx.backend.delete_entities(&accepted))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                for key in &accepted {
                    self.deletions.release(key).await;
                }
                e.log("Batch delete failed");
                return Err(e);
            }
        };

        for failure in &result.failures {
            self.deletions.release(&failure.key).await;
        }
        let deleted: Vec<EntityKey> = accepted
            .into_iter()
            .filter(|key| !result.failures.iter().any(|f| &f.key == key))
            .collect();
        for key in &deleted {
            if let EntityKey::Draft { draft_id, .. } = key {
                self.forget(draft_id).await;
            }
        }
        log::info!(
            "Batch delete complete: {} deleted, {} failed, {} skipped",
            deleted.len(),
            result.failures.len(),
            skipped.len()
        );
        Ok(BatchDeleteReport {
            deleted,
            skipped,
            failed: result.failures,
        })
    }

    /// Split rows selected for bulk deletion into locked, unsaved and deletable
    pub fn plan_bulk_delete(&self, rows: &[ProductRow]) -> BulkDeletePlan {
        let mut plan = BulkDeletePlan::default();
        for row in rows {
            let Some(key) = row.entity_key() else {
                continue;
            };
            let class = DeletionClass::of(row);
            let bucket = match class {
                DeletionClass::Locked { .. } => &mut plan.locked,
                DeletionClass::Unsaved { .. } => &mut plan.unsaved,
                DeletionClass::Deletable => &mut plan.deletable,
            };
            bucket.push(BulkDeleteEntry {
                key,
                name: row.name.clone(),
                class,
            });
        }
        plan
    }

    /// Decide what the display view does with the draft data of `row`
    pub async fn resume_decision(&self, row: &ProductRow) -> ResumeDecision {
        let Some(admin) = row.administrative.as_ref() else {
            return ResumeDecision::Nothing;
        };
        if !admin.draft_is_created_by_me || !self.is_draft_id_valid(&admin.draft_uuid).await {
            return ResumeDecision::Nothing;
        }
        if admin.is_clean() {
            ResumeDecision::DiscardSilently {
                draft_id: admin.draft_uuid.clone(),
            }
        } else {
            ResumeDecision::AskToResume {
                draft_id: admin.draft_uuid.clone(),
                product_name: row.name.clone(),
                last_changed_at: admin.last_change_date_time,
            }
        }
    }
}

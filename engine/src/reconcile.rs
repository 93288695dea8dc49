//! Batch reconciliation for offline queue flushes.
//!
//! The reconciler does no IO. The caller walks the batch, normalizes each
//! element, persists it however it likes and reports the outcome back by
//! index. Once every index is resolved, [`Reconciler::finish`] decides what
//! the client is told.
//!
//! # Algorithm
//!
//! 1. Gate the payload: `items` must be an array ([`extract_batch`])
//! 2. Every element starts as [`ItemState::Pending`]
//! 3. Each element is resolved exactly once to `Rejected`, `PersistFailed`
//!    or `Persisted`; one item never affects another
//! 4. Aggregate:
//!    - empty batch → [`BatchOutcome::Empty`]
//!    - at least one persisted → [`BatchOutcome::Accepted`]
//!    - none persisted, some persistence failed → [`BatchOutcome::StoreUnavailable`]
//!    - none persisted, all rejected → [`BatchOutcome::NoItemsProcessable`]
//!
//! `Accepted` means exactly the listed items were saved. Every other
//! non-empty outcome means nothing was saved and the whole batch should be
//! kept for a later flush.

use crate::record::PurchaseSummary;
use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pull the queued items out of a flush payload.
///
/// Fails with [`Error::InvalidPayload`] when `items` is missing or not an
/// array. An empty array is valid.
pub fn extract_batch(payload: &Value) -> Result<&[Value]> {
    match payload.get("items") {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::InvalidPayload("items must be an array".into())),
        None => Err(Error::InvalidPayload("items is required".into())),
    }
}

/// Processing state of one batch element.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    /// Not yet processed
    Pending,
    /// Failed validation
    Rejected(String),
    /// Valid, but the store did not save it
    PersistFailed(String),
    /// Durably stored
    Persisted(PurchaseSummary),
}

impl ItemState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ItemState::Pending)
    }
}

/// Which step an item dropped out at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipStage {
    Validation,
    Persistence,
}

/// An item that was not persisted, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    /// Position in the submitted batch
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_id: Option<String>,
    pub stage: SkipStage,
    pub reason: String,
}

/// Aggregated result of a non-empty batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed_count: usize,
    pub total_received: usize,
    /// Persisted purchases, in batch order
    pub purchases: Vec<PurchaseSummary>,
    /// Rejected or failed items, in batch order
    pub skipped: Vec<SkippedItem>,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.stage == SkipStage::Persistence)
            .count()
    }

    pub fn rejected_count(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.stage == SkipStage::Validation)
            .count()
    }
}

/// What the batch amounts to, from the client's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Nothing was sent; nothing to do
    Empty,
    /// At least one item persisted; drop exactly those
    Accepted(BatchReport),
    /// Every item failed validation
    NoItemsProcessable(BatchReport),
    /// Nothing persisted and the store failed at least once
    StoreUnavailable(BatchReport),
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Empty | BatchOutcome::Accepted(_))
    }

    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Empty => None,
            BatchOutcome::Accepted(r)
            | BatchOutcome::NoItemsProcessable(r)
            | BatchOutcome::StoreUnavailable(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    queue_id: Option<String>,
    state: ItemState,
}

/// Tracks the state of every element of one batch.
#[derive(Debug, Clone)]
pub struct Reconciler {
    slots: Vec<Slot>,
}

impl Reconciler {
    /// Create a reconciler for a batch of `len` items, all pending.
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![
                Slot {
                    queue_id: None,
                    state: ItemState::Pending,
                };
                len
            ],
        }
    }

    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Current state of an item.
    pub fn state(&self, index: usize) -> Option<&ItemState> {
        self.slots.get(index).map(|s| &s.state)
    }

    /// Items not yet resolved.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.state.is_pending()).count()
    }

    /// Resolve an item. Each index can only be resolved once.
    pub fn resolve(
        &mut self,
        index: usize,
        queue_id: Option<String>,
        state: ItemState,
    ) -> Result<()> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(Error::UnknownItem { index, len })?;

        if !slot.state.is_pending() {
            return Err(Error::ItemAlreadyResolved(index));
        }
        if state.is_pending() {
            return Err(Error::InvalidTransition(index));
        }

        slot.queue_id = queue_id;
        slot.state = state;
        Ok(())
    }

    /// Aggregate all item states into the batch outcome.
    pub fn finish(self) -> Result<BatchOutcome> {
        if self.slots.is_empty() {
            return Ok(BatchOutcome::Empty);
        }

        let pending = self.pending();
        if pending > 0 {
            return Err(Error::UnresolvedItems {
                pending,
                len: self.slots.len(),
            });
        }

        let total_received = self.slots.len();
        let mut purchases = Vec::new();
        let mut skipped = Vec::new();

        for (index, slot) in self.slots.into_iter().enumerate() {
            let (stage, reason) = match slot.state {
                ItemState::Persisted(summary) => {
                    purchases.push(summary);
                    continue;
                }
                ItemState::Rejected(reason) => (SkipStage::Validation, reason),
                ItemState::PersistFailed(reason) => (SkipStage::Persistence, reason),
                ItemState::Pending => {
                    return Err(Error::UnresolvedItems {
                        pending: 1,
                        len: total_received,
                    })
                }
            };
            skipped.push(SkippedItem {
                index,
                queue_id: slot.queue_id,
                stage,
                reason,
            });
        }

        let report = BatchReport {
            processed_count: purchases.len(),
            total_received,
            purchases,
            skipped,
        };

        Ok(if report.processed_count > 0 {
            BatchOutcome::Accepted(report)
        } else if report.failed_count() > 0 {
            BatchOutcome::StoreUnavailable(report)
        } else {
            BatchOutcome::NoItemsProcessable(report)
        })
    }
}

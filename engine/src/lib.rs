//! # Cartsync Engine
//!
//! Deterministic reconciliation of offline purchase queues.
//!
//! A client that loses connectivity buffers cart/purchase events locally and
//! later flushes them as one batch. This crate decides, for every entry in
//! such a batch, whether it becomes a purchase record, and what the client
//! is told so it can prune its queue safely.
//!
//! ## Design Principles
//!
//! - **No IO**: persistence is the caller's job; outcomes are reported back
//! - **Deterministic**: the processing clock is an argument, not a syscall
//! - **Isolated**: one bad entry never affects its siblings
//!
//! ## Core Concepts
//!
//! ### Queued items
//!
//! [`QueuedItem`] is the untrusted input shape. Recognized fields are
//! `userId`, `items`, `total`, `timestamp`, `createdAt` and `id`; anything
//! else is carried along as opaque attributes.
//!
//! ### Normalization
//!
//! [`normalize`] validates one entry and produces a [`PurchaseInput`] with
//! a resolved total, event time and provenance metadata.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] tracks every entry from `Pending` to `Rejected`,
//! `PersistFailed` or `Persisted` and aggregates the batch into a
//! [`BatchOutcome`].
//!
//! ## Quick Start
//!
//! ```rust
//! use cartsync_engine::{
//!     extract_batch, normalize, BatchOutcome, ItemState, PurchaseRecord,
//!     Reconciler, RequestContext,
//! };
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let payload = json!({
//!     "items": [{"userId": "u1", "items": [{"price": 20}, {"price": 5}], "id": "q1"}]
//! });
//!
//! let batch = extract_batch(&payload).unwrap();
//! let ctx = RequestContext::default();
//! let mut reconciler = Reconciler::new(batch.len());
//!
//! for (index, raw) in batch.iter().enumerate() {
//!     let input = normalize(raw, &ctx, Utc::now()).unwrap();
//!     let queue_id = input.queue_id.clone();
//!     // A real caller hands `input` to its store here.
//!     let record = PurchaseRecord::from_input("p-1", input, Utc::now());
//!     reconciler
//!         .resolve(index, queue_id, ItemState::Persisted(record.summary(false)))
//!         .unwrap();
//! }
//!
//! match reconciler.finish().unwrap() {
//!     BatchOutcome::Accepted(report) => {
//!         assert_eq!(report.processed_count, 1);
//!         assert_eq!(report.purchases[0].total, 25.0);
//!     }
//!     other => panic!("unexpected outcome: {:?}", other),
//! }
//! ```

pub mod error;
pub mod normalize;
pub mod queued;
pub mod reconcile;
pub mod record;

// Re-export main types at crate root
pub use error::Error;
pub use normalize::{line_total, normalize, parse_instant};
pub use queued::QueuedItem;
pub use reconcile::{
    extract_batch, BatchOutcome, BatchReport, ItemState, Reconciler, SkipStage, SkippedItem,
};
pub use record::{
    PurchaseInput, PurchaseMetadata, PurchaseRecord, PurchaseStatus, PurchaseSummary,
    RequestContext, SYNC_SOURCE, UNKNOWN,
};

/// Point in time, always UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

//! Imago Services
//!
//! Lifecycle services built on top of `imago-core`: upload issuance,
//! webhook ingestion, expiry reconciliation, and an in-memory record store
//! for tests and single-process deployments. All remote and persistence
//! side effects go through the trait seams in `imago_core::hooks`.

pub mod ingestion;
pub mod issuance;
pub mod reconciler;
pub mod store;

pub use ingestion::{IngestOutcome, WebhookIngestionService};
pub use issuance::{IssueUploadRequest, IssuedUpload, UploadIssuanceService};
pub use reconciler::ExpiryReconciler;
pub use store::InMemoryRecordStore;

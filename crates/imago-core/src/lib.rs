//! Imago Core Library
//!
//! This crate provides the domain models, lifecycle state machine,
//! transformation spec, variant registry, delivery-URL compiler, and
//! collaborator trait seams shared across all Imago components.

pub mod config;
pub mod delivery_url;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod models;
pub mod transformation;
pub mod variants;

// Re-export commonly used types
pub use config::ImagesConfig;
pub use delivery_url::{Rendering, UrlCompiler};
pub use error::AppError;
pub use hooks::{Clock, IssuedUploadAuth, RecordStore, RemoteImageApi, SystemClock, UrlSigner};
pub use lifecycle::{apply, Effect, LifecycleEvent, Transition};
pub use models::{ImageRecord, ImageStatus, WebhookEnvelope, WebhookEventKind};
pub use transformation::{Border, Fit, Gravity, OutputFormat, TransformationSpec, Trim};
pub use variants::VariantRegistry;

//! Domain models shared across Imago components.

pub mod image;
pub mod webhook;

pub use image::{ImageRecord, ImageStatus};
pub use webhook::{WebhookEnvelope, WebhookEventKind};

//! Image lifecycle state machine
//!
//! Pure transition function over `(ImageRecord, LifecycleEvent)`. Legal
//! transitions:
//!
//! ```text
//! pending  -> uploaded | expired
//! uploaded -> ready | failed
//! ready    -> deleted
//! failed   -> deleted
//! expired  -> deleted
//! ```
//!
//! `deleted` is terminal. A `Ready` event arriving while still `pending`
//! coalesces into uploaded-then-ready within the same call; no transition
//! ever skips a state. Duplicate deliveries (sequence at or below the
//! record's high-water mark, or an event whose target equals the current
//! status) are successful no-ops so at-least-once webhook delivery
//! converges. Illegal pairs return `InvalidTransition` and leave the
//! record untouched.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{ImageRecord, ImageStatus};

/// Events that drive an image record through its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// Upload authorization issued; legal only while `pending`.
    Issued,
    /// Client claimed the one-time upload URL.
    UploadComplete { seq: i64 },
    /// Remote processing finished; carries the confirmed variant list.
    Ready { seq: i64, variants: Vec<String> },
    /// Remote processing failed.
    Failed { seq: i64, reason: String },
    /// Unclaimed pending upload passed its deadline.
    Expire,
    /// Caller-initiated remote deletion succeeded.
    Delete,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Issued => "issued",
            LifecycleEvent::UploadComplete { .. } => "upload_complete",
            LifecycleEvent::Ready { .. } => "ready",
            LifecycleEvent::Failed { .. } => "failed",
            LifecycleEvent::Expire => "expire",
            LifecycleEvent::Delete => "delete",
        }
    }

    fn seq(&self) -> Option<i64> {
        match self {
            LifecycleEvent::UploadComplete { seq }
            | LifecycleEvent::Ready { seq, .. }
            | LifecycleEvent::Failed { seq, .. } => Some(*seq),
            _ => None,
        }
    }

    /// Status this event drives a record into, where fixed.
    fn target(&self) -> Option<ImageStatus> {
        match self {
            LifecycleEvent::Issued => None,
            LifecycleEvent::UploadComplete { .. } => Some(ImageStatus::Uploaded),
            LifecycleEvent::Ready { .. } => Some(ImageStatus::Ready),
            LifecycleEvent::Failed { .. } => Some(ImageStatus::Failed),
            LifecycleEvent::Expire => Some(ImageStatus::Expired),
            LifecycleEvent::Delete => Some(ImageStatus::Deleted),
        }
    }
}

/// Side effects a transition produced, in application order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StatusChanged { from: ImageStatus, to: ImageStatus },
    VariantsRecorded(Vec<String>),
    FailureRecorded(String),
}

/// Result of applying an event: the updated record and what happened.
#[derive(Debug, Clone)]
pub struct Transition {
    pub record: ImageRecord,
    /// False when the event was a duplicate and nothing changed.
    pub applied: bool,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn noop(record: ImageRecord) -> Self {
        Self {
            record,
            applied: false,
            effects: Vec::new(),
        }
    }
}

/// Apply `event` to `record` at time `now`.
///
/// Returns the updated record and effect list, or `InvalidTransition` with
/// the record untouched. Duplicate deliveries succeed as no-ops.
pub fn apply(
    record: &ImageRecord,
    event: &LifecycleEvent,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    // Idempotency: an already-applied sequence is a safe no-op.
    if let Some(seq) = event.seq() {
        if seq <= record.last_event_seq {
            return Ok(Transition::noop(record.clone()));
        }
    }
    // An event that would land on the current status is a duplicate.
    if event.target() == Some(record.status) {
        return Ok(Transition::noop(record.clone()));
    }

    let mut next = record.clone();
    let mut effects = Vec::new();

    match (record.status, event) {
        (ImageStatus::Pending, LifecycleEvent::Issued) => {
            // Issuance confirmation on a pending record changes nothing.
            return Ok(Transition::noop(record.clone()));
        }
        (ImageStatus::Pending, LifecycleEvent::UploadComplete { seq }) => {
            step(&mut next, ImageStatus::Uploaded, &mut effects);
            next.last_event_seq = *seq;
        }
        // Success reported before the intermediate acknowledgment:
        // coalesce into uploaded-then-ready within this call.
        (ImageStatus::Pending, LifecycleEvent::Ready { seq, variants }) => {
            step(&mut next, ImageStatus::Uploaded, &mut effects);
            step(&mut next, ImageStatus::Ready, &mut effects);
            record_variants(&mut next, variants, &mut effects);
            next.last_event_seq = *seq;
        }
        (ImageStatus::Pending, LifecycleEvent::Expire) => {
            let expires_at = next.upload_expires_at.ok_or(AppError::InvalidTransition {
                from: record.status,
                event: event.name(),
            })?;
            if now <= expires_at {
                return Err(AppError::InvalidTransition {
                    from: record.status,
                    event: event.name(),
                });
            }
            step(&mut next, ImageStatus::Expired, &mut effects);
        }
        (ImageStatus::Uploaded, LifecycleEvent::Ready { seq, variants }) => {
            step(&mut next, ImageStatus::Ready, &mut effects);
            record_variants(&mut next, variants, &mut effects);
            next.last_event_seq = *seq;
        }
        (ImageStatus::Uploaded, LifecycleEvent::Failed { seq, reason }) => {
            step(&mut next, ImageStatus::Failed, &mut effects);
            next.failure_reason = Some(reason.clone());
            effects.push(Effect::FailureRecorded(reason.clone()));
            next.last_event_seq = *seq;
        }
        (
            ImageStatus::Ready | ImageStatus::Failed | ImageStatus::Expired,
            LifecycleEvent::Delete,
        ) => {
            step(&mut next, ImageStatus::Deleted, &mut effects);
        }
        _ => {
            return Err(AppError::InvalidTransition {
                from: record.status,
                event: event.name(),
            });
        }
    }

    next.updated_at = now;
    Ok(Transition {
        record: next,
        applied: true,
        effects,
    })
}

/// Advance one state. Leaving `pending` promotes the issued upload
/// reference into the permanent remote id and retires the upload deadline.
fn step(record: &mut ImageRecord, to: ImageStatus, effects: &mut Vec<Effect>) {
    let from = record.status;
    if from == ImageStatus::Pending {
        if record.remote_id.is_none() {
            record.remote_id = record.upload_ref.clone();
        }
        record.upload_expires_at = None;
    }
    record.status = to;
    effects.push(Effect::StatusChanged { from, to });
}

fn record_variants(record: &mut ImageRecord, variants: &[String], effects: &mut Vec<Effect>) {
    record.variants_available = variants.iter().cloned().collect();
    effects.push(Effect::VariantsRecorded(variants.to_vec()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending_record(now: DateTime<Utc>) -> ImageRecord {
        ImageRecord::new_pending(
            None,
            "r-1".to_string(),
            false,
            None,
            now + Duration::seconds(3600),
            now,
        )
    }

    fn at(record: &ImageRecord, event: &LifecycleEvent, now: DateTime<Utc>) -> ImageRecord {
        apply(record, event, now).unwrap().record
    }

    #[test]
    fn test_happy_path() {
        let now = Utc::now();
        let record = pending_record(now);

        let record = at(&record, &LifecycleEvent::UploadComplete { seq: 1 }, now);
        assert_eq!(record.status, ImageStatus::Uploaded);
        assert_eq!(record.remote_id.as_deref(), Some("r-1"));
        assert!(record.upload_expires_at.is_none());

        let record = at(
            &record,
            &LifecycleEvent::Ready {
                seq: 2,
                variants: vec!["public".to_string(), "thumbnail".to_string()],
            },
            now,
        );
        assert_eq!(record.status, ImageStatus::Ready);
        assert!(record.variants_available.contains("thumbnail"));

        let record = at(&record, &LifecycleEvent::Delete, now);
        assert_eq!(record.status, ImageStatus::Deleted);
    }

    #[test]
    fn test_ready_while_pending_coalesces() {
        let now = Utc::now();
        let record = pending_record(now);

        let transition = apply(
            &record,
            &LifecycleEvent::Ready {
                seq: 1,
                variants: vec!["public".to_string()],
            },
            now,
        )
        .unwrap();

        assert_eq!(transition.record.status, ImageStatus::Ready);
        assert_eq!(transition.record.remote_id.as_deref(), Some("r-1"));
        // Both hops are visible in the effect list; no state was skipped.
        assert_eq!(
            transition.effects[0],
            Effect::StatusChanged {
                from: ImageStatus::Pending,
                to: ImageStatus::Uploaded,
            }
        );
        assert_eq!(
            transition.effects[1],
            Effect::StatusChanged {
                from: ImageStatus::Uploaded,
                to: ImageStatus::Ready,
            }
        );
    }

    #[test]
    fn test_illegal_pairs_leave_record_untouched() {
        let now = Utc::now();
        let record = pending_record(now);

        let illegal: &[LifecycleEvent] = &[
            LifecycleEvent::Failed {
                seq: 1,
                reason: "boom".to_string(),
            },
            LifecycleEvent::Delete,
        ];
        for event in illegal {
            let err = apply(&record, event, now).unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { .. }), "{event:?}");
        }
        assert_eq!(record.status, ImageStatus::Pending);

        // Terminal state accepts nothing.
        let mut deleted = record.clone();
        deleted.status = ImageStatus::Deleted;
        deleted.last_event_seq = 5;
        for event in [
            LifecycleEvent::Issued,
            LifecycleEvent::UploadComplete { seq: 6 },
            LifecycleEvent::Expire,
        ] {
            assert!(apply(&deleted, &event, now).is_err(), "{event:?}");
        }
    }

    #[test]
    fn test_duplicate_ready_is_noop() {
        let now = Utc::now();
        let record = pending_record(now);
        let record = at(&record, &LifecycleEvent::UploadComplete { seq: 1 }, now);
        let ready = LifecycleEvent::Ready {
            seq: 2,
            variants: vec!["public".to_string()],
        };
        let record = at(&record, &ready, now);
        assert_eq!(record.status, ImageStatus::Ready);

        let transition = apply(&record, &ready, now).unwrap();
        assert!(!transition.applied);
        assert!(transition.effects.is_empty());
        assert_eq!(transition.record.status, ImageStatus::Ready);
    }

    #[test]
    fn test_stale_sequence_is_noop() {
        let now = Utc::now();
        let record = pending_record(now);
        let record = at(
            &record,
            &LifecycleEvent::Ready {
                seq: 2,
                variants: vec![],
            },
            now,
        );

        // Late re-delivery of the earlier upload acknowledgment.
        let transition = apply(&record, &LifecycleEvent::UploadComplete { seq: 1 }, now).unwrap();
        assert!(!transition.applied);
        assert_eq!(transition.record.status, ImageStatus::Ready);
    }

    #[test]
    fn test_expire_requires_deadline_passed() {
        let now = Utc::now();
        let record = pending_record(now);

        // Deadline is an hour out: expiry is illegal.
        assert!(apply(&record, &LifecycleEvent::Expire, now).is_err());

        let later = now + Duration::seconds(3601);
        let transition = apply(&record, &LifecycleEvent::Expire, later).unwrap();
        assert_eq!(transition.record.status, ImageStatus::Expired);
        assert_eq!(transition.record.remote_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_expired_can_only_be_deleted() {
        let now = Utc::now();
        let record = pending_record(now);
        let later = now + Duration::seconds(3601);
        let record = at(&record, &LifecycleEvent::Expire, later);

        assert!(apply(
            &record,
            &LifecycleEvent::Ready {
                seq: 1,
                variants: vec![]
            },
            later,
        )
        .is_err());

        let record = at(&record, &LifecycleEvent::Delete, later);
        assert_eq!(record.status, ImageStatus::Deleted);
    }

    #[test]
    fn test_failed_records_reason() {
        let now = Utc::now();
        let record = pending_record(now);
        let record = at(&record, &LifecycleEvent::UploadComplete { seq: 1 }, now);
        let transition = apply(
            &record,
            &LifecycleEvent::Failed {
                seq: 2,
                reason: "malware detected".to_string(),
            },
            now,
        )
        .unwrap();
        assert_eq!(transition.record.status, ImageStatus::Failed);
        assert_eq!(
            transition.record.failure_reason.as_deref(),
            Some("malware detected")
        );
        assert!(transition
            .effects
            .contains(&Effect::FailureRecorded("malware detected".to_string())));
    }

    #[test]
    fn test_issued_on_pending_is_noop() {
        let now = Utc::now();
        let record = pending_record(now);
        let transition = apply(&record, &LifecycleEvent::Issued, now).unwrap();
        assert!(!transition.applied);
        assert_eq!(transition.record.status, ImageStatus::Pending);
    }
}

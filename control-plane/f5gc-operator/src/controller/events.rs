use kube::Resource;
use kube::runtime::events::{Event, EventType, Recorder};
use tracing::debug;

use super::reconcile::{Outcome, ReconcileErr};
use crate::crd::Free5GC;

pub const REASON_APPLIED: &str = "Applied";
pub const REASON_PRUNED: &str = "Pruned";
pub const REASON_FINALIZED: &str = "CleanedUp";

async fn emit(
    recorder: &Recorder,
    obj: &Free5GC,
    type_: EventType,
    reason: &str,
    action: &str,
    note: Option<String>,
) {
    let res = recorder
        .publish(
            &Event {
                type_,
                reason: reason.into(),
                note,
                action: action.into(),
                secondary: None,
            },
            &obj.object_ref(&()),
        )
        .await;
    if let Err(e) = res {
        debug!(error = %e, reason, "failed to publish event");
    }
}

/// Publish what a pass changed; quiet passes publish nothing.
pub async fn publish_outcome(
    recorder: &Recorder,
    obj: &Free5GC,
    result: &Result<Outcome, ReconcileErr>,
) {
    match result {
        Ok(outcome @ Outcome::Converged { pruned, .. }) => {
            let changes = outcome.changes();
            if !changes.is_empty() {
                let note = changes
                    .iter()
                    .map(|a| format!("{} {} {}", a.outcome.as_str(), a.kind, a.name))
                    .collect::<Vec<_>>()
                    .join("; ");
                emit(recorder, obj, EventType::Normal, REASON_APPLIED, "Apply", Some(note))
                    .await;
            }
            if !pruned.is_empty() {
                emit(
                    recorder,
                    obj,
                    EventType::Normal,
                    REASON_PRUNED,
                    "Delete",
                    Some(pruned.join(", ")),
                )
                .await;
            }
        }
        Ok(Outcome::Finalized) => {
            emit(
                recorder,
                obj,
                EventType::Normal,
                REASON_FINALIZED,
                "Finalize",
                Some("owned resources removed".into()),
            )
            .await;
        }
        Ok(_) => {}
        Err(e @ ReconcileErr::Config(_)) => {
            emit(
                recorder,
                obj,
                EventType::Warning,
                e.reason(),
                "Validate",
                Some(e.to_string()),
            )
            .await;
        }
        // transient store errors are retried; logging covers them
        Err(ReconcileErr::Store(_)) => {}
    }
}

//! Span helpers for poll cycles and log reconciliation.

use tracing::Span;
use uuid::Uuid;

use crate::model::{Identity, Status};

/// Start a span covering one poll cycle.
///
/// `poll.result` is declared empty and filled by [`record_outcome`].
pub fn start_poll_span(cycle: u64) -> Span {
    tracing::info_span!(
        "sheit.poll",
        "poll.cycle" = cycle,
        "poll.result" = tracing::field::Empty,
    )
}

/// Start a span for one status change of one identity.
///
/// Each call gets its own id so concurrent reconciliations of the same
/// identity can be told apart in traces.
pub fn start_reconcile_span(status: Status, identity: &Identity) -> Span {
    tracing::info_span!(
        "sheit.reconcile",
        "reconcile.id" = %Uuid::new_v4(),
        "reconcile.status" = %status,
        "reconcile.assignee" = %identity.assignee,
        "reconcile.description" = %identity.description,
        "reconcile.result" = tracing::field::Empty,
    )
}

/// Record the outcome on a span created by this module.
pub fn record_outcome(span: &Span, field: &'static str, result: &str) {
    span.record(field, result);
}

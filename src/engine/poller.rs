//! Change polling of the primary sheet.
//!
//! The poller keeps the last modification stamp it saw (the cursor). A
//! cycle only does work when the stamp is present and differs from the
//! cursor: it advances the cursor, emits `updated`, and starts one
//! reconciliation per assigned row. Those reconciliations run as
//! independent tasks and report failures only through `error` events.

use opentelemetry::KeyValue;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info};

use super::{Reconciled, Tracker};
use crate::error::Result;
use crate::event::EventKind;
use crate::model::{Identity, PRIMARY_SHEET};
use crate::telemetry::metrics;
use crate::telemetry::sync::{record_outcome, start_poll_span};

/// Result of one poll cycle.
#[derive(Debug)]
pub enum PollOutcome {
    /// The fetch failed or carried no modification stamp.
    NoData,
    /// The stamp matches the cursor; nothing was done.
    Unchanged,
    /// The sheet changed; one task was started per assigned row.
    Updated {
        dispatched: Vec<JoinHandle<Result<Reconciled>>>,
    },
}

impl PollOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoData => "no_data",
            Self::Unchanged => "unchanged",
            Self::Updated { .. } => "updated",
        }
    }

    /// Number of reconciliations started by the cycle.
    pub fn dispatched(&self) -> usize {
        match self {
            Self::Updated { dispatched } => dispatched.len(),
            _ => 0,
        }
    }

    /// Wait for every reconciliation the cycle started.
    pub async fn settle(self) -> Vec<Result<Reconciled>> {
        let Self::Updated { dispatched } = self else {
            return Vec::new();
        };
        let mut results = Vec::with_capacity(dispatched.len());
        for handle in dispatched {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => debug!("reconciliation task did not finish: {e}"),
            }
        }
        results
    }
}

/// Drives poll cycles and owns the cursor.
pub struct Poller {
    tracker: Tracker,
    cursor: Option<String>,
    cycle: u64,
}

impl Poller {
    pub fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            cursor: None,
            cycle: 0,
        }
    }

    /// Last modification stamp acted on.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        self.cycle += 1;
        let span = start_poll_span(self.cycle);
        let outcome = self.cycle_inner().instrument(span.clone()).await;

        record_outcome(&span, "poll.result", outcome.label());
        metrics::poll_cycles().add(1, &[KeyValue::new("result", outcome.label())]);
        outcome
    }

    async fn cycle_inner(&mut self) -> PollOutcome {
        let Some(fetched) = self.tracker.fetch_or_report(PRIMARY_SHEET).await else {
            return PollOutcome::NoData;
        };
        let updated = match fetched.data.updated.as_deref() {
            Some(stamp) if !stamp.is_empty() => stamp.to_string(),
            _ => return PollOutcome::NoData,
        };
        if self.cursor.as_deref() == Some(updated.as_str()) {
            debug!(%updated, "primary sheet unchanged");
            return PollOutcome::Unchanged;
        }

        info!(%updated, rows = fetched.data.rows.len(), "primary sheet updated");
        self.cursor = Some(updated);

        let assignments: Vec<Identity> = fetched
            .data
            .rows
            .iter()
            .filter_map(|row| Identity::from_row(row, &self.tracker.fields))
            .collect();

        self.tracker.events.emit(EventKind::Updated(fetched.data));

        let dispatched = assignments
            .into_iter()
            .map(|identity| {
                let tracker = self.tracker.clone();
                tokio::spawn(
                    async move { tracker.start_assignment(identity).await }.in_current_span(),
                )
            })
            .collect();

        PollOutcome::Updated { dispatched }
    }
}

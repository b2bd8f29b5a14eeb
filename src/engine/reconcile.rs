//! Find-or-create of log rows.
//!
//! One log row per identity: the log is scanned in table order and the
//! first row whose trimmed assignee and description match is updated in
//! place. Only when nothing matches is a new row appended. Later
//! duplicates, if a human ever adds one, are left alone.

use chrono::Utc;
use opentelemetry::KeyValue;
use tracing::{Instrument, debug, info, warn};

use super::Tracker;
use crate::error::{Error, Result};
use crate::event::EventKind;
use crate::model::{Identity, LOG_SHEET, Row, STATUS_COLUMN, Status, new_log_row};
use crate::telemetry::metrics;
use crate::telemetry::sync::{record_outcome, start_reconcile_span};

/// What a status change did to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// No row matched; this row was appended.
    Created(Row),
    /// The first matching row now carries the new status.
    Updated(Row),
    /// A poll-driven `started` met a row that already carries a status.
    /// Nothing is written, so the sheet stays idle.
    Unchanged(Row),
    /// The log could not be read, so nothing was written.
    Skipped,
}

impl Reconciled {
    pub fn row(&self) -> Option<&Row> {
        match self {
            Self::Created(row) | Self::Updated(row) | Self::Unchanged(row) => Some(row),
            Self::Skipped => None,
        }
    }
}

/// How an existing row's status may be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Explicit calls always win.
    Overwrite,
    /// Poll-driven starts only fill in rows without a status: they never
    /// move a row backwards and never rewrite a `started` row.
    KeepSettled,
}

fn persist_err(error: Error) -> Error {
    Error::Persist(error.to_string())
}

impl Tracker {
    /// Set the status of the log row for (`email`, `description`), creating
    /// the row if this identity has never been logged.
    ///
    /// A missing or blank argument fails with [`Error::InvalidArgument`]
    /// before the data source is contacted. Every failure is also emitted
    /// as an `error` event.
    pub async fn set_assigned_status(
        &self,
        email: Option<&str>,
        description: Option<&str>,
        status: Status,
    ) -> Result<Reconciled> {
        let identity = match (email, description) {
            (Some(email), Some(description)) => Some(Identity::new(email, description)),
            _ => None,
        };
        let Some(identity) = identity.filter(|id| !id.is_blank()) else {
            return Err(self.report(Error::InvalidArgument(format!(
                "received email:{email:?} description:{description:?} and status:{status}"
            ))));
        };
        self.reconcile(identity, status, Mode::Overwrite).await
    }

    /// Log the start of an assignment found by the poller.
    pub(crate) async fn start_assignment(&self, identity: Identity) -> Result<Reconciled> {
        self.reconcile(identity, Status::Started, Mode::KeepSettled)
            .await
    }

    async fn reconcile(&self, identity: Identity, status: Status, mode: Mode) -> Result<Reconciled> {
        let span = start_reconcile_span(status, &identity);
        let result = self
            .reconcile_inner(&identity, status, mode)
            .instrument(span.clone())
            .await;

        let label = match &result {
            Ok(Reconciled::Created(_)) => "created",
            Ok(Reconciled::Updated(_)) => "updated",
            Ok(Reconciled::Unchanged(_)) => "unchanged",
            Ok(Reconciled::Skipped) => "skipped",
            Err(_) => "error",
        };
        record_outcome(&span, "reconcile.result", label);
        if matches!(label, "created" | "updated") {
            metrics::log_transitions().add(
                1,
                &[
                    KeyValue::new("status", status.as_str()),
                    KeyValue::new("action", label),
                ],
            );
        }
        result
    }

    async fn reconcile_inner(
        &self,
        identity: &Identity,
        status: Status,
        mode: Mode,
    ) -> Result<Reconciled> {
        let Some(log) = self.fetch_or_report(LOG_SHEET).await else {
            debug!("log fetch returned no rows, leaving log untouched");
            return Ok(Reconciled::Skipped);
        };

        let existing = log
            .rows
            .into_iter()
            .find(|stored| identity.matches(&stored.row, &self.fields));

        if let Some(mut stored) = existing {
            if mode == Mode::KeepSettled && stored.row.status().is_some() {
                debug!(current = ?stored.row.status(), "assignment already logged");
                return Ok(Reconciled::Unchanged(stored.row));
            }

            stored.row.set(STATUS_COLUMN, status.as_str());
            if let Err(e) = self.source.save_row(&log.worksheet, &stored).await {
                warn!(error = %e, "failed to save log row");
                return Err(self.report(persist_err(e)));
            }
            info!(row = stored.id, %status, "log row updated");
            self.events
                .emit(EventKind::transition(status, stored.row.clone()));
            return Ok(Reconciled::Updated(stored.row));
        }

        let row = new_log_row(identity, status, &self.fields, Utc::now());
        match self.source.append_row(&log.worksheet, row).await {
            Ok(stored) => {
                info!(row = stored.id, %status, "log row created");
                self.events
                    .emit(EventKind::transition(status, stored.row.clone()));
                Ok(Reconciled::Created(stored.row))
            }
            Err(e) => {
                warn!(error = %e, "failed to append log row");
                Err(self.report(persist_err(e)))
            }
        }
    }
}

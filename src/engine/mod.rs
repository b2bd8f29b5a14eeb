//! Sync engine: change polling, log reconciliation, and the status calls.
//!
//! [`Tracker`] is the public handle. It owns the data source and the event
//! bus; the poll cursor lives in the [`Poller`] driven by [`Tracker::run`].

pub mod fetch;
pub mod poller;
pub mod reconcile;

pub use fetch::Fetched;
pub use poller::{PollOutcome, Poller};
pub use reconcile::Reconciled;

use std::sync::Arc;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::model::{FieldNames, LOG_SHEET_COLUMNS, LOG_SHEET_TITLE, Status};
use crate::source::{DataSource, NewWorksheet};
use crate::telemetry::metrics;

/// Handle to a running sync. Cheap to clone; clones share everything.
pub struct Tracker {
    source: Arc<dyn DataSource>,
    config: Arc<Config>,
    fields: Arc<FieldNames>,
    events: Arc<EventBus>,
    shutdown: Arc<Notify>,
}

impl Clone for Tracker {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: Arc::clone(&self.config),
            fields: Arc::clone(&self.fields),
            events: Arc::clone(&self.events),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl Tracker {
    pub fn new(config: Config, source: Arc<dyn DataSource>) -> Self {
        let fields = FieldNames::new(&config.assigned_field, &config.description_field);
        Self {
            source,
            config: Arc::new(config),
            fields: Arc::new(fields),
            events: Arc::new(EventBus::default()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fields(&self) -> &FieldNames {
        &self.fields
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Mark an assignment as completed in the log.
    pub async fn complete(&self, email: &str, description: &str) -> Result<Reconciled> {
        self.set_assigned_status(Some(email), Some(description), Status::Completed)
            .await
    }

    /// Mark an assignment as rejected in the log.
    pub async fn reject(&self, email: &str, description: &str) -> Result<Reconciled> {
        self.set_assigned_status(Some(email), Some(description), Status::Rejected)
            .await
    }

    /// Try to create the `Log` worksheet with its header row.
    ///
    /// Fails quietly when the worksheet already exists (or anything else
    /// goes wrong); returns whether a worksheet was created.
    pub async fn provision_log_sheet(&self) -> bool {
        let request = NewWorksheet {
            title: LOG_SHEET_TITLE.to_string(),
            col_count: LOG_SHEET_COLUMNS,
            headers: self.fields.log_headers(),
        };
        match self.source.add_worksheet(request).await {
            Ok(sheet) => {
                info!(worksheet = %sheet.id, "provisioned log worksheet");
                true
            }
            Err(e) => {
                debug!("log worksheet not provisioned: {e}");
                false
            }
        }
    }

    /// A poller with an empty cursor.
    pub fn poller(&self) -> Poller {
        Poller::new(self.clone())
    }

    /// Provision the log, then poll immediately and every `poll_interval`
    /// until [`Tracker::shutdown`] is called.
    pub async fn run(&self) {
        self.provision_log_sheet().await;

        let mut poller = self.poller();
        info!(
            sheet_id = %self.config.sheet_id,
            interval = ?self.config.poll_interval,
            "tracker started, polling for assignments"
        );

        loop {
            // Reconciliations started by the cycle keep running on their own.
            let _ = poller.poll_once().await;

            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("tracker shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Run the poll loop on a background task.
    pub fn spawn(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.run().await })
    }

    /// Signal the poll loop to stop after its current cycle.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Count, broadcast, and return a failure.
    pub(crate) fn report(&self, error: Error) -> Error {
        metrics::record_error(error.kind());
        self.events.emit_error(error)
    }
}

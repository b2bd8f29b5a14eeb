//! Worksheet fetches.
//!
//! [`Tracker::fetch_sheet`] is strict and returns the failure.
//! [`Tracker::fetch_or_report`] is the soft boundary used by the poller and
//! the reconciler: it logs the failure, emits it as an `error` event, and
//! hands back `None` so callers only branch on presence.

use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::warn;

use super::Tracker;
use crate::error::{Error, Result};
use crate::model::SheetData;
use crate::source::{SourceRow, WorksheetInfo};
use crate::telemetry::metrics;

/// A fetched worksheet, with the handles needed to write rows back.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub data: SheetData,
    pub worksheet: WorksheetInfo,
    pub rows: Vec<SourceRow>,
}

fn fetch_err(error: Error) -> Error {
    match error {
        Error::Source(msg) => Error::Fetch(msg),
        other => other,
    }
}

impl Tracker {
    /// Read workbook metadata and every row of the worksheet at `index`.
    pub async fn fetch_sheet(&self, index: usize) -> Result<Fetched> {
        let started = Instant::now();

        let info = self.source.info().await.map_err(fetch_err)?;
        let worksheet = info
            .worksheets
            .get(index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("can't fetch worksheet at index: {index}")))?;
        let rows = self.source.rows(&worksheet).await.map_err(fetch_err)?;

        metrics::fetch_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("sheet", index as i64)],
        );

        Ok(Fetched {
            data: SheetData {
                title: info.title,
                updated: info.updated,
                author: info.author,
                rows: rows.iter().map(|r| r.row.clone()).collect(),
            },
            worksheet,
            rows,
        })
    }

    /// Fetch, reporting any failure on the event channel instead of returning it.
    pub async fn fetch_or_report(&self, index: usize) -> Option<Fetched> {
        match self.fetch_sheet(index).await {
            Ok(fetched) => Some(fetched),
            Err(e) => {
                warn!(sheet = index, error = %e, "fetch failed");
                self.report(e);
                None
            }
        }
    }
}

//! In-memory data source for tests and demos.
//!
//! Holds a [`Workbook`] behind a mutex, counts every call, and can be told
//! to fail the next call of a given operation.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: nothing is shared across processes
//! - **No persistence**: the workbook is gone when the value is dropped

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::workbook::Workbook;
use super::{DataSource, NewWorksheet, SheetInfo, SourceRow, WorksheetInfo};
use crate::error::{Error, Result};
use crate::model::{LOG_SHEET, PRIMARY_SHEET, Row};

/// Operations that can be counted and failed on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Info,
    Rows,
    AppendRow,
    SaveRow,
    AddWorksheet,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub info: usize,
    pub rows: usize,
    pub append_row: usize,
    pub save_row: usize,
    pub add_worksheet: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.info + self.rows + self.append_row + self.save_row + self.add_worksheet
    }
}

#[derive(Debug, Default)]
struct State {
    workbook: Workbook,
    calls: CallCounts,
    fail_next: HashSet<Operation>,
}

#[derive(Debug)]
pub struct InMemorySource {
    state: Mutex<State>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::Source("in-memory workbook lock poisoned".to_string())
}

impl InMemorySource {
    /// A workbook containing only the primary worksheet.
    pub fn new(title: impl Into<String>, primary_headers: &[&str]) -> Self {
        let headers = primary_headers.iter().map(|h| h.to_string()).collect();
        Self::from_workbook(Workbook::new(title, headers))
    }

    pub fn from_workbook(workbook: Workbook) -> Self {
        Self {
            state: Mutex::new(State {
                workbook,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state.lock().map_err(poison_err)
    }

    /// Count the call and consume a pending injected failure, if any.
    fn enter(&self, op: Operation) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock()?;
        match op {
            Operation::Info => state.calls.info += 1,
            Operation::Rows => state.calls.rows += 1,
            Operation::AppendRow => state.calls.append_row += 1,
            Operation::SaveRow => state.calls.save_row += 1,
            Operation::AddWorksheet => state.calls.add_worksheet += 1,
        }
        if state.fail_next.remove(&op) {
            return Err(Error::Source(format!("injected {op:?} failure")));
        }
        Ok(state)
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: Operation) {
        if let Ok(mut state) = self.lock() {
            state.fail_next.insert(op);
        }
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().map(|s| s.calls).unwrap_or_default()
    }

    pub fn reset_calls(&self) {
        if let Ok(mut state) = self.lock() {
            state.calls = CallCounts::default();
        }
    }

    /// Append an assignment row to the primary sheet, as an editor would.
    pub fn add_assignment(&self, row: Row) -> Result<()> {
        let mut state = self.lock()?;
        let primary = state
            .workbook
            .worksheets
            .get(PRIMARY_SHEET)
            .map(|w| w.info())
            .ok_or_else(|| Error::NotFound("primary worksheet".to_string()))?;
        state.workbook.append_row(&primary, row)?;
        Ok(())
    }

    /// Append a row straight into the log sheet, bypassing the tracker.
    pub fn seed_log_row(&self, row: Row) -> Result<()> {
        let mut state = self.lock()?;
        let log = state
            .workbook
            .worksheets
            .get(LOG_SHEET)
            .map(|w| w.info())
            .ok_or_else(|| Error::NotFound("log worksheet".to_string()))?;
        state.workbook.append_row(&log, row)?;
        Ok(())
    }

    /// Pin the workbook modification stamp.
    pub fn set_updated(&self, updated: Option<&str>) {
        if let Ok(mut state) = self.lock() {
            state.workbook.updated = updated.map(str::to_string);
        }
    }

    pub fn updated(&self) -> Option<String> {
        self.lock().ok().and_then(|s| s.workbook.updated.clone())
    }

    pub fn log_rows(&self) -> Vec<Row> {
        self.sheet_rows(LOG_SHEET)
    }

    pub fn primary_rows(&self) -> Vec<Row> {
        self.sheet_rows(PRIMARY_SHEET)
    }

    fn sheet_rows(&self, index: usize) -> Vec<Row> {
        self.lock()
            .ok()
            .and_then(|s| {
                s.workbook
                    .worksheets
                    .get(index)
                    .map(|w| w.rows.iter().map(|r| r.row.clone()).collect())
            })
            .unwrap_or_default()
    }

    pub fn worksheet_titles(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.workbook.worksheets.iter().map(|w| w.title.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataSource for InMemorySource {
    async fn info(&self) -> Result<SheetInfo> {
        Ok(self.enter(Operation::Info)?.workbook.info())
    }

    async fn rows(&self, worksheet: &WorksheetInfo) -> Result<Vec<SourceRow>> {
        self.enter(Operation::Rows)?.workbook.rows(worksheet)
    }

    async fn append_row(&self, worksheet: &WorksheetInfo, row: Row) -> Result<SourceRow> {
        self.enter(Operation::AppendRow)?
            .workbook
            .append_row(worksheet, row)
    }

    async fn save_row(&self, worksheet: &WorksheetInfo, row: &SourceRow) -> Result<()> {
        self.enter(Operation::SaveRow)?
            .workbook
            .save_row(worksheet, row)
    }

    async fn add_worksheet(&self, new: NewWorksheet) -> Result<WorksheetInfo> {
        self.enter(Operation::AddWorksheet)?
            .workbook
            .add_worksheet(new)
    }
}

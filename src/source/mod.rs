//! Data source seam.
//!
//! The tracker never talks to a spreadsheet service directly. It goes
//! through [`DataSource`], which exposes the handful of operations the
//! sync needs: workbook metadata, read all rows of a worksheet, append a
//! row, save a row in place, and add a worksheet.
//!
//! - [`memory::InMemorySource`]: tests and demos, with failure injection
//! - [`file::JsonFileSource`]: a workbook kept as a JSON document on disk
//!
//! Remote-service clients implement the same trait.

pub mod file;
pub mod memory;
pub mod workbook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Row;

/// Workbook metadata returned by [`DataSource::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub title: String,
    /// Last-modified timestamp of the whole workbook.
    pub updated: Option<String>,
    pub author: Option<String>,
    /// Worksheets in display order.
    pub worksheets: Vec<WorksheetInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorksheetInfo {
    pub id: String,
    pub title: String,
    pub col_count: u32,
    pub headers: Vec<String>,
}

/// A row as stored by the source. `id` is the handle used to save it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub id: u64,
    pub row: Row,
}

/// Request to provision a worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorksheet {
    pub title: String,
    pub col_count: u32,
    pub headers: Vec<String>,
}

/// Table access used by the tracker.
///
/// Every method is a suspension point; implementations must not block the
/// runtime thread.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn info(&self) -> Result<SheetInfo>;

    /// All rows of a worksheet, in table order.
    async fn rows(&self, worksheet: &WorksheetInfo) -> Result<Vec<SourceRow>>;

    async fn append_row(&self, worksheet: &WorksheetInfo, row: Row) -> Result<SourceRow>;

    /// Overwrite a previously read row in place.
    async fn save_row(&self, worksheet: &WorksheetInfo, row: &SourceRow) -> Result<()>;

    /// Fails if a worksheet with the same title already exists.
    async fn add_worksheet(&self, new: NewWorksheet) -> Result<WorksheetInfo>;
}

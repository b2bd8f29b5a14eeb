//! Workbook kept as a JSON document on disk.
//!
//! Every call re-reads the file so edits made by hand between polls are
//! picked up; writes replace the whole document through a temp file.
//! Calls from this process are serialized by an async mutex.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::workbook::Workbook;
use super::{DataSource, NewWorksheet, SheetInfo, SourceRow, WorksheetInfo};
use crate::error::{Error, Result};
use crate::model::Row;

#[derive(Debug)]
pub struct JsonFileSource {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSource {
    /// Open an existing workbook file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::NotFound(format!("workbook {}", path.display())));
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Write a fresh workbook with one primary worksheet and open it.
    pub async fn create(
        path: impl Into<PathBuf>,
        title: &str,
        primary_headers: Vec<String>,
    ) -> Result<Self> {
        let path = path.into();
        write_workbook(&path, &Workbook::new(title, primary_headers)).await?;
        Self::open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Workbook> {
        let bytes = tokio::fs::read(&self.path).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Fetch(format!("{} is not a workbook: {e}", self.path.display())))
    }

    /// Read, mutate, and write back while holding the file lock.
    async fn modify<T>(&self, f: impl FnOnce(&mut Workbook) -> Result<T>) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut workbook = self.load().await?;
        let out = f(&mut workbook)?;
        write_workbook(&self.path, &workbook).await?;
        Ok(out)
    }
}

async fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    let json = serde_json::to_vec_pretty(workbook)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "workbook written");
    Ok(())
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn info(&self) -> Result<SheetInfo> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.info())
    }

    async fn rows(&self, worksheet: &WorksheetInfo) -> Result<Vec<SourceRow>> {
        let _guard = self.lock.lock().await;
        self.load().await?.rows(worksheet)
    }

    async fn append_row(&self, worksheet: &WorksheetInfo, row: Row) -> Result<SourceRow> {
        self.modify(|wb| wb.append_row(worksheet, row)).await
    }

    async fn save_row(&self, worksheet: &WorksheetInfo, row: &SourceRow) -> Result<()> {
        self.modify(|wb| wb.save_row(worksheet, row)).await
    }

    async fn add_worksheet(&self, new: NewWorksheet) -> Result<WorksheetInfo> {
        self.modify(|wb| wb.add_worksheet(new)).await
    }
}

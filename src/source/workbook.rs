//! Plain workbook document shared by the in-process sources.
//!
//! Mutations bump the workbook-level `updated` stamp, the same way a
//! hosted spreadsheet reports a new modification time after any edit.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{NewWorksheet, SheetInfo, SourceRow, WorksheetInfo};
use crate::error::{Error, Result};
use crate::model::Row;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub title: String,
    pub updated: Option<String>,
    pub author: Option<String>,
    pub worksheets: Vec<Worksheet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: String,
    pub title: String,
    pub col_count: u32,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<SourceRow>,
    #[serde(default)]
    pub next_row_id: u64,
}

impl Worksheet {
    pub fn new(id: impl Into<String>, title: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            col_count: headers.len().max(1) as u32,
            headers,
            rows: Vec::new(),
            next_row_id: 1,
        }
    }

    pub fn info(&self) -> WorksheetInfo {
        WorksheetInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            col_count: self.col_count,
            headers: self.headers.clone(),
        }
    }

    fn push(&mut self, row: Row) -> SourceRow {
        // Documents written by hand may omit the counter.
        let floor = self.rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let id = self.next_row_id.max(floor);
        self.next_row_id = id + 1;
        let stored = SourceRow { id, row };
        self.rows.push(stored.clone());
        stored
    }
}

impl Workbook {
    /// A workbook with a single primary worksheet.
    pub fn new(title: impl Into<String>, primary_headers: Vec<String>) -> Self {
        let mut workbook = Self {
            title: title.into(),
            updated: None,
            author: None,
            worksheets: vec![Worksheet::new("od6", "Sheet1", primary_headers)],
        };
        workbook.touch();
        workbook
    }

    /// Set `updated` to now, strictly after the previous stamp.
    pub fn touch(&mut self) {
        let mut now = Utc::now();
        if let Some(prev) = self
            .updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            let floor = prev.with_timezone(&Utc) + TimeDelta::microseconds(1);
            if now < floor {
                now = floor;
            }
        }
        self.updated = Some(now.to_rfc3339_opts(SecondsFormat::Micros, true));
    }

    pub fn info(&self) -> SheetInfo {
        SheetInfo {
            title: self.title.clone(),
            updated: self.updated.clone(),
            author: self.author.clone(),
            worksheets: self.worksheets.iter().map(Worksheet::info).collect(),
        }
    }

    pub fn worksheet(&self, id: &str) -> Result<&Worksheet> {
        self.worksheets
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("worksheet {id}")))
    }

    pub fn worksheet_mut(&mut self, id: &str) -> Result<&mut Worksheet> {
        self.worksheets
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::NotFound(format!("worksheet {id}")))
    }

    pub fn rows(&self, worksheet: &WorksheetInfo) -> Result<Vec<SourceRow>> {
        Ok(self.worksheet(&worksheet.id)?.rows.clone())
    }

    pub fn append_row(&mut self, worksheet: &WorksheetInfo, row: Row) -> Result<SourceRow> {
        let stored = self.worksheet_mut(&worksheet.id)?.push(row);
        self.touch();
        Ok(stored)
    }

    pub fn save_row(&mut self, worksheet: &WorksheetInfo, row: &SourceRow) -> Result<()> {
        let sheet = self.worksheet_mut(&worksheet.id)?;
        let slot = sheet
            .rows
            .iter_mut()
            .find(|r| r.id == row.id)
            .ok_or_else(|| Error::NotFound(format!("row {} in worksheet {}", row.id, worksheet.id)))?;
        if slot.row == row.row {
            return Ok(());
        }
        slot.row = row.row.clone();
        self.touch();
        Ok(())
    }

    pub fn add_worksheet(&mut self, new: NewWorksheet) -> Result<WorksheetInfo> {
        if self.worksheets.iter().any(|w| w.title == new.title) {
            return Err(Error::Source(format!(
                "a worksheet named \"{}\" already exists",
                new.title
            )));
        }
        let id = format!("ws{}", self.worksheets.len() + 1);
        let mut sheet = Worksheet::new(id, new.title, new.headers);
        sheet.col_count = new.col_count;
        let info = sheet.info();
        self.worksheets.push(sheet);
        self.touch();
        Ok(info)
    }
}

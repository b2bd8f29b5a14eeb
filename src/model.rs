//! Core data model.
//!
//! Rows are plain string maps keyed by column name. An assignment is
//! identified by its trimmed (assignee, description) pair; the log keeps
//! exactly one row per identity and moves its status through the
//! lifecycle below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of the externally edited sheet that assignments are read from.
pub const PRIMARY_SHEET: usize = 0;
/// Index of the log sheet owned by the tracker.
pub const LOG_SHEET: usize = 1;
pub const LOG_SHEET_TITLE: &str = "Log";
pub const LOG_SHEET_COLUMNS: u32 = 50;

pub const DATE_COLUMN: &str = "date";
pub const STATUS_COLUMN: &str = "status";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a logged assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Started,
    Completed,
    Rejected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One spreadsheet row: column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Cell value with surrounding whitespace removed; missing cells read as "".
    pub fn trimmed(&self, column: &str) -> &str {
        self.get(column).map(str::trim).unwrap_or("")
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(column, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn status(&self) -> Option<Status> {
        self.get(STATUS_COLUMN).and_then(|s| s.parse().ok())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The configured column names for assignee and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub assigned: String,
    pub description: String,
}

impl FieldNames {
    pub fn new(assigned: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            assigned: assigned.into(),
            description: description.into(),
        }
    }

    /// Header row provisioned on a fresh log sheet.
    pub fn log_headers(&self) -> Vec<String> {
        vec![
            DATE_COLUMN.to_string(),
            self.assigned.clone(),
            STATUS_COLUMN.to_string(),
            self.description.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The (assignee, description) pair keying a log row. Always trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub assignee: String,
    pub description: String,
}

impl Identity {
    pub fn new(assignee: &str, description: &str) -> Self {
        Self {
            assignee: assignee.trim().to_string(),
            description: description.trim().to_string(),
        }
    }

    /// Identity of an assignment row, or `None` unless both cells are non-empty.
    pub fn from_row(row: &Row, fields: &FieldNames) -> Option<Self> {
        let assignee = row.trimmed(&fields.assigned);
        let description = row.trimmed(&fields.description);
        if assignee.is_empty() || description.is_empty() {
            return None;
        }
        Some(Self::new(assignee, description))
    }

    pub fn is_blank(&self) -> bool {
        self.assignee.is_empty() || self.description.is_empty()
    }

    /// Case-sensitive equality on both trimmed cells.
    pub fn matches(&self, row: &Row, fields: &FieldNames) -> bool {
        row.trimmed(&fields.assigned) == self.assignee
            && row.trimmed(&fields.description) == self.description
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.assignee, self.description)
    }
}

/// A fresh log row for an identity seen for the first time.
pub fn new_log_row(
    identity: &Identity,
    status: Status,
    fields: &FieldNames,
    now: DateTime<Utc>,
) -> Row {
    Row::new()
        .with(DATE_COLUMN, utc_string(now))
        .with(fields.assigned.clone(), identity.assignee.clone())
        .with(fields.description.clone(), identity.description.clone())
        .with(STATUS_COLUMN, status.as_str())
}

/// RFC 1123 timestamp, e.g. `Tue, 20 Oct 2026 10:00:00 GMT`.
pub fn utc_string(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ---------------------------------------------------------------------------
// Sheet payloads
// ---------------------------------------------------------------------------

/// One fetched worksheet plus the workbook metadata it was read with.
/// Also the payload of the `updated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetData {
    pub title: String,
    /// Workbook last-modified timestamp as reported by the source.
    pub updated: Option<String>,
    pub author: Option<String>,
    pub rows: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields() -> FieldNames {
        FieldNames::new("assigned", "hed")
    }

    #[test]
    fn identity_trims_both_cells() {
        let row = Row::new()
            .with("assigned", "a@x.com ")
            .with("hed", " Fix bug ");
        let id = Identity::from_row(&row, &fields()).unwrap();
        assert_eq!(id, Identity::new("a@x.com", "Fix bug"));
    }

    #[test]
    fn identity_requires_both_cells() {
        let only_assignee = Row::new().with("assigned", "a@x.com").with("hed", "   ");
        let only_hed = Row::new().with("hed", "Fix bug");
        assert!(Identity::from_row(&only_assignee, &fields()).is_none());
        assert!(Identity::from_row(&only_hed, &fields()).is_none());
    }

    #[test]
    fn identity_match_is_case_sensitive() {
        let id = Identity::new("a@x.com", "Fix bug");
        let row = Row::new().with("assigned", " a@x.com").with("hed", "Fix bug\t");
        let shouting = Row::new().with("assigned", "A@X.COM").with("hed", "Fix bug");
        assert!(id.matches(&row, &fields()));
        assert!(!id.matches(&shouting, &fields()));
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in [Status::Started, Status::Completed, Status::Rejected] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("done".parse::<Status>().is_err());
    }

    #[test]
    fn new_log_row_has_date_and_status() {
        let now = Utc.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap();
        let row = new_log_row(&Identity::new("a@x.com", "Fix bug"), Status::Started, &fields(), now);
        assert_eq!(row.get("date"), Some("Tue, 20 Oct 2026 10:00:00 GMT"));
        assert_eq!(row.get("assigned"), Some("a@x.com"));
        assert_eq!(row.get("hed"), Some("Fix bug"));
        assert_eq!(row.status(), Some(Status::Started));
    }

    #[test]
    fn log_headers_follow_configured_fields() {
        let fields = FieldNames::new("owner", "task");
        assert_eq!(fields.log_headers(), vec!["date", "owner", "status", "task"]);
    }
}

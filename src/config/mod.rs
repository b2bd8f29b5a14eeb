//! Typed tracker configuration.
//!
//! Built once before the tracker starts and immutable afterwards. Every
//! entry point (JSON value, TOML file, environment) funnels through
//! [`Config::from_value`] so validation happens in exactly one place.
//! The credential payload is wrapped in `secrecy::SecretString` to keep it
//! out of logs.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ASSIGNED_FIELD: &str = "assigned";
pub const DEFAULT_DESCRIPTION_FIELD: &str = "hed";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20_000;

#[derive(Debug)]
pub struct Config {
    /// Opaque credential payload (JSON text) handed to the data source.
    pub auth: SecretString,
    /// Identifier of the remote workbook.
    pub sheet_id: String,
    /// Column holding the assignee email.
    pub assigned_field: String,
    /// Column holding the task label.
    pub description_field: String,
    pub poll_interval: Duration,
}

impl Config {
    /// Minimal configuration with defaults for everything optional.
    pub fn new(sheet_id: impl Into<String>, auth: impl Into<String>) -> Self {
        let auth: String = auth.into();
        Self {
            auth: SecretString::from(auth),
            sheet_id: sheet_id.into(),
            assigned_field: DEFAULT_ASSIGNED_FIELD.to_string(),
            description_field: DEFAULT_DESCRIPTION_FIELD.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn fields(mut self, assigned: impl Into<String>, description: impl Into<String>) -> Self {
        self.assigned_field = assigned.into();
        self.description_field = description.into();
        self
    }

    /// Validate a construction object of the shape
    /// `{ auth: {..}, sheetId: "..", assignedField?, descriptionField?, pollInterval? }`.
    ///
    /// `auth` must be an object and `sheetId` a string. Optional keys that
    /// are missing or of the wrong type fall back to their defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::Config(format!(
                    "expected an object, got {}",
                    type_name(&other)
                )));
            }
        };

        let auth = match map.get("auth") {
            Some(auth @ Value::Object(_)) => serde_json::to_string(auth)?,
            other => {
                return Err(Error::Config(format!(
                    "`auth` must be an object, got {}",
                    other.map(type_name).unwrap_or("nothing")
                )));
            }
        };

        let sheet_id = match map.get("sheetId") {
            Some(Value::String(id)) => id.clone(),
            other => {
                return Err(Error::Config(format!(
                    "`sheetId` must be a string, got {}",
                    other.map(type_name).unwrap_or("nothing")
                )));
            }
        };

        let mut config = Self::new(sheet_id, auth);
        if let Some(field) = string_key(&map, "assignedField") {
            config.assigned_field = field;
        }
        if let Some(field) = string_key(&map, "descriptionField") {
            config.description_field = field;
        }
        match map.get("pollInterval").and_then(Value::as_f64) {
            Some(ms) if ms.is_finite() && ms >= 0.0 => {
                config.poll_interval = Duration::from_millis(ms as u64);
            }
            _ => {}
        }
        Ok(config)
    }

    /// Load from a TOML file using the same keys as [`Config::from_value`],
    /// with `auth` as a table.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let parsed: toml::Value = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_value(serde_json::to_value(parsed)?)
    }

    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let auth_text = required_var("SHEIT_AUTH")?;
        let auth: Value = serde_json::from_str(&auth_text)
            .map_err(|e| Error::Config(format!("SHEIT_AUTH is not valid JSON: {e}")))?;

        let mut map = Map::new();
        map.insert("auth".into(), auth);
        map.insert("sheetId".into(), Value::String(required_var("SHEIT_SHEET_ID")?));
        if let Ok(field) = std::env::var("SHEIT_ASSIGNED_FIELD") {
            map.insert("assignedField".into(), Value::String(field));
        }
        if let Ok(field) = std::env::var("SHEIT_DESCRIPTION_FIELD") {
            map.insert("descriptionField".into(), Value::String(field));
        }
        if let Ok(ms) = std::env::var("SHEIT_POLL_INTERVAL_MS") {
            let ms: u64 = ms.parse().map_err(|_| {
                Error::Config(format!("SHEIT_POLL_INTERVAL_MS must be milliseconds, got {ms}"))
            })?;
            map.insert("pollInterval".into(), Value::from(ms));
        }
        Self::from_value(Value::Object(map))
    }
}

/// Process-level settings that are not part of the tracker itself.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

fn string_key(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

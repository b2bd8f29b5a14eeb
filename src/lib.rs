//! # sheit-rs
//!
//! Keeps a spreadsheet log of assignment status. The tracker polls a
//! primary sheet for rows carrying an assignee and a task description,
//! records each (assignee, description) pair once in a `Log` sheet as
//! `started`, and moves that row to `completed` or `rejected` on request.
//!
//! Spreadsheet access goes through the [`source::DataSource`] trait;
//! lifecycle notifications are delivered on a broadcast channel (see
//! [`event`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod source;
pub mod telemetry;

pub use engine::{PollOutcome, Poller, Reconciled, Tracker};
pub use error::{Error, Result};

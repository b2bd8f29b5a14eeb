//! Secret handling utilities.
//!
//! Re-exports secrecy types so data source adapters can read the
//! credential payload without depending on secrecy directly.

pub use secrecy::{ExposeSecret, SecretString};

//! Error types and result handling for kinesis-shipper.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate. Per-event and per-batch
//! failures have their own types ([`PartitionKeyError`],
//! [`MapError`](crate::streams::MapError),
//! [`TransportError`](crate::streams::TransportError)) so the dispatcher can
//! tell them apart without string matching.
//!
//! # Example
//!
//! ```rust
//! use kinesis_shipper::{Error, Result};
//!
//! fn load_settings() -> Result<()> {
//!     Err(Error::Config("stream_name is not defined".to_string()))
//! }
//!
//! match load_settings() {
//!     Ok(()) => println!("Loaded"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use crate::streams::TransportError;
use thiserror::Error;

/// The main error type for kinesis-shipper operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be loaded or deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// JSON serialization error when encoding events.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event could not be encoded into a record payload.
    #[error("Encode error: {message}")]
    Encode {
        /// Description of the encoding failure
        message: String,
    },

    /// One or more batches of a dispatch failed at the transport level.
    ///
    /// Carries the first failure; the retriable events of all batches are
    /// still returned alongside this error.
    #[error("{failed_batches} batch(es) failed to send, first failure: {source}")]
    Dispatch {
        /// Number of batches whose submission failed outright
        failed_batches: usize,
        /// The first transport failure observed
        #[source]
        source: TransportError,
    },
}

/// Failure to derive a partition key from an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionKeyError {
    /// The configured field is absent from the event.
    #[error("field '{field}' not found in event")]
    MissingField {
        /// The dotted field path that was looked up
        field: String,
    },

    /// The configured field exists but its value is not a string.
    #[error("field '{field}' (={value}) is found, but not a string")]
    TypeMismatch {
        /// The dotted field path that was looked up
        field: String,
        /// The JSON rendering of the value found
        value: String,
    },
}

/// A convenient Result type alias for kinesis-shipper operations.
///
/// This is equivalent to `std::result::Result<T, kinesis_shipper::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

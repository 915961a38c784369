//! Errors that cross the machine's boundary to the host.
//!
//! Device anomalies never appear here: devices clamp or drop out-of-range
//! input themselves. Only failures the host must react to are modelled.

use thiserror::Error;

/// Machine and session errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum X16Error {
    /// Session setup could not be agreed with the host (pixel format,
    /// invalid configuration). No run is attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A snapshot buffer has the wrong length. State is left unchanged.
    #[error("snapshot size mismatch: expected {expected} bytes, got {actual}")]
    Size {
        /// Bytes the snapshot format requires.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// The host rejected a frame or an audio batch. Ends the current slice;
    /// device state stays exactly as it was when delivery was attempted.
    #[error("delivery failure: {0}")]
    Delivery(&'static str),
}

/// Convenience alias for machine operations.
pub type X16Result<T> = Result<T, X16Error>;

//! Error types for a send/receive transaction.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a transaction.
///
/// A receive timeout is not an error: it is a normal way for the receive
/// loop to finish. Likewise a short reply just yields no engineering value.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No serial port name was supplied.
    #[error("no serial port selected")]
    NoPortSelected,

    /// The send field contained no hex tokens.
    #[error("no data to send")]
    HexParse,

    /// A token could not be converted to a byte.
    #[error("'{token}' is not a valid hexadecimal byte (00-FF)")]
    InvalidByte {
        /// The offending token as typed.
        token: String,
    },

    /// The output file name is blank.
    #[error("output file name must not be empty")]
    EmptyFilename,

    /// The log file could not be opened for appending.
    #[error("cannot write log file {}: {source}", .path.display())]
    LogFile {
        /// Full path of the log file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The read timeout lies outside 50..=1000 ms.
    #[error("timeout must be between 50 ms and 1000 ms (got {0})")]
    TimeoutRange(i64),

    /// The baud rate is not a positive integer.
    #[error("invalid baud rate '{0}'")]
    InvalidBaudRate(String),

    /// The port could not be claimed.
    #[error("failed to open port '{port}': {source}")]
    PortOpen {
        /// Port name as configured.
        port: String,
        /// Driver error.
        #[source]
        source: serialport::Error,
    },

    /// Writing the request frame failed.
    #[error("failed to write to serial port: {0}")]
    Write(#[source] std::io::Error),

    /// A previous transaction is still receiving.
    #[error("a transaction is already in progress")]
    Busy,
}

impl SessionError {
    /// Returns true for errors detected before any hardware access.
    pub fn is_preflight(&self) -> bool {
        !matches!(
            self,
            SessionError::PortOpen { .. } | SessionError::Write(_) | SessionError::Busy
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

//! Validation of the operator-supplied configuration.
//!
//! All checks here run before the serial port is touched. The log file
//! probe is the only one with a side effect: it creates the file if it
//! does not yet exist.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{LOG_EXTENSION, TIMEOUT_RANGE_MS};
use crate::error::{Result, SessionError};

/// Raw field values as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub port: String,
    pub baud_rate: String,
    pub timeout_ms: String,
    pub folder: String,
    pub filename: String,
    pub hex_frame: String,
}

/// Validated serial settings for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub port: String,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub fn validate_port(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(SessionError::NoPortSelected);
    }
    Ok(name)
}

/// Parses the timeout field. Unparsable text counts as 0.
pub fn validate_timeout(text: &str) -> Result<u64> {
    let value: i64 = text.trim().parse().unwrap_or(0);
    if !TIMEOUT_RANGE_MS.contains(&value) {
        return Err(SessionError::TimeoutRange(value));
    }
    Ok(value as u64)
}

pub fn validate_baud_rate(text: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(rate) if rate > 0 => Ok(rate),
        _ => Err(SessionError::InvalidBaudRate(text.to_string())),
    }
}

/// Builds `<folder>/<filename>.txt` without touching the filesystem.
pub fn log_path(folder: &str, filename: &str) -> Result<PathBuf> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(SessionError::EmptyFilename);
    }
    Ok(Path::new(folder).join(format!("{}.{}", filename, LOG_EXTENSION)))
}

/// Checks that the log file can be created or appended to.
///
/// Opening the file for append is the probe itself; the handle is closed
/// again immediately.
pub fn validate_output_target(folder: &str, filename: &str) -> Result<PathBuf> {
    let path = log_path(folder, filename)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| SessionError::LogFile {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

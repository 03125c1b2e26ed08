//! Append-only text log of every transaction.
//!
//! Each transaction produces two records:
//!
//! ```text
//! (14:03:07.512)_Send(6): 01 04 00 00 00 02\r\n
//! (14:03:07.731)_Receive(9): 01 04 04 00 20 7C 4E 5A BA\r\n
//! \r\n
//! ```
//!
//! The file is opened, appended to and closed for every record, so other
//! programs may read it between writes.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{Result, SessionError};

/// Text encoding used for the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogEncoding {
    /// Single-byte (Latin-1) encoding, ASCII-compatible with the legacy code
    /// pages. Characters above U+00FF become `?`.
    #[default]
    Ansi,
    Utf8,
    /// UTF-16 little endian, no byte order mark.
    Utf16Le,
}

impl LogEncoding {
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            LogEncoding::Ansi => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            LogEncoding::Utf8 => text.as_bytes().to_vec(),
            LogEncoding::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "Send"),
            Direction::Receive => write!(f, "Receive"),
        }
    }
}

/// One record of the log file.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    pub bytes: Vec<u8>,
}

impl LogEntry {
    pub fn now(direction: Direction, bytes: &[u8]) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            bytes: bytes.to_vec(),
        }
    }

    pub fn render(&self) -> String {
        let mut line = format!(
            "({})_{}({}):",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.direction,
            self.bytes.len()
        );
        for b in &self.bytes {
            line.push_str(&format!(" {:02X}", b));
        }
        line.push_str("\r\n");
        // Blank line between transactions.
        if self.direction == Direction::Receive {
            line.push_str("\r\n");
        }
        line
    }
}

/// Appends transaction records to `<folder>/<filename>.txt`.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    path: PathBuf,
    encoding: LogEncoding,
}

impl SessionLogger {
    pub fn new(path: impl Into<PathBuf>, encoding: LogEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_send(&self, bytes: &[u8]) -> Result<()> {
        self.append(&LogEntry::now(Direction::Send, bytes))
    }

    pub fn log_receive(&self, bytes: &[u8]) -> Result<()> {
        self.append(&LogEntry::now(Direction::Receive, bytes))
    }

    pub fn append(&self, entry: &LogEntry) -> Result<()> {
        let to_log_error = |source| SessionError::LogFile {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_log_error)?;
        file.write_all(&self.encoding.encode(&entry.render()))
            .map_err(to_log_error)?;

        log::debug!(
            "Logged {} record ({} bytes) to {}",
            entry.direction,
            entry.bytes.len(),
            self.path.display()
        );
        Ok(())
    }
}

//! # Serial Link Test Harness Library
//!
//! This library contains the send/receive session engine of the serial
//! test harness. An operator-typed hex frame is validated and written to
//! a serial port, a worker thread collects the fixed-length reply under a
//! per-read timeout, the reply is decoded into an engineering value, and
//! both directions are appended to a text log.
//!
//! The front-end only supplies a [`SendRequest`] and consumes [`Update`]s.

pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod frame;
pub mod harness;
pub mod logger;
pub mod progress;
pub mod session;

pub use config::{SendRequest, SessionConfig};
pub use decode::{decode, format_value};
pub use error::{Result, SessionError};
pub use frame::{encode, to_display_hex, Frame};
pub use harness::{Harness, TransactionSummary, TransmitReport, Update};
pub use logger::{Direction, LogEncoding, LogEntry, SessionLogger};
pub use progress::{spawn_receiver, ProgressChannel, SessionEvent};
pub use session::{PortOpener, ReceiveBuffer, SerialSession, SystemPorts, Termination};

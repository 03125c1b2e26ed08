//! Transaction controller for the reporting side.
//!
//! [`Harness::send`] validates the operator's input, transmits the frame,
//! logs the Send record and starts the receive worker. The caller then
//! polls for [`Update`]s; the final one decodes the reply and logs the
//! Receive record. Only one transaction may be in flight at a time.

use std::path::PathBuf;

use crate::config::{
    log_path, validate_baud_rate, validate_output_target, validate_port, validate_timeout,
    SendRequest, SessionConfig,
};
use crate::decode::decode;
use crate::error::{Result, SessionError};
use crate::frame::{encode, to_display_hex};
use crate::logger::{LogEncoding, SessionLogger};
use crate::progress::{spawn_receiver, Poll, ProgressChannel, SessionEvent};
use crate::session::{PortOpener, SerialSession, SystemPorts, Termination};

/// What the operator sees right after a successful transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitReport {
    pub sent_count: usize,
    pub sent_hex: String,
    pub log_path: PathBuf,
}

/// Final outcome of one transaction.
#[derive(Debug)]
pub struct TransactionSummary {
    pub sent_count: usize,
    pub received: Vec<u8>,
    pub termination: Termination,
    pub value: Option<f32>,
    /// Set when the Receive record could not be written.
    pub log_error: Option<SessionError>,
}

impl TransactionSummary {
    pub fn received_count(&self) -> usize {
        self.received.len()
    }
}

#[derive(Debug)]
pub enum Update {
    /// New bytes arrived.
    Progress {
        received_count: usize,
        chunk_hex: String,
    },
    Finished(TransactionSummary),
    /// The worker stopped without handing the buffer back. An empty
    /// Receive record is still logged.
    Aborted,
}

struct InFlight {
    channel: ProgressChannel,
    logger: SessionLogger,
    sent_count: usize,
}

pub struct Harness<O: PortOpener = SystemPorts> {
    opener: O,
    encoding: LogEncoding,
    in_flight: Option<InFlight>,
}

impl Harness<SystemPorts> {
    pub fn new(encoding: LogEncoding) -> Self {
        Self::with_opener(SystemPorts, encoding)
    }
}

impl<O: PortOpener> Harness<O> {
    pub fn with_opener(opener: O, encoding: LogEncoding) -> Self {
        Self {
            opener,
            encoding,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a transaction.
    ///
    /// Every validation runs before the port is opened. On error nothing
    /// is logged and no worker is started.
    pub fn send(&mut self, request: &SendRequest) -> Result<TransmitReport> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }

        let port = validate_port(&request.port)?;
        let frame = encode(&request.hex_frame)?;
        log_path(&request.folder, &request.filename)?;
        let timeout_ms = validate_timeout(&request.timeout_ms)?;
        let baud_rate = validate_baud_rate(&request.baud_rate)?;
        let path = validate_output_target(&request.folder, &request.filename)?;

        let config = SessionConfig {
            port: port.to_string(),
            baud_rate,
            timeout_ms,
        };
        let mut session = SerialSession::open(&self.opener, config)?;
        let sent_count = session.transmit(&frame)?;

        let logger = SessionLogger::new(path, self.encoding);
        logger.log_send(frame.as_bytes())?;

        let report = TransmitReport {
            sent_count,
            sent_hex: to_display_hex(frame.as_bytes()),
            log_path: logger.path().to_path_buf(),
        };

        self.in_flight = Some(InFlight {
            channel: spawn_receiver(session),
            logger,
            sent_count,
        });
        Ok(report)
    }

    /// Returns the next update if one is ready.
    pub fn poll(&mut self) -> Option<Update> {
        let poll = self.in_flight.as_mut()?.channel.try_next();
        self.handle(poll)
    }

    /// Blocks until the next update. Returns `None` when idle.
    pub fn wait(&mut self) -> Option<Update> {
        loop {
            let poll = self.in_flight.as_mut()?.channel.next();
            if let Some(update) = self.handle(poll) {
                return Some(update);
            }
        }
    }

    fn handle(&mut self, poll: Poll) -> Option<Update> {
        match poll {
            Poll::Pending => None,
            Poll::Event(SessionEvent::Progress {
                received_count,
                chunk,
            }) => {
                // Attempts that produced nothing carry no news for the display.
                if chunk.is_empty() {
                    return None;
                }
                Some(Update::Progress {
                    received_count,
                    chunk_hex: to_display_hex(&chunk),
                })
            }
            Poll::Event(SessionEvent::Completed(buffer)) => {
                let in_flight = self.in_flight.take()?;
                let value = decode(&buffer);
                let log_error = in_flight.logger.log_receive(buffer.bytes()).err();
                if let Some(err) = &log_error {
                    log::warn!("{}", err);
                }
                Some(Update::Finished(TransactionSummary {
                    sent_count: in_flight.sent_count,
                    received: buffer.bytes().to_vec(),
                    termination: buffer.termination(),
                    value,
                    log_error,
                }))
            }
            Poll::Lost => {
                // The buffer died with the worker; close the pair with an empty record.
                let in_flight = self.in_flight.take()?;
                if let Err(err) = in_flight.logger.log_receive(&[]) {
                    log::warn!("{}", err);
                }
                Some(Update::Aborted)
            }
        }
    }
}

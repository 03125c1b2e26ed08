//! One serial transaction: open, transmit, receive, close.
//!
//! A [`SerialSession`] owns the port handle for exactly one transaction.
//! [`SerialSession::receive`] consumes the session, so the port is closed
//! once the receive loop finishes no matter how it finished.

use std::io::{self, Read, Write};

use serialport::{DataBits, Parity, SerialPort, StopBits};

use crate::config::SessionConfig;
use crate::constants::{RECEIVE_CAPACITY, TARGET_LEN};
use crate::error::{Result, SessionError};
use crate::frame::Frame;

/// Something that can claim a serial link for a transaction.
pub trait PortOpener {
    type Port: Read + Write + Send + 'static;

    fn open(&self, config: &SessionConfig) -> Result<Self::Port>;
}

/// Opens real serial ports through the `serialport` crate, 8-N-1.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortOpener for SystemPorts {
    type Port = Box<dyn SerialPort>;

    fn open(&self, config: &SessionConfig) -> Result<Self::Port> {
        serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.timeout())
            .open()
            .map_err(|source| SessionError::PortOpen {
                port: config.port.clone(),
                source,
            })
    }
}

/// Lifecycle of an open session. There is no `Closed` value: closing
/// consumes the session, so a closed session cannot be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Transmitted,
    Receiving,
}

/// Why the receive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All `TARGET_LEN` bytes arrived.
    TargetReached,
    /// A read attempt produced no byte within the timeout.
    TimedOut,
    /// The driver reported an error other than a timeout.
    LinkError,
}

/// Bytes accumulated by the receive loop.
#[derive(Debug, Clone)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    received: usize,
    termination: Termination,
}

impl ReceiveBuffer {
    fn new() -> Self {
        Self {
            data: vec![0; RECEIVE_CAPACITY],
            received: 0,
            termination: Termination::TimedOut,
        }
    }

    /// Builds a finished buffer from already received bytes.
    ///
    /// Input longer than `TARGET_LEN` is truncated.
    pub fn from_received(bytes: &[u8], termination: Termination) -> Self {
        let mut buffer = Self::new();
        let len = bytes.len().min(TARGET_LEN);
        buffer.data[..len].copy_from_slice(&bytes[..len]);
        buffer.received = len;
        buffer.termination = termination;
        buffer
    }

    pub fn received_count(&self) -> usize {
        self.received
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.received]
    }

    pub fn is_complete(&self) -> bool {
        self.received >= TARGET_LEN
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    fn request_len(&self) -> usize {
        (TARGET_LEN - self.received).min(self.data.len() - self.received)
    }
}

/// An open serial link for a single transaction.
pub struct SerialSession<P> {
    port: P,
    config: SessionConfig,
    state: SessionState,
}

impl<P: Read + Write> SerialSession<P> {
    pub fn open<O>(opener: &O, config: SessionConfig) -> Result<Self>
    where
        O: PortOpener<Port = P>,
    {
        let port = opener.open(&config)?;
        log::info!(
            "Opened {} at {} baud (timeout {} ms)",
            config.port,
            config.baud_rate,
            config.timeout_ms
        );
        Ok(Self {
            port,
            config,
            state: SessionState::Open,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Writes the whole frame and returns the number of bytes sent.
    pub fn transmit(&mut self, frame: &Frame) -> Result<usize> {
        self.port
            .write_all(frame.as_bytes())
            .and_then(|_| self.port.flush())
            .map_err(SessionError::Write)?;
        self.state = SessionState::Transmitted;
        log::debug!("Sent {} bytes: {}", frame.len(), frame);
        Ok(frame.len())
    }

    /// Runs the bounded receive loop, then closes the port.
    ///
    /// `on_progress` is called after every read attempt with the cumulative
    /// byte count and the bytes that attempt produced. The loop stops once
    /// `TARGET_LEN` bytes are in, or as soon as one attempt yields nothing.
    pub fn receive<F>(mut self, mut on_progress: F) -> ReceiveBuffer
    where
        F: FnMut(usize, &[u8]),
    {
        self.state = SessionState::Receiving;
        let mut buffer = ReceiveBuffer::new();

        let termination = loop {
            let start = buffer.received;
            let end = start + buffer.request_len();

            match self.port.read(&mut buffer.data[start..end]) {
                Ok(0) => {
                    on_progress(buffer.received, &[]);
                    break Termination::TimedOut;
                }
                Ok(n) => {
                    buffer.received += n;
                    log::trace!("Read {} bytes ({} total)", n, buffer.received);
                    on_progress(buffer.received, &buffer.data[start..buffer.received]);
                    if buffer.is_complete() {
                        break Termination::TargetReached;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    on_progress(buffer.received, &[]);
                    break Termination::TimedOut;
                }
                Err(e) => {
                    log::warn!("Read from {} failed: {}", self.config.port, e);
                    on_progress(buffer.received, &[]);
                    break Termination::LinkError;
                }
            }
        };

        buffer.termination = termination;
        log::debug!(
            "Receive finished with {:?} after {} bytes",
            termination,
            buffer.received
        );
        self.close();
        buffer
    }

    /// Releases the port.
    pub fn close(self) {
        log::info!("Closed {}", self.config.port);
        drop(self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    enum Step {
        Data(Vec<u8>),
        Silence,
        Fail,
    }

    /// A port that replays a scripted sequence of read results.
    struct ScriptedPort {
        steps: VecDeque<Step>,
        written: Arc<Mutex<Vec<u8>>>,
        requests: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<bool>>,
        fail_write: bool,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.requests.lock().unwrap().push(buf.len());
            match self.steps.pop_front() {
                Some(Step::Data(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Data(data.split_off(n)));
                    }
                    Ok(n)
                }
                Some(Step::Fail) => Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
                Some(Step::Silence) | None => {
                    Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
                }
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for ScriptedPort {
        fn drop(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct Probe {
        written: Arc<Mutex<Vec<u8>>>,
        requests: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<bool>>,
    }

    fn session(steps: Vec<Step>) -> (SerialSession<ScriptedPort>, Probe) {
        let harness = Probe {
            written: Arc::default(),
            requests: Arc::default(),
            closed: Arc::default(),
        };
        let port = ScriptedPort {
            steps: steps.into(),
            written: harness.written.clone(),
            requests: harness.requests.clone(),
            closed: harness.closed.clone(),
            fail_write: false,
        };
        let session = SerialSession {
            port,
            config: SessionConfig {
                port: "COM3".into(),
                baud_rate: 9600,
                timeout_ms: 200,
            },
            state: SessionState::Open,
        };
        (session, harness)
    }

    const REPLY: [u8; 9] = [0x01, 0x04, 0x04, 0x00, 0x20, 0x7C, 0x4E, 0x5A, 0xBA];

    #[test]
    fn transmit_writes_whole_frame() {
        let (mut session, h) = session(vec![]);
        assert_eq!(session.state(), SessionState::Open);
        let frame = encode("01 04 00 00 00 02").unwrap();
        assert_eq!(session.transmit(&frame).unwrap(), 6);
        assert_eq!(session.state(), SessionState::Transmitted);
        assert_eq!(*h.written.lock().unwrap(), vec![0x01, 0x04, 0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn transmit_failure_is_write_error() {
        let (mut session, _h) = session(vec![]);
        session.port.fail_write = true;
        let frame = encode("01").unwrap();
        assert!(matches!(session.transmit(&frame), Err(SessionError::Write(_))));
    }

    #[test]
    fn silent_device_times_out_with_nothing() {
        let (session, h) = session(vec![Step::Silence]);
        let mut reports = Vec::new();
        let buffer = session.receive(|count, _| reports.push(count));
        assert_eq!(buffer.received_count(), 0);
        assert_eq!(buffer.termination(), Termination::TimedOut);
        assert_eq!(reports, vec![0]);
        assert!(*h.closed.lock().unwrap());
    }

    #[test]
    fn full_reply_in_one_burst() {
        let (session, h) = session(vec![Step::Data(REPLY.to_vec())]);
        let buffer = session.receive(|_, _| {});
        assert_eq!(buffer.bytes(), &REPLY);
        assert_eq!(buffer.termination(), Termination::TargetReached);
        assert_eq!(*h.requests.lock().unwrap(), vec![9]);
        assert!(*h.closed.lock().unwrap());
    }

    #[test]
    fn split_reply_reports_each_chunk() {
        let (session, _h) = session(vec![
            Step::Data(REPLY[..4].to_vec()),
            Step::Data(REPLY[4..].to_vec()),
        ]);
        let mut reports = Vec::new();
        let buffer = session.receive(|count, chunk| reports.push((count, chunk.to_vec())));
        assert!(buffer.is_complete());
        assert_eq!(
            reports,
            vec![(4, REPLY[..4].to_vec()), (9, REPLY[4..].to_vec())]
        );
    }

    #[test]
    fn never_reads_past_target() {
        let mut noisy = REPLY.to_vec();
        noisy.extend_from_slice(&[0xEE; 20]);
        let (session, h) = session(vec![
            Step::Data(noisy[..5].to_vec()),
            Step::Data(noisy[5..].to_vec()),
        ]);
        let buffer = session.receive(|_, _| {});
        assert_eq!(buffer.received_count(), 9);
        assert_eq!(buffer.bytes(), &REPLY);
        assert_eq!(*h.requests.lock().unwrap(), vec![9, 4]);
    }

    #[test]
    fn partial_reply_stops_at_first_silence() {
        let (session, h) = session(vec![
            Step::Data(REPLY[..3].to_vec()),
            Step::Silence,
            Step::Data(REPLY[3..].to_vec()),
        ]);
        let buffer = session.receive(|_, _| {});
        assert_eq!(buffer.received_count(), 3);
        assert_eq!(buffer.termination(), Termination::TimedOut);
        assert_eq!(h.requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn link_error_ends_loop_and_closes() {
        let (session, h) = session(vec![Step::Data(vec![0x01, 0x04]), Step::Fail]);
        let buffer = session.receive(|_, _| {});
        assert_eq!(buffer.received_count(), 2);
        assert_eq!(buffer.termination(), Termination::LinkError);
        assert!(*h.closed.lock().unwrap());
    }

    #[test]
    fn from_received_truncates_to_target() {
        let buffer = ReceiveBuffer::from_received(&[0xAA; 12], Termination::TargetReached);
        assert_eq!(buffer.received_count(), 9);
    }
}

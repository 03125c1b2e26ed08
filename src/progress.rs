//! Hand-off between the receive worker and the reporting side.
//!
//! The session is moved into a worker thread. Everything the reporting side
//! learns about the receive phase arrives as a [`SessionEvent`], ending
//! with exactly one `Completed` event that hands the buffer back.

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::session::{ReceiveBuffer, SerialSession};

#[derive(Debug)]
pub enum SessionEvent {
    /// A read attempt finished.
    Progress {
        /// Bytes received so far.
        received_count: usize,
        /// Bytes produced by this attempt.
        chunk: Vec<u8>,
    },
    /// The receive loop ended and the port is closed.
    Completed(ReceiveBuffer),
}

/// Result of polling a [`ProgressChannel`].
#[derive(Debug)]
pub enum Poll {
    Event(SessionEvent),
    Pending,
    /// The worker went away without completing.
    Lost,
}

/// Receiving end of a running receive worker.
pub struct ProgressChannel {
    events: Receiver<SessionEvent>,
    worker: Option<JoinHandle<()>>,
}

/// Moves `session` into a worker thread and starts its receive loop.
pub fn spawn_receiver<P>(session: SerialSession<P>) -> ProgressChannel
where
    P: Read + Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        let buffer = session.receive(|received_count, chunk| {
            let _ = tx.send(SessionEvent::Progress {
                received_count,
                chunk: chunk.to_vec(),
            });
        });
        let _ = tx.send(SessionEvent::Completed(buffer));
    });

    ProgressChannel {
        events: rx,
        worker: Some(worker),
    }
}

impl ProgressChannel {
    /// Returns the next event without blocking.
    pub fn try_next(&mut self) -> Poll {
        match self.events.try_recv() {
            Ok(event) => self.deliver(event),
            Err(TryRecvError::Empty) => Poll::Pending,
            Err(TryRecvError::Disconnected) => self.lost(),
        }
    }

    /// Blocks until the next event arrives.
    pub fn next(&mut self) -> Poll {
        match self.events.recv() {
            Ok(event) => self.deliver(event),
            Err(_) => self.lost(),
        }
    }

    fn deliver(&mut self, event: SessionEvent) -> Poll {
        if matches!(event, SessionEvent::Completed(_)) {
            self.join();
        }
        Poll::Event(event)
    }

    fn lost(&mut self) -> Poll {
        self.join();
        Poll::Lost
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Receive worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::Result;
    use crate::session::{PortOpener, Termination};
    use std::collections::VecDeque;
    use std::io;

    struct ChunkedPort(VecDeque<Vec<u8>>);

    impl Read for ChunkedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Err(io::ErrorKind::TimedOut.into()),
            }
        }
    }

    impl Write for ChunkedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Chunks(Vec<Vec<u8>>);

    impl PortOpener for Chunks {
        type Port = ChunkedPort;

        fn open(&self, _config: &SessionConfig) -> Result<ChunkedPort> {
            Ok(ChunkedPort(self.0.clone().into()))
        }
    }

    fn open(chunks: Vec<Vec<u8>>) -> SerialSession<ChunkedPort> {
        let config = SessionConfig {
            port: "loop".into(),
            baud_rate: 115200,
            timeout_ms: 50,
        };
        SerialSession::open(&Chunks(chunks), config).unwrap()
    }

    fn drain(mut channel: ProgressChannel) -> (Vec<(usize, Vec<u8>)>, ReceiveBuffer) {
        let mut progress = Vec::new();
        loop {
            match channel.next() {
                Poll::Event(SessionEvent::Progress { received_count, chunk }) => {
                    progress.push((received_count, chunk))
                }
                Poll::Event(SessionEvent::Completed(buffer)) => return (progress, buffer),
                Poll::Pending => continue,
                Poll::Lost => panic!("worker lost"),
            }
        }
    }

    #[test]
    fn progress_arrives_before_completion() {
        let channel = spawn_receiver(open(vec![vec![1, 2, 3], vec![4, 5, 6, 7, 8, 9]]));
        let (progress, buffer) = drain(channel);
        assert_eq!(
            progress,
            vec![(3, vec![1, 2, 3]), (9, vec![4, 5, 6, 7, 8, 9])]
        );
        assert_eq!(buffer.bytes(), &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(buffer.termination(), Termination::TargetReached);
    }

    #[test]
    fn silence_still_completes() {
        let (progress, buffer) = drain(spawn_receiver(open(vec![])));
        assert_eq!(progress, vec![(0, vec![])]);
        assert_eq!(buffer.received_count(), 0);
    }

    #[test]
    fn channel_reports_lost_after_completion() {
        let mut channel = spawn_receiver(open(vec![]));
        let _ = drain_until_complete(&mut channel);
        assert!(matches!(channel.next(), Poll::Lost));
    }

    fn drain_until_complete(channel: &mut ProgressChannel) -> ReceiveBuffer {
        loop {
            if let Poll::Event(SessionEvent::Completed(buffer)) = channel.next() {
                return buffer;
            }
        }
    }
}

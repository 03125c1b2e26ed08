//! State of the interactive front-end.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use commtest::{
    format_value, Harness, LogEncoding, PortOpener, SendRequest, SystemPorts, TransactionSummary,
    Update,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Port,
    BaudRate,
    Timeout,
    Folder,
    FileName,
    SendData,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Port,
        Field::BaudRate,
        Field::Timeout,
        Field::Folder,
        Field::FileName,
        Field::SendData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Port => "Port",
            Field::BaudRate => "Baud rate",
            Field::Timeout => "Timeout (ms)",
            Field::Folder => "Log folder",
            Field::FileName => "Log file (.txt)",
            Field::SendData => "Send data (hex)",
        }
    }

    fn index(self) -> usize {
        Field::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    fn next(self) -> Field {
        Field::ALL[(self.index() + 1) % Field::ALL.len()]
    }

    fn prev(self) -> Field {
        Field::ALL[(self.index() + Field::ALL.len() - 1) % Field::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub is_error: bool,
}

pub struct App<O: PortOpener = SystemPorts> {
    pub request: SendRequest,
    pub focus: Field,
    pub send_line: String,
    pub receive_line: String,
    pub sent_count: usize,
    pub received_count: usize,
    pub value: Option<String>,
    pub status: Option<Status>,
    pub should_quit: bool,
    harness: Harness<O>,
}

impl App<SystemPorts> {
    pub fn new(request: SendRequest, encoding: LogEncoding) -> Self {
        Self::with_harness(request, Harness::new(encoding))
    }
}

impl<O: PortOpener> App<O> {
    pub fn with_harness(request: SendRequest, harness: Harness<O>) -> Self {
        Self {
            request,
            focus: Field::SendData,
            send_line: String::new(),
            receive_line: String::new(),
            sent_count: 0,
            received_count: 0,
            value: None,
            status: None,
            should_quit: false,
            harness,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.harness.is_busy()
    }

    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Port => &self.request.port,
            Field::BaudRate => &self.request.baud_rate,
            Field::Timeout => &self.request.timeout_ms,
            Field::Folder => &self.request.folder,
            Field::FileName => &self.request.filename,
            Field::SendData => &self.request.hex_frame,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Port => &mut self.request.port,
            Field::BaudRate => &mut self.request.baud_rate,
            Field::Timeout => &mut self.request.timeout_ms,
            Field::Folder => &mut self.request.folder,
            Field::FileName => &mut self.request.filename,
            Field::SendData => &mut self.request.hex_frame,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') | KeyCode::Char('q') = key.code {
                self.quit();
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.quit(),
            KeyCode::Enter => self.send(),
            KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
            KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
            KeyCode::Backspace => {
                self.field_mut(self.focus).pop();
            }
            KeyCode::Char(c) => self.field_mut(self.focus).push(c),
            _ => {}
        }
    }

    /// Starts a transaction with the current field values.
    pub fn send(&mut self) {
        match self.harness.send(&self.request) {
            Ok(report) => {
                self.sent_count = report.sent_count;
                self.received_count = 0;
                self.send_line = report.sent_hex;
                self.receive_line.clear();
                self.value = None;
                self.status = Some(Status {
                    message: format!("Waiting for reply, logging to {}", report.log_path.display()),
                    is_error: false,
                });
            }
            Err(e) => {
                self.status = Some(Status {
                    message: e.to_string(),
                    is_error: true,
                })
            }
        }
    }

    /// Applies every update the worker has produced so far.
    pub fn tick(&mut self) {
        while let Some(update) = self.harness.poll() {
            self.apply(update);
        }
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Progress {
                received_count,
                chunk_hex,
            } => {
                if !self.receive_line.is_empty() {
                    self.receive_line.push(' ');
                }
                self.receive_line.push_str(&chunk_hex);
                self.received_count = received_count;
            }
            Update::Finished(summary) => self.finish(summary),
            Update::Aborted => {
                self.status = Some(Status {
                    message: "receive worker stopped unexpectedly".to_string(),
                    is_error: true,
                })
            }
        }
    }

    fn finish(&mut self, summary: TransactionSummary) {
        self.received_count = summary.received_count();
        self.value = summary.value.map(format_value);
        self.status = Some(match &summary.log_error {
            Some(err) => Status {
                message: err.to_string(),
                is_error: true,
            },
            None => Status {
                message: format!(
                    "Done: {} sent, {} received ({:?})",
                    summary.sent_count, self.received_count, summary.termination
                ),
                is_error: false,
            },
        });
    }

    /// Lets a running transaction finish so its Receive record is written.
    fn quit(&mut self) {
        while let Some(update) = self.harness.wait() {
            self.apply(update);
        }
        self.should_quit = true;
    }
}

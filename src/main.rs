mod app;
mod ui;

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use commtest::{
    format_value, Harness, LogEncoding, PortOpener, SendRequest, Termination, TransmitReport,
    Update,
};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, backend::CrosstermBackend, Terminal};

use app::App;

/// Manual serial-link test harness: send a hex frame, log the reply.
#[derive(Debug, Parser)]
#[command(name = "commtest_cli", version, about)]
struct Cli {
    /// Serial port name, e.g. COM3 or /dev/ttyUSB0
    #[arg(long, default_value = "")]
    port: String,

    #[arg(long, default_value = "9600")]
    baud: String,

    /// Per-read timeout in milliseconds (50-1000)
    #[arg(long, default_value = "200")]
    timeout: String,

    /// Folder holding the traffic log
    #[arg(long, default_value = ".")]
    folder: String,

    /// Traffic log file name, without the .txt extension
    #[arg(long, default_value = "commtest")]
    file: String,

    /// Text encoding of the traffic log
    #[arg(long, value_enum, default_value_t = EncodingArg::Ansi)]
    encoding: EncodingArg,

    /// Write diagnostic logging to this file
    #[arg(long)]
    diag_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive terminal front-end (default)
    Tui,
    /// Run one transaction and print the result
    Send {
        /// Frame to send, e.g. "01 04 00 00 00 02"
        hex: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncodingArg {
    Ansi,
    Utf8,
    Utf16le,
}

impl From<EncodingArg> for LogEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Ansi => LogEncoding::Ansi,
            EncodingArg::Utf8 => LogEncoding::Utf8,
            EncodingArg::Utf16le => LogEncoding::Utf16Le,
        }
    }
}

impl Cli {
    fn request(&self, hex_frame: &str) -> SendRequest {
        SendRequest {
            port: self.port.clone(),
            baud_rate: self.baud.clone(),
            timeout_ms: self.timeout.clone(),
            folder: self.folder.clone(),
            filename: self.file.clone(),
            hex_frame: hex_frame.to_string(),
        }
    }
}

// The main entry point for the command-line test harness.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Command::Send { hex }) => init_logging(cli.diag_log.as_deref(), false)
            .and_then(|_| run_send(&cli, hex)),
        Some(Command::Tui) | None => {
            init_logging(cli.diag_log.as_deref(), true).and_then(|_| run_tui(&cli).map(|_| true))
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("[ERROR] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// Diagnostics go to stderr for one-shot runs. The TUI owns the terminal,
// so there they are dropped unless a file was given.
fn init_logging(diag_log: Option<&Path>, interactive: bool) -> Result<()> {
    let default_level = if diag_log.is_some() { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    match diag_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open diagnostic log {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None if interactive => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }

    builder.init();
    Ok(())
}

// Runs a single transaction and prints it the way the TUI shows it.
fn run_send(cli: &Cli, hex: &str) -> Result<bool> {
    let mut harness = Harness::new(cli.encoding.into());

    let report = match harness.send(&cli.request(hex)) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return Ok(false);
        }
    };

    let ok = print_transaction(&mut harness, &report, io::stdout())?;
    Ok(ok)
}

// Stdout writer that remembers its first failure instead of bailing out.
struct Echo<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> Echo<W> {
    fn emit(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            self.error = Some(e);
        }
    }
}

// Echoes one transaction. The harness is always drained, even when `out`
// fails, so the Receive record gets written.
fn print_transaction<O: PortOpener, W: Write>(
    harness: &mut Harness<O>,
    report: &TransmitReport,
    out: W,
) -> io::Result<bool> {
    let mut echo = Echo { out, error: None };
    echo.emit(&format!(
        "Send ({}): {}\nReceive :",
        report.sent_count, report.sent_hex
    ));

    let mut ok = true;
    while let Some(update) = harness.wait() {
        match update {
            Update::Progress { chunk_hex, .. } => echo.emit(&format!(" {}", chunk_hex)),
            Update::Finished(summary) => {
                echo.emit(&format!("\nReceived {} bytes\n", summary.received_count()));
                if summary.termination == Termination::LinkError {
                    eprintln!("[WARNING] Serial link reported an error while receiving.");
                }
                match summary.value {
                    Some(value) => echo.emit(&format!("Value: {}\n", format_value(value))),
                    None => echo.emit("Value: -\n"),
                }
                if let Some(e) = summary.log_error {
                    eprintln!("[ERROR] {}", e);
                    ok = false;
                }
            }
            Update::Aborted => {
                echo.emit("\n");
                eprintln!("[ERROR] Receive worker stopped unexpectedly.");
                ok = false;
            }
        }
    }

    match echo.error {
        Some(e) => Err(e),
        None => Ok(ok),
    }
}

fn run_tui(cli: &Cli) -> Result<()> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::new(cli.request(""), cli.encoding.into());
    let result = event_loop(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commtest::{SessionConfig, SessionError};
    use std::collections::VecDeque;
    use std::io::Read;

    const REPLY: [u8; 9] = [0x01, 0x04, 0x04, 0x00, 0x20, 0x7C, 0x4E, 0x5A, 0xBA];

    struct ReplyPort(VecDeque<u8>);

    impl Read for ReplyPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::ErrorKind::TimedOut.into());
            }
            let n = buf.len().min(self.0.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.0.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    impl Write for ReplyPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Replying;

    impl PortOpener for Replying {
        type Port = ReplyPort;

        fn open(&self, _config: &SessionConfig) -> Result<ReplyPort, SessionError> {
            Ok(ReplyPort(REPLY.iter().copied().collect()))
        }
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    fn start(folder: &Path) -> (Harness<Replying>, TransmitReport) {
        let mut harness = Harness::with_opener(Replying, LogEncoding::Ansi);
        let request = SendRequest {
            port: "COM3".into(),
            baud_rate: "9600".into(),
            timeout_ms: "200".into(),
            folder: folder.to_str().unwrap().into(),
            filename: "cli".into(),
            hex_frame: "01 04 00 00 00 02".into(),
        };
        let report = harness.send(&request).unwrap();
        (harness, report)
    }

    #[test]
    fn prints_echo_and_value() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, report) = start(dir.path());
        let mut out = Vec::new();
        assert!(print_transaction(&mut harness, &report, &mut out).unwrap());

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Send (6): 01 04 00 00 00 02\n"));
        assert!(text.contains("Receive : 01 04 04 00 20 7C 4E 5A BA\n"));
        assert!(text.contains("Received 9 bytes\n"));
        assert!(text.ends_with("Value: 32.486\n"));
    }

    #[test]
    fn broken_stdout_still_finishes_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let (mut harness, report) = start(dir.path());

        let err = print_transaction(&mut harness, &report, ClosedPipe).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(!harness.is_busy());

        let log = std::fs::read_to_string(dir.path().join("cli.txt")).unwrap();
        assert!(log.contains(")_Receive(9): 01 04 04 00 20 7C 4E 5A BA\r\n\r\n"));
    }
}

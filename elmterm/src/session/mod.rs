//! The duplex terminal engine.
//!
//! Three threads share the work. The REPL thread owns the raw-mode
//! terminal and the history; the transport thread owns the adapter fd, the
//! framer and the analyzer, woken by readiness events; the printer thread
//! is the only stdout writer. The REPL publishes `(active, text, cursor)`
//! snapshots into a shared lock and everything user-visible flows through
//! the printer's queue.

mod printer;

use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsFd, AsRawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use parking_lot::{Mutex, RwLock};
use polling::{Event, Events, Poller};

use elmterm_input::{KeyDecoder, LineEditor, Outcome};
use elmterm_obd::analyzer::annotate_outgoing;
use elmterm_obd::{Analyzer, Annotation, LineFramer, Severity};

use crate::config::Settings;
use crate::error::Error;
use crate::history::History;
use crate::theme::Palette;
use crate::transport::Transport;

use printer::{OutputMsg, Printer, Style};

/// Key under which the transport fd is registered with the poller.
const TRANSPORT_KEY: usize = 0;
/// How often blocked threads wake up to observe the shutdown flag.
const TICK: Duration = Duration::from_millis(200);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// What the line editor looks like right now, for the printer.
#[derive(Default)]
pub struct EditorSnapshot {
    pub active: bool,
    pub text: String,
    pub cursor: usize,
}

/// State with concurrent owners.
pub struct Shared {
    pub editor: RwLock<EditorSnapshot>,
    /// Bytes accepted for transmission but not yet written.
    pending: Mutex<VecDeque<u8>>,
    /// The trimmed+uppercased last command, awaiting its local echo.
    echo: Mutex<Option<String>>,
    shutdown: AtomicBool,
    analyze: AtomicBool,
    /// Message of the transport failure that forced shutdown, if any.
    failed: Mutex<Option<String>>,
}

impl Shared {
    fn new(analyze: bool) -> Self {
        Self {
            editor: RwLock::new(EditorSnapshot::default()),
            pending: Mutex::new(VecDeque::new()),
            echo: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            analyze: AtomicBool::new(analyze),
            failed: Mutex::new(None),
        }
    }

    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || INTERRUPTED.load(Ordering::SeqCst)
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn publish_editor(&self, editor: &LineEditor) {
        let mut snapshot = self.editor.write();
        snapshot.text.clear();
        snapshot.text.push_str(editor.text());
        snapshot.cursor = editor.cursor();
    }
}

pub fn run(settings: Settings, transport: Transport) -> Result<(), Error> {
    install_signal_handlers()?;

    let shared = Arc::new(Shared::new(!settings.plain));
    let poller = Arc::new(Poller::new()?);
    let (tx, rx) = mpsc::channel();

    let printer = Printer::new(
        rx,
        shared.clone(),
        Palette::new(settings.theme),
        settings.prompt.clone(),
        settings.timestamps,
    );
    let printer_handle = thread::spawn(move || printer.run());

    let _ = tx.send(OutputMsg::Lines(vec![
        (
            Style::Status,
            format!("elmterm connected to {}", settings.target),
        ),
        (
            Style::Status,
            "Type :help for local commands, :quit to leave".into(),
        ),
    ]));

    let transport_handle = {
        let shared = shared.clone();
        let poller = poller.clone();
        let tx = tx.clone();
        let hexdump = settings.hexdump;
        thread::spawn(move || transport_loop(transport, &shared, &poller, &tx, hexdump))
    };

    let result = repl(&settings, &shared, &poller, &tx);

    shared.request_shutdown();
    let _ = poller.notify();
    let _ = transport_handle.join();

    let _ = tx.send(OutputMsg::Shutdown);
    let _ = printer_handle.join();

    if let Some(message) = shared.failed.lock().take() {
        return Err(Error::Transport(message));
    }
    result
}

fn install_signal_handlers() -> Result<(), nix::Error> {
    // No SA_RESTART: a pending SIGINT must interrupt the blocking reads.
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only touches an atomic.
    unsafe { signal::sigaction(Signal::SIGINT, &action)? };
    // A broken transport must surface as a write error, not kill us.
    // SAFETY: ignoring a signal installs no handler at all.
    unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigIgn)? };
    Ok(())
}

// ---------------------------------------------------------------------
// REPL thread
// ---------------------------------------------------------------------

/// Puts the controlling terminal into cbreak mode for the lifetime of the
/// value and restores the saved attributes on drop.
struct RawMode {
    saved: Termios,
}

impl RawMode {
    fn enable() -> Result<Self, nix::Error> {
        let stdin = io::stdin();
        let saved = termios::tcgetattr(&stdin)?;

        let mut raw = saved.clone();
        raw.local_flags.remove(
            LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG | LocalFlags::IEXTEN,
        );
        raw.input_flags.remove(InputFlags::ICRNL | InputFlags::IXON);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw)?;

        Ok(Self { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(&io::stdin(), SetArg::TCSANOW, &self.saved);
    }
}

enum Flow {
    Continue,
    Quit,
}

fn repl(
    settings: &Settings,
    shared: &Shared,
    poller: &Poller,
    tx: &Sender<OutputMsg>,
) -> Result<(), Error> {
    let stdin = io::stdin();
    let _raw = RawMode::enable().map_err(Error::Terminal)?;

    let mut decoder = KeyDecoder::new();
    let mut editor = LineEditor::new();
    let mut history = History::load(settings.history_path.clone(), settings.history_depth);

    shared.editor.write().active = true;
    let _ = tx.send(OutputMsg::Redraw);

    loop {
        if shared.shutting_down() {
            break;
        }

        let mut fds = [PollFd::new(stdin.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(TICK.as_millis() as u16)) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(nix::Error::EINTR) => continue,
            Err(e) => return Err(Error::Terminal(e)),
        }

        let mut byte = [0u8; 1];
        let n = match nix::unistd::read(stdin.as_raw_fd(), &mut byte) {
            Ok(n) => n,
            Err(nix::Error::EINTR) | Err(nix::Error::EAGAIN) => continue,
            Err(e) => return Err(Error::Terminal(e)),
        };
        if n == 0 {
            break;
        }

        let Some(key) = decoder.feed(byte[0]) else {
            continue;
        };

        match editor.handle(key, history.entries()) {
            Outcome::Unchanged => {}
            Outcome::Edited => {
                shared.publish_editor(&editor);
                let _ = tx.send(OutputMsg::Redraw);
            }
            Outcome::Cancelled => {
                shared.publish_editor(&editor);
                let _ = tx.send(OutputMsg::Redraw);
            }
            Outcome::Eof => break,
            Outcome::Committed(line) => {
                shared.publish_editor(&editor);
                match handle_line(&line, settings, shared, poller, tx, &mut history) {
                    Flow::Continue => {}
                    Flow::Quit => break,
                }
            }
        }
    }

    shared.editor.write().active = false;
    if let Err(e) = history.save() {
        warn!("could not save history: {e}");
    }
    Ok(())
}

fn handle_line(
    raw: &str,
    settings: &Settings,
    shared: &Shared,
    poller: &Poller,
    tx: &Sender<OutputMsg>,
    history: &mut History,
) -> Flow {
    // Scroll the committed line into the transcript before anything that
    // might print after it.
    let _ = tx.send(OutputMsg::Lines(vec![(
        Style::Input,
        format!("{}{raw}", settings.prompt),
    )]));

    let line = raw.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    let lower = line.to_lowercase();
    if lower == "quit" || lower == "exit" {
        return Flow::Quit;
    }
    if let Some(meta) = line.strip_prefix(':') {
        return handle_meta(meta, shared, tx, history);
    }

    history.push(line);
    if let Err(e) = history.save() {
        let _ = tx.send(OutputMsg::Lines(vec![(
            Style::Warning,
            format!("could not save history: {e}"),
        )]));
    }

    *shared.echo.lock() = Some(line.to_uppercase());

    if shared.analyze.load(Ordering::SeqCst) {
        if let Some(annotation) = annotate_outgoing(line) {
            let _ = tx.send(OutputMsg::Lines(annotation_lines(&annotation, true)));
        }
    }

    {
        let mut pending = shared.pending.lock();
        pending.extend(line.as_bytes());
        pending.extend(&settings.terminator);
    }
    let _ = poller.notify();

    Flow::Continue
}

fn handle_meta(
    meta: &str,
    shared: &Shared,
    tx: &Sender<OutputMsg>,
    history: &mut History,
) -> Flow {
    let mut parts = meta.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();

    match name.as_str() {
        "help" => {
            let _ = tx.send(OutputMsg::Lines(help_lines()));
        }
        "history" => {
            let count = match parts.next() {
                None => 20,
                Some(arg) => match arg.parse::<usize>() {
                    Ok(n) => n,
                    Err(_) => {
                        let _ = tx.send(OutputMsg::Lines(vec![(
                            Style::Error,
                            format!("usage: :history [n], got {arg:?}"),
                        )]));
                        return Flow::Continue;
                    }
                },
            };
            let start = history.tail_start_index(count);
            let lines = history
                .tail(count)
                .iter()
                .enumerate()
                .map(|(i, entry)| (Style::Detail, format!("{:>5}  {entry}", start + i)))
                .collect();
            let _ = tx.send(OutputMsg::Lines(lines));
        }
        "clear" => {
            let _ = tx.send(OutputMsg::ClearScreen);
        }
        "analyzer" => {
            let enabled = match parts.next().map(str::to_lowercase).as_deref() {
                Some("on") => true,
                Some("off") => false,
                None => !shared.analyze.load(Ordering::SeqCst),
                Some(other) => {
                    let _ = tx.send(OutputMsg::Lines(vec![(
                        Style::Error,
                        format!("usage: :analyzer [on|off], got {other:?}"),
                    )]));
                    return Flow::Continue;
                }
            };
            shared.analyze.store(enabled, Ordering::SeqCst);
            let state = if enabled { "enabled" } else { "disabled" };
            let _ = tx.send(OutputMsg::Lines(vec![(
                Style::Status,
                format!("Analyzer {state}"),
            )]));
        }
        "save" => {
            let message = match history.save() {
                Ok(()) => (Style::Status, "History saved".to_string()),
                Err(e) => (Style::Warning, format!("could not save history: {e}")),
            };
            let _ = tx.send(OutputMsg::Lines(vec![message]));
        }
        "quit" | "exit" => return Flow::Quit,
        _ => {
            let _ = tx.send(OutputMsg::Lines(vec![(
                Style::Error,
                format!("Unknown command :{name} (try :help)"),
            )]));
        }
    }

    Flow::Continue
}

fn help_lines() -> Vec<(Style, String)> {
    [
        ("  :help", "this list"),
        ("  :history [n]", "show the last n commands (default 20)"),
        ("  :clear", "clear the screen"),
        ("  :analyzer [on|off]", "toggle response analysis"),
        ("  :save", "write the history file now"),
        ("  :quit | :exit", "leave elmterm"),
    ]
    .iter()
    .map(|(cmd, what)| (Style::Detail, format!("{cmd:<22}{what}")))
    .collect()
}

// ---------------------------------------------------------------------
// Transport thread
// ---------------------------------------------------------------------

fn transport_loop(
    transport: Transport,
    shared: &Shared,
    poller: &Poller,
    tx: &Sender<OutputMsg>,
    hexdump: bool,
) {
    let mut framer = LineFramer::new();
    let mut analyzer = Analyzer::new();
    let mut events = Events::new();
    let mut buf = [0u8; 4096];

    // SAFETY: the fd stays alive until the matching delete below.
    if let Err(e) = unsafe { poller.add(&transport, Event::readable(TRANSPORT_KEY)) } {
        fail(shared, tx, format!("cannot watch transport: {e}"));
        return;
    }

    'outer: while !shared.shutting_down() {
        // polling is oneshot: re-arm with the interest we currently have.
        let interest = if shared.pending.lock().is_empty() {
            Event::readable(TRANSPORT_KEY)
        } else {
            Event::all(TRANSPORT_KEY)
        };
        if let Err(e) = poller.modify(&transport, interest) {
            fail(shared, tx, format!("cannot watch transport: {e}"));
            break;
        }

        events.clear();
        match poller.wait(&mut events, Some(TICK)) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                fail(shared, tx, format!("poll failed: {e}"));
                break;
            }
        }

        if shared.shutting_down() {
            break;
        }

        // Writes first so a queued command is not starved by a chatty bus.
        if let Err(e) = drain_writes(&transport, shared) {
            fail(shared, tx, format!("write failed: {e}"));
            break;
        }

        loop {
            match transport.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(OutputMsg::Lines(vec![(
                        Style::Status,
                        "Connection closed by the adapter".into(),
                    )]));
                    shared.request_shutdown();
                    break 'outer;
                }
                Ok(n) => {
                    for line in framer.feed(&buf[..n]) {
                        incoming_line(&line, shared, tx, &mut analyzer, hexdump);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    fail(shared, tx, format!("read failed: {e}"));
                    break 'outer;
                }
            }
        }
    }

    // Graceful stop: flush whatever is still queued, best-effort. A dead
    // transport just fails the write again, which no longer matters.
    let _ = drain_writes(&transport, shared);
    let _ = poller.delete(&transport);
}

/// Drain the pending-write queue with non-blocking writes. `WouldBlock`
/// (and a zero-length write) suspend draining until the next
/// writable-readiness event; real errors are returned.
fn drain_writes(transport: &Transport, shared: &Shared) -> io::Result<()> {
    let mut pending = shared.pending.lock();
    while !pending.is_empty() {
        let (head, _) = pending.as_slices();
        match transport.write(head) {
            Ok(0) => break,
            Ok(n) => {
                debug!("wrote {n} bytes");
                pending.drain(..n);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn incoming_line(
    line: &[u8],
    shared: &Shared,
    tx: &Sender<OutputMsg>,
    analyzer: &mut Analyzer,
    hexdump: bool,
) {
    let text = String::from_utf8_lossy(line).into_owned();

    // First-match echo suppression: the adapter echoes a sent command at
    // most once, before any substantive response.
    {
        let mut echo = shared.echo.lock();
        if echo.as_deref() == Some(text.trim().to_uppercase().as_str()) {
            debug!("suppressed local echo: {}", text.trim());
            *echo = None;
            return;
        }
    }

    let mut lines = vec![(Style::Incoming, text.clone())];

    if hexdump {
        lines.extend(
            hexdump_lines(line)
                .into_iter()
                .map(|l| (Style::Detail, l)),
        );
    }

    if shared.analyze.load(Ordering::SeqCst) {
        if let Some(annotation) = analyzer.annotate_incoming(&text) {
            lines.extend(annotation_lines(&annotation, false));
        }
    }

    let _ = tx.send(OutputMsg::Lines(lines));
}

fn fail(shared: &Shared, tx: &Sender<OutputMsg>, message: String) {
    let _ = tx.send(OutputMsg::Lines(vec![(
        Style::Error,
        format!("transport error: {message}"),
    )]));
    *shared.failed.lock() = Some(message);
    shared.request_shutdown();
}

fn annotation_lines(annotation: &Annotation, outgoing: bool) -> Vec<(Style, String)> {
    let headline_style = match annotation.severity {
        Severity::Warning => Style::Warning,
        Severity::Info if outgoing => Style::Outgoing,
        Severity::Info => Style::Headline,
    };

    let mut lines = vec![(headline_style, format!("* {}", annotation.headline))];
    lines.extend(
        annotation
            .details
            .iter()
            .map(|d| (Style::Detail, format!("    {d}"))),
    );
    lines
}

fn hexdump_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            format!(
                "  {:04X}  {:<47}  |{}|",
                row * 16,
                hex.join(" "),
                elmterm_obd::hex::ascii(chunk)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hexdump_rows() {
        let lines = hexdump_lines(b"7E8 41 0C 1A F8 then some more bytes!");
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  0000  37 45 38 20 34 31"));
        assert!(lines[0].ends_with("|7E8 41 0C 1A F8 |"));
        assert!(lines[1].starts_with("  0010"));
    }

    #[test]
    fn annotation_rendering() {
        let mut analyzer = Analyzer::new();
        let annotation = analyzer.annotate_incoming("7E8 7F 10 12").unwrap();
        let lines = annotation_lines(&annotation, false);
        assert_eq!(lines[0].0, Style::Warning);
        assert!(lines[0].1.starts_with("* Negative Response"));
        assert!(lines[1].1.starts_with("    "));
    }

    #[test]
    fn help_covers_every_meta_command() {
        let help: String = help_lines().into_iter().map(|(_, l)| l).collect();
        for cmd in [":help", ":history", ":clear", ":analyzer", ":save", ":quit"] {
            assert!(help.contains(cmd), "missing {cmd}");
        }
    }
}

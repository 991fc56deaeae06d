//! The single stdout writer.
//!
//! Annotations, incoming lines and status text from any thread are funneled
//! through one queue so they never interleave mid-line with each other or
//! with the prompt. Before printing anything the current line is erased;
//! afterwards the prompt and the line under composition are painted back
//! and the cursor restored.

use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use chrono::SecondsFormat;

use super::Shared;
use crate::theme::Palette;

/// Output role; the palette maps each role to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// The echoed committed command, prompt included.
    Input,
    Outgoing,
    Incoming,
    Headline,
    Detail,
    Warning,
    Error,
    Status,
}

pub enum OutputMsg {
    Lines(Vec<(Style, String)>),
    ClearScreen,
    Redraw,
    Shutdown,
}

pub struct Printer {
    rx: Receiver<OutputMsg>,
    shared: Arc<Shared>,
    palette: Palette,
    prompt: String,
    timestamps: bool,
}

impl Printer {
    pub fn new(
        rx: Receiver<OutputMsg>,
        shared: Arc<Shared>,
        palette: Palette,
        prompt: String,
        timestamps: bool,
    ) -> Self {
        Self {
            rx,
            shared,
            palette,
            prompt,
            timestamps,
        }
    }

    pub fn run(self) {
        while let Ok(msg) = self.rx.recv() {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            match msg {
                OutputMsg::Lines(lines) => {
                    let _ = self.print_lines(&mut out, &lines);
                }
                OutputMsg::ClearScreen => {
                    let _ = write!(out, "\x1b[2J\x1b[H");
                    let _ = self.paint_prompt(&mut out);
                }
                OutputMsg::Redraw => {
                    let _ = write!(out, "\r\x1b[K");
                    let _ = self.paint_prompt(&mut out);
                }
                OutputMsg::Shutdown => {
                    let _ = write!(out, "\r\x1b[K");
                    let _ = out.flush();
                    break;
                }
            }
            let _ = out.flush();
        }
    }

    fn print_lines(&self, out: &mut impl Write, lines: &[(Style, String)]) -> io::Result<()> {
        write!(out, "\r\x1b[K")?;
        for (style, text) in lines {
            if self.timestamps {
                let stamp = chrono::Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
                write!(
                    out,
                    "{}{stamp}{} ",
                    self.palette.timestamp, self.palette.reset
                )?;
            }
            write!(
                out,
                "{}{text}{}\r\n",
                self.color(*style),
                self.palette.reset
            )?;
        }
        self.paint_prompt(out)
    }

    /// Repaint `<prompt><buffer>` and walk the cursor back to its column.
    /// A no-op when line editing is inactive.
    fn paint_prompt(&self, out: &mut impl Write) -> io::Result<()> {
        let editor = self.shared.editor.read();
        if !editor.active {
            return Ok(());
        }

        write!(
            out,
            "{}{}{}{}",
            self.palette.prompt, self.prompt, self.palette.reset, editor.text
        )?;
        let back = editor.text.len() - editor.cursor;
        if back > 0 {
            write!(out, "\x1b[{back}D")?;
        }
        Ok(())
    }

    fn color(&self, style: Style) -> &'static str {
        match style {
            Style::Input => self.palette.prompt,
            Style::Outgoing => self.palette.outgoing,
            Style::Incoming => self.palette.incoming,
            Style::Headline => self.palette.headline,
            Style::Detail => self.palette.detail,
            Style::Warning => self.palette.warning,
            Style::Error => self.palette.error,
            Style::Status => self.palette.status,
        }
    }
}

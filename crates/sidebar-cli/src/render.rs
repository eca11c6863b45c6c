use sidebar_agents::{EngineEvent, Severity};
use std::io::{self, Write};

/// Prints engine events to a terminal: replies on `out`, status lines on `err`.
pub struct TerminalView<O, E> {
    out: O,
    err: E,
    /// Turn id and text already printed for the reply in progress.
    streaming: Option<(String, String)>,
}

impl TerminalView<io::Stdout, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> TerminalView<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            streaming: None,
        }
    }

    pub fn show(&mut self, event: EngineEvent) -> io::Result<()> {
        match event {
            EngineEvent::UserTurn {
                context_title: Some(title),
                ..
            } => writeln!(self.err, "[page] {title}")?,
            EngineEvent::UserTurn { .. } => {}
            EngineEvent::AssistantUpdated { turn_id, text } => self.update(turn_id, &text)?,
            EngineEvent::AssistantCompleted { turn_id, text } => self.complete(&turn_id, &text)?,
            EngineEvent::Status { message, severity } => {
                writeln!(self.err, "{} {message}", severity_tag(severity))?
            }
            EngineEvent::Error { message } => writeln!(self.err, "{message}")?,
        }
        self.out.flush()?;
        self.err.flush()
    }

    fn update(&mut self, turn_id: String, snapshot: &str) -> io::Result<()> {
        if let Some((id, printed)) = &mut self.streaming
            && *id == turn_id
        {
            match new_suffix(printed, snapshot) {
                Some(suffix) => write!(self.out, "{suffix}")?,
                None => write!(self.out, "\n{snapshot}")?,
            }
            *printed = snapshot.to_string();
            return Ok(());
        }

        // A previous reply never completed; start on a fresh line.
        if self.streaming.is_some() {
            writeln!(self.out)?;
        }
        write!(self.out, "{snapshot}")?;
        self.streaming = Some((turn_id, snapshot.to_string()));
        Ok(())
    }

    fn complete(&mut self, turn_id: &str, text: &str) -> io::Result<()> {
        match self.streaming.take() {
            Some((id, printed)) if id == turn_id => match new_suffix(&printed, text) {
                Some(suffix) => writeln!(self.out, "{suffix}"),
                None if printed.trim_end() == text => writeln!(self.out),
                None => writeln!(self.out, "\n{text}"),
            },
            _ => writeln!(self.out, "{text}"),
        }
    }

    /// End a reply whose turn failed after partial output.
    pub fn abandon_stream(&mut self) -> io::Result<()> {
        if self.streaming.take().is_some() {
            writeln!(self.out)?;
        }
        Ok(())
    }
}

/// The part of `snapshot` not yet printed, when it extends `printed`.
fn new_suffix<'a>(printed: &str, snapshot: &'a str) -> Option<&'a str> {
    snapshot.strip_prefix(printed)
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[info]",
        Severity::Success => "[ready]",
        Severity::Warning => "[warn]",
        Severity::Error => "[error]",
    }
}

//! Level-gated terminal output.
//!
//! One line per event, prefixed with a bracketed level tag. Colour is used
//! only when stdout is a terminal. A capture sink records lines in memory so
//! tests can assert on what a resolver reported.

use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Minimum level that is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum LogLevel {
    /// Everything
    Debug,
    /// Progress and results
    Info,
    /// Recoverable problems
    Warn,
    /// Failures
    Error,
    /// Only run-terminating failures
    Fatal,
}

/// Tag attached to each emitted line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `[DEBUG]`
    Debug,
    /// `[INFO]`
    Info,
    /// `[WARN]`
    Warn,
    /// `[ERROR]`
    Error,
    /// `[SUCCESS]`
    Success,
}

impl Tag {
    fn label(&self) -> &'static str {
        match self {
            Tag::Debug => "[DEBUG]",
            Tag::Info => "[INFO]",
            Tag::Warn => "[WARN]",
            Tag::Error => "[ERROR]",
            Tag::Success => "[SUCCESS]",
        }
    }

    fn threshold(&self) -> LogLevel {
        match self {
            Tag::Debug => LogLevel::Debug,
            Tag::Info | Tag::Success => LogLevel::Info,
            Tag::Warn => LogLevel::Warn,
            Tag::Error => LogLevel::Error,
        }
    }

    fn color(&self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            Tag::Debug => spec.set_fg(Some(Color::Blue)),
            Tag::Info => spec.set_fg(Some(Color::Cyan)),
            Tag::Warn => spec.set_fg(Some(Color::Yellow)).set_bold(true),
            Tag::Error => spec.set_fg(Some(Color::Red)).set_bold(true),
            Tag::Success => spec.set_fg(Some(Color::Green)).set_bold(true),
        };
        spec
    }
}

/// A captured line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Level tag
    pub tag: Tag,
    /// Message text
    pub message: String,
}

#[derive(Debug, Clone)]
enum Sink {
    Terminal(ColorChoice),
    Capture(Arc<Mutex<Vec<LogRecord>>>),
}

/// Output manager for consistent terminal output
#[derive(Debug, Clone)]
pub struct OutputManager {
    sink: Sink,
    level: LogLevel,
}

impl OutputManager {
    /// Create a terminal output manager
    pub fn new(level: LogLevel) -> Self {
        let color = if std::io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            sink: Sink::Terminal(color),
            level,
        }
    }

    /// Create an output manager that records lines instead of printing them
    pub fn capture(level: LogLevel) -> Self {
        Self {
            sink: Sink::Capture(Arc::new(Mutex::new(Vec::new()))),
            level,
        }
    }

    /// Lines recorded so far (empty for terminal output)
    pub fn records(&self) -> Vec<LogRecord> {
        match &self.sink {
            Sink::Capture(records) => records.lock().map(|r| r.clone()).unwrap_or_default(),
            Sink::Terminal(_) => Vec::new(),
        }
    }

    /// Whether any recorded line with `tag` contains `needle`
    pub fn contains(&self, tag: Tag, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.tag == tag && r.message.contains(needle))
    }

    /// Current minimum level
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Print a debug message
    pub fn debug(&self, message: &str) {
        self.emit(Tag::Debug, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        self.emit(Tag::Info, message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.emit(Tag::Warn, message);
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        self.emit(Tag::Error, message);
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.emit(Tag::Success, message);
    }

    /// Print an error regardless of level and terminate the process.
    ///
    /// Reserved for the binary entry point; library code returns errors.
    pub fn fatal(&self, message: &str, exit_code: i32) -> ! {
        self.write(Tag::Error, message);
        std::process::exit(exit_code)
    }

    fn emit(&self, tag: Tag, message: &str) {
        if tag.threshold() < self.level {
            return;
        }
        self.write(tag, message);
    }

    fn write(&self, tag: Tag, message: &str) {
        match &self.sink {
            Sink::Capture(records) => {
                if let Ok(mut records) = records.lock() {
                    records.push(LogRecord {
                        tag,
                        message: message.to_string(),
                    });
                }
            }
            Sink::Terminal(color) => {
                let bufwtr = if tag == Tag::Error {
                    BufferWriter::stderr(*color)
                } else {
                    BufferWriter::stdout(*color)
                };
                let mut buffer = bufwtr.buffer();
                let _ = buffer.set_color(&tag.color());
                let _ = write!(&mut buffer, "{}", tag.label());
                let _ = buffer.reset();
                let _ = writeln!(&mut buffer, " {}", message);
                if bufwtr.print(&buffer).is_err() {
                    println!("{} {}", tag.label(), message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_gating() {
        let output = OutputManager::capture(LogLevel::Warn);
        output.debug("hidden debug");
        output.info("hidden info");
        output.success("hidden success");
        output.warn("shown warn");
        output.error("shown error");

        let records = output.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tag, Tag::Warn);
        assert_eq!(records[1].tag, Tag::Error);
    }

    #[test]
    fn test_debug_level_shows_everything() {
        let output = OutputManager::capture(LogLevel::Debug);
        output.debug("d");
        output.success("s");
        assert!(output.contains(Tag::Debug, "d"));
        assert!(output.contains(Tag::Success, "s"));
    }

    #[test]
    fn test_clones_share_capture() {
        let output = OutputManager::capture(LogLevel::Info);
        let clone = output.clone();
        clone.info("from clone");
        assert!(output.contains(Tag::Info, "from clone"));
    }

    #[test]
    fn test_labels_are_bracketed() {
        for tag in [Tag::Debug, Tag::Info, Tag::Warn, Tag::Error, Tag::Success] {
            let label = tag.label();
            assert!(label.starts_with('[') && label.ends_with(']'));
        }
    }
}

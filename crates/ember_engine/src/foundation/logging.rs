//! Logging utilities and structured logging support
//!
//! The engine logs through the `log` facade with the emitting object's name as
//! the target. [`init`] installs a plain `env_logger`; [`init_with`] installs one
//! that mirrors the classic engine log layout:
//!
//! ```text
//! 14:02:51 | [INFO]    | [core_master_renderer] Master renderer created.
//! ```

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use env_logger::{Builder, Target};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub use log::{debug, error, info, trace, warn};

use crate::error::{EngineError, EngineResult};

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Log file, truncated when the logger starts
    pub file: Option<PathBuf>,
    /// Echo every line to stderr
    pub console: bool,
    /// Prefix lines with `HH:MM:SS`
    pub timestamps: bool,
    /// Let debug records through
    pub debug: bool,
    /// Print the `[target]` column
    pub show_names: bool,
    /// Written once at the top of the log file
    pub header: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            file: None,
            console: true,
            timestamps: true,
            debug: false,
            show_names: true,
            header: None,
        }
    }
}

impl LoggerConfig {
    /// Set the log file path
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Enable or disable debug records
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable console echo
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

/// Initialize the logging system with `RUST_LOG` driven defaults
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system from a [`LoggerConfig`]
///
/// Fails if the log file cannot be created or a logger is already installed.
pub fn init_with(config: &LoggerConfig) -> EngineResult<()> {
    let mut file = match &config.file {
        Some(path) => Some(File::create(path).map_err(|e| {
            EngineError::resource("logger", "logging::init_with", format!("Cannot open log file [{}]: {e}", path.display()))
        })?),
        None => None,
    };

    if let (Some(file), Some(header)) = (file.as_mut(), &config.header) {
        writeln!(file, "{header}").map_err(|e| {
            EngineError::resource("logger", "logging::init_with", format!("Cannot write log header: {e}"))
        })?;
    }

    let sink = LogSink { file, console: config.console };
    let timestamps = config.timestamps;
    let show_names = config.show_names;

    Builder::new()
        .filter_level(if config.debug { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_env("RUST_LOG")
        .target(Target::Pipe(Box::new(sink)))
        .format(move |buf, record| {
            let time = timestamps.then(|| clock_string(SystemTime::now()));
            let target = show_names.then(|| record.target());
            let text = format_record(time.as_deref(), record.level(), target, &record.args().to_string());
            buf.write_all(text.as_bytes())
        })
        .try_init()
        .map_err(|e| EngineError::usage("logger", "logging::init_with", e.to_string()))
}

/// Format one record, splitting multi-line messages so every line is prefixed
pub fn format_record(time: Option<&str>, level: log::Level, target: Option<&str>, message: &str) -> String {
    let mut prefix = String::new();
    if let Some(time) = time {
        prefix.push_str(time);
        prefix.push_str(" | ");
    }
    prefix.push_str(&format!("{:<9} | ", format!("[{level}]")));
    if let Some(target) = target {
        prefix.push_str(&format!("[{target}] "));
    }

    let mut out = String::new();
    for line in message.lines() {
        out.push_str(&prefix);
        out.push_str(line);
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str(prefix.trim_end());
        out.push('\n');
    }
    out
}

/// `HH:MM:SS` of the given instant in UTC
pub fn clock_string(now: SystemTime) -> String {
    let secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs()) % 86_400;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Writes formatted records to the log file and optionally stderr
struct LogSink {
    file: Option<File>,
    console: bool,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        if self.console {
            io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_record_layout() {
        let line = format_record(Some("01:02:03"), log::Level::Info, Some("camera"), "Camera created.");
        assert_eq!(line, "01:02:03 | [INFO]    | [camera] Camera created.\n");
    }

    #[test]
    fn test_format_record_splits_lines() {
        let text = format_record(None, log::Level::Warn, None, "first\nsecond");
        assert_eq!(text, "[WARN]    | first\n[WARN]    | second\n");
    }

    #[test]
    fn test_clock_string() {
        let t = UNIX_EPOCH + Duration::from_secs(86_400 * 3 + 3600 * 13 + 60 * 7 + 9);
        assert_eq!(clock_string(t), "13:07:09");
    }
}

use chrono::SecondsFormat;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::io::Stderr;
use std::io::Stdout;
use std::io::Write;
use std::io::stderr;
use std::io::stdout;
use std::sync::Arc;

use crate::utils::LogLevel;

#[derive(Clone)]
pub struct LoggerOptions {
  pub log_level: LogLevel,
  /// Whether stdout will be read by a program.
  pub is_stdout_machine_readable: bool,
}

/// Append-only diagnostics log.
///
/// Diagnostics go to stderr one entry at a time so that entries from concurrent
/// format requests never interleave within a line. Stdout is reserved for output
/// that another program reads.
#[derive(Clone)]
pub struct Logger {
  output_lock: Arc<Mutex<LoggerState>>,
  log_level: LogLevel,
  is_stdout_machine_readable: bool,
}

struct LoggerState {
  std_out: Stdout,
  std_err: Stderr,
}

impl Logger {
  pub fn new(options: &LoggerOptions) -> Self {
    Logger {
      output_lock: Arc::new(Mutex::new(LoggerState {
        std_out: stdout(),
        std_err: stderr(),
      })),
      log_level: options.log_level,
      is_stdout_machine_readable: options.is_stdout_machine_readable,
    }
  }

  #[inline]
  pub fn log_level(&self) -> LogLevel {
    self.log_level
  }

  /// Writes text meant for a human to stdout, unless stdout is machine readable.
  pub fn log(&self, text: &str) {
    if self.is_stdout_machine_readable {
      return;
    }
    self.log_machine_readable(text);
  }

  pub fn log_machine_readable(&self, text: &str) {
    let mut state = self.output_lock.lock();
    let _ = write!(state.std_out, "{}", with_trailing_newline(text));
    let _ = state.std_out.flush();
  }

  pub fn log_diagnostic(&self, level: LogLevel, text: &str) {
    if level == LogLevel::Silent || level > self.log_level {
      return;
    }
    let entry = format_diagnostic_entry(level, text);
    let mut state = self.output_lock.lock();
    let _ = write!(state.std_err, "{}", entry);
    let _ = state.std_err.flush();
  }
}

/// Formats a single diagnostics entry as `[timestamp] [LEVEL] message`.
pub fn format_diagnostic_entry(level: LogLevel, text: &str) -> String {
  let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
  with_trailing_newline(&format!("[{}] [{}] {}", timestamp, level.label(), text))
}

/// Renders structured data for the diagnostics log.
pub fn log_data(data: &impl Serialize) -> String {
  serde_json::to_string_pretty(data).unwrap_or_else(|err| format!("<unserializable: {}>", err))
}

fn with_trailing_newline(text: &str) -> String {
  if text.ends_with('\n') {
    text.to_string()
  } else {
    format!("{}\n", text)
  }
}

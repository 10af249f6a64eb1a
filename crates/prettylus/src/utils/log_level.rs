use std::fmt;
use std::str::FromStr;

use anyhow::bail;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
  Silent,
  Error,
  Warn,
  #[default]
  Info,
  Debug,
}

impl LogLevel {
  #[inline]
  pub fn is_error(&self) -> bool {
    *self >= LogLevel::Error
  }

  #[inline]
  pub fn is_warn(&self) -> bool {
    *self >= LogLevel::Warn
  }

  #[inline]
  pub fn is_info(&self) -> bool {
    *self >= LogLevel::Info
  }

  #[inline]
  pub fn is_debug(&self) -> bool {
    *self >= LogLevel::Debug
  }

  /// Label used in the diagnostics log.
  pub fn label(&self) -> &'static str {
    match self {
      LogLevel::Silent => "SILENT",
      LogLevel::Error => "ERROR",
      LogLevel::Warn => "WARN",
      LogLevel::Info => "INFO",
      LogLevel::Debug => "DEBUG",
    }
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for LogLevel {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s.to_lowercase().as_str() {
      "silent" => LogLevel::Silent,
      "error" => LogLevel::Error,
      "warn" => LogLevel::Warn,
      "info" => LogLevel::Info,
      "debug" => LogLevel::Debug,
      _ => bail!("Unknown log level '{}'. Expected one of: silent, error, warn, info, debug", s),
    })
  }
}

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::utils::LogLevel;

/// Every side effect the bridge performs goes through an environment so
/// that the whole pipeline can run against an in-memory file system in tests.
pub trait Environment: Clone + Send + Sync + 'static {
  fn read_file(&self, file_path: impl AsRef<Path>) -> std::io::Result<String>;
  fn write_file(&self, file_path: impl AsRef<Path>, file_text: &str) -> std::io::Result<()>;
  fn path_exists(&self, path: impl AsRef<Path>) -> bool;
  fn path_is_file(&self, path: impl AsRef<Path>) -> bool;
  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool;
  fn cwd(&self) -> PathBuf;
  fn env_var(&self, name: &str) -> Option<String>;
  fn log_level(&self) -> LogLevel;
  /// Text for a human reading stdout.
  fn log(&self, text: &str);
  /// Text read by another program.
  fn log_machine_readable(&self, text: &str);
  /// Appends an entry to the diagnostics log.
  fn log_diagnostic(&self, level: LogLevel, text: &str);
  fn stdout(&self) -> Box<dyn Write + Send>;
}

// use macros here so the expression provided is only evaluated when the level is enabled

macro_rules! log_error {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level().is_error() {
      $environment.log_diagnostic($crate::utils::LogLevel::Error, &format!($($arg)*));
    }
  }
}

macro_rules! log_warn {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level().is_warn() {
      $environment.log_diagnostic($crate::utils::LogLevel::Warn, &format!($($arg)*));
    }
  }
}

macro_rules! log_info {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level().is_info() {
      $environment.log_diagnostic($crate::utils::LogLevel::Info, &format!($($arg)*));
    }
  }
}

macro_rules! log_debug {
  ($environment:expr, $($arg:tt)*) => {
    if $environment.log_level().is_debug() {
      $environment.log_diagnostic($crate::utils::LogLevel::Debug, &format!($($arg)*));
    }
  }
}

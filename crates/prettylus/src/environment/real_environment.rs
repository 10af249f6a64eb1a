use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;

use super::Environment;
use crate::utils::LogLevel;
use crate::utils::Logger;
use crate::utils::LoggerOptions;

pub struct RealEnvironmentOptions {
  pub log_level: LogLevel,
  pub is_stdout_machine_readable: bool,
}

#[derive(Clone)]
pub struct RealEnvironment {
  logger: Logger,
  cwd: PathBuf,
}

impl RealEnvironment {
  pub fn new(options: RealEnvironmentOptions) -> Result<RealEnvironment> {
    let logger = Logger::new(&LoggerOptions {
      log_level: options.log_level,
      is_stdout_machine_readable: options.is_stdout_machine_readable,
    });
    let cwd = std::env::current_dir()?;
    let environment = RealEnvironment { logger, cwd };
    log_debug!(environment, "Current directory: {}", environment.cwd.display());
    Ok(environment)
  }
}

impl Environment for RealEnvironment {
  fn read_file(&self, file_path: impl AsRef<Path>) -> std::io::Result<String> {
    log_debug!(self, "Reading file: {}", file_path.as_ref().display());
    fs::read_to_string(file_path)
  }

  fn write_file(&self, file_path: impl AsRef<Path>, file_text: &str) -> std::io::Result<()> {
    log_debug!(self, "Writing file: {}", file_path.as_ref().display());
    fs::write(file_path, file_text)
  }

  fn path_exists(&self, path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
  }

  fn path_is_file(&self, path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
  }

  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool {
    path.as_ref().is_absolute()
  }

  fn cwd(&self) -> PathBuf {
    self.cwd.clone()
  }

  fn env_var(&self, name: &str) -> Option<String> {
    std::env::var(name).ok()
  }

  fn log_level(&self) -> LogLevel {
    self.logger.log_level()
  }

  fn log(&self, text: &str) {
    self.logger.log(text);
  }

  fn log_machine_readable(&self, text: &str) {
    self.logger.log_machine_readable(text);
  }

  fn log_diagnostic(&self, level: LogLevel, text: &str) {
    self.logger.log_diagnostic(level, text);
  }

  fn stdout(&self) -> Box<dyn Write + Send> {
    Box::new(std::io::stdout())
  }
}

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use super::Environment;
use crate::utils::LogLevel;

#[derive(Default)]
struct TestEnvironmentState {
  files: HashMap<PathBuf, String>,
  dirs: HashSet<PathBuf>,
  env_vars: HashMap<String, String>,
  cwd: PathBuf,
  logged_messages: Vec<String>,
  machine_output: Vec<String>,
  diagnostics: Vec<(LogLevel, String)>,
}

/// In-memory environment for tests.
#[derive(Clone)]
pub struct TestEnvironment {
  state: Arc<Mutex<TestEnvironmentState>>,
  log_level: Arc<Mutex<LogLevel>>,
}

impl Default for TestEnvironment {
  fn default() -> Self {
    Self::new()
  }
}

impl TestEnvironment {
  pub fn new() -> TestEnvironment {
    let environment = TestEnvironment {
      state: Default::default(),
      log_level: Arc::new(Mutex::new(LogLevel::Debug)),
    };
    environment.set_cwd("/");
    environment
  }

  pub fn set_cwd(&self, path: impl AsRef<Path>) {
    let path = path.as_ref().to_path_buf();
    self.mk_dir_all(&path);
    self.state.lock().cwd = path;
  }

  pub fn set_log_level(&self, log_level: LogLevel) {
    *self.log_level.lock() = log_level;
  }

  pub fn set_env_var(&self, name: &str, value: Option<&str>) {
    let mut state = self.state.lock();
    match value {
      Some(value) => state.env_vars.insert(name.to_string(), value.to_string()),
      None => state.env_vars.remove(name),
    };
  }

  pub fn mk_dir_all(&self, path: impl AsRef<Path>) {
    let mut state = self.state.lock();
    for ancestor in path.as_ref().ancestors() {
      state.dirs.insert(ancestor.to_path_buf());
    }
  }

  pub fn file_text(&self, path: impl AsRef<Path>) -> Option<String> {
    self.state.lock().files.get(path.as_ref()).cloned()
  }

  pub fn take_logged_messages(&self) -> Vec<String> {
    std::mem::take(&mut self.state.lock().logged_messages)
  }

  pub fn take_machine_output(&self) -> Vec<String> {
    std::mem::take(&mut self.state.lock().machine_output)
  }

  pub fn diagnostics(&self) -> Vec<(LogLevel, String)> {
    self.state.lock().diagnostics.clone()
  }

  /// Diagnostics at the given level.
  pub fn diagnostics_at(&self, level: LogLevel) -> Vec<String> {
    self
      .state
      .lock()
      .diagnostics
      .iter()
      .filter(|(entry_level, _)| *entry_level == level)
      .map(|(_, text)| text.clone())
      .collect()
  }

  pub fn has_diagnostic_containing(&self, level: LogLevel, text: &str) -> bool {
    self.diagnostics_at(level).iter().any(|entry| entry.contains(text))
  }
}

impl Environment for TestEnvironment {
  fn read_file(&self, file_path: impl AsRef<Path>) -> std::io::Result<String> {
    let state = self.state.lock();
    match state.files.get(file_path.as_ref()) {
      Some(text) => Ok(text.clone()),
      None => Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("Could not find file at path {}", file_path.as_ref().display()),
      )),
    }
  }

  fn write_file(&self, file_path: impl AsRef<Path>, file_text: &str) -> std::io::Result<()> {
    let file_path = file_path.as_ref().to_path_buf();
    if let Some(parent) = file_path.parent() {
      self.mk_dir_all(parent);
    }
    self.state.lock().files.insert(file_path, file_text.to_string());
    Ok(())
  }

  fn path_exists(&self, path: impl AsRef<Path>) -> bool {
    let state = self.state.lock();
    state.files.contains_key(path.as_ref()) || state.dirs.contains(path.as_ref())
  }

  fn path_is_file(&self, path: impl AsRef<Path>) -> bool {
    self.state.lock().files.contains_key(path.as_ref())
  }

  fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool {
    let text = path.as_ref().to_string_lossy();
    text.starts_with('/') || (text.len() > 2 && text[1..].starts_with(":\\"))
  }

  fn cwd(&self) -> PathBuf {
    self.state.lock().cwd.clone()
  }

  fn env_var(&self, name: &str) -> Option<String> {
    self.state.lock().env_vars.get(name).cloned()
  }

  fn log_level(&self) -> LogLevel {
    *self.log_level.lock()
  }

  fn log(&self, text: &str) {
    self.state.lock().logged_messages.push(text.to_string());
  }

  fn log_machine_readable(&self, text: &str) {
    self.state.lock().machine_output.push(text.to_string());
  }

  fn log_diagnostic(&self, level: LogLevel, text: &str) {
    if level <= self.log_level() {
      self.state.lock().diagnostics.push((level, text.to_string()));
    }
  }

  fn stdout(&self) -> Box<dyn Write + Send> {
    Box::new(TestStdOut { environment: self.clone() })
  }
}

struct TestStdOut {
  environment: TestEnvironment,
}

impl Write for TestStdOut {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.environment.log_machine_readable(&String::from_utf8_lossy(buf));
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

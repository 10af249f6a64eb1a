use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use anyhow::bail;
use async_trait::async_trait;
use thiserror::Error;

use crate::arg_parser::parse_args;
use crate::configuration::ConfigKeyMap;
use crate::environment::Environment;
use crate::environment::TestEnvironment;
use crate::modules::ModuleHost;
use crate::modules::PrimaryFormatOptions;
use crate::modules::PrimaryFormatter;
use crate::modules::ResolvedPackage;
use crate::modules::StyleFormatter;
use crate::plugins::PluginShape;
use crate::run_cli::AppError;
use crate::run_cli::run_cli;
use crate::utils::TestStdInReader;

#[derive(Debug, Error)]
#[error("{inner:#}")]
pub struct TestAppError {
  asserted_exit_code: RefCell<bool>,
  inner: AppError,
}

impl TestAppError {
  #[track_caller]
  pub fn assert_exit_code(&self, exit_code: i32) {
    self.asserted_exit_code.replace(true);
    assert_eq!(self.inner.exit_code, exit_code);
  }
}

impl From<AppError> for TestAppError {
  fn from(inner: AppError) -> Self {
    Self {
      asserted_exit_code: Default::default(),
      inner,
    }
  }
}

impl Drop for TestAppError {
  fn drop(&mut self) {
    if std::thread::panicking() || self.inner.exit_code <= 1 {
      return;
    }
    if !*self.asserted_exit_code.borrow() {
      panic!("Exit code must be asserted. Was: {}", self.inner.exit_code);
    }
  }
}

pub fn run_test_cli(args: Vec<&str>, environment: &TestEnvironment, host: &TestModuleHost) -> Result<(), TestAppError> {
  run_test_cli_with_stdin(args, environment, host, TestStdInReader::default())
}

pub fn run_test_cli_with_stdin(args: Vec<&str>, environment: &TestEnvironment, host: &TestModuleHost, stdin_reader: TestStdInReader) -> Result<(), TestAppError> {
  let mut args: Vec<String> = args.into_iter().map(String::from).collect();
  args.insert(0, String::from(""));
  let args = parse_args(args, stdin_reader).map_err(AppError::from)?;
  environment.set_log_level(args.log_level);

  let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
  runtime.block_on(async {
    run_cli(&args, environment, Rc::new(host.clone())).await?;
    Ok::<(), TestAppError>(())
  })
}

pub type PrimaryFormatFn = Rc<dyn Fn(&str, &PrimaryFormatOptions) -> Result<String>>;
pub type StyleFormatFn = Rc<dyn Fn(&str, &ConfigKeyMap) -> Result<String>>;

#[derive(Clone)]
pub struct TestPrimaryModule {
  pub config: Option<ConfigKeyMap>,
  pub format: PrimaryFormatFn,
}

impl TestPrimaryModule {
  pub fn new(format: impl Fn(&str, &PrimaryFormatOptions) -> Result<String> + 'static) -> Self {
    Self {
      config: None,
      format: Rc::new(format),
    }
  }

  /// A formatter that returns its input.
  pub fn identity() -> Self {
    Self::new(|text, _| Ok(text.to_string()))
  }

  pub fn with_config(mut self, config: serde_json::Value) -> Self {
    self.config = Some(serde_json::from_value(config).unwrap());
    self
  }
}

#[derive(Default)]
struct TestModuleHostState {
  primaries: HashMap<PathBuf, TestPrimaryModule>,
  styles: HashMap<PathBuf, StyleFormatFn>,
  plugins: HashMap<PathBuf, PluginShape>,
  load_errors: HashMap<PathBuf, String>,
  loaded_entries: Vec<PathBuf>,
  resolve_config_calls: Vec<(PathBuf, bool)>,
  primary_format_calls: Vec<PrimaryFormatOptions>,
  style_format_calls: Vec<(String, ConfigKeyMap)>,
}

/// Scripted in-memory stand-in for the Node.js module host.
///
/// Modules are registered by package directory and become resolvable through
/// the test environment's file system.
#[derive(Clone, Default)]
pub struct TestModuleHost {
  state: Rc<RefCell<TestModuleHostState>>,
}

impl TestModuleHost {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_primary(&self, environment: &TestEnvironment, package_dir: &str, module: TestPrimaryModule) {
    let entry_path = write_entry(environment, package_dir);
    self.state.borrow_mut().primaries.insert(entry_path, module);
  }

  pub fn add_style(&self, environment: &TestEnvironment, package_dir: &str, format: impl Fn(&str, &ConfigKeyMap) -> Result<String> + 'static) {
    let entry_path = write_entry(environment, package_dir);
    self.state.borrow_mut().styles.insert(entry_path, Rc::new(format));
  }

  pub fn add_plugin(&self, environment: &TestEnvironment, package_dir: &str, shape: PluginShape) {
    let entry_path = write_entry(environment, package_dir);
    self.state.borrow_mut().plugins.insert(entry_path, shape);
  }

  /// Registers a package that exists on disk but throws when loaded.
  pub fn add_broken(&self, environment: &TestEnvironment, package_dir: &str, message: &str) {
    let entry_path = write_entry(environment, package_dir);
    self.state.borrow_mut().load_errors.insert(entry_path, message.to_string());
  }

  pub fn loaded_entries(&self) -> Vec<PathBuf> {
    self.state.borrow().loaded_entries.clone()
  }

  pub fn resolve_config_calls(&self) -> Vec<(PathBuf, bool)> {
    self.state.borrow().resolve_config_calls.clone()
  }

  pub fn primary_format_calls(&self) -> Vec<PrimaryFormatOptions> {
    self.state.borrow().primary_format_calls.clone()
  }

  pub fn style_format_calls(&self) -> Vec<(String, ConfigKeyMap)> {
    self.state.borrow().style_format_calls.clone()
  }

  fn record_load(&self, package: &ResolvedPackage) -> Result<()> {
    let mut state = self.state.borrow_mut();
    state.loaded_entries.push(package.entry_path.clone());
    if let Some(message) = state.load_errors.get(&package.entry_path) {
      bail!("{}", message);
    }
    Ok(())
  }
}

fn write_entry(environment: &TestEnvironment, package_dir: &str) -> PathBuf {
  let entry_path = Path::new(package_dir).join("index.js");
  environment.write_file(&entry_path, "").unwrap();
  entry_path
}

pub struct TestPrimaryFormatter {
  module: TestPrimaryModule,
  state: Rc<RefCell<TestModuleHostState>>,
}

pub struct TestStyleFormatter {
  format: StyleFormatFn,
  state: Rc<RefCell<TestModuleHostState>>,
}

#[async_trait(?Send)]
impl ModuleHost for TestModuleHost {
  type Primary = TestPrimaryFormatter;
  type Style = TestStyleFormatter;

  async fn load_primary(&self, package: &ResolvedPackage) -> Result<TestPrimaryFormatter> {
    self.record_load(package)?;
    match self.state.borrow().primaries.get(&package.entry_path) {
      Some(module) => Ok(TestPrimaryFormatter {
        module: module.clone(),
        state: self.state.clone(),
      }),
      None => bail!("Module has no format function: {}", package.entry_path.display()),
    }
  }

  async fn load_style(&self, package: &ResolvedPackage) -> Result<TestStyleFormatter> {
    self.record_load(package)?;
    match self.state.borrow().styles.get(&package.entry_path) {
      Some(format) => Ok(TestStyleFormatter {
        format: format.clone(),
        state: self.state.clone(),
      }),
      None => bail!("Module has no format function: {}", package.entry_path.display()),
    }
  }

  async fn inspect_plugin(&self, package: &ResolvedPackage) -> Result<PluginShape> {
    self.record_load(package)?;
    Ok(self.state.borrow().plugins.get(&package.entry_path).cloned().unwrap_or_default())
  }
}

#[async_trait(?Send)]
impl PrimaryFormatter for TestPrimaryFormatter {
  async fn resolve_config(&self, file_path: &Path, use_cache: bool) -> Result<Option<ConfigKeyMap>> {
    self.state.borrow_mut().resolve_config_calls.push((file_path.to_path_buf(), use_cache));
    Ok(self.module.config.clone())
  }

  async fn format(&self, text: &str, options: &PrimaryFormatOptions) -> Result<String> {
    self.state.borrow_mut().primary_format_calls.push(options.clone());
    (self.module.format)(text, options)
  }
}

#[async_trait(?Send)]
impl StyleFormatter for TestStyleFormatter {
  async fn format(&self, text: &str, options: &ConfigKeyMap) -> Result<String> {
    self.state.borrow_mut().style_format_calls.push((text.to_string(), options.clone()));
    (self.format)(text, options)
  }
}

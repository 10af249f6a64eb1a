use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

use super::ResolvedPackage;
use crate::configuration::ConfigKeyMap;
use crate::plugins::MaterializedPlugin;
use crate::plugins::PluginShape;

/// An error thrown by an external formatter.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct FormatterInvocationError {
  pub message: String,
  #[serde(default)]
  pub stack: Option<String>,
  #[serde(default)]
  pub code: Option<String>,
}

impl FormatterInvocationError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      stack: None,
      code: None,
    }
  }
}

/// Prettier fails this way when a plugin it was handed by name cannot be
/// found from its internal placeholder module.
pub fn is_missing_plugin_placeholder(err: &anyhow::Error) -> bool {
  let message = match err.downcast_ref::<FormatterInvocationError>() {
    Some(err) => err.message.clone(),
    None => err.to_string(),
  };
  message.contains("Cannot find package") && message.contains("/noop.js")
}

/// Loads external formatter modules and plugins by their resolved entry path.
#[async_trait(?Send)]
pub trait ModuleHost {
  type Primary: PrimaryFormatter;
  type Style: StyleFormatter;

  async fn load_primary(&self, package: &ResolvedPackage) -> Result<Self::Primary>;
  async fn load_style(&self, package: &ResolvedPackage) -> Result<Self::Style>;
  /// Loads the plugin and reports what it exposes.
  async fn inspect_plugin(&self, package: &ResolvedPackage) -> Result<PluginShape>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryFormatOptions {
  /// Resolved configuration without its plugin list.
  pub config: ConfigKeyMap,
  pub plugins: Vec<MaterializedPlugin>,
  pub file_path: PathBuf,
}

impl PrimaryFormatOptions {
  pub fn without_plugins(&self) -> Self {
    Self {
      config: self.config.clone(),
      plugins: Vec::new(),
      file_path: self.file_path.clone(),
    }
  }
}

#[async_trait(?Send)]
pub trait PrimaryFormatter {
  /// Resolves the configuration that applies to the given file.
  async fn resolve_config(&self, file_path: &Path, use_cache: bool) -> Result<Option<ConfigKeyMap>>;
  async fn format(&self, text: &str, options: &PrimaryFormatOptions) -> Result<String>;
}

#[async_trait(?Send)]
pub trait StyleFormatter {
  async fn format(&self, text: &str, options: &ConfigKeyMap) -> Result<String>;
}

use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::configuration::ConfigKeyMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginCapability {
  #[serde(rename = "parsers")]
  Parser,
  #[serde(rename = "printers")]
  Printer,
  #[serde(rename = "languages")]
  LanguageDescriptor,
}

/// What a loaded plugin module exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginShape {
  #[serde(default)]
  pub capabilities: Vec<PluginCapability>,
  #[serde(default)]
  pub default_export: Option<Box<PluginShape>>,
}

impl PluginShape {
  pub fn is_usable(&self) -> bool {
    !self.capabilities.is_empty()
  }
}

/// Which export of a plugin package is the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginExport {
  Module,
  Default,
}

/// A plugin ready to hand to the primary formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MaterializedPlugin {
  /// A plugin package loaded from an absolute path.
  Package { name: String, entry_path: PathBuf, export: PluginExport },
  /// A plugin object that was already part of the resolved configuration.
  Inline { value: serde_json::Value },
}

impl MaterializedPlugin {
  pub fn describe(&self) -> String {
    match self {
      MaterializedPlugin::Package { name, export, .. } => match export {
        PluginExport::Module => format!("package {}", name),
        PluginExport::Default => format!("package {} (default export)", name),
      },
      MaterializedPlugin::Inline { .. } => "inline object".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PluginDescriptor {
  Named(String),
  Materialized(MaterializedPlugin),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to load plugin {name}: {reason}")]
pub struct PluginResolutionFailure {
  pub name: String,
  pub reason: String,
}

/// Removes the plugin list from a resolved primary config.
///
/// A single value is treated as a one element list. Values that are neither
/// names nor objects are ignored.
pub fn take_plugins(config: &mut ConfigKeyMap) -> Vec<PluginDescriptor> {
  let values = match config.shift_remove("plugins") {
    Some(serde_json::Value::Array(values)) => values,
    Some(value) => vec![value],
    None => return Vec::new(),
  };
  values
    .into_iter()
    .filter_map(|value| match value {
      serde_json::Value::String(name) => Some(PluginDescriptor::Named(name)),
      value @ serde_json::Value::Object(_) => Some(PluginDescriptor::Materialized(MaterializedPlugin::Inline { value })),
      _ => None,
    })
    .collect()
}

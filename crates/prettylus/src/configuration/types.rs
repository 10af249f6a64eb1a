use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Options passed to an external formatter, in declaration order.
pub type ConfigKeyMap = IndexMap<String, serde_json::Value>;

pub const DEFAULT_STYLE_CONFIG_FILE_NAME: &str = ".stylusrc";
pub const DEFAULT_PRIMARY_MODULE: &str = "prettier";
pub const DEFAULT_STYLE_MODULE: &str = "stylus-supremacy";
pub const DEFAULT_STYLE_LANGUAGE: &str = "stylus";

/// User-visible options of the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeOptions {
  /// Name of the style formatter's config file. `null` disables the search.
  pub style_config_file_name: Option<String>,
  /// Directory, absolute or relative to the project root, where the primary
  /// formatter and its plugins are installed.
  pub primary_base_directory: Option<String>,
  /// Explicit primary formatter config file, absolute or relative to the project root.
  pub primary_config_file: Option<String>,
  pub primary_module: String,
  pub style_module: String,
  /// Value of the `lang` attribute that marks an embedded style block.
  pub style_language: String,
}

impl Default for BridgeOptions {
  fn default() -> Self {
    Self {
      style_config_file_name: Some(DEFAULT_STYLE_CONFIG_FILE_NAME.to_string()),
      primary_base_directory: None,
      primary_config_file: None,
      primary_module: DEFAULT_PRIMARY_MODULE.to_string(),
      style_module: DEFAULT_STYLE_MODULE.to_string(),
      style_language: DEFAULT_STYLE_LANGUAGE.to_string(),
    }
  }
}

pub const KNOWN_BRIDGE_OPTION_KEYS: [&str; 6] = [
  "styleConfigFileName",
  "primaryBaseDirectory",
  "primaryConfigFile",
  "primaryModule",
  "styleModule",
  "styleLanguage",
];

/// Values provided on the command line that win over the config file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeOptionOverrides {
  pub style_config_file_name: Option<String>,
  pub primary_base_directory: Option<String>,
  pub primary_config_file: Option<String>,
}

impl BridgeOptions {
  pub fn apply_overrides(&mut self, overrides: &BridgeOptionOverrides) {
    if let Some(name) = &overrides.style_config_file_name {
      self.style_config_file_name = if name.is_empty() { None } else { Some(name.clone()) };
    }
    if let Some(dir) = &overrides.primary_base_directory {
      self.primary_base_directory = Some(dir.clone());
    }
    if let Some(file) = &overrides.primary_config_file {
      self.primary_config_file = Some(file.clone());
    }
  }
}

use anyhow::Context;
use anyhow::Result;
use std::path::Path;
use std::path::PathBuf;

use super::BridgeOptionOverrides;
use super::BridgeOptions;
use super::deserialize_bridge_options;
use crate::arg_parser::CliArgs;
use crate::environment::Environment;

pub static POSSIBLE_CONFIG_FILE_NAMES: [&str; 4] = ["prettylus.json", "prettylus.jsonc", ".prettylus.json", ".prettylus.jsonc"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBridgeConfig {
  /// Config file the options were read from, if any.
  pub file_path: Option<PathBuf>,
  /// Directory containing the config file.
  pub base_path: Option<PathBuf>,
  pub options: BridgeOptions,
}

pub struct BridgeConfigArgs<'a> {
  pub config: Option<&'a str>,
  pub overrides: &'a BridgeOptionOverrides,
}

/// Reads the bridge options from an explicit config file or the closest
/// `prettylus.json` in the start directory or its ancestors.
pub fn resolve_bridge_config(args: &BridgeConfigArgs, start_dir: &Path, environment: &impl Environment) -> Result<ResolvedBridgeConfig> {
  let config_file_path = match args.config {
    Some(config) => Some(resolve_cli_path(config, environment)),
    None => get_config_file_in_ancestor_directories(start_dir, environment),
  };

  let mut resolved = match config_file_path {
    Some(file_path) => {
      log_debug!(environment, "Reading configuration file: {}", file_path.display());
      let file_text = environment
        .read_file(&file_path)
        .with_context(|| format!("Error reading configuration file: {}", file_path.display()))?;
      let options =
        deserialize_bridge_options(&file_text, environment).with_context(|| format!("Error parsing configuration file: {}", file_path.display()))?;
      ResolvedBridgeConfig {
        base_path: file_path.parent().map(|p| p.to_path_buf()),
        file_path: Some(file_path),
        options,
      }
    }
    None => {
      log_debug!(environment, "No configuration file found. Using default options.");
      ResolvedBridgeConfig {
        file_path: None,
        base_path: None,
        options: BridgeOptions::default(),
      }
    }
  };

  resolved.options.apply_overrides(args.overrides);
  Ok(resolved)
}

/// Resolves the bridge options for the command line arguments, searching from the current directory.
pub fn resolve_config_from_args(args: &CliArgs, environment: &impl Environment) -> Result<ResolvedBridgeConfig> {
  let config_args = BridgeConfigArgs {
    config: args.config.as_deref(),
    overrides: &args.overrides,
  };
  resolve_bridge_config(&config_args, &environment.cwd(), environment)
}

/// The `--project-root` argument, else the directory of the configuration file, else the current directory.
pub fn resolve_project_root(args: &CliArgs, config: &ResolvedBridgeConfig, environment: &impl Environment) -> PathBuf {
  match (&args.project_root, &config.base_path) {
    (Some(project_root), _) => resolve_cli_path(project_root, environment),
    (None, Some(base_path)) => base_path.clone(),
    (None, None) => environment.cwd(),
  }
}

/// Makes a path given on the command line absolute.
pub fn resolve_cli_path(path: &str, environment: &impl Environment) -> PathBuf {
  let path = PathBuf::from(path);
  if environment.is_absolute_path(&path) {
    path
  } else {
    environment.cwd().join(path)
  }
}

fn get_config_file_in_ancestor_directories(start_dir: &Path, environment: &impl Environment) -> Option<PathBuf> {
  for ancestor_dir in start_dir.ancestors() {
    for file_name in &POSSIBLE_CONFIG_FILE_NAMES {
      let config_path = ancestor_dir.join(file_name);
      if environment.path_is_file(&config_path) {
        return Some(config_path);
      }
    }
  }
  None
}

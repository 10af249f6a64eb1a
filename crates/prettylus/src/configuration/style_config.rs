use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

use super::ConfigKeyMap;
use crate::environment::Environment;
use crate::format::IndentUnit;
use crate::format::LineEnding;
use crate::utils::UserWarnings;
use crate::utils::log_data;

#[derive(Debug, Error)]
#[error("Malformed JSON in config file: {}", file_path.display())]
pub struct ConfigParseError {
  pub file_path: PathBuf,
  pub message: String,
}

/// Where to look for the style formatter's config file.
#[derive(Debug, Clone, Copy)]
pub struct StyleConfigSearch<'a> {
  pub document_path: &'a Path,
  pub is_untitled: bool,
  pub project_root: Option<&'a Path>,
  pub config_file_name: Option<&'a str>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigSearchResult {
  /// `None` means the defaults should be used.
  pub file_path: Option<PathBuf>,
  pub contents: ConfigKeyMap,
}

/// Finds the style config file closest to the document, walking from the
/// document's directory up to the project root.
///
/// A config file that can't be parsed is reported to `warnings` and treated as
/// if it didn't exist.
pub fn locate_style_config(search: &StyleConfigSearch, environment: &impl Environment, warnings: &UserWarnings) -> ConfigSearchResult {
  let (Some(project_root), Some(config_file_name)) = (search.project_root, search.config_file_name) else {
    log_info!(environment, "No project root or style config file name provided, using default config");
    return ConfigSearchResult::default();
  };

  let Some(file_path) = find_style_config_file(search.document_path, search.is_untitled, project_root, config_file_name, environment) else {
    log_info!(environment, "No style config file found, using default config");
    return ConfigSearchResult::default();
  };

  log_info!(environment, "Found style config at: {}", file_path.display());
  match read_style_config(&file_path, environment) {
    Ok(contents) => {
      log_info!(environment, "Loaded style config: {}", log_data(&contents));
      ConfigSearchResult {
        file_path: Some(file_path),
        contents,
      }
    }
    Err(err) => {
      log_error!(environment, "Failed to parse style config {}: {}", err.file_path.display(), err.message);
      warnings.push(err.to_string());
      ConfigSearchResult::default()
    }
  }
}

fn find_style_config_file(
  document_path: &Path,
  is_untitled: bool,
  project_root: &Path,
  config_file_name: &str,
  environment: &impl Environment,
) -> Option<PathBuf> {
  let relative_path = match document_path.strip_prefix(project_root) {
    Ok(relative_path) if !is_untitled => relative_path,
    _ => {
      let file_path = project_root.join(config_file_name);
      return environment.path_exists(&file_path).then_some(file_path);
    }
  };

  let mut segments = relative_path
    .components()
    .filter_map(|component| match component {
      Component::Normal(segment) => Some(segment),
      _ => None,
    })
    .collect::<Vec<_>>();
  segments.pop(); // file name

  loop {
    let mut file_path = project_root.to_path_buf();
    file_path.extend(&segments);
    file_path.push(config_file_name);
    log_debug!(environment, "Checking for style config: {}", file_path.display());
    if environment.path_exists(&file_path) {
      return Some(file_path);
    }
    segments.pop()?;
  }
}

fn read_style_config(file_path: &Path, environment: &impl Environment) -> Result<ConfigKeyMap, ConfigParseError> {
  let parse_error = |message: String| ConfigParseError {
    file_path: file_path.to_path_buf(),
    message,
  };
  let file_text = environment.read_file(file_path).map_err(|err| parse_error(err.to_string()))?;
  match serde_json::from_str::<serde_json::Value>(&file_text).map_err(|err| parse_error(err.to_string()))? {
    serde_json::Value::Object(object) => Ok(object.into_iter().collect()),
    _ => Err(parse_error("Expected a JSON object".to_string())),
  }
}

/// Builds the style formatter options. The document's indentation and line
/// ending are the defaults; values from the located config file win.
pub fn create_style_options(config: &ConfigKeyMap, indent_unit: &IndentUnit, line_ending: LineEnding, environment: &impl Environment) -> ConfigKeyMap {
  let mut options = ConfigKeyMap::new();
  options.insert("tabStopChar".to_string(), indent_unit.as_text().into());
  options.insert("newLineChar".to_string(), line_ending.as_str().into());
  for (key, value) in config {
    options.insert(key.clone(), value.clone());
  }
  log_debug!(environment, "Created style formatting options: {}", log_data(&options));
  options
}

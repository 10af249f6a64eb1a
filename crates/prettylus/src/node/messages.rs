use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

use crate::configuration::ConfigKeyMap;
use crate::modules::FormatterInvocationError;
use crate::plugins::MaterializedPlugin;

pub type ModuleHandle = u32;

/// A request sent to the bridge process as one line of JSON.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BridgeRequest<'a> {
  /// Loads a module and returns a handle to it.
  Load { entry_path: &'a Path },
  /// Loads a plugin module and describes what it exposes.
  InspectPlugin { entry_path: &'a Path },
  ResolveConfig {
    handle: ModuleHandle,
    file_path: &'a Path,
    use_cache: bool,
  },
  Format {
    handle: ModuleHandle,
    text: &'a str,
    options: &'a ConfigKeyMap,
    plugins: &'a [MaterializedPlugin],
    file_path: &'a Path,
  },
  FormatStyle {
    handle: ModuleHandle,
    text: &'a str,
    options: &'a ConfigKeyMap,
  },
}

#[derive(Debug, Serialize)]
pub struct BridgeMessage<'a> {
  pub id: u32,
  #[serde(flatten)]
  pub request: &'a BridgeRequest<'a>,
}

#[derive(Debug, Deserialize)]
pub struct BridgeResponse {
  pub id: u32,
  pub ok: bool,
  #[serde(default)]
  pub result: serde_json::Value,
  #[serde(default)]
  pub error: Option<FormatterInvocationError>,
}

impl BridgeResponse {
  pub fn into_result(self) -> Result<serde_json::Value, FormatterInvocationError> {
    if self.ok {
      Ok(self.result)
    } else {
      Err(self.error.unwrap_or_else(|| FormatterInvocationError::new("The bridge process reported an error without details.")))
    }
  }
}

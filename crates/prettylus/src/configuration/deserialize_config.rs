use anyhow::Result;
use anyhow::bail;

use super::BridgeOptions;
use super::KNOWN_BRIDGE_OPTION_KEYS;
use crate::environment::Environment;

/// Parses the bridge's JSONC configuration file.
pub fn deserialize_bridge_options(config_file_text: &str, environment: &impl Environment) -> Result<BridgeOptions> {
  let value = match jsonc_parser::parse_to_serde_value(config_file_text, &Default::default()) {
    Ok(value) => value,
    Err(err) => bail!("{}", err),
  };

  let object = match value {
    Some(serde_json::Value::Object(object)) => object,
    Some(_) => bail!("Expected a root object in the json"),
    None => return Ok(BridgeOptions::default()),
  };

  for key in object.keys() {
    if !KNOWN_BRIDGE_OPTION_KEYS.contains(&key.as_str()) && key != "$schema" {
      log_warn!(environment, "Unknown property in configuration file: {}", key);
    }
  }

  Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

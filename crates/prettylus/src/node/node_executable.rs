use std::path::PathBuf;

use anyhow::Result;

use crate::environment::Environment;
use crate::utils::which_global;

pub const NODE_PATH_ENV_VAR_NAME: &str = "PRETTYLUS_NODE_PATH";

pub fn resolve_node_executable(environment: &impl Environment) -> Result<PathBuf> {
  if let Some(path) = environment.env_var(NODE_PATH_ENV_VAR_NAME) {
    return Ok(PathBuf::from(path));
  }
  which_global("node", environment).map_err(|err| {
    anyhow::anyhow!(
      concat!(
        "The 'node' executable is required to load the formatters. Please ensure it's ",
        "installed and available on the path. Alternatively, you may supply a {} ",
        "environment variable.\n\n{:#}"
      ),
      NODE_PATH_ENV_VAR_NAME,
      err,
    )
  })
}

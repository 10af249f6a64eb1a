use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::arg_parser::CliArgs;
use crate::configuration::BridgeOptions;
use crate::configuration::resolve_config_from_args;
use crate::configuration::resolve_project_root;
use crate::environment::Environment;

pub fn output_version(environment: &impl Environment) {
  environment.log(&format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
}

pub fn output_help(help_text: &str, environment: &impl Environment) {
  environment.log(help_text);
}

pub fn output_resolved_config(args: &CliArgs, environment: &impl Environment) -> Result<()> {
  #[derive(Serialize)]
  #[serde(rename_all = "camelCase")]
  struct ResolvedConfigOutput {
    config_file: Option<PathBuf>,
    project_root: PathBuf,
    options: BridgeOptions,
  }

  let config = resolve_config_from_args(args, environment)?;
  let output = ResolvedConfigOutput {
    project_root: resolve_project_root(args, &config, environment),
    config_file: config.file_path,
    options: config.options,
  };
  environment.log_machine_readable(&serde_json::to_string_pretty(&output)?);
  Ok(())
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;

  use crate::environment::Environment;
  use crate::environment::TestEnvironment;
  use crate::test_helpers::TestModuleHost;
  use crate::test_helpers::run_test_cli;

  #[test]
  fn outputs_resolved_config() {
    let environment = TestEnvironment::new();
    environment.set_cwd("/ws/src");
    environment
      .write_file("/ws/.prettylus.jsonc", r#"{ "primaryBaseDirectory": "tools" /* shared */ }"#)
      .unwrap();
    run_test_cli(
      vec!["output-resolved-config", "--style-config-file-name", ".stylus.json"],
      &environment,
      &TestModuleHost::new(),
    )
    .unwrap();
    assert_eq!(
      environment.take_machine_output(),
      vec![
        r#"{
  "configFile": "/ws/.prettylus.jsonc",
  "projectRoot": "/ws",
  "options": {
    "styleConfigFileName": ".stylus.json",
    "primaryBaseDirectory": "tools",
    "primaryConfigFile": null,
    "primaryModule": "prettier",
    "styleModule": "stylus-supremacy",
    "styleLanguage": "stylus"
  }
}"#
      ]
    );
  }

  #[test]
  fn outputs_version() {
    let environment = TestEnvironment::new();
    run_test_cli(vec!["--version"], &environment, &TestModuleHost::new()).unwrap();
    assert_eq!(environment.take_logged_messages(), vec![format!("prettylus {}", env!("CARGO_PKG_VERSION"))]);
  }

  #[test]
  fn malformed_config_is_an_error() {
    let environment = TestEnvironment::new();
    environment.write_file("/prettylus.json", "{ \"styleLanguage\": }").unwrap();
    let err = run_test_cli(vec!["output-resolved-config"], &environment, &TestModuleHost::new()).err().unwrap();
    assert!(err.to_string().starts_with("Error parsing configuration file: /prettylus.json"), "{}", err);
  }
}

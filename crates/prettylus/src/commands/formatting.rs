use anyhow::Result;
use anyhow::bail;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::arg_parser::CliArgs;
use crate::arg_parser::FmtSubCommand;
use crate::arg_parser::StdInFmtSubCommand;
use crate::configuration::resolve_cli_path;
use crate::configuration::resolve_config_from_args;
use crate::configuration::resolve_project_root;
use crate::environment::Environment;
use crate::format::FormatRequest;
use crate::format::FormatResult;
use crate::format::Formatter;
use crate::format::IndentUnit;
use crate::format::LineEnding;
use crate::format::NoEditReason;
use crate::modules::ModuleHost;

pub async fn format_files<TEnvironment: Environment>(args: &CliArgs, cmd: &FmtSubCommand, environment: &TEnvironment, host: &impl ModuleHost) -> Result<()> {
  let config = resolve_config_from_args(args, environment)?;
  let project_root = resolve_project_root(args, &config, environment);
  let formatter = Formatter::new(config.options, environment.clone());
  let token = CancellationToken::new();
  let mut formatted_files_count = 0;
  let mut error_count = 0;

  for file_path in &cmd.file_paths {
    let file_path = resolve_cli_path(file_path, environment);
    let file_text = match environment.read_file(&file_path) {
      Ok(file_text) => file_text,
      Err(err) => {
        log_error!(environment, "Error reading file {}: {:#}", file_path.display(), err);
        error_count += 1;
        continue;
      }
    };

    let request = create_format_request(args, file_text, file_path.clone(), Some(project_root.clone()));
    let response = formatter.format_document(host, &request, &token).await;
    for warning in &response.warnings {
      log_warn!(environment, "{}: {}", file_path.display(), warning);
    }
    match response.result {
      FormatResult::Replace(formatted_text) => match environment.write_file(&file_path, &formatted_text) {
        Ok(()) => formatted_files_count += 1,
        Err(err) => {
          log_error!(environment, "Error writing file {}: {:#}", file_path.display(), err);
          error_count += 1;
        }
      },
      FormatResult::NoEdit(NoEditReason::Failed) => error_count += 1,
      FormatResult::NoEdit(reason) => {
        log_info!(environment, "Unchanged ({:?}): {}", reason, file_path.display());
      }
    }
  }

  if formatted_files_count > 0 {
    let suffix = if formatted_files_count == 1 { "file" } else { "files" };
    environment.log(&format!("Formatted {} {}.", formatted_files_count, suffix));
  }

  if error_count > 0 {
    bail!("Had {0} error(s) formatting.", error_count);
  }
  Ok(())
}

/// Writes the formatted text, or the original text when there is no edit, to stdout.
pub async fn format_stdin<TEnvironment: Environment>(args: &CliArgs, cmd: &StdInFmtSubCommand, environment: &TEnvironment, host: &impl ModuleHost) -> Result<()> {
  let config = resolve_config_from_args(args, environment)?;
  let project_root = resolve_project_root(args, &config, environment);
  let formatter = Formatter::new(config.options, environment.clone());
  let file_path = resolve_cli_path(&cmd.file_path, environment);
  let request = create_format_request(args, cmd.file_text.clone(), file_path, Some(project_root));
  let token = CancellationToken::new();

  let response = match &cmd.range {
    Some(range) => formatter.format_range(host, &request, range.clone(), &token).await,
    None => formatter.format_document(host, &request, &token).await,
  };

  let (text, failed) = match &response.result {
    FormatResult::Replace(formatted_text) => (formatted_text.as_str(), false),
    FormatResult::NoEdit(reason) => (cmd.file_text.as_str(), *reason == NoEditReason::Failed),
  };
  let mut stdout = environment.stdout();
  stdout.write_all(text.as_bytes())?;
  stdout.flush()?;

  if failed {
    bail!("{}", response.warnings.join("\n"));
  }
  for warning in &response.warnings {
    log_warn!(environment, "{}", warning);
  }
  Ok(())
}

fn create_format_request(args: &CliArgs, file_text: String, file_path: PathBuf, project_root: Option<PathBuf>) -> FormatRequest {
  FormatRequest {
    line_ending: LineEnding::detect(&file_text),
    indent_unit: IndentUnit::from_settings(args.use_tabs, args.indent_width),
    file_text,
    file_path,
    is_untitled: false,
    project_root,
  }
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;
  use serde_json::json;

  use crate::configuration::ConfigKeyMap;
  use crate::environment::Environment;
  use crate::environment::TestEnvironment;
  use crate::test_helpers::TestModuleHost;
  use crate::test_helpers::TestPrimaryModule;
  use crate::test_helpers::run_test_cli;
  use crate::test_helpers::run_test_cli_with_stdin;
  use crate::utils::LogLevel;
  use crate::utils::TestStdInReader;

  const UNFORMATTED: &str = "<template><div/></template>\n<style lang=\"stylus\">\n.a\n  color: red\n</style>\n";
  const FORMATTED: &str = "<template><div /></template>\n<style lang=\"stylus\">\n.a\n\tcolor red\n</style>\n";

  fn setup() -> (TestEnvironment, TestModuleHost) {
    let environment = TestEnvironment::new();
    environment.set_cwd("/ws");
    environment.write_file("/ws/prettylus.json", "{}").unwrap();
    let host = TestModuleHost::new();
    host.add_primary(
      &environment,
      "/ws/node_modules/prettier",
      TestPrimaryModule::new(|text, _| Ok(text.replace("<div/>", "<div />"))),
    );
    host.add_style(&environment, "/ws/node_modules/stylus-supremacy", |text, options| {
      let indent = options["tabStopChar"].as_str().unwrap();
      Ok(text.replace("  color: red", &format!("{}color red", indent)))
    });
    (environment, host)
  }

  #[test]
  fn formats_files_in_place() {
    let (environment, host) = setup();
    environment.write_file("/ws/src/App.vue", UNFORMATTED).unwrap();
    environment.write_file("/ws/src/Done.vue", FORMATTED).unwrap();
    run_test_cli(vec!["fmt", "--use-tabs", "src/App.vue", "/ws/src/Done.vue"], &environment, &host).unwrap();
    assert_eq!(environment.file_text("/ws/src/App.vue").unwrap(), FORMATTED);
    assert_eq!(environment.file_text("/ws/src/Done.vue").unwrap(), FORMATTED);
    assert_eq!(environment.take_logged_messages(), vec!["Formatted 1 file."]);
    assert!(environment.has_diagnostic_containing(LogLevel::Info, "Unchanged (Unchanged): /ws/src/Done.vue"));
  }

  #[test]
  fn formats_stdin_to_stdout() {
    let (environment, host) = setup();
    run_test_cli_with_stdin(
      vec!["fmt", "--use-tabs", "--stdin", "src/App.vue"],
      &environment,
      &host,
      TestStdInReader::from(UNFORMATTED),
    )
    .unwrap();
    assert_eq!(environment.take_machine_output(), vec![FORMATTED]);
    assert_eq!(host.style_format_calls()[0].1, serde_json::from_value::<ConfigKeyMap>(json!({ "tabStopChar": "\t", "newLineChar": "\n" })).unwrap());
  }

  #[test]
  fn stdin_range_formats_whole_document() {
    let (environment, host) = setup();
    run_test_cli_with_stdin(
      vec!["fmt", "--use-tabs", "--stdin", "/ws/src/App.vue", "--range", "0..5"],
      &environment,
      &host,
      TestStdInReader::from(UNFORMATTED),
    )
    .unwrap();
    assert_eq!(environment.take_machine_output(), vec![FORMATTED]);
  }

  #[test]
  fn stdin_outputs_original_text_when_failing() {
    let (environment, host) = setup();
    host.add_primary(
      &environment,
      "/ws/node_modules/prettier",
      TestPrimaryModule::new(|_, _| anyhow::bail!("SyntaxError: Unexpected closing tag")),
    );
    let err = run_test_cli_with_stdin(vec!["fmt", "--stdin", "src/App.vue"], &environment, &host, TestStdInReader::from(UNFORMATTED))
      .err()
      .unwrap();
    assert_eq!(err.to_string(), "SyntaxError: Unexpected closing tag");
    err.assert_exit_code(1);
    assert_eq!(environment.take_machine_output(), vec![UNFORMATTED]);
  }

  #[test]
  fn reports_files_that_fail() {
    let (environment, host) = setup();
    environment.write_file("/ws/src/App.vue", UNFORMATTED).unwrap();
    let err = run_test_cli(vec!["fmt", "src/App.vue", "src/Missing.vue"], &environment, &host).err().unwrap();
    assert_eq!(err.to_string(), "Had 1 error(s) formatting.");
    assert!(environment.has_diagnostic_containing(LogLevel::Error, "Error reading file /ws/src/Missing.vue"));
    assert!(environment.file_text("/ws/src/App.vue").unwrap().contains("<div />"));
  }

  #[test]
  fn uses_config_directory_as_project_root() {
    let (environment, host) = setup();
    environment.write_file("/ws/.stylusrc", r#"{ "quoteChar": "'" }"#).unwrap();
    environment.write_file("/ws/src/App.vue", UNFORMATTED).unwrap();
    environment.set_cwd("/ws/src");
    run_test_cli(vec!["fmt", "App.vue"], &environment, &host).unwrap();
    assert_eq!(
      host.style_format_calls()[0].1,
      serde_json::from_value::<ConfigKeyMap>(json!({ "tabStopChar": "  ", "newLineChar": "\n", "quoteChar": "'" })).unwrap()
    );
  }
}

use std::rc::Rc;

use thiserror::Error;
use tokio::io::BufReader;

use crate::arg_parser::CliArgs;
use crate::arg_parser::ParseArgsError;
use crate::arg_parser::SubCommand;
use crate::commands;
use crate::environment::Environment;
use crate::modules::ModuleHost;

#[derive(Debug, Error)]
#[error("{inner:#}")]
pub struct AppError {
  pub inner: anyhow::Error,
  pub exit_code: i32,
}

impl From<anyhow::Error> for AppError {
  fn from(inner: anyhow::Error) -> Self {
    AppError { inner, exit_code: 1 }
  }
}

impl From<ParseArgsError> for AppError {
  fn from(inner: ParseArgsError) -> Self {
    AppError {
      inner: inner.into(),
      exit_code: 2,
    }
  }
}

pub async fn run_cli<TEnvironment: Environment, THost: ModuleHost + 'static>(args: &CliArgs, environment: &TEnvironment, host: Rc<THost>) -> Result<(), AppError> {
  match &args.sub_command {
    SubCommand::Help(help_text) => {
      commands::output_help(help_text, environment);
      Ok(())
    }
    SubCommand::Version => {
      commands::output_version(environment);
      Ok(())
    }
    SubCommand::OutputResolvedConfig => Ok(commands::output_resolved_config(args, environment)?),
    SubCommand::Fmt(cmd) => Ok(commands::format_files(args, cmd, environment, &*host).await?),
    SubCommand::StdInFmt(cmd) => Ok(commands::format_stdin(args, cmd, environment, &*host).await?),
    SubCommand::EditorService => Ok(commands::run_editor_service(args, environment, host, BufReader::new(tokio::io::stdin())).await?),
  }
}

#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]

use prettylus::arg_parser::parse_args;
use prettylus::environment::RealEnvironment;
use prettylus::environment::RealEnvironmentOptions;
use prettylus::node::NodeModuleHost;
use prettylus::run_cli::AppError;
use prettylus::run_cli::run_cli;
use prettylus::utils::LogLevel;
use prettylus::utils::RealStdInReader;
use std::rc::Rc;

fn main() {
  let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
  rt.block_on(async move {
    match run().await {
      Ok(_) => {}
      Err((err, log_level)) => {
        if log_level != LogLevel::Silent {
          let result = format!("{:#}", err.inner);
          #[allow(clippy::print_stderr)]
          if !result.is_empty() {
            eprintln!("{}", result);
          }
        }
        std::process::exit(err.exit_code);
      }
    }
  });
}

async fn run() -> Result<(), (AppError, LogLevel)> {
  let args = parse_args(std::env::args().collect(), RealStdInReader).map_err(|err| (err.into(), LogLevel::Info))?;

  let environment = RealEnvironment::new(RealEnvironmentOptions {
    log_level: args.log_level,
    is_stdout_machine_readable: args.is_stdout_machine_readable(),
  })
  .map_err(|err| (err.into(), args.log_level))?;
  let host = Rc::new(NodeModuleHost::new(environment.clone()));

  run_cli(&args, &environment, host).await.map_err(|err| (err, args.log_level))
}

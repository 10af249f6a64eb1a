use anyhow::Result;
use anyhow::bail;
use std::ops::Range;
use thiserror::Error;

use crate::configuration::BridgeOptionOverrides;
use crate::utils::LogLevel;
use crate::utils::StdInReader;

pub const DEFAULT_INDENT_WIDTH: u8 = 2;

#[derive(Debug, PartialEq, Eq)]
pub struct CliArgs {
  pub sub_command: SubCommand,
  pub log_level: LogLevel,
  pub config: Option<String>,
  pub project_root: Option<String>,
  pub overrides: BridgeOptionOverrides,
  pub indent_width: u8,
  pub use_tabs: bool,
}

impl CliArgs {
  pub fn is_stdout_machine_readable(&self) -> bool {
    // these output text that's read by another program
    matches!(
      self.sub_command,
      SubCommand::StdInFmt(..) | SubCommand::EditorService | SubCommand::OutputResolvedConfig
    )
  }

  fn new_with_sub_command(sub_command: SubCommand) -> CliArgs {
    CliArgs {
      sub_command,
      log_level: LogLevel::default(),
      config: None,
      project_root: None,
      overrides: Default::default(),
      indent_width: DEFAULT_INDENT_WIDTH,
      use_tabs: false,
    }
  }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubCommand {
  Fmt(FmtSubCommand),
  StdInFmt(StdInFmtSubCommand),
  EditorService,
  OutputResolvedConfig,
  Version,
  Help(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct FmtSubCommand {
  pub file_paths: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct StdInFmtSubCommand {
  pub file_path: String,
  pub file_text: String,
  pub range: Option<Range<usize>>,
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ParseArgsError(#[from] anyhow::Error);

pub fn parse_args<TStdInReader: StdInReader>(args: Vec<String>, std_in_reader: TStdInReader) -> Result<CliArgs, ParseArgsError> {
  inner_parse_args(args, std_in_reader).map_err(ParseArgsError)
}

fn inner_parse_args<TStdInReader: StdInReader>(args: Vec<String>, std_in_reader: TStdInReader) -> Result<CliArgs> {
  if args.len() == 1 || (args.len() == 2 && (args[1] == "help" || args[1] == "--help")) {
    let mut cli_parser = create_cli_parser(CliArgParserKind::ForOutputtingMainHelp);
    cli_parser.try_get_matches_from_mut(vec![""])?;
    let help_text = format!("{}", cli_parser.render_help());
    return Ok(CliArgs::new_with_sub_command(SubCommand::Help(help_text)));
  } else if args.len() == 2 && (args[1] == "-v" || args[1] == "-V" || args[1] == "--version") {
    return Ok(CliArgs::new_with_sub_command(SubCommand::Version));
  }

  let cli_parser = create_cli_parser(CliArgParserKind::Default);
  let matches = cli_parser.try_get_matches_from(&args)?;

  let sub_command = match matches.subcommand() {
    Some(("fmt", matches)) => {
      if let Some(file_path) = matches.get_one::<String>("stdin").map(String::from) {
        SubCommand::StdInFmt(StdInFmtSubCommand {
          file_path,
          file_text: std_in_reader.read()?,
          range: match matches.get_one::<String>("range") {
            Some(text) => Some(parse_range(text)?),
            None => None,
          },
        })
      } else {
        let file_paths = values_to_vec(matches.get_many("files"));
        if file_paths.is_empty() {
          bail!("Provide the files to format or use --stdin <file-path>.");
        }
        SubCommand::Fmt(FmtSubCommand { file_paths })
      }
    }
    Some(("editor-service", _)) => SubCommand::EditorService,
    Some(("output-resolved-config", _)) => SubCommand::OutputResolvedConfig,
    Some(("version", _)) => SubCommand::Version,
    _ => unreachable!(),
  };

  let log_level = if matches.get_flag("verbose") {
    LogLevel::Debug
  } else {
    match matches.get_one::<String>("log-level") {
      Some(text) => text.parse()?,
      None => LogLevel::default(),
    }
  };

  Ok(CliArgs {
    sub_command,
    log_level,
    config: matches.get_one::<String>("config").map(String::from),
    project_root: matches.get_one::<String>("project-root").map(String::from),
    overrides: BridgeOptionOverrides {
      style_config_file_name: matches.get_one::<String>("style-config-file-name").map(String::from),
      primary_base_directory: matches.get_one::<String>("primary-base-dir").map(String::from),
      primary_config_file: matches.get_one::<String>("primary-config").map(String::from),
    },
    indent_width: matches.get_one::<u8>("indent-width").copied().unwrap_or(DEFAULT_INDENT_WIDTH),
    use_tabs: matches.get_flag("use-tabs"),
  })
}

/// Parses a byte range written as `<start>..<end>`.
fn parse_range(text: &str) -> Result<Range<usize>> {
  let Some((start, end)) = text.split_once("..") else {
    bail!("Expected a range in the format <start>..<end>, but found '{}'.", text);
  };
  let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) else {
    bail!("Expected a range in the format <start>..<end>, but found '{}'.", text);
  };
  if start > end {
    bail!("The range start ({}) must not be greater than its end ({}).", start, end);
  }
  Ok(start..end)
}

fn values_to_vec(values: Option<clap::parser::ValuesRef<String>>) -> Vec<String> {
  values.map(|x| x.map(std::string::ToString::to_string).collect()).unwrap_or_default()
}

#[derive(Default, PartialEq, Eq)]
pub enum CliArgParserKind {
  ForOutputtingMainHelp,
  #[default]
  Default,
}

pub fn create_cli_parser(kind: CliArgParserKind) -> clap::Command {
  use clap::Arg;
  use clap::Command;

  let mut app = Command::new("prettylus");

  // hack to get this to display the way I want
  app = if kind == CliArgParserKind::ForOutputtingMainHelp {
    app.disable_help_subcommand(true).disable_version_flag(true).disable_help_flag(true)
  } else {
    app.subcommand_required(true)
  };

  app = app
    .bin_name("prettylus")
    .version(env!("CARGO_PKG_VERSION"))
    .about("Formats Vue single-file components with Prettier and their Stylus blocks with stylus-supremacy.")
    .override_usage("prettylus <SUBCOMMAND> [OPTIONS] [--] [files]...")
    .help_template(r#"{bin} {version}

{about}

USAGE:
    {usage}

SUBCOMMANDS:
{subcommands}

OPTIONS:
{options}

ENVIRONMENT VARIABLES:
  PRETTYLUS_NODE_PATH  Node.js executable used to load the formatters.
                       Defaults to `node` on the PATH.{after-help}"#)
    .after_help(
            r#"EXAMPLES:
  Format files in place:

    prettylus fmt src/App.vue src/components/Button.vue

  Format stdin and write the result to stdout:

    prettylus fmt --stdin src/App.vue < src/App.vue

  Use Prettier installed in a sub directory of the project:

    prettylus fmt --primary-base-dir tools/formatting src/App.vue"#,
    )
    .subcommand(
      Command::new("fmt")
        .about("Formats the files and writes the result to the file system.")
        .arg(
          Arg::new("files")
            .help("Paths of the files to format.")
            .num_args(1..),
        )
        .arg(
          Arg::new("stdin")
            .long("stdin")
            .value_name("file-path")
            .help("Format stdin and output the result to stdout. The file path is used to find the configuration.")
            .required(false)
            .num_args(1)
        )
        .arg(
          Arg::new("range")
            .long("range")
            .value_name("start..end")
            .help("Byte range of stdin to format. The whole document is formatted.")
            .requires("stdin")
            .num_args(1)
        )
    )
    .subcommand(
      Command::new("output-resolved-config")
        .about("Prints the resolved bridge configuration.")
    )
    .subcommand(
      Command::new("version")
        .about("Outputs the version.")
    )
    .subcommand(
      Command::new("editor-service")
        .about("Runs a JSON lines formatting service on stdin and stdout.")
        .hide(true)
    )
    .arg(
      Arg::new("config")
        .long("config")
        .short('c')
        .help("Path to the JSON configuration file. Defaults to prettylus.json(c) or .prettylus.json(c) in current or ancestor directory when not provided.")
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("project-root")
        .long("project-root")
        .value_name("dir")
        .help("Project root directory. Defaults to the directory of the configuration file or the current directory.")
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("style-config-file-name")
        .long("style-config-file-name")
        .value_name("name")
        .help("Name of the stylus-supremacy configuration file. An empty value disables the search.")
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("primary-base-dir")
        .long("primary-base-dir")
        .value_name("dir")
        .help("Directory, absolute or relative to the project root, where Prettier and its plugins are installed.")
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("primary-config")
        .long("primary-config")
        .value_name("file")
        .help("Prettier configuration file, absolute or relative to the project root.")
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("indent-width")
        .long("indent-width")
        .value_name("n")
        .help("Indentation width in spaces used for style blocks.")
        .value_parser(clap::value_parser!(u8))
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("use-tabs")
        .long("use-tabs")
        .help("Indent style blocks with tabs.")
        .global(true)
        .num_args(0)
    )
    .arg(
      Arg::new("log-level")
        .long("log-level")
        .help("Level of the diagnostics written to stderr.")
        .value_parser(["silent", "error", "warn", "info", "debug"])
        .global(true)
        .num_args(1)
    )
    .arg(
      Arg::new("verbose")
        .long("verbose")
        .help("Prints additional diagnostic information. Same as --log-level debug.")
        .global(true)
        .num_args(0)
    );

  app
}

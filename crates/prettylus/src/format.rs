use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use std::cell::Cell;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::configuration::BridgeOptions;
use crate::configuration::StyleConfigSearch;
use crate::configuration::create_style_options;
use crate::configuration::locate_style_config;
use crate::embedded_blocks::BlockPattern;
use crate::embedded_blocks::extract_blocks;
use crate::embedded_blocks::splice_blocks;
use crate::environment::Environment;
use crate::modules::FormatterInvocationError;
use crate::modules::ModuleHost;
use crate::modules::PrimaryFormatOptions;
use crate::modules::PrimaryFormatter;
use crate::modules::ResolvedPackage;
use crate::modules::StyleFormatter;
use crate::modules::is_missing_plugin_placeholder;
use crate::modules::primary_candidate_dirs;
use crate::modules::resolve_module;
use crate::plugins::materialize_plugins;
use crate::plugins::take_plugins;
use crate::utils::UserWarnings;
use crate::utils::log_data;

pub const PRIMARY_PARSER: &str = "vue";
pub const PLUGIN_RETRY_WARNING: &str = concat!(
  "Formatted without plugins due to resolution issues. ",
  "Check that plugins are installed in the same directory as the primary formatter."
);
const PRIMARY_CONFIG_PROBE_FILE_NAME: &str = "dummy.vue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndentUnit {
  Spaces(u8),
  Tab,
}

impl IndentUnit {
  pub fn from_settings(use_tabs: bool, indent_width: u8) -> Self {
    if use_tabs { IndentUnit::Tab } else { IndentUnit::Spaces(indent_width) }
  }

  pub fn as_text(&self) -> String {
    match self {
      IndentUnit::Spaces(count) => " ".repeat(*count as usize),
      IndentUnit::Tab => "\t".to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
  Lf,
  CrLf,
}

impl LineEnding {
  pub fn detect(text: &str) -> Self {
    if text.contains("\r\n") { LineEnding::CrLf } else { LineEnding::Lf }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      LineEnding::Lf => "\n",
      LineEnding::CrLf => "\r\n",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
  pub file_text: String,
  pub file_path: PathBuf,
  pub is_untitled: bool,
  pub project_root: Option<PathBuf>,
  pub indent_unit: IndentUnit,
  pub line_ending: LineEnding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEditReason {
  Unchanged,
  Cancelled,
  EmptyOutput,
  Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatResult {
  /// Text that replaces the whole document.
  Replace(String),
  NoEdit(NoEditReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatResponse {
  pub result: FormatResult,
  /// Messages to show to the user.
  pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStage {
  Resolving,
  ConfiguringPrimary,
  FormattingPrimary,
  ConfiguringSecondary,
  FormattingBlocks,
  Splicing,
  Done,
  Failed,
}

impl fmt::Display for FormatStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      FormatStage::Resolving => "resolving formatter modules",
      FormatStage::ConfiguringPrimary => "configuring the primary formatter",
      FormatStage::FormattingPrimary => "formatting the document",
      FormatStage::ConfiguringSecondary => "configuring the style formatter",
      FormatStage::FormattingBlocks => "formatting style blocks",
      FormatStage::Splicing => "splicing style blocks",
      FormatStage::Done => "done",
      FormatStage::Failed => "failed",
    };
    f.write_str(text)
  }
}

#[derive(Serialize)]
struct ErrorDetails<'a> {
  message: String,
  stack: Option<&'a str>,
  code: Option<&'a str>,
}

impl<'a> ErrorDetails<'a> {
  fn from_error(err: &'a anyhow::Error) -> Self {
    match err.downcast_ref::<FormatterInvocationError>() {
      Some(invocation_err) => ErrorDetails {
        message: format!("{:#}", err),
        stack: invocation_err.stack.as_deref(),
        code: invocation_err.code.as_deref(),
      },
      None => ErrorDetails {
        message: format!("{:#}", err),
        stack: None,
        code: None,
      },
    }
  }
}

/// Formats single-file components: the whole document with the primary
/// formatter, then each embedded style block with the style formatter.
pub struct Formatter<TEnvironment: Environment> {
  options: BridgeOptions,
  environment: TEnvironment,
}

impl<TEnvironment: Environment> Formatter<TEnvironment> {
  pub fn new(options: BridgeOptions, environment: TEnvironment) -> Self {
    log_info!(environment, "Formatter initialized with options: {}", log_data(&options));
    Self { options, environment }
  }

  pub fn options(&self) -> &BridgeOptions {
    &self.options
  }

  /// Formats the document. Never fails: errors become a user warning and no edit.
  pub async fn format_document(&self, host: &impl ModuleHost, request: &FormatRequest, token: &CancellationToken) -> FormatResponse {
    let environment = &self.environment;
    log_info!(
      environment,
      "Formatting document: {}",
      log_data(&json!({
        "documentPath": request.file_path,
        "rootPath": request.project_root,
        "isUntitled": request.is_untitled,
      }))
    );

    let warnings = UserWarnings::default();
    let stage = Cell::new(FormatStage::Resolving);
    let result = match self.run_stages(host, request, &stage, &warnings).await {
      Ok(output) => {
        stage.set(FormatStage::Done);
        if token.is_cancelled() {
          log_info!(environment, "Formatting was cancelled");
          FormatResult::NoEdit(NoEditReason::Cancelled)
        } else if output.is_empty() {
          log_warn!(environment, "Formatting produced empty output, leaving the document unchanged");
          FormatResult::NoEdit(NoEditReason::EmptyOutput)
        } else if output == request.file_text {
          log_info!(environment, "Document is already formatted");
          FormatResult::NoEdit(NoEditReason::Unchanged)
        } else {
          log_info!(environment, "Formatting completed successfully");
          FormatResult::Replace(output)
        }
      }
      Err(err) => {
        log_error!(environment, "Formatting failed while {}: {}", stage.get(), log_data(&ErrorDetails::from_error(&err)));
        stage.set(FormatStage::Failed);
        warnings.push(format!("{:#}", err));
        FormatResult::NoEdit(NoEditReason::Failed)
      }
    };

    FormatResponse {
      result,
      warnings: warnings.take(),
    }
  }

  /// Range formatting always formats the whole document.
  pub async fn format_range(&self, host: &impl ModuleHost, request: &FormatRequest, range: Range<usize>, token: &CancellationToken) -> FormatResponse {
    log_debug!(
      self.environment,
      "Range {}..{} requested for {}, formatting the whole document",
      range.start,
      range.end,
      request.file_path.display()
    );
    self.format_document(host, request, token).await
  }

  async fn run_stages<THost: ModuleHost>(&self, host: &THost, request: &FormatRequest, stage: &Cell<FormatStage>, warnings: &UserWarnings) -> Result<String> {
    let environment = &self.environment;
    let project_root = request.project_root.as_deref();

    let primary_base_dir = self.resolve_primary_base_dir(project_root);
    let primary_config_path = self.resolve_primary_config_path(primary_base_dir.as_deref(), project_root, &request.file_path);
    log_info!(
      environment,
      "Primary formatter paths resolved: {}",
      log_data(&json!({
        "baseDirectory": primary_base_dir,
        "configPath": primary_config_path,
      }))
    );
    let primary_candidates = primary_candidate_dirs(primary_base_dir.as_deref(), project_root);
    let primary = resolve_module(&self.options.primary_module, &primary_candidates, environment, async |package: &ResolvedPackage| {
      host.load_primary(package).await
    })
    .await?;

    stage.set(FormatStage::ConfiguringPrimary);
    log_info!(environment, "Resolving primary formatter config from: {}", primary_config_path.display());
    let mut config = primary.instance.resolve_config(&primary_config_path, false).await?.unwrap_or_default();
    log_info!(environment, "Resolved primary formatter config: {}", log_data(&config));
    let plugin_descriptors = take_plugins(&mut config);
    let plugins = if plugin_descriptors.is_empty() {
      log_info!(environment, "No plugins specified in primary formatter config");
      Vec::new()
    } else {
      materialize_plugins(plugin_descriptors, &primary.dependency_resolver, host, environment).await.plugins
    };
    config.insert("parser".to_string(), PRIMARY_PARSER.into());
    let primary_options = PrimaryFormatOptions {
      config,
      plugins,
      file_path: synthetic_file_path(&request.file_path),
    };
    log_info!(
      environment,
      "Final primary formatter options: {}",
      log_data(&json!({
        "parser": PRIMARY_PARSER,
        "pluginCount": primary_options.plugins.len(),
        "filepath": primary_options.file_path,
      }))
    );
    if !primary_options.plugins.is_empty() {
      let details = primary_options
        .plugins
        .iter()
        .enumerate()
        .map(|(index, plugin)| json!({ "index": index, "kind": plugin.describe() }))
        .collect::<Vec<_>>();
      log_info!(environment, "Plugin details: {}", log_data(&details));
    }

    stage.set(FormatStage::FormattingPrimary);
    let primary_output = match primary.instance.format(&request.file_text, &primary_options).await {
      Ok(output) => output,
      Err(err) => {
        log_error!(environment, "Primary formatting failed: {}", log_data(&ErrorDetails::from_error(&err)));
        if !is_missing_plugin_placeholder(&err) {
          return Err(err);
        }
        log_warn!(environment, "Retrying without plugins due to a plugin resolution error");
        let output = primary.instance.format(&request.file_text, &primary_options.without_plugins()).await?;
        warnings.push(PLUGIN_RETRY_WARNING);
        output
      }
    };
    log_info!(environment, "Primary formatting complete");

    stage.set(FormatStage::ConfiguringSecondary);
    let style_candidates = project_root.map(|root| vec![root.to_path_buf()]).unwrap_or_default();
    let style = resolve_module(&self.options.style_module, &style_candidates, environment, async |package: &ResolvedPackage| {
      host.load_style(package).await
    })
    .await?;
    let style_config = locate_style_config(
      &StyleConfigSearch {
        document_path: &request.file_path,
        is_untitled: request.is_untitled,
        project_root,
        config_file_name: self.options.style_config_file_name.as_deref(),
      },
      environment,
      warnings,
    );
    let style_options = create_style_options(&style_config.contents, &request.indent_unit, request.line_ending, environment);

    let pattern = BlockPattern::for_style_language(&self.options.style_language)?;
    let blocks = extract_blocks(&request.file_text, &pattern, environment);
    log_info!(environment, "Found {} style block(s)", blocks.len());
    stage.set(FormatStage::Splicing);
    splice_blocks(
      primary_output,
      &blocks,
      async |text: &str| -> Result<String> {
        stage.set(FormatStage::FormattingBlocks);
        let formatted = style.instance.format(text, &style_options).await?;
        stage.set(FormatStage::Splicing);
        Ok(formatted)
      },
      environment,
    )
    .await
  }

  fn resolve_primary_base_dir(&self, project_root: Option<&Path>) -> Option<PathBuf> {
    let configured = self.options.primary_base_directory.as_deref().filter(|dir| !dir.is_empty())?;
    let base_dir = if self.environment.is_absolute_path(configured) {
      PathBuf::from(configured)
    } else {
      match project_root {
        Some(project_root) => project_root.join(configured),
        None => {
          log_warn!(self.environment, "Ignoring relative primaryBaseDirectory without a project root: {}", configured);
          return None;
        }
      }
    };
    if self.environment.path_exists(&base_dir) {
      Some(base_dir)
    } else {
      log_warn!(self.environment, "Configured primaryBaseDirectory does not exist, ignoring: {}", base_dir.display());
      None
    }
  }

  fn resolve_primary_config_path(&self, primary_base_dir: Option<&Path>, project_root: Option<&Path>, document_path: &Path) -> PathBuf {
    if let Some(config_file) = self.options.primary_config_file.as_deref().filter(|file| !file.is_empty()) {
      return match project_root {
        Some(project_root) if !self.environment.is_absolute_path(config_file) => project_root.join(config_file),
        _ => PathBuf::from(config_file),
      };
    }
    match primary_base_dir {
      Some(base_dir) => base_dir.join(PRIMARY_CONFIG_PROBE_FILE_NAME),
      None => document_path.to_path_buf(),
    }
  }
}

/// A file path that keeps only the real extension, so the primary formatter
/// picks its parser from it without reading configuration near the document.
fn synthetic_file_path(file_path: &Path) -> PathBuf {
  match file_path.extension() {
    Some(extension) => PathBuf::from(format!("/tmp/dummy.{}", extension.to_string_lossy())),
    None => PathBuf::from("/tmp/dummy"),
  }
}

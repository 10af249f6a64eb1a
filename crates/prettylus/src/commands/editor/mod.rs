use anyhow::Result;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod messages;

use crate::arg_parser::CliArgs;
use crate::configuration::resolve_cli_path;
use crate::configuration::resolve_config_from_args;
use crate::environment::Environment;
use crate::format::FormatRequest;
use crate::format::FormatResult;
use crate::format::Formatter;
use crate::format::IndentUnit;
use crate::format::LineEnding;
use crate::modules::ModuleHost;

use self::messages::EditorRequest;
use self::messages::EditorRequestBody;
use self::messages::EditorResponse;
use self::messages::EditorResponseBody;
use self::messages::FormatRequestBody;

/// Serves format requests read as JSON lines until the input closes or a
/// shutdown message is received.
pub async fn run_editor_service<TEnvironment: Environment, THost: ModuleHost + 'static>(
  args: &CliArgs,
  environment: &TEnvironment,
  host: Rc<THost>,
  reader: impl AsyncBufRead + Unpin,
) -> Result<()> {
  let local_set = tokio::task::LocalSet::new();
  local_set
    .run_until(async move {
      let mut editor_service = EditorService::new(args, environment, host)?;
      editor_service.run(reader).await
    })
    .await
}

struct PendingRequest {
  /// Tells apart requests that reuse an id.
  generation: u64,
  token: CancellationToken,
}

struct EditorContext<TEnvironment: Environment> {
  environment: TEnvironment,
  pending_requests: RefCell<HashMap<u32, PendingRequest>>,
  next_generation: Cell<u64>,
}

impl<TEnvironment: Environment> EditorContext<TEnvironment> {
  fn new(environment: TEnvironment) -> Self {
    Self {
      environment,
      pending_requests: Default::default(),
      next_generation: Cell::new(0),
    }
  }

  fn track(&self, id: u32, token: CancellationToken) -> u64 {
    let generation = self.next_generation.get();
    self.next_generation.set(generation + 1);
    self.pending_requests.borrow_mut().insert(id, PendingRequest { generation, token });
    generation
  }

  fn untrack(&self, id: u32, generation: u64) {
    let mut pending_requests = self.pending_requests.borrow_mut();
    if pending_requests.get(&id).is_some_and(|pending| pending.generation == generation) {
      pending_requests.remove(&id);
    }
  }

  fn cancel(&self, id: u32) -> bool {
    match self.pending_requests.borrow_mut().remove(&id) {
      Some(pending) => {
        pending.token.cancel();
        true
      }
      None => false,
    }
  }

  fn send(&self, id: Option<u32>, body: EditorResponseBody) {
    match serde_json::to_string(&EditorResponse { id, body }) {
      Ok(text) => self.environment.log_machine_readable(&text),
      Err(err) => log_error!(self.environment, "Error serializing response. {:#}", err),
    }
  }
}

struct EditorService<'a, TEnvironment: Environment, THost: ModuleHost> {
  args: &'a CliArgs,
  environment: &'a TEnvironment,
  host: Rc<THost>,
  formatter: Rc<Formatter<TEnvironment>>,
  default_project_root: Option<PathBuf>,
  context: Rc<EditorContext<TEnvironment>>,
  tasks: Vec<JoinHandle<()>>,
}

impl<'a, TEnvironment: Environment, THost: ModuleHost + 'static> EditorService<'a, TEnvironment, THost> {
  pub fn new(args: &'a CliArgs, environment: &'a TEnvironment, host: Rc<THost>) -> Result<Self> {
    let formatter = Rc::new(create_formatter(args, environment)?);
    Ok(Self {
      args,
      environment,
      host,
      formatter,
      default_project_root: args.project_root.as_ref().map(|root| resolve_cli_path(root, environment)),
      context: Rc::new(EditorContext::new(environment.clone())),
      tasks: Vec::new(),
    })
  }

  pub async fn run(&mut self, reader: impl AsyncBufRead + Unpin) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
      self.tasks.retain(|task| !task.is_finished());
      if line.trim().is_empty() {
        continue;
      }
      let request = match EditorRequest::parse(&line) {
        Ok(request) => request,
        Err(err) => {
          log_warn!(self.environment, "{}", err);
          self.context.send(err.id, EditorResponseBody::Error { message: err.message });
          continue;
        }
      };
      log_debug!(self.environment, "Received editor message {}", request.id);

      match request.body {
        EditorRequestBody::Format(body) => self.spawn_format(request.id, body, false),
        EditorRequestBody::FormatRange(body) => self.spawn_format(request.id, body, true),
        EditorRequestBody::Cancel { target_id } => {
          if self.context.cancel(target_id) {
            log_debug!(self.environment, "Cancelled editor message {}", target_id);
          }
        }
        EditorRequestBody::ConfigChanged => {
          let body = match create_formatter(self.args, self.environment) {
            Ok(formatter) => {
              self.formatter = Rc::new(formatter);
              EditorResponseBody::Success
            }
            Err(err) => {
              log_error!(self.environment, "Error reloading configuration. {:#}", err);
              EditorResponseBody::Error {
                message: format!("{:#}", err),
              }
            }
          };
          self.context.send(Some(request.id), body);
        }
        EditorRequestBody::Shutdown => {
          self.wait_for_tasks().await;
          self.context.send(Some(request.id), EditorResponseBody::Success);
          return Ok(());
        }
      }
    }

    // input closed, so finish what was already received
    self.wait_for_tasks().await;
    Ok(())
  }

  fn spawn_format(&mut self, id: u32, body: FormatRequestBody, is_range: bool) {
    let range: Option<Range<usize>> = match (is_range, body.range) {
      (true, Some(range)) => Some(range.into()),
      (true, None) => {
        self.context.send(
          Some(id),
          EditorResponseBody::Error {
            message: "A formatRange message requires a range.".to_string(),
          },
        );
        return;
      }
      (false, _) => None,
    };
    let request = FormatRequest {
      line_ending: body.line_ending.unwrap_or_else(|| LineEnding::detect(&body.text)),
      indent_unit: IndentUnit::from_settings(
        body.use_tabs.unwrap_or(self.args.use_tabs),
        body.indent_width.unwrap_or(self.args.indent_width),
      ),
      file_text: body.text,
      file_path: body.file_path,
      is_untitled: body.is_untitled,
      project_root: body.project_root.or_else(|| self.default_project_root.clone()),
    };

    let token = CancellationToken::new();
    let generation = self.context.track(id, token.clone());
    let formatter = self.formatter.clone();
    let host = self.host.clone();
    let context = self.context.clone();
    self.tasks.push(tokio::task::spawn_local(async move {
      let response = match range {
        Some(range) => formatter.format_range(&*host, &request, range, &token).await,
        None => formatter.format_document(&*host, &request, &token).await,
      };
      context.untrack(id, generation);
      let text = match response.result {
        FormatResult::Replace(text) => Some(text),
        FormatResult::NoEdit(_) => None,
      };
      context.send(
        Some(id),
        EditorResponseBody::Formatted {
          text,
          warnings: response.warnings,
        },
      );
    }));
  }

  async fn wait_for_tasks(&mut self) {
    for task in self.tasks.drain(..) {
      if let Err(err) = task.await {
        log_error!(self.environment, "Format task failed. {:#}", err);
      }
    }
  }
}

fn create_formatter<TEnvironment: Environment>(args: &CliArgs, environment: &TEnvironment) -> Result<Formatter<TEnvironment>> {
  let config = resolve_config_from_args(args, environment)?;
  Ok(Formatter::new(config.options, environment.clone()))
}

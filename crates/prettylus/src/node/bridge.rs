use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use std::cell::Cell;
use std::cell::RefCell;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;

use super::BridgeMessage;
use super::BridgeRequest;
use super::BridgeResponse;
use super::resolve_node_executable;
use crate::environment::Environment;

/// Script run by the bridge process.
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");
/// Marks stderr lines that came from `console.log` and friends.
const LOG_LINE_PREFIX: &str = "[log] ";

struct BridgeIo {
  stdin: ChildStdin,
  stdout: Lines<BufReader<ChildStdout>>,
}

/// A Node.js child process that loads formatter modules by absolute path and
/// answers one JSON request per line.
pub struct NodeBridge {
  // killed on drop
  child: RefCell<Child>,
  exited: Cell<bool>,
  io: tokio::sync::Mutex<BridgeIo>,
  next_id: Cell<u32>,
}

impl NodeBridge {
  pub async fn start(environment: &impl Environment) -> Result<Self> {
    let node_path = resolve_node_executable(environment)?;
    log_debug!(environment, "Starting formatter bridge with {}", node_path.display());
    let mut child = Command::new(&node_path)
      .arg("-e")
      .arg(BRIDGE_SCRIPT)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true)
      .spawn()
      .map_err(|err| anyhow!("Error starting {}. {:#}", node_path.display(), err))?;

    let stdin = child.stdin.take().context("Missing stdin of the bridge process.")?;
    let stdout = child.stdout.take().context("Missing stdout of the bridge process.")?;
    let stderr = child.stderr.take().context("Missing stderr of the bridge process.")?;

    // module and plugin output ends up on stderr
    tokio::spawn({
      let environment = environment.clone();
      async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
          match lines.next_line().await {
            Ok(Some(line)) => log_stderr_line(&line, &environment),
            Ok(None) => break,
            Err(err) => {
              log_debug!(environment, "Error reading line from the bridge process stderr. {:#}", err);
              break;
            }
          }
        }
      }
    });

    Ok(Self {
      child: RefCell::new(child),
      exited: Cell::new(false),
      io: tokio::sync::Mutex::new(BridgeIo {
        stdin,
        stdout: BufReader::new(stdout).lines(),
      }),
      next_id: Cell::new(0),
    })
  }

  /// Sends a request and waits for its response. Requests are answered in order.
  ///
  /// An error thrown on the JavaScript side is returned as a `FormatterInvocationError`.
  pub async fn send(&self, request: &BridgeRequest<'_>) -> Result<serde_json::Value> {
    let id = self.next_id.get();
    self.next_id.set(id.wrapping_add(1));
    let mut line = serde_json::to_string(&BridgeMessage { id, request })?;
    line.push('\n');

    let mut io = self.io.lock().await;
    let sent = match io.stdin.write_all(line.as_bytes()).await {
      Ok(()) => io.stdin.flush().await,
      Err(err) => Err(err),
    };
    if let Err(err) = sent {
      self.exited.set(true);
      return Err(err).context("Sending message failed because the bridge process exited.");
    }

    let response_line = match io.stdout.next_line().await {
      Ok(Some(response_line)) => response_line,
      Ok(None) => {
        self.exited.set(true);
        bail!("The bridge process exited before responding.");
      }
      Err(err) => {
        self.exited.set(true);
        return Err(err).context("Reading the response of the bridge process failed.");
      }
    };
    let response: BridgeResponse =
      serde_json::from_str(&response_line).with_context(|| format!("Invalid response from the bridge process: {}", response_line))?;
    if response.id != id {
      bail!("Expected a response for message {} from the bridge process, but got {}.", id, response.id);
    }
    Ok(response.into_result()?)
  }

  /// Whether the process is gone, so requests can no longer be answered.
  pub fn has_exited(&self) -> bool {
    if !self.exited.get() && !matches!(self.child.borrow_mut().try_wait(), Ok(None)) {
      self.exited.set(true);
    }
    self.exited.get()
  }
}

/// Output of `console.log` is ordinary chatter. Anything else on stderr is
/// a warning or an error from a module.
fn log_stderr_line(line: &str, environment: &impl Environment) {
  match line.strip_prefix(LOG_LINE_PREFIX) {
    Some(text) => log_debug!(environment, "[node] {}", text),
    None => log_warn!(environment, "[node] {}", line),
  }
}

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::rc::Rc;
use tokio::sync::Mutex;

use super::BridgeRequest;
use super::ModuleHandle;
use super::NodeBridge;
use crate::configuration::ConfigKeyMap;
use crate::environment::Environment;
use crate::modules::ModuleHost;
use crate::modules::PrimaryFormatOptions;
use crate::modules::PrimaryFormatter;
use crate::modules::ResolvedPackage;
use crate::modules::StyleFormatter;
use crate::plugins::PluginShape;

/// Hosts formatter modules in a Node.js process that is started on first use
/// and killed when the host and every formatter it loaded are dropped. A
/// process that exited is replaced on the next load.
pub struct NodeModuleHost<TEnvironment: Environment> {
  environment: TEnvironment,
  bridge: Mutex<Option<Rc<NodeBridge>>>,
}

impl<TEnvironment: Environment> NodeModuleHost<TEnvironment> {
  pub fn new(environment: TEnvironment) -> Self {
    Self {
      environment,
      bridge: Mutex::new(None),
    }
  }

  async fn bridge(&self) -> Result<Rc<NodeBridge>> {
    let mut bridge = self.bridge.lock().await;
    if let Some(current) = bridge.as_ref() {
      if !current.has_exited() {
        return Ok(current.clone());
      }
      log_warn!(self.environment, "The formatter bridge process exited. Starting a new one.");
    }
    let started = Rc::new(NodeBridge::start(&self.environment).await?);
    *bridge = Some(started.clone());
    Ok(started)
  }

  async fn load(&self, package: &ResolvedPackage) -> Result<(Rc<NodeBridge>, ModuleHandle)> {
    let bridge = self.bridge().await?;
    log_debug!(
      self.environment,
      "Loading {} {}from {}",
      package.request,
      package.version.as_ref().map(|version| format!("{} ", version)).unwrap_or_default(),
      package.entry_path.display()
    );
    let value = bridge.send(&BridgeRequest::Load { entry_path: &package.entry_path }).await?;
    let handle = serde_json::from_value(value)?;
    Ok((bridge, handle))
  }
}

#[async_trait(?Send)]
impl<TEnvironment: Environment> ModuleHost for NodeModuleHost<TEnvironment> {
  type Primary = NodePrimaryFormatter;
  type Style = NodeStyleFormatter;

  async fn load_primary(&self, package: &ResolvedPackage) -> Result<NodePrimaryFormatter> {
    let (bridge, handle) = self.load(package).await?;
    Ok(NodePrimaryFormatter { bridge, handle })
  }

  async fn load_style(&self, package: &ResolvedPackage) -> Result<NodeStyleFormatter> {
    let (bridge, handle) = self.load(package).await?;
    Ok(NodeStyleFormatter { bridge, handle })
  }

  async fn inspect_plugin(&self, package: &ResolvedPackage) -> Result<PluginShape> {
    let bridge = self.bridge().await?;
    let value = bridge.send(&BridgeRequest::InspectPlugin { entry_path: &package.entry_path }).await?;
    Ok(serde_json::from_value(value)?)
  }
}

pub struct NodePrimaryFormatter {
  bridge: Rc<NodeBridge>,
  handle: ModuleHandle,
}

#[async_trait(?Send)]
impl PrimaryFormatter for NodePrimaryFormatter {
  async fn resolve_config(&self, file_path: &Path, use_cache: bool) -> Result<Option<ConfigKeyMap>> {
    let value = self
      .bridge
      .send(&BridgeRequest::ResolveConfig {
        handle: self.handle,
        file_path,
        use_cache,
      })
      .await?;
    Ok(serde_json::from_value(value)?)
  }

  async fn format(&self, text: &str, options: &PrimaryFormatOptions) -> Result<String> {
    let value = self
      .bridge
      .send(&BridgeRequest::Format {
        handle: self.handle,
        text,
        options: &options.config,
        plugins: &options.plugins,
        file_path: &options.file_path,
      })
      .await?;
    Ok(serde_json::from_value(value)?)
  }
}

pub struct NodeStyleFormatter {
  bridge: Rc<NodeBridge>,
  handle: ModuleHandle,
}

#[async_trait(?Send)]
impl StyleFormatter for NodeStyleFormatter {
  async fn format(&self, text: &str, options: &ConfigKeyMap) -> Result<String> {
    let value = self
      .bridge
      .send(&BridgeRequest::FormatStyle {
        handle: self.handle,
        text,
        options,
      })
      .await?;
    Ok(serde_json::from_value(value)?)
  }
}

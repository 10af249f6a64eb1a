use super::MaterializedPlugin;
use super::PluginDescriptor;
use super::PluginExport;
use super::PluginResolutionFailure;
use crate::environment::Environment;
use crate::modules::DependencyResolver;
use crate::modules::ModuleHost;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaterializedPlugins {
  pub plugins: Vec<MaterializedPlugin>,
  pub failures: Vec<PluginResolutionFailure>,
}

/// Turns the configured plugin list into plugins loaded from the same
/// dependency tree as the primary formatter.
///
/// Plugins that can't be loaded are dropped and recorded as failures. Names
/// are never passed through.
pub async fn materialize_plugins<TEnvironment: Environment>(
  descriptors: Vec<PluginDescriptor>,
  dependency_resolver: &DependencyResolver<TEnvironment>,
  host: &impl ModuleHost,
  environment: &TEnvironment,
) -> MaterializedPlugins {
  let mut result = MaterializedPlugins::default();
  for descriptor in descriptors {
    match descriptor {
      PluginDescriptor::Materialized(plugin) => {
        log_info!(environment, "Plugin already loaded as object");
        result.plugins.push(plugin);
      }
      PluginDescriptor::Named(name) => {
        log_info!(environment, "Attempting to load plugin: {}", name);
        match materialize_named(&name, dependency_resolver, host, environment).await {
          Ok(plugin) => result.plugins.push(plugin),
          Err(failure) => {
            log_error!(environment, "{}", failure);
            result.failures.push(failure);
          }
        }
      }
    }
  }
  log_info!(environment, "Total plugins processed: {}", result.plugins.len());
  result
}

async fn materialize_named<TEnvironment: Environment>(
  name: &str,
  dependency_resolver: &DependencyResolver<TEnvironment>,
  host: &impl ModuleHost,
  environment: &TEnvironment,
) -> Result<MaterializedPlugin, PluginResolutionFailure> {
  let failure = |reason: String| PluginResolutionFailure {
    name: name.to_string(),
    reason,
  };
  let package = dependency_resolver.resolve(name).map_err(|err| failure(format!("{:#}", err)))?;
  let shape = host.inspect_plugin(&package).await.map_err(|err| failure(format!("{:#}", err)))?;

  let export = if shape.is_usable() {
    log_info!(environment, "Successfully loaded plugin: {} ({:?})", name, shape.capabilities);
    PluginExport::Module
  } else if shape.default_export.is_some() {
    log_warn!(environment, "Loaded plugin {} but it doesn't expose parsers, printers or languages", name);
    log_info!(environment, "Using default export for plugin: {}", name);
    PluginExport::Default
  } else {
    return Err(failure("The plugin doesn't have the expected structure".to_string()));
  };

  Ok(MaterializedPlugin::Package {
    name: name.to_string(),
    entry_path: package.entry_path,
    export,
  })
}

#[cfg(test)]
mod test {
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use std::path::Path;
  use std::path::PathBuf;

  use super::*;
  use crate::environment::TestEnvironment;
  use crate::modules::ResolutionRoot;
  use crate::plugins::PluginCapability;
  use crate::plugins::PluginShape;
  use crate::test_helpers::TestModuleHost;

  fn setup() -> (TestEnvironment, TestModuleHost, DependencyResolver<TestEnvironment>) {
    let environment = TestEnvironment::new();
    environment.write_file("/ws/package.json", "{}").unwrap();
    let host = TestModuleHost::new();
    let resolver = DependencyResolver::new(ResolutionRoot::for_directory(Path::new("/ws"), &environment), environment.clone());
    (environment, host, resolver)
  }

  #[tokio::test(flavor = "current_thread")]
  async fn loads_named_plugins_with_capabilities() {
    let (environment, host, resolver) = setup();
    host.add_plugin(
      &environment,
      "/ws/node_modules/prettier-plugin-pug",
      PluginShape {
        capabilities: vec![PluginCapability::Parser, PluginCapability::Printer],
        default_export: None,
      },
    );
    let result = materialize_plugins(vec![PluginDescriptor::Named("prettier-plugin-pug".to_string())], &resolver, &host, &environment).await;
    assert_eq!(
      result,
      MaterializedPlugins {
        plugins: vec![MaterializedPlugin::Package {
          name: "prettier-plugin-pug".to_string(),
          entry_path: PathBuf::from("/ws/node_modules/prettier-plugin-pug/index.js"),
          export: PluginExport::Module,
        }],
        failures: Vec::new(),
      }
    );
  }

  #[tokio::test(flavor = "current_thread")]
  async fn unwraps_default_export() {
    let (environment, host, resolver) = setup();
    host.add_plugin(
      &environment,
      "/ws/node_modules/esm-plugin",
      PluginShape {
        capabilities: Vec::new(),
        default_export: Some(Box::new(PluginShape {
          capabilities: vec![PluginCapability::LanguageDescriptor],
          default_export: None,
        })),
      },
    );
    let result = materialize_plugins(vec![PluginDescriptor::Named("esm-plugin".to_string())], &resolver, &host, &environment).await;
    assert_eq!(
      result.plugins,
      vec![MaterializedPlugin::Package {
        name: "esm-plugin".to_string(),
        entry_path: PathBuf::from("/ws/node_modules/esm-plugin/index.js"),
        export: PluginExport::Default,
      }]
    );
  }

  #[tokio::test(flavor = "current_thread")]
  async fn drops_unusable_and_missing_plugins() {
    let (environment, host, resolver) = setup();
    host.add_plugin(&environment, "/ws/node_modules/not-a-plugin", PluginShape::default());
    host.add_broken(&environment, "/ws/node_modules/throws-on-load", "SyntaxError: Unexpected token 'export'");
    host.add_plugin(
      &environment,
      "/ws/node_modules/good-plugin",
      PluginShape {
        capabilities: vec![PluginCapability::Printer],
        default_export: None,
      },
    );
    let inline = MaterializedPlugin::Inline {
      value: json!({ "$prettylusPlugin": 0 }),
    };
    let result = materialize_plugins(
      vec![
        PluginDescriptor::Named("missing-plugin".to_string()),
        PluginDescriptor::Named("not-a-plugin".to_string()),
        PluginDescriptor::Materialized(inline.clone()),
        PluginDescriptor::Named("throws-on-load".to_string()),
        PluginDescriptor::Named("good-plugin".to_string()),
      ],
      &resolver,
      &host,
      &environment,
    )
    .await;

    assert_eq!(result.plugins.len(), 2);
    assert_eq!(result.plugins[0], inline);
    assert!(matches!(&result.plugins[1], MaterializedPlugin::Package { name, .. } if name == "good-plugin"));
    assert_eq!(
      result.failures,
      vec![
        PluginResolutionFailure {
          name: "missing-plugin".to_string(),
          reason: "Cannot find module 'missing-plugin' from '/ws'".to_string(),
        },
        PluginResolutionFailure {
          name: "not-a-plugin".to_string(),
          reason: "The plugin doesn't have the expected structure".to_string(),
        },
        PluginResolutionFailure {
          name: "throws-on-load".to_string(),
          reason: "SyntaxError: Unexpected token 'export'".to_string(),
        },
      ]
    );
  }
}

use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

use super::DependencyResolver;
use super::ResolutionRoot;
use super::ResolvedPackage;
use crate::environment::Environment;

/// A loaded external module along with the dependency tree it came from.
pub struct ResolvedModule<TModule, TEnvironment: Environment> {
  pub instance: TModule,
  pub resolved_from_dir: PathBuf,
  /// Resolves further packages (ex. plugins) from the same dependency tree.
  pub dependency_resolver: DependencyResolver<TEnvironment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
  pub dir: PathBuf,
  pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ModuleResolutionError {
  pub module_name: String,
  /// One entry per candidate directory, in the order tried.
  pub attempts: Vec<ResolutionAttempt>,
}

impl fmt::Display for ModuleResolutionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.attempts.is_empty() {
      return write!(
        f,
        "Could not determine a base directory for {}. Open a project folder or configure primaryBaseDirectory.",
        self.module_name
      );
    }
    write!(
      f,
      "Could not load {}. Make sure it is installed in the configured base directory or in the project (ex. \"npm install --save-dev {}\"). Tried directories: {}. Errors: {}",
      self.module_name,
      self.module_name,
      self.attempts.iter().map(|attempt| attempt.dir.display().to_string()).collect::<Vec<_>>().join(", "),
      self
        .attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.dir.display(), attempt.error))
        .collect::<Vec<_>>()
        .join(" | "),
    )
  }
}

/// Loads `module_name` from the first candidate directory whose dependency
/// tree provides it.
pub async fn resolve_module<TModule, TEnvironment: Environment>(
  module_name: &str,
  candidate_dirs: &[PathBuf],
  environment: &TEnvironment,
  load: impl AsyncFn(&ResolvedPackage) -> Result<TModule>,
) -> Result<ResolvedModule<TModule, TEnvironment>, ModuleResolutionError> {
  log_info!(
    environment,
    "Searching for {} in: {}",
    module_name,
    candidate_dirs.iter().map(|dir| dir.display().to_string()).collect::<Vec<_>>().join(", ")
  );

  let mut attempts = Vec::with_capacity(candidate_dirs.len());
  for dir in candidate_dirs {
    let root = ResolutionRoot::for_directory(dir, environment);
    log_info!(
      environment,
      "Trying to load {} from: {} (manifest found: {}, resolving from: {})",
      module_name,
      dir.display(),
      root.has_manifest(),
      root.base_dir().display(),
    );
    let dependency_resolver = DependencyResolver::new(root, environment.clone());
    match load_from(module_name, &dependency_resolver, &load).await {
      Ok(instance) => {
        log_info!(environment, "Loaded {} from: {}", module_name, dir.display());
        return Ok(ResolvedModule {
          instance,
          resolved_from_dir: dir.clone(),
          dependency_resolver,
        });
      }
      Err(err) => {
        log_warn!(environment, "Failed to load {} from {}: {:#}", module_name, dir.display(), err);
        attempts.push(ResolutionAttempt {
          dir: dir.clone(),
          error: format!("{:#}", err),
        });
      }
    }
  }

  let err = ModuleResolutionError {
    module_name: module_name.to_string(),
    attempts,
  };
  log_error!(environment, "{}", err);
  Err(err)
}

async fn load_from<TModule, TEnvironment: Environment>(
  module_name: &str,
  dependency_resolver: &DependencyResolver<TEnvironment>,
  load: &impl AsyncFn(&ResolvedPackage) -> Result<TModule>,
) -> Result<TModule> {
  let package = dependency_resolver.resolve(module_name)?;
  load(&package).await
}

/// Lists the directories to look for the primary formatter in, without duplicates.
pub fn primary_candidate_dirs(base_dir: Option<&Path>, project_root: Option<&Path>) -> Vec<PathBuf> {
  let mut dirs: Vec<PathBuf> = Vec::with_capacity(2);
  for dir in [base_dir, project_root].into_iter().flatten() {
    if !dirs.iter().any(|existing| existing == dir) {
      dirs.push(dir.to_path_buf());
    }
  }
  dirs
}

use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;

use crate::environment::Environment;

pub const PROJECT_MANIFEST_FILE_NAME: &str = "package.json";
const NODE_MODULES_DIR_NAME: &str = "node_modules";
const ENTRY_EXTENSIONS: [&str; 3] = ["js", "cjs", "mjs"];
/// Conditions matched in `exports`, the ones Node.js uses for `require`.
const EXPORT_CONDITIONS: [&str; 4] = ["require", "node", "node-addons", "default"];

/// The directory that module requests are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionRoot {
  /// A directory with a project manifest directly inside it.
  Manifest(PathBuf),
  /// A plain directory.
  Directory(PathBuf),
}

impl ResolutionRoot {
  pub fn for_directory(dir: &Path, environment: &impl Environment) -> Self {
    if environment.path_is_file(dir.join(PROJECT_MANIFEST_FILE_NAME)) {
      ResolutionRoot::Manifest(dir.to_path_buf())
    } else {
      ResolutionRoot::Directory(dir.to_path_buf())
    }
  }

  pub fn base_dir(&self) -> &Path {
    match self {
      ResolutionRoot::Manifest(dir) | ResolutionRoot::Directory(dir) => dir,
    }
  }

  pub fn has_manifest(&self) -> bool {
    matches!(self, ResolutionRoot::Manifest(_))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
  /// What was asked for, ex. `prettier` or `@prettier/plugin-pug`.
  pub request: String,
  /// Root directory of the package when the request was a package name.
  pub package_dir: Option<PathBuf>,
  /// Absolute path of the file to load.
  pub entry_path: PathBuf,
  pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
  main: Option<String>,
  version: Option<String>,
  exports: Option<Value>,
}

/// Resolves module requests the way Node.js does for CommonJS, rooted at a
/// single directory's dependency tree.
#[derive(Debug, Clone)]
pub struct DependencyResolver<TEnvironment: Environment> {
  root: ResolutionRoot,
  environment: TEnvironment,
}

impl<TEnvironment: Environment> DependencyResolver<TEnvironment> {
  pub fn new(root: ResolutionRoot, environment: TEnvironment) -> Self {
    Self { root, environment }
  }

  pub fn root(&self) -> &ResolutionRoot {
    &self.root
  }

  pub fn resolve(&self, request: &str) -> Result<ResolvedPackage> {
    let base_dir = self.root.base_dir();
    let resolved = if is_path_request(request) {
      self.resolve_file_request(base_dir, request)
    } else {
      self.resolve_package_request(base_dir, request)?
    };
    match resolved {
      Some(package) => {
        log_debug!(self.environment, "Resolved '{}' to {}", request, package.entry_path.display());
        Ok(package)
      }
      None => bail!("Cannot find module '{}' from '{}'", request, base_dir.display()),
    }
  }

  fn resolve_file_request(&self, base_dir: &Path, request: &str) -> Option<ResolvedPackage> {
    let path = if self.environment.is_absolute_path(request) {
      PathBuf::from(request)
    } else {
      base_dir.join(request)
    };
    let entry_path = self.resolve_path(&path)?;
    Some(ResolvedPackage {
      request: request.to_string(),
      package_dir: None,
      entry_path,
      version: None,
    })
  }

  fn resolve_package_request(&self, base_dir: &Path, request: &str) -> Result<Option<ResolvedPackage>> {
    let Some((package_name, sub_path)) = split_package_request(request) else {
      return Ok(None);
    };
    for ancestor in base_dir.ancestors() {
      if ancestor.file_name().is_some_and(|name| name == NODE_MODULES_DIR_NAME) {
        continue;
      }
      let package_dir = ancestor.join(NODE_MODULES_DIR_NAME).join(package_name);
      if !self.environment.path_exists(&package_dir) {
        continue;
      }
      let manifest = self.read_manifest(&package_dir).unwrap_or_default();
      let entry_path = match &manifest.exports {
        // a package with exports never falls back to a lookup on disk
        Some(exports) => Some(self.resolve_exports(&package_dir, exports, sub_path)?),
        None => match sub_path {
          Some(sub_path) => self.resolve_path(&package_dir.join(sub_path)),
          None => self.resolve_directory(&package_dir),
        },
      };
      if let Some(entry_path) = entry_path {
        return Ok(Some(ResolvedPackage {
          request: request.to_string(),
          version: manifest.version,
          package_dir: Some(package_dir),
          entry_path,
        }));
      }
    }
    Ok(None)
  }

  fn resolve_exports(&self, package_dir: &Path, exports: &Value, sub_path: Option<&str>) -> Result<PathBuf> {
    let export_key = match sub_path {
      Some(sub_path) => format!("./{}", sub_path),
      None => ".".to_string(),
    };
    let target = match exports.as_object().filter(|map| map.keys().any(|key| key.starts_with('.'))) {
      Some(sub_paths) => match_export_sub_path(sub_paths, &export_key),
      None => (export_key == ".").then_some((exports, None)),
    };
    let Some(entry_path) = target.and_then(|(target, pattern_match)| export_target_path(package_dir, target, pattern_match.as_deref())) else {
      bail!(
        "Package subpath '{}' is not defined by \"exports\" in {}",
        export_key,
        package_dir.join(PROJECT_MANIFEST_FILE_NAME).display()
      );
    };
    if !self.environment.path_is_file(&entry_path) {
      bail!("Cannot find module '{}' exported from {}", entry_path.display(), package_dir.display());
    }
    Ok(entry_path)
  }

  fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
    self.find_file(path).or_else(|| {
      if self.environment.path_exists(path) {
        self.resolve_directory(path)
      } else {
        None
      }
    })
  }

  fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
    if let Some(main) = self.read_manifest(dir).and_then(|manifest| manifest.main) {
      let main_path = dir.join(main);
      if let Some(entry_path) = self.find_file(&main_path).or_else(|| self.find_file(&main_path.join("index"))) {
        return Some(entry_path);
      }
    }
    self.find_file(&dir.join("index"))
  }

  /// Finds the file at the path as given or with one of the entry extensions added.
  fn find_file(&self, path: &Path) -> Option<PathBuf> {
    if self.environment.path_is_file(path) {
      return Some(path.to_path_buf());
    }
    ENTRY_EXTENSIONS.iter().find_map(|extension| {
      let mut file_path = path.as_os_str().to_owned();
      file_path.push(".");
      file_path.push(extension);
      let file_path = PathBuf::from(file_path);
      self.environment.path_is_file(&file_path).then_some(file_path)
    })
  }

  fn read_manifest(&self, dir: &Path) -> Option<PackageManifest> {
    let manifest_path = dir.join(PROJECT_MANIFEST_FILE_NAME);
    let text = self.environment.read_file(&manifest_path).ok()?;
    match serde_json::from_str(&text) {
      Ok(manifest) => Some(manifest),
      Err(err) => {
        log_debug!(self.environment, "Ignoring invalid manifest {}: {}", manifest_path.display(), err);
        None
      }
    }
  }
}

/// Finds the target for an `exports` sub-path, along with the text matched by
/// `*` when the key is a pattern. Exact keys win, then the longest pattern prefix.
fn match_export_sub_path<'a>(sub_paths: &'a Map<String, Value>, export_key: &str) -> Option<(&'a Value, Option<String>)> {
  if !export_key.contains('*') {
    if let Some(target) = sub_paths.get(export_key) {
      return Some((target, None));
    }
  }
  let mut best_match: Option<(&str, &Value, String)> = None;
  for (key, target) in sub_paths {
    let Some((prefix, suffix)) = key.split_once('*') else {
      continue;
    };
    if suffix.contains('*') || export_key.len() < key.len() || !export_key.starts_with(prefix) || !export_key.ends_with(suffix) {
      continue;
    }
    let is_better = match &best_match {
      Some((best_key, _, _)) => {
        let best_prefix_len = best_key.find('*').unwrap_or(best_key.len());
        prefix.len() > best_prefix_len || (prefix.len() == best_prefix_len && key.len() > best_key.len())
      }
      None => true,
    };
    if is_better {
      let matched = export_key[prefix.len()..export_key.len() - suffix.len()].to_string();
      best_match = Some((key.as_str(), target, matched));
    }
  }
  best_match.map(|(_, target, matched)| (target, Some(matched)))
}

/// Picks the path an `exports` target points at. Arrays yield their first
/// valid entry and condition objects their first matching condition.
fn export_target_path(package_dir: &Path, target: &Value, pattern_match: Option<&str>) -> Option<PathBuf> {
  match target {
    Value::String(target) => {
      let relative = target.strip_prefix("./")?;
      if relative.split('/').any(|segment| segment == ".." || segment == "node_modules") {
        return None;
      }
      let relative = match pattern_match {
        Some(matched) => relative.replace('*', matched),
        None => relative.to_string(),
      };
      Some(package_dir.join(relative))
    }
    Value::Array(targets) => targets.iter().find_map(|target| export_target_path(package_dir, target, pattern_match)),
    Value::Object(conditions) => conditions
      .iter()
      .filter(|(condition, _)| EXPORT_CONDITIONS.contains(&condition.as_str()))
      .find_map(|(_, target)| export_target_path(package_dir, target, pattern_match)),
    _ => None,
  }
}

fn is_path_request(request: &str) -> bool {
  request.starts_with("./") || request.starts_with("../") || request == "." || request == ".." || request.starts_with('/') || request.contains(":\\")
}

/// Splits `@scope/name/sub/path` into `@scope/name` and `sub/path`.
fn split_package_request(request: &str) -> Option<(&str, Option<&str>)> {
  let name_segment_count = if request.starts_with('@') { 2 } else { 1 };
  let mut split_index = None;
  for (count, (index, _)) in request.match_indices('/').enumerate() {
    if count + 1 == name_segment_count {
      split_index = Some(index);
      break;
    }
  }
  match split_index {
    Some(index) => {
      let sub_path = &request[index + 1..];
      Some((&request[..index], if sub_path.is_empty() { None } else { Some(sub_path) }))
    }
    None if name_segment_count == 2 => None,
    None if request.is_empty() => None,
    None => Some((request, None)),
  }
}

use anyhow::Result;
use anyhow::bail;
use std::path::PathBuf;

use crate::environment::Environment;

pub fn which_global(command_name: &str, environment: &impl Environment) -> Result<PathBuf> {
  let mut search_dirs = vec![];
  if let Some(path) = environment.env_var("PATH") {
    for folder in path.split(if cfg!(windows) { ';' } else { ':' }) {
      if !folder.is_empty() {
        search_dirs.push(PathBuf::from(folder));
      }
    }
  }
  let path_exts = if cfg!(windows) {
    let uc_command_name = command_name.to_uppercase();
    let path_ext = environment.env_var("PATHEXT").unwrap_or_else(|| ".EXE;.CMD;.BAT;.COM".to_string());
    let command_exts = path_ext
      .split(';')
      .map(|s| s.trim().to_uppercase())
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>();
    if command_exts.is_empty() || command_exts.iter().any(|ext| uc_command_name.ends_with(ext)) {
      None // use the command name as-is
    } else {
      Some(command_exts)
    }
  } else {
    None
  };

  for search_dir in search_dirs {
    let paths = if let Some(path_exts) = &path_exts {
      path_exts.iter().map(|path_ext| search_dir.join(format!("{command_name}{path_ext}"))).collect()
    } else {
      vec![search_dir.join(command_name)]
    };
    for path in paths {
      if environment.path_is_file(&path) {
        return Ok(path);
      }
    }
  }

  bail!("{}: command not found", command_name)
}

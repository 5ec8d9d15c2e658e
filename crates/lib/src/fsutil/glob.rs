//! Glob matching against a directory root, with single-`**` recursion.
//!
//! Patterns without `**` go through the standard shell glob. A `**` splits
//! the pattern once into a literal prefix and suffix: the walk starts at
//! `root/prefix` and a visited path matches when the remainder after the
//! prefix equals the suffix or ends with `/suffix` (everything matches when
//! the suffix is empty). Additional `**` tokens are not supported.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Resolve `pattern` against `root`, returning matching absolute paths.
///
/// Paths that do not exist produce no matches; output patterns are allowed
/// to be broader than what a build actually wrote.
pub fn glob_match(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
  let pattern = pattern.trim_start_matches('/');

  if !pattern.contains("**") {
    let full = root.join(pattern);
    let paths = glob::glob(&full.to_string_lossy())?;
    return Ok(paths.filter_map(Result::ok).collect());
  }

  let (prefix, suffix) = match pattern.split_once("**") {
    Some((p, s)) => (p.trim_end_matches('/'), s.trim_start_matches('/')),
    None => (pattern, ""),
  };

  let walk_root = if prefix.is_empty() {
    root.to_path_buf()
  } else {
    root.join(prefix)
  };
  if !walk_root.exists() {
    return Ok(Vec::new());
  }

  let mut matches = Vec::new();
  for entry in WalkDir::new(&walk_root).into_iter().filter_map(Result::ok) {
    let rel = match entry.path().strip_prefix(root) {
      Ok(rel) => rel.to_string_lossy().into_owned(),
      Err(_) => continue,
    };

    if suffix.is_empty() {
      matches.push(entry.path().to_path_buf());
      continue;
    }

    let remainder = if prefix.is_empty() {
      rel.as_str()
    } else if rel == prefix {
      ""
    } else {
      match rel.strip_prefix(&format!("{}/", prefix)) {
        Some(r) => r,
        None => continue,
      }
    };

    if remainder == suffix || remainder.ends_with(&format!("/{}", suffix)) {
      matches.push(entry.path().to_path_buf());
    }
  }

  Ok(matches)
}

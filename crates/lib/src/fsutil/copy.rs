use std::fs;
use std::io;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use tracing::warn;
use walkdir::WalkDir;

/// Glob matching options for exclusion patterns: a single `*` never crosses
/// a path segment.
fn match_options() -> MatchOptions {
  MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
  }
}

/// Copy a single file, preserving permissions.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
  fs::copy(src, dst)?;
  Ok(())
}

/// Recursively copy `src` into `dst`, skipping paths that match any of the
/// exclusion globs.
///
/// A pattern excludes an entry if it matches the entry's relative path or
/// any ancestor prefix of it, so `exclude: ["saves"]` prunes the whole
/// `saves/` subtree at any depth of nesting in the pattern.
pub fn copy_dir(src: &Path, dst: &Path, exclude: &[String]) -> io::Result<()> {
  fs::create_dir_all(dst)?;

  let patterns: Vec<Pattern> = exclude
    .iter()
    .filter_map(|raw| match Pattern::new(raw) {
      Ok(pattern) => Some(pattern),
      Err(err) => {
        warn!(pattern = %raw, error = %err, "ignoring invalid exclude pattern");
        None
      }
    })
    .collect();

  let mut walker = WalkDir::new(src).min_depth(1).into_iter();
  while let Some(entry) = walker.next() {
    let entry = entry.map_err(io::Error::from)?;
    let rel = entry
      .path()
      .strip_prefix(src)
      .map_err(|e| io::Error::other(e.to_string()))?;

    if is_excluded(rel, &patterns) {
      if entry.file_type().is_dir() {
        walker.skip_current_dir();
      }
      continue;
    }

    let dest = dst.join(rel);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&dest)?;
    } else {
      copy_file(entry.path(), &dest)?;
    }
  }

  Ok(())
}

fn is_excluded(rel: &Path, patterns: &[Pattern]) -> bool {
  if patterns.is_empty() {
    return false;
  }
  let opts = match_options();
  // Check the path itself and every ancestor prefix, so a pattern naming a
  // directory prunes everything below it.
  let mut prefix = std::path::PathBuf::new();
  for component in rel.components() {
    prefix.push(component);
    let candidate = prefix.to_string_lossy();
    if patterns.iter().any(|p| p.matches_with(&candidate, opts)) {
      return true;
    }
  }
  false
}

/// Whether `path` stays inside `dir` once joined, i.e. contains no parent
/// traversal after stripping the prefix. Guards archive extraction against
/// entries like `../evil`.
pub fn is_within(path: &Path, dir: &Path) -> bool {
  match path.strip_prefix(dir) {
    Ok(rel) => !rel
      .components()
      .any(|c| matches!(c, std::path::Component::ParentDir)),
    Err(_) => false,
  }
}

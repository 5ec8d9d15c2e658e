//! Overlay execution for `run_in_build`.
//!
//! An OverlayFS mount stacks a throwaway upper layer over the read-only
//! lower build tree. The entrypoint runs in the merged view; everything it
//! creates or modifies lands in the upper layer, from which the declared
//! output globs are captured into the derivation output. Files that were
//! only read never appear in the capture, and the lower tree is never
//! mutated.
//!
//! Mounting needs `CAP_SYS_ADMIN` or a userns-capable environment; the
//! caller is responsible for running somewhere that allows it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::mount::{MsFlags, mount, umount};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fsutil::copy::{copy_dir, copy_file};
use crate::fsutil::glob::glob_match;
use crate::recipe::RunCommand;
use crate::store::Store;
use crate::util::hash::RecipeHash;

use super::BuildError;

#[derive(Debug, Error)]
pub enum OverlayError {
  #[error("failed to mount overlay at {path}: {source}")]
  Mount {
    path: PathBuf,
    #[source]
    source: nix::Error,
  },

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Execute `command` over the materialised output of `build` and capture the
/// upper-layer paths matching `outputs` into `dest`.
pub fn run_in_build(
  store: &Store,
  build: &RecipeHash,
  command: &RunCommand,
  outputs: &[String],
  dest: &Path,
) -> Result<(), BuildError> {
  let build_drv = store.load_recipe(build)?;
  let lower = store.derivation_path(&build_drv.out);
  if !lower.exists() {
    return Err(BuildError::SourceMissing(lower));
  }

  let scratch = tempfile::Builder::new()
    .prefix("kintsugi-overlay-")
    .tempdir()
    .map_err(OverlayError::Io)?;
  let upper = scratch.path().join("upper");
  let work = scratch.path().join("work");
  let merged = scratch.path().join("merged");
  for dir in [&upper, &work, &merged] {
    fs::create_dir_all(dir).map_err(OverlayError::Io)?;
  }

  let options = format!(
    "lowerdir={},upperdir={},workdir={}",
    lower.display(),
    upper.display(),
    work.display()
  );
  debug!(%options, "mounting overlay");
  mount(
    Some("overlay"),
    &merged,
    Some("overlay"),
    MsFlags::empty(),
    Some(options.as_str()),
  )
  .map_err(|source| OverlayError::Mount {
    path: merged.clone(),
    source,
  })?;

  let exec_result = crate::process::run_entrypoint(&merged, command);
  let capture_result = if exec_result.is_ok() {
    capture_outputs(&upper, outputs, dest)
  } else {
    Ok(())
  };

  if let Err(err) = umount(&merged) {
    // A failed unmount must not lose the captured work, but deleting the
    // scratch tree through a live mount would reach into the lower layer.
    warn!(path = %merged.display(), error = %err, "failed to unmount overlay, leaking scratch dir");
    let _ = scratch.keep();
  }

  exec_result?;
  capture_result
}

/// Copy every upper-layer match of the output globs into `dest`, preserving
/// relative paths. Matches that vanished are skipped; globs are allowed to
/// be broader than what the command produced.
fn capture_outputs(upper: &Path, outputs: &[String], dest: &Path) -> Result<(), BuildError> {
  fs::create_dir_all(dest)?;

  for pattern in outputs {
    let matches = glob_match(upper, pattern)?;
    debug!(pattern = %pattern, count = matches.len(), "capturing outputs");

    for matched in matches {
      let rel = match matched.strip_prefix(upper) {
        Ok(rel) => rel,
        Err(_) => continue,
      };
      if rel.as_os_str().is_empty() {
        continue;
      }
      let target = dest.join(rel);

      let metadata = match fs::metadata(&matched) {
        Ok(metadata) => metadata,
        Err(_) => continue,
      };
      if metadata.is_dir() {
        copy_dir(&matched, &target, &[])?;
      } else {
        if let Some(parent) = target.parent() {
          fs::create_dir_all(parent)?;
        }
        copy_file(&matched, &target)?;
      }
    }
  }

  info!(dest = %dest.display(), "captured outputs");
  Ok(())
}

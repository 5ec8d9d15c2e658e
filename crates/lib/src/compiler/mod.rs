//! The compiler: resolves a recipe DAG and materialises each derivation.
//!
//! Execution is strictly serial. Each derivation is built into a staging
//! directory and committed into `store/` with a single rename, so the
//! presence of `store/<out>` always means a complete build. That presence
//! is also the whole caching story: existing outputs are never rebuilt.

pub mod overlay;
pub mod resolve;
mod source;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use crate::fsutil::archive::ArchiveError;
use crate::process::ProcessError;
use crate::recipe::Derivation;
use crate::store::{Store, StoreError};
use crate::util::hash::RecipeHash;

pub use resolve::{ResolveError, resolve};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error("source path does not exist: {0}")]
  SourceMissing(PathBuf),

  #[error("vase '{0}' not found")]
  VaseMissing(String),

  #[error("download failed for {url}: {message}")]
  Download { url: String, message: String },

  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("git operation failed: {0}")]
  Git(#[source] ProcessError),

  #[error(transparent)]
  Exec(#[from] ProcessError),

  #[error(transparent)]
  Overlay(#[from] overlay::OverlayError),

  #[error("failed to serialize TOML content: {0}")]
  TomlSerialize(#[from] toml::ser::Error),

  #[error("failed to serialize JSON content: {0}")]
  JsonSerialize(#[from] serde_json::Error),

  #[error("invalid output glob pattern: {0}")]
  GlobPattern(#[from] glob::PatternError),

  #[error("build cancelled")]
  Cancelled,

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Cooperative cancellation flag, observed between derivations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::Relaxed);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Relaxed)
  }
}

/// Result of building (or cache-hitting) a single derivation.
#[derive(Debug)]
pub struct BuildOutcome {
  pub store_path: PathBuf,
  pub cached: bool,
}

pub struct Compiler<'a> {
  store: &'a Store,
  modpack_root: Option<PathBuf>,
  cancel: CancelToken,
}

impl<'a> Compiler<'a> {
  pub fn new(store: &'a Store) -> Self {
    Compiler {
      store,
      modpack_root: None,
      cancel: CancelToken::new(),
    }
  }

  /// Directory against which relative `fetch_local` paths resolve.
  pub fn with_modpack_root(mut self, path: impl Into<PathBuf>) -> Self {
    self.modpack_root = Some(path.into());
    self
  }

  /// A handle callers can use to request cancellation from another thread.
  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  pub(crate) fn store(&self) -> &Store {
    self.store
  }

  pub(crate) fn modpack_root(&self) -> Option<&Path> {
    self.modpack_root.as_deref()
  }

  /// Resolve and build the whole DAG rooted at `root`, in order.
  ///
  /// Any failure aborts the run; there are no retries. Returns the number
  /// of derivations in the plan (cached ones included).
  pub fn build_all(&self, root: &RecipeHash) -> Result<usize, BuildError> {
    let plan = resolve(self.store, root)?;
    info!(steps = plan.len(), root = %root, "executing build plan");

    for (index, drv) in plan.iter().enumerate() {
      if self.cancel.is_cancelled() {
        return Err(BuildError::Cancelled);
      }
      info!(
        step = index + 1,
        total = plan.len(),
        out = %drv.out,
        kind = drv.src.kind(),
        "building derivation"
      );
      self.build_derivation(drv)?;
    }

    Ok(plan.len())
  }

  /// Build a single derivation unless its output already exists.
  pub fn build_derivation(&self, drv: &Derivation) -> Result<BuildOutcome, BuildError> {
    let final_path = self.store.derivation_path(&drv.out);
    if final_path.exists() {
      debug!(path = %final_path.display(), "cached");
      return Ok(BuildOutcome {
        store_path: final_path,
        cached: true,
      });
    }

    let staging_root = self.store.staging_dir();
    fs::create_dir_all(&staging_root)?;
    let staging = staging_root.join(&drv.out);
    if staging.exists() {
      // Leftover from an interrupted run.
      fs::remove_dir_all(&staging)?;
    }

    let result = self.build_source(drv, &staging).and_then(|()| {
      if let Some(script) = &drv.postbuild {
        crate::process::run_shell(script, &staging, "postbuild")?;
      }
      Ok(())
    });

    match result {
      Ok(()) => {
        fs::rename(&staging, &final_path)?;
        debug!(path = %final_path.display(), "committed");
        Ok(BuildOutcome {
          store_path: final_path,
          cached: false,
        })
      }
      Err(err) => {
        let _ = fs::remove_dir_all(&staging);
        Err(err)
      }
    }
  }
}

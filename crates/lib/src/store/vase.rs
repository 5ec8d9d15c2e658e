//! Vase registry: named, versioned source trees usable as derivation inputs.
//!
//! Adding a vase `textures` creates `vases/textures-1`, then `textures-2`,
//! and so on; recipes reference the full versioned name. A vase cannot be
//! removed while any recipe references it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::fsutil::copy::copy_dir;
use crate::recipe::Source;
use crate::store::Store;

#[derive(Debug, Error)]
pub enum VaseError {
  #[error("vase '{0}' not found")]
  Missing(String),

  #[error("vase source path does not exist: {0}")]
  SourceMissing(PathBuf),

  #[error("vase '{vase}' is still referenced by recipe {recipe}")]
  InUse { vase: String, recipe: String },

  #[error(transparent)]
  Io(#[from] io::Error),
}

impl Store {
  /// Copy `src` into the registry as the next version of `name`, returning
  /// the versioned directory name.
  pub fn add_vase(&self, name: &str, src: &Path) -> Result<String, VaseError> {
    if !src.exists() {
      return Err(VaseError::SourceMissing(src.to_path_buf()));
    }

    let next = self.max_vase_version(name)? + 1;
    let versioned = format!("{}-{}", name, next);
    let dest = self.vase_path(&versioned);

    if src.is_dir() {
      copy_dir(src, &dest, &[])?;
    } else {
      fs::create_dir_all(&dest)?;
      let file_name = src.file_name().map(PathBuf::from).unwrap_or_else(|| "vase".into());
      fs::copy(src, dest.join(file_name))?;
    }

    info!(vase = %versioned, "vase added");
    Ok(versioned)
  }

  /// Remove a versioned vase. Refuses while any recipe still references it.
  pub fn remove_vase(&self, name: &str) -> Result<(), VaseError> {
    let path = self.vase_path(name);
    if !path.exists() {
      return Err(VaseError::Missing(name.to_string()));
    }

    if let Some(recipe) = self.find_vase_reference(name)? {
      return Err(VaseError::InUse {
        vase: name.to_string(),
        recipe,
      });
    }

    fs::remove_dir_all(&path)?;
    info!(vase = %name, "vase removed");
    Ok(())
  }

  /// Sorted names of every registered vase.
  pub fn list_vases(&self) -> Result<Vec<String>, VaseError> {
    let entries = match fs::read_dir(self.vases_dir()) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(err) => return Err(VaseError::Io(err)),
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
      if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
        names.push(entry.file_name().to_string_lossy().into_owned());
      }
    }
    names.sort();
    Ok(names)
  }

  fn max_vase_version(&self, name: &str) -> Result<u32, VaseError> {
    let prefix = format!("{}-", name);
    let mut max = 0;
    for vase in self.list_vases()? {
      if let Some(suffix) = vase.strip_prefix(&prefix)
        && let Ok(version) = suffix.parse::<u32>()
      {
        max = max.max(version);
      }
    }
    Ok(max)
  }

  /// Scan every recipe document for a `fetch_vase` source naming `name`.
  /// Undecodable recipes are skipped: a stale or foreign document must not
  /// block vase removal.
  fn find_vase_reference(&self, name: &str) -> Result<Option<String>, VaseError> {
    let entries = match fs::read_dir(self.recipes_dir()) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(err) => return Err(VaseError::Io(err)),
    };

    for entry in entries.flatten() {
      let path = entry.path();
      if path.extension().map(|e| e != "json").unwrap_or(true) {
        continue;
      }
      let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
          warn!(path = %path.display(), error = %err, "skipping unreadable recipe");
          continue;
        }
      };
      let drv: crate::recipe::Derivation = match serde_json::from_str(&content) {
        Ok(drv) => drv,
        Err(_) => continue,
      };
      if let Source::FetchVase { vase } = &drv.src
        && vase == name
      {
        let recipe = path
          .file_stem()
          .map(|s| s.to_string_lossy().into_owned())
          .unwrap_or_default();
        return Ok(Some(recipe));
      }
    }
    Ok(None)
  }
}

//! On-disk store layout and recipe loading.
//!
//! Everything lives under a single root (default `~/.kintsugi`, always
//! threaded in explicitly):
//!
//! ```text
//! <root>/
//! ├── store/     <out>/...            materialised derivations
//! ├── recipes/   <hash>.json          recipe documents (written by the front-end)
//! ├── modpacks/  <name>/<gen-link>    per-generation symlinks into store/
//! │              <name>/current build
//! ├── vases/     <name>-<N>/...       user-managed versioned inputs
//! └── staging/                        in-progress builds, committed by rename
//! ```

pub mod gc;
pub mod vase;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::recipe::Derivation;
use crate::util::hash::RecipeHash;

const STORE_DIR: &str = "store";
const RECIPES_DIR: &str = "recipes";
const MODPACKS_DIR: &str = "modpacks";
const VASES_DIR: &str = "vases";
const STAGING_DIR: &str = "staging";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("recipe not found for hash {0}")]
  RecipeNotFound(RecipeHash),

  #[error("failed to decode recipe {hash}: {source}")]
  RecipeDecode {
    hash: RecipeHash,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Handle to a store root. Cheap to construct; `init` creates the layout.
#[derive(Debug, Clone)]
pub struct Store {
  root: PathBuf,
}

impl Store {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Store { root: root.into() }
  }

  /// Create the store directory layout if it does not exist yet.
  pub fn init(&self) -> io::Result<()> {
    for dir in [STORE_DIR, RECIPES_DIR, MODPACKS_DIR, VASES_DIR] {
      fs::create_dir_all(self.root.join(dir))?;
    }
    Ok(())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn store_dir(&self) -> PathBuf {
    self.root.join(STORE_DIR)
  }

  pub fn recipes_dir(&self) -> PathBuf {
    self.root.join(RECIPES_DIR)
  }

  pub fn modpacks_dir(&self) -> PathBuf {
    self.root.join(MODPACKS_DIR)
  }

  pub fn vases_dir(&self) -> PathBuf {
    self.root.join(VASES_DIR)
  }

  /// Scratch area for in-progress builds. Lives beside `store/` on the same
  /// filesystem so a finished build can be committed with a single rename.
  pub fn staging_dir(&self) -> PathBuf {
    self.root.join(STAGING_DIR)
  }

  pub fn recipe_path(&self, hash: &RecipeHash) -> PathBuf {
    self.recipes_dir().join(format!("{}.json", hash))
  }

  /// Path of a materialised derivation, `store/<out>`.
  pub fn derivation_path(&self, out: &str) -> PathBuf {
    self.store_dir().join(out)
  }

  pub fn modpack_dir(&self, name: &str) -> PathBuf {
    self.modpacks_dir().join(name)
  }

  pub fn vase_path(&self, name: &str) -> PathBuf {
    self.vases_dir().join(name)
  }

  /// Load and decode the recipe document for `hash`.
  pub fn load_recipe(&self, hash: &RecipeHash) -> Result<Derivation, StoreError> {
    let path = self.recipe_path(hash);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        return Err(StoreError::RecipeNotFound(hash.clone()));
      }
      Err(err) => return Err(StoreError::Io(err)),
    };
    serde_json::from_str(&content).map_err(|source| StoreError::RecipeDecode {
      hash: hash.clone(),
      source,
    })
  }

  /// Resolve a recipe hash to the full directory name of its materialised
  /// output by scanning `store/` for a `<hash>-` prefix.
  pub fn find_derivation_by_hash(&self, hash: &RecipeHash) -> Result<Option<String>, StoreError> {
    let store_dir = self.store_dir();
    let entries = match fs::read_dir(&store_dir) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(err) => return Err(StoreError::Io(err)),
    };

    let prefix = format!("{}-", hash);
    for entry in entries.flatten() {
      let name = entry.file_name().to_string_lossy().into_owned();
      if name.starts_with(&prefix) {
        return Ok(Some(name));
      }
    }
    Ok(None)
  }

  /// All derivation directory names currently materialised in `store/`.
  pub fn list_derivations(&self) -> Result<Vec<String>, StoreError> {
    let entries = match fs::read_dir(self.store_dir()) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(err) => return Err(StoreError::Io(err)),
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
      if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
        names.push(entry.file_name().to_string_lossy().into_owned());
      }
    }
    Ok(names)
  }
}

//! Modpack generation registry.
//!
//! Per modpack name, a directory under `modpacks/` holds one symlink per
//! generation, `<hash>-<name>-gen-<N>`, pointing at the store output, plus a
//! `current build` symlink whose target is a generation *name* (relative,
//! never a store path). Registering a build appends a generation and
//! repoints `current build`; rollback only repoints it.
//!
//! Replacement is unlink-then-symlink. The microsecond window with no
//! `current build` is accepted; readers surface `NoActiveBuild` and retry.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

use crate::store::Store;
use crate::util::hash::RecipeHash;

pub const CURRENT_BUILD_LINK: &str = "current build";

const GEN_INFIX: &str = "-gen-";

#[derive(Debug, Error)]
pub enum ModpackError {
  #[error("modpack '{0}' not found")]
  NotFound(String),

  #[error("modpack '{0}' has no active build")]
  NoActiveBuild(String),

  #[error("generation {number} not found for modpack '{modpack}'")]
  GenerationNotFound { modpack: String, number: u32 },

  #[error("invalid generation link name: {0}")]
  InvalidGeneration(String),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// One numbered snapshot of a modpack's build history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
  /// Symlink name, `<hash>-<name>-gen-<N>`.
  pub name: String,
  pub number: u32,
  /// The store path the symlink points at.
  pub target: PathBuf,
}

pub struct ModpackManager<'a> {
  store: &'a Store,
}

impl<'a> ModpackManager<'a> {
  pub fn new(store: &'a Store) -> Self {
    ModpackManager { store }
  }

  /// Names of every registered modpack.
  pub fn list(&self) -> Result<Vec<String>, ModpackError> {
    let entries = match fs::read_dir(self.store.modpacks_dir()) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(err) => return Err(ModpackError::Io(err)),
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

  /// All generations of a modpack, newest first.
  pub fn generations(&self, name: &str) -> Result<Vec<Generation>, ModpackError> {
    let modpack_dir = self.store.modpack_dir(name);
    let entries = match fs::read_dir(&modpack_dir) {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        return Err(ModpackError::NotFound(name.to_string()));
      }
      Err(err) => return Err(ModpackError::Io(err)),
    };

    let mut generations = Vec::new();
    for entry in entries.flatten() {
      let link_name = entry.file_name().to_string_lossy().into_owned();
      if link_name == CURRENT_BUILD_LINK {
        continue;
      }
      let Ok(target) = fs::read_link(entry.path()) else {
        continue;
      };
      if let Some((_, number)) = link_name.rsplit_once(GEN_INFIX)
        && let Ok(number) = number.parse::<u32>()
      {
        generations.push(Generation {
          name: link_name,
          number,
          target,
        });
      }
    }

    generations.sort_by(|a, b| b.number.cmp(&a.number));
    Ok(generations)
  }

  /// The generation `current build` points at.
  pub fn current_generation(&self, name: &str) -> Result<Generation, ModpackError> {
    let modpack_dir = self.store.modpack_dir(name);
    let current = modpack_dir.join(CURRENT_BUILD_LINK);

    let gen_name = fs::read_link(&current)
      .map_err(|_| ModpackError::NoActiveBuild(name.to_string()))?
      .to_string_lossy()
      .into_owned();

    let target = fs::read_link(modpack_dir.join(&gen_name))
      .map_err(|_| ModpackError::NoActiveBuild(name.to_string()))?;

    let number = gen_name
      .rsplit_once(GEN_INFIX)
      .and_then(|(_, n)| n.parse::<u32>().ok())
      .ok_or_else(|| ModpackError::InvalidGeneration(gen_name.clone()))?;

    Ok(Generation {
      name: gen_name,
      number,
      target,
    })
  }

  /// Record a successful build as the next generation and make it current.
  pub fn register_build(
    &self,
    name: &str,
    hash: &RecipeHash,
    store_path: &std::path::Path,
  ) -> Result<Generation, ModpackError> {
    let modpack_dir = self.store.modpack_dir(name);
    fs::create_dir_all(&modpack_dir)?;

    let max = self
      .generations(name)?
      .iter()
      .map(|g| g.number)
      .max()
      .unwrap_or(0);
    let next = max + 1;

    let link_name = format!("{}-{}{}{}", hash, name, GEN_INFIX, next);
    let gen_link = modpack_dir.join(&link_name);

    remove_if_exists(&gen_link)?;
    std::os::unix::fs::symlink(store_path, &gen_link)?;

    let current = modpack_dir.join(CURRENT_BUILD_LINK);
    remove_if_exists(&current)?;
    std::os::unix::fs::symlink(&link_name, &current)?;

    info!(modpack = name, generation = next, "registered build");
    Ok(Generation {
      name: link_name,
      number: next,
      target: store_path.to_path_buf(),
    })
  }

  /// Point `current build` back at generation `number`.
  pub fn rollback(&self, name: &str, number: u32) -> Result<Generation, ModpackError> {
    let generations = self.generations(name)?;
    let target = generations
      .into_iter()
      .find(|g| g.number == number)
      .ok_or_else(|| ModpackError::GenerationNotFound {
        modpack: name.to_string(),
        number,
      })?;

    let current = self.store.modpack_dir(name).join(CURRENT_BUILD_LINK);
    remove_if_exists(&current)?;
    std::os::unix::fs::symlink(&target.name, &current)?;

    info!(modpack = name, generation = number, "rolled back");
    Ok(target)
  }

  /// Remove a modpack's registration. Store outputs are untouched; the next
  /// GC run will reclaim anything no longer reachable.
  pub fn delete(&self, name: &str) -> Result<(), ModpackError> {
    let modpack_dir = self.store.modpack_dir(name);
    if !modpack_dir.exists() {
      return Err(ModpackError::NotFound(name.to_string()));
    }
    fs::remove_dir_all(&modpack_dir)?;
    debug!(modpack = name, "modpack deleted");
    Ok(())
  }

  /// Follow `current build` through the generation link to the store path.
  pub fn resolve_current_build(&self, name: &str) -> Result<PathBuf, ModpackError> {
    Ok(self.current_generation(name)?.target)
  }
}

fn remove_if_exists(path: &std::path::Path) -> io::Result<()> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(err) => Err(err),
  }
}

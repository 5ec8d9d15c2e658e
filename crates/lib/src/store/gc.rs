//! Garbage collection: reachability from modpack generations.
//!
//! Every generation symlink of every modpack is a live root. The mark phase
//! loads each root's recipe and transitively follows its references
//! (dependencies, layers, run-in-build targets), resolving recipe hashes to
//! store directory names by prefix scan. Anything unmarked is swept, then
//! recipe documents that no remaining derivation uses are removed.
//!
//! Missing recipes or store entries are skipped silently so a store that
//! predates the current recipe set still collects cleanly.

use std::collections::HashSet;
use std::fs;
use std::io;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::modpack::CURRENT_BUILD_LINK;
use crate::recipe::DerivationName;
use crate::store::Store;

#[derive(Debug, Error)]
pub enum GcError {
  #[error(transparent)]
  Store(#[from] crate::store::StoreError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Outcome of one collection run. Per-item failures land in `errors`; the
/// sweep keeps going past them.
#[derive(Debug, Default, Serialize)]
pub struct GcResult {
  pub deleted_derivations: Vec<String>,
  pub deleted_recipes: Vec<String>,
  pub errors: Vec<String>,
}

/// Run a collection over `store`. In dry-run mode garbage is reported but
/// nothing is deleted.
pub fn collect_garbage(store: &Store, dry_run: bool) -> Result<GcResult, GcError> {
  let mut result = GcResult::default();

  let roots = live_roots(store)?;
  debug!(count = roots.len(), "collected live roots from modpacks");

  let mut marked: HashSet<String> = HashSet::new();
  for root in &roots {
    mark_reachable(store, root, &mut marked);
  }

  let all = store.list_derivations()?;

  let garbage: Vec<String> = all.iter().filter(|name| !marked.contains(*name)).cloned().collect();

  for name in &garbage {
    result.deleted_derivations.push(name.clone());
    if dry_run {
      continue;
    }
    let path = store.derivation_path(name);
    debug!(path = %path.display(), "removing unreferenced derivation");
    if let Err(err) = fs::remove_dir_all(&path) {
      warn!(path = %path.display(), error = %err, "failed to delete derivation");
      result.errors.push(format!("delete {}: {}", name, err));
    }
  }

  // Orphan recipes are judged against the post-sweep store contents; under
  // dry-run that set is simulated.
  let remaining: HashSet<&String> = all.iter().filter(|name| marked.contains(*name)).collect();
  sweep_orphan_recipes(store, &remaining, dry_run, &mut result)?;

  info!(
    derivations = result.deleted_derivations.len(),
    recipes = result.deleted_recipes.len(),
    errors = result.errors.len(),
    dry_run,
    "garbage collection complete"
  );

  Ok(result)
}

/// Basenames of every generation symlink target across all modpacks.
///
/// The `current build` link is skipped: its target is itself a generation
/// link that the scan already picks up.
fn live_roots(store: &Store) -> Result<Vec<String>, GcError> {
  let modpacks_dir = store.modpacks_dir();
  let entries = match fs::read_dir(&modpacks_dir) {
    Ok(entries) => entries,
    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(err) => return Err(GcError::Io(err)),
  };

  let mut roots = Vec::new();
  for modpack in entries.flatten() {
    if !modpack.file_type().map(|t| t.is_dir()).unwrap_or(false) {
      continue;
    }
    let links = match fs::read_dir(modpack.path()) {
      Ok(links) => links,
      Err(err) => {
        warn!(modpack = %modpack.path().display(), error = %err, "skipping unreadable modpack");
        continue;
      }
    };
    for link in links.flatten() {
      if link.file_name().to_string_lossy() == CURRENT_BUILD_LINK {
        continue;
      }
      let metadata = match fs::symlink_metadata(link.path()) {
        Ok(metadata) => metadata,
        Err(_) => continue,
      };
      if !metadata.file_type().is_symlink() {
        continue;
      }
      let target = match fs::read_link(link.path()) {
        Ok(target) => target,
        Err(_) => continue,
      };
      if let Some(name) = target.file_name() {
        roots.push(name.to_string_lossy().into_owned());
      }
    }
  }
  Ok(roots)
}

/// Transitively mark `name` and everything its recipe references.
fn mark_reachable(store: &Store, name: &str, marked: &mut HashSet<String>) {
  if !marked.insert(name.to_string()) {
    return;
  }

  let Some(parsed) = DerivationName::parse(name) else {
    return;
  };
  let Ok(drv) = store.load_recipe(&parsed.hash) else {
    // Recipe gone; the root itself stays live but contributes no edges.
    return;
  };

  for reference in drv.references() {
    if let Ok(Some(full_name)) = store.find_derivation_by_hash(reference) {
      mark_reachable(store, &full_name, marked);
    }
  }
}

fn sweep_orphan_recipes(
  store: &Store,
  remaining: &HashSet<&String>,
  dry_run: bool,
  result: &mut GcResult,
) -> Result<(), GcError> {
  let entries = match fs::read_dir(store.recipes_dir()) {
    Ok(entries) => entries,
    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(err) => return Err(GcError::Io(err)),
  };

  for entry in entries.flatten() {
    let path = entry.path();
    if path.extension().map(|e| e != "json").unwrap_or(true) {
      continue;
    }
    let Some(hash) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
      continue;
    };

    let prefix = format!("{}-", hash);
    let used = remaining.iter().any(|name| name.starts_with(&prefix));
    if used {
      continue;
    }

    result.deleted_recipes.push(hash.clone());
    if dry_run {
      continue;
    }
    debug!(path = %path.display(), "removing orphan recipe");
    if let Err(err) = fs::remove_file(&path) {
      warn!(path = %path.display(), error = %err, "failed to delete recipe");
      result.errors.push(format!("delete recipe {}: {}", hash, err));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::modpack::ModpackManager;
  use crate::util::hash::RecipeHash;
  use crate::util::testutil::{hex_hash, temp_store, write_recipe, write_text_derivation};

  /// Materialise a fake store output and its recipe, returning the out name.
  fn seed_derivation(store: &Store, hash_char: char, name: &str) -> String {
    let drv = write_text_derivation(&hex_hash(hash_char), name, "1", "file.txt", "x");
    write_recipe(store, &drv);
    let path = store.derivation_path(&drv.out);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("file.txt"), "x").unwrap();
    drv.out
  }

  fn register(store: &Store, modpack: &str, hash_char: char, out: &str) {
    let manager = ModpackManager::new(store);
    manager
      .register_build(modpack, &RecipeHash(hex_hash(hash_char)), &store.derivation_path(out))
      .unwrap();
  }

  #[test]
  fn unreferenced_derivation_is_swept() {
    let (_temp, store) = temp_store();
    let live = seed_derivation(&store, 'a', "live");
    let dead = seed_derivation(&store, 'b', "dead");
    register(&store, "mypack", 'a', &live);

    let result = collect_garbage(&store, false).unwrap();

    assert_eq!(result.deleted_derivations, vec![dead.clone()]);
    assert!(store.derivation_path(&live).exists());
    assert!(!store.derivation_path(&dead).exists());
    assert!(result.errors.is_empty());
  }

  #[test]
  fn dry_run_reports_without_deleting() {
    let (_temp, store) = temp_store();
    let dead = seed_derivation(&store, 'b', "dead");

    let result = collect_garbage(&store, true).unwrap();

    assert_eq!(result.deleted_derivations, vec![dead.clone()]);
    assert!(store.derivation_path(&dead).exists());
    assert!(store.recipe_path(&RecipeHash(hex_hash('b'))).exists());
  }

  #[test]
  fn dependencies_of_roots_stay_alive() {
    let (_temp, store) = temp_store();
    let dep = seed_derivation(&store, 'c', "dep");

    let mut root = write_text_derivation(&hex_hash('d'), "root", "1", "file.txt", "x");
    root.dependencies = vec![RecipeHash(hex_hash('c'))];
    write_recipe(&store, &root);
    fs::create_dir_all(store.derivation_path(&root.out)).unwrap();
    register(&store, "mypack", 'd', &root.out);

    let result = collect_garbage(&store, false).unwrap();

    assert!(result.deleted_derivations.is_empty());
    assert!(store.derivation_path(&dep).exists());
  }

  #[test]
  fn layers_of_composed_roots_stay_alive() {
    let (_temp, store) = temp_store();
    let layer = seed_derivation(&store, 'a', "layer");

    let root = crate::recipe::Derivation {
      out: format!("{}-composed-1", hex_hash('e')),
      src: crate::recipe::Source::FetchBuild {
        layers: vec![RecipeHash(hex_hash('a'))],
        entrypoint: None,
        args: vec![],
        env: Default::default(),
        permissions: vec![],
        umu: None,
      },
      dependencies: vec![],
      postbuild: None,
    };
    write_recipe(&store, &root);
    fs::create_dir_all(store.derivation_path(&root.out)).unwrap();
    register(&store, "mypack", 'e', &root.out);

    let result = collect_garbage(&store, false).unwrap();

    assert!(result.deleted_derivations.is_empty());
    assert!(store.derivation_path(&layer).exists());
  }

  #[test]
  fn retired_modpack_outputs_become_garbage() {
    let (_temp, store) = temp_store();
    let keep = seed_derivation(&store, 'a', "keep");
    let retired = seed_derivation(&store, 'b', "retired");
    register(&store, "active", 'a', &keep);
    register(&store, "retired", 'b', &retired);

    let manager = ModpackManager::new(&store);
    manager.delete("retired").unwrap();

    let dry = collect_garbage(&store, true).unwrap();
    assert_eq!(dry.deleted_derivations, vec![retired.clone()]);
    assert!(store.derivation_path(&retired).exists());

    let real = collect_garbage(&store, false).unwrap();
    assert_eq!(real.deleted_derivations, vec![retired.clone()]);
    assert!(!store.derivation_path(&retired).exists());
    assert!(store.derivation_path(&keep).exists());
  }

  #[test]
  fn orphan_recipe_is_removed_after_sweep() {
    let (_temp, store) = temp_store();
    let dead = seed_derivation(&store, 'b', "dead");

    let result = collect_garbage(&store, false).unwrap();

    assert_eq!(result.deleted_derivations, vec![dead]);
    assert_eq!(result.deleted_recipes, vec![hex_hash('b')]);
    assert!(!store.recipe_path(&RecipeHash(hex_hash('b'))).exists());
  }

  #[test]
  fn recipe_of_live_derivation_is_kept() {
    let (_temp, store) = temp_store();
    let live = seed_derivation(&store, 'a', "live");
    register(&store, "mypack", 'a', &live);

    let result = collect_garbage(&store, false).unwrap();

    assert!(result.deleted_recipes.is_empty());
    assert!(store.recipe_path(&RecipeHash(hex_hash('a'))).exists());
  }

  #[test]
  fn empty_store_collects_cleanly() {
    let (_temp, store) = temp_store();
    let result = collect_garbage(&store, false).unwrap();
    assert!(result.deleted_derivations.is_empty());
    assert!(result.deleted_recipes.is_empty());
    assert!(result.errors.is_empty());
  }
}

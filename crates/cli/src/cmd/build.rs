use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use kintsugi_lib::store_lock::{LockMode, StoreLock};
use kintsugi_lib::{Compiler, ModpackManager, RecipeHash, Store};

use crate::output::{format_duration, print_success, truncate_hash};

pub fn cmd_build(
  root: &Path,
  root_hash: &str,
  register: Option<&str>,
  modpack_path: Option<&Path>,
) -> Result<()> {
  let start = Instant::now();

  let store = Store::new(root);
  store.init().context("failed to initialise store layout")?;

  let _lock = StoreLock::acquire(root, LockMode::Exclusive, "build").context("failed to acquire store lock")?;

  let mut compiler = Compiler::new(&store);
  if let Some(path) = modpack_path {
    compiler = compiler.with_modpack_root(path);
  }

  let hash = RecipeHash(root_hash.to_string());
  let count = compiler.build_all(&hash).context("build failed")?;

  print_success(&format!(
    "Built {} derivation(s) in {}",
    count,
    format_duration(start.elapsed())
  ));

  if let Some(name) = register {
    let full_name = store
      .find_derivation_by_hash(&hash)
      .context("failed to scan store")?
      .with_context(|| format!("built derivation {} not found in store", truncate_hash(root_hash)))?;
    let store_path = store.derivation_path(&full_name);

    let manager = ModpackManager::new(&store);
    let generation = manager
      .register_build(name, &hash, &store_path)
      .context("failed to register build")?;

    print_success(&format!("Active build for '{}' is now: {}", name, generation.name));
  }

  Ok(())
}

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use kintsugi_lib::Store;
use kintsugi_lib::store::gc::collect_garbage;
use kintsugi_lib::store_lock::{LockMode, StoreLock};

use crate::output::{OutputFormat, format_duration, print_error, print_info, print_json, print_stat, print_success};

pub fn cmd_gc(root: &Path, dry_run: bool, output: OutputFormat) -> Result<()> {
  let start = Instant::now();

  let store = Store::new(root);
  store.init().context("failed to initialise store layout")?;

  let _lock = StoreLock::acquire(root, LockMode::Exclusive, "gc").context("failed to acquire store lock")?;

  let result = collect_garbage(&store, dry_run).context("garbage collection failed")?;

  if output.is_json() {
    print_json(&result)?;
    return Ok(());
  }

  if dry_run {
    print_info("Dry run - no changes made");
    for name in &result.deleted_derivations {
      print_stat("would delete", name);
    }
    for hash in &result.deleted_recipes {
      print_stat("would delete recipe", hash);
    }
  } else {
    print_success("Garbage collection complete");
  }

  print_stat("Derivations removed", &result.deleted_derivations.len().to_string());
  print_stat("Recipes removed", &result.deleted_recipes.len().to_string());
  print_stat("Duration", &format_duration(start.elapsed()));

  for error in &result.errors {
    print_error(error);
  }

  Ok(())
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use kintsugi_lib::Store;
use kintsugi_lib::store_lock::{LockMode, StoreLock};

use crate::output::{print_info, print_success};

#[derive(Subcommand)]
pub enum VaseCommand {
  /// Register a new version of a vase from a local path
  Add { name: String, path: PathBuf },

  /// Remove a versioned vase (refused while recipes reference it)
  Remove { name: String },

  /// List registered vases
  List,
}

pub fn cmd_vase(root: &Path, command: VaseCommand) -> Result<()> {
  let store = Store::new(root);
  store.init().context("failed to initialise store layout")?;

  match command {
    VaseCommand::Add { name, path } => {
      let _lock = StoreLock::acquire(root, LockMode::Exclusive, "vase add").context("failed to acquire store lock")?;
      let versioned = store.add_vase(&name, &path)?;
      print_success(&format!("Vase created: {}", versioned));
    }
    VaseCommand::Remove { name } => {
      let _lock =
        StoreLock::acquire(root, LockMode::Exclusive, "vase remove").context("failed to acquire store lock")?;
      store.remove_vase(&name)?;
      print_success(&format!("Vase removed: {}", name));
    }
    VaseCommand::List => {
      let vases = store.list_vases()?;
      if vases.is_empty() {
        print_info("No vases found.");
        return Ok(());
      }
      for vase in vases {
        println!("{}", vase);
      }
    }
  }

  Ok(())
}

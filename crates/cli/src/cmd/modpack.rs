use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use kintsugi_lib::{ModpackManager, Store};

use crate::output::{print_info, print_stat, print_success, symbols};

#[derive(Subcommand)]
pub enum ModpackCommand {
  /// List registered modpacks
  List,

  /// List the generations of a modpack, newest first
  Generations { name: String },

  /// Show the current generation of a modpack
  Current { name: String },

  /// Point a modpack back at an earlier generation
  Rollback { name: String, generation: u32 },

  /// Remove a modpack's registration (store outputs are kept)
  Delete { name: String },
}

pub fn cmd_modpack(root: &Path, command: ModpackCommand) -> Result<()> {
  let store = Store::new(root);
  store.init().context("failed to initialise store layout")?;
  let manager = ModpackManager::new(&store);

  match command {
    ModpackCommand::List => {
      let modpacks = manager.list()?;
      if modpacks.is_empty() {
        print_info("No modpacks registered.");
        return Ok(());
      }
      for name in modpacks {
        println!("{}", name);
      }
    }
    ModpackCommand::Generations { name } => {
      let generations = manager.generations(&name)?;
      for generation in generations {
        println!(
          "  {} gen {} {} {}",
          symbols::INFO,
          generation.number,
          symbols::ARROW,
          generation.target.display()
        );
      }
    }
    ModpackCommand::Current { name } => {
      let generation = manager.current_generation(&name)?;
      print_stat("generation", &generation.number.to_string());
      print_stat("target", &generation.target.display().to_string());
    }
    ModpackCommand::Rollback { name, generation } => {
      let rolled = manager.rollback(&name, generation)?;
      print_success(&format!("'{}' rolled back to generation {}", name, rolled.number));
    }
    ModpackCommand::Delete { name } => {
      manager.delete(&name)?;
      print_success(&format!("Modpack '{}' deleted", name));
    }
  }

  Ok(())
}

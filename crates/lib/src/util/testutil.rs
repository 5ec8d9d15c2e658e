//! Shared helpers for unit tests.

use std::fs;

use tempfile::TempDir;

use crate::recipe::{Derivation, Source};
use crate::store::Store;
use crate::util::hash::RecipeHash;

/// A 32-character pseudo recipe hash made of one repeated hex digit.
pub fn hex_hash(c: char) -> String {
  std::iter::repeat_n(c, 32).collect()
}

/// An initialised store rooted in a fresh temp directory.
pub fn temp_store() -> (TempDir, Store) {
  let temp = TempDir::new().unwrap();
  let store = Store::new(temp.path());
  store.init().unwrap();
  (temp, store)
}

/// Serialize `drv` into `recipes/<hash>.json` and return the hash, taken
/// from the first 32 characters of `out`.
pub fn write_recipe(store: &Store, drv: &Derivation) -> RecipeHash {
  let hash = RecipeHash(drv.out[..32].to_string());
  let json = serde_json::to_string_pretty(drv).unwrap();
  fs::write(store.recipe_path(&hash), json).unwrap();
  hash
}

/// A `write_text` derivation named `<hash>-<name>-<version>`.
pub fn write_text_derivation(hash: &str, name: &str, version: &str, path: &str, content: &str) -> Derivation {
  Derivation {
    out: format!("{}-{}-{}", hash, name, version),
    src: Source::WriteText {
      path: path.to_string(),
      content: content.to_string(),
    },
    dependencies: vec![],
    postbuild: None,
  }
}

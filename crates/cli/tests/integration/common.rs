//! Shared helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// Isolated test environment: every test gets its own store root.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    TestEnv {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().join("kintsugi-root")
  }

  /// A pre-configured command for the kintsugi binary pointed at the
  /// isolated store root.
  pub fn kintsugi(&self) -> Command {
    let mut cmd = Command::cargo_bin("kintsugi").unwrap();
    cmd.arg("--root").arg(self.root());
    cmd
  }

  /// Write a recipe document for `hash` (32 hex chars) into the store's
  /// recipes directory.
  pub fn write_recipe(&self, hash: &str, recipe: serde_json::Value) {
    let recipes = self.root().join("recipes");
    std::fs::create_dir_all(&recipes).unwrap();
    std::fs::write(
      recipes.join(format!("{}.json", hash)),
      serde_json::to_string_pretty(&recipe).unwrap(),
    )
    .unwrap();
  }

  pub fn store_path(&self, out: &str) -> PathBuf {
    self.root().join("store").join(out)
  }

  /// A 32-character pseudo hash.
  pub fn hex_hash(c: char) -> String {
    std::iter::repeat_n(c, 32).collect()
  }

  /// Register a `write_text` recipe producing one file, returning its hash.
  pub fn seed_text_recipe(&self, c: char, name: &str, path: &str, content: &str) -> String {
    let hash = Self::hex_hash(c);
    self.write_recipe(
      &hash,
      serde_json::json!({
        "out": format!("{}-{}-1", hash, name),
        "src": { "type": "write_text", "path": path, "content": content },
        "dependencies": []
      }),
    );
    hash
  }
}

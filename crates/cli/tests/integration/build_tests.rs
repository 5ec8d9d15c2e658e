use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_write_text_materialises_output() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "hello", "greet.txt", "hi");

  env
    .kintsugi()
    .args(["build", &hash])
    .assert()
    .success()
    .stdout(predicate::str::contains("Built 1 derivation"));

  let out = env.store_path(&format!("{}-hello-1", hash)).join("greet.txt");
  assert_eq!(std::fs::read_to_string(out).unwrap(), "hi");
}

#[test]
fn second_build_is_a_cache_hit() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "hello", "greet.txt", "hi");

  env.kintsugi().args(["build", &hash]).assert().success();

  // Tamper with the output; the cached second run must leave it alone.
  let out = env.store_path(&format!("{}-hello-1", hash)).join("greet.txt");
  std::fs::write(&out, "tampered").unwrap();

  env.kintsugi().args(["build", &hash]).assert().success();
  assert_eq!(std::fs::read_to_string(&out).unwrap(), "tampered");
}

#[test]
fn layered_build_last_layer_wins() {
  let env = TestEnv::new();
  let a = env.seed_text_recipe('a', "la", "etc/x", "A");
  let b = env.seed_text_recipe('b', "lb", "etc/x", "B");

  let c = TestEnv::hex_hash('c');
  env.write_recipe(
    &c,
    serde_json::json!({
      "out": format!("{}-composed-1", c),
      "src": { "type": "fetch_build", "layers": [a, b] },
      "dependencies": []
    }),
  );

  env
    .kintsugi()
    .args(["build", &c])
    .assert()
    .success()
    .stdout(predicate::str::contains("Built 3 derivation"));

  let merged = env.store_path(&format!("{}-composed-1", c)).join("etc/x");
  assert_eq!(std::fs::read_to_string(merged).unwrap(), "B");
}

#[test]
fn build_with_register_creates_generation() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "mypack", "data.txt", "x");

  env
    .kintsugi()
    .args(["build", &hash, "--register", "mypack"])
    .assert()
    .success()
    .stdout(predicate::str::contains("gen-1"));

  let modpack_dir = env.root().join("modpacks/mypack");
  assert!(modpack_dir.join("current build").is_symlink());
}

#[test]
fn failing_postbuild_aborts_with_error() {
  let env = TestEnv::new();
  let hash = TestEnv::hex_hash('a');
  env.write_recipe(
    &hash,
    serde_json::json!({
      "out": format!("{}-broken-1", hash),
      "src": { "type": "write_text", "path": "f.txt", "content": "x" },
      "dependencies": [],
      "postbuild": "exit 1"
    }),
  );

  env.kintsugi().args(["build", &hash]).assert().failure();
  assert!(!env.store_path(&format!("{}-broken-1", hash)).exists());
}

#[test]
fn unknown_source_kind_fails_decode() {
  let env = TestEnv::new();
  let hash = TestEnv::hex_hash('a');
  env.write_recipe(
    &hash,
    serde_json::json!({
      "out": format!("{}-mystery-1", hash),
      "src": { "type": "fetch_mystery" },
      "dependencies": []
    }),
  );

  env
    .kintsugi()
    .args(["build", &hash])
    .assert()
    .failure()
    .stderr(predicate::str::contains("build"));
}

use predicates::prelude::*;

use super::common::TestEnv;

fn seed_source(env: &TestEnv) -> std::path::PathBuf {
  let src = env.temp.path().join("textures-src");
  std::fs::create_dir_all(&src).unwrap();
  std::fs::write(src.join("grass.png"), "png").unwrap();
  src
}

#[test]
fn add_and_list_vases() {
  let env = TestEnv::new();
  let src = seed_source(&env);

  env
    .kintsugi()
    .args(["vase", "add", "textures"])
    .arg(&src)
    .assert()
    .success()
    .stdout(predicate::str::contains("textures-1"));

  env
    .kintsugi()
    .args(["vase", "add", "textures"])
    .arg(&src)
    .assert()
    .success()
    .stdout(predicate::str::contains("textures-2"));

  env
    .kintsugi()
    .args(["vase", "list"])
    .assert()
    .success()
    .stdout(predicate::str::contains("textures-1"))
    .stdout(predicate::str::contains("textures-2"));
}

#[test]
fn vase_feeds_fetch_vase_build() {
  let env = TestEnv::new();
  let src = seed_source(&env);
  env
    .kintsugi()
    .args(["vase", "add", "textures"])
    .arg(&src)
    .assert()
    .success();

  let hash = TestEnv::hex_hash('a');
  env.write_recipe(
    &hash,
    serde_json::json!({
      "out": format!("{}-texpack-1", hash),
      "src": { "type": "fetch_vase", "vase": "textures-1" },
      "dependencies": []
    }),
  );

  env.kintsugi().args(["build", &hash]).assert().success();
  assert!(env.store_path(&format!("{}-texpack-1", hash)).join("grass.png").exists());
}

#[test]
fn referenced_vase_cannot_be_removed() {
  let env = TestEnv::new();
  let src = seed_source(&env);
  env
    .kintsugi()
    .args(["vase", "add", "textures"])
    .arg(&src)
    .assert()
    .success();

  let hash = TestEnv::hex_hash('a');
  env.write_recipe(
    &hash,
    serde_json::json!({
      "out": format!("{}-texpack-1", hash),
      "src": { "type": "fetch_vase", "vase": "textures-1" },
      "dependencies": []
    }),
  );

  env
    .kintsugi()
    .args(["vase", "remove", "textures-1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("still referenced"));

  // Unreferenced versions can go.
  env.kintsugi().args(["vase", "add", "sounds"]).arg(&src).assert().success();
  env.kintsugi().args(["vase", "remove", "sounds-1"]).assert().success();
}

#[test]
fn remove_missing_vase_fails() {
  let env = TestEnv::new();
  env
    .kintsugi()
    .args(["vase", "remove", "nothing-1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not found"));
}

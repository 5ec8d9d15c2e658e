use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn three_registrations_then_rollback_to_first() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "mypack", "f.txt", "x");

  for _ in 0..3 {
    env
      .kintsugi()
      .args(["build", &hash, "--register", "mypack"])
      .assert()
      .success();
  }

  env
    .kintsugi()
    .args(["modpack", "current", "mypack"])
    .assert()
    .success()
    .stdout(predicate::str::contains("generation: 3"));

  env
    .kintsugi()
    .args(["modpack", "rollback", "mypack", "1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("rolled back to generation 1"));

  env
    .kintsugi()
    .args(["modpack", "current", "mypack"])
    .assert()
    .success()
    .stdout(predicate::str::contains("generation: 1"))
    .stdout(predicate::str::contains(format!("{}-mypack-1", hash)));
}

#[test]
fn generations_lists_newest_first() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "mypack", "f.txt", "x");

  env
    .kintsugi()
    .args(["build", &hash, "--register", "mypack"])
    .assert()
    .success();
  env
    .kintsugi()
    .args(["build", &hash, "--register", "mypack"])
    .assert()
    .success();

  let output = env
    .kintsugi()
    .args(["modpack", "generations", "mypack"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();
  let text = String::from_utf8(output).unwrap();
  let gen2 = text.find("gen 2").expect("gen 2 listed");
  let gen1 = text.find("gen 1").expect("gen 1 listed");
  assert!(gen2 < gen1);
}

#[test]
fn rollback_to_unknown_generation_fails() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "mypack", "f.txt", "x");
  env
    .kintsugi()
    .args(["build", &hash, "--register", "mypack"])
    .assert()
    .success();

  env
    .kintsugi()
    .args(["modpack", "rollback", "mypack", "7"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("generation 7 not found"));
}

#[test]
fn current_without_builds_reports_no_active_build() {
  let env = TestEnv::new();
  std::fs::create_dir_all(env.root().join("modpacks/ghost")).unwrap();

  env
    .kintsugi()
    .args(["modpack", "current", "ghost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no active build"));
}

#[test]
fn delete_keeps_store_outputs() {
  let env = TestEnv::new();
  let hash = env.seed_text_recipe('a', "mypack", "f.txt", "x");
  env
    .kintsugi()
    .args(["build", &hash, "--register", "mypack"])
    .assert()
    .success();

  env.kintsugi().args(["modpack", "delete", "mypack"]).assert().success();

  assert!(!env.root().join("modpacks/mypack").exists());
  assert!(env.store_path(&format!("{}-mypack-1", hash)).exists());
}

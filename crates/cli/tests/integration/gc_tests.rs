use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn gc_dry_run_reports_but_keeps_garbage() {
  let env = TestEnv::new();
  let keep = env.seed_text_recipe('a', "keep", "f.txt", "x");
  let drop = env.seed_text_recipe('b', "drop", "f.txt", "x");

  env
    .kintsugi()
    .args(["build", &keep, "--register", "active"])
    .assert()
    .success();
  env.kintsugi().args(["build", &drop]).assert().success();

  let dropped_out = env.store_path(&format!("{}-drop-1", drop));
  env
    .kintsugi()
    .args(["gc", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"))
    .stdout(predicate::str::contains(format!("{}-drop-1", drop)));
  assert!(dropped_out.exists());
}

#[test]
fn gc_removes_unreachable_and_keeps_reachable() {
  let env = TestEnv::new();
  let keep = env.seed_text_recipe('a', "keep", "f.txt", "x");
  let drop = env.seed_text_recipe('b', "drop", "f.txt", "x");

  env
    .kintsugi()
    .args(["build", &keep, "--register", "active"])
    .assert()
    .success();
  env.kintsugi().args(["build", &drop]).assert().success();

  env.kintsugi().arg("gc").assert().success();

  assert!(env.store_path(&format!("{}-keep-1", keep)).exists());
  assert!(!env.store_path(&format!("{}-drop-1", drop)).exists());
  // The orphaned recipe document goes with it.
  assert!(!env.root().join("recipes").join(format!("{}.json", drop)).exists());
}

#[test]
fn retired_modpack_is_collected() {
  let env = TestEnv::new();
  let keep = env.seed_text_recipe('a', "keep", "f.txt", "x");
  let retired = env.seed_text_recipe('b', "retired", "f.txt", "x");

  env
    .kintsugi()
    .args(["build", &keep, "--register", "active"])
    .assert()
    .success();
  env
    .kintsugi()
    .args(["build", &retired, "--register", "old"])
    .assert()
    .success();

  env.kintsugi().args(["modpack", "delete", "old"]).assert().success();
  env.kintsugi().arg("gc").assert().success();

  assert!(env.store_path(&format!("{}-keep-1", keep)).exists());
  assert!(!env.store_path(&format!("{}-retired-1", retired)).exists());
}

#[test]
fn gc_json_output_has_result_shape() {
  let env = TestEnv::new();

  let output = env
    .kintsugi()
    .args(["gc", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert!(parsed["deleted_derivations"].is_array());
  assert!(parsed["deleted_recipes"].is_array());
  assert!(parsed["errors"].is_array());
}

//! Thin launcher for the external processes the engine leans on: `sh` for
//! postFetch/postbuild snippets, `git` for clones, `7z` for archives the
//! built-in readers do not cover, and the entrypoint (native or through
//! `umu-run`) of an overlay execution.

use std::io;
use std::path::Path;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::recipe::RunCommand;

#[derive(Debug, Error)]
pub enum ProcessError {
  #[error("failed to spawn {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: io::Error,
  },

  #[error("{phase} exited with status {code:?}")]
  Exit { phase: String, code: Option<i32> },
}

fn check_status(phase: &str, status: std::process::ExitStatus) -> Result<(), ProcessError> {
  if status.success() {
    Ok(())
  } else {
    Err(ProcessError::Exit {
      phase: phase.to_string(),
      code: status.code(),
    })
  }
}

/// Run a shell snippet with `sh -c` in `dir`, inheriting stdio.
///
/// Empty snippets are a no-op so callers can pass optional scripts through
/// unconditionally.
pub fn run_shell(script: &str, dir: &Path, phase: &str) -> Result<(), ProcessError> {
  if script.is_empty() {
    return Ok(());
  }
  info!(phase, dir = %dir.display(), "running script");

  let status = Command::new("sh")
    .arg("-c")
    .arg(script)
    .current_dir(dir)
    .status()
    .map_err(|source| ProcessError::Spawn {
      program: "sh".to_string(),
      source,
    })?;
  check_status(phase, status)
}

/// Invoke `git` with the given arguments, inheriting stdio.
pub fn run_git(args: &[&str]) -> Result<(), ProcessError> {
  debug!(?args, "invoking git");
  let status = Command::new("git")
    .args(args)
    .status()
    .map_err(|source| ProcessError::Spawn {
      program: "git".to_string(),
      source,
    })?;
  let phase = format!("git {}", args.first().copied().unwrap_or(""));
  check_status(&phase, status)
}

/// Extract a 7z archive through the external `7z` binary.
pub fn extract_7z(archive: &Path, dest: &Path) -> Result<(), ProcessError> {
  // 7z wants the -o path to end with a separator.
  let output = Command::new("7z")
    .arg("x")
    .arg(format!("-o{}/", dest.display()))
    .arg("-y")
    .arg(archive)
    .output()
    .map_err(|source| ProcessError::Spawn {
      program: "7z".to_string(),
      source,
    })?;

  if !output.status.success() {
    debug!(
      stderr = %String::from_utf8_lossy(&output.stderr),
      "7z extraction output"
    );
  }
  check_status("7z", output.status)
}

/// Spawn the entrypoint of an overlay execution with `merged` as its working
/// directory, either natively or through the `umu-run` launcher. Stdio is
/// inherited so the command's output interleaves with the build log.
pub fn run_entrypoint(merged: &Path, command: &RunCommand) -> Result<(), ProcessError> {
  let mut cmd = match &command.umu {
    Some(umu) => {
      let mut cmd = Command::new("umu-run");
      cmd
        .arg("run")
        .arg("--umu-version")
        .arg(&umu.version)
        .arg("--umu-appid")
        .arg(&umu.id)
        .arg(&command.entrypoint)
        .args(&command.args);
      cmd
    }
    None => {
      let mut cmd = Command::new(merged.join(&command.entrypoint));
      cmd.args(&command.args);
      cmd
    }
  };

  info!(entrypoint = %command.entrypoint, umu = command.umu.is_some(), "executing entrypoint");

  let status = cmd
    .current_dir(merged)
    .status()
    .map_err(|source| ProcessError::Spawn {
      program: command.entrypoint.clone(),
      source,
    })?;
  check_status("entrypoint", status)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn empty_script_is_a_noop() {
    let temp = TempDir::new().unwrap();
    run_shell("", temp.path(), "postbuild").unwrap();
  }

  #[test]
  fn script_runs_in_given_directory() {
    let temp = TempDir::new().unwrap();
    run_shell("echo done > marker.txt", temp.path(), "postFetch").unwrap();
    assert!(temp.path().join("marker.txt").exists());
  }

  #[test]
  fn failing_script_reports_exit_code() {
    let temp = TempDir::new().unwrap();
    let result = run_shell("exit 3", temp.path(), "postbuild");
    assert!(matches!(
      result,
      Err(ProcessError::Exit { code: Some(3), .. })
    ));
  }

  #[test]
  fn missing_binary_is_a_spawn_error() {
    let temp = TempDir::new().unwrap();
    let command = RunCommand {
      entrypoint: "does/not/exist".into(),
      args: vec![],
      umu: None,
    };
    let result = run_entrypoint(temp.path(), &command);
    assert!(matches!(result, Err(ProcessError::Spawn { .. })));
  }

  #[test]
  fn native_entrypoint_runs_relative_to_merged() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("bin/tool");
    std::fs::create_dir_all(script.parent().unwrap()).unwrap();
    std::fs::write(&script, "#!/bin/sh\ntouch ran.txt\n").unwrap();

    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let command = RunCommand {
      entrypoint: "bin/tool".into(),
      args: vec![],
      umu: None,
    };
    run_entrypoint(temp.path(), &command).unwrap();
    assert!(temp.path().join("ran.txt").exists());
  }
}

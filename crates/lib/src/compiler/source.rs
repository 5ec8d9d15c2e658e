//! Per-kind build strategies. Each builder materialises one derivation into
//! the staging directory handed to it; the compiler commits or discards the
//! result.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::consts::ENV_MODPACK_PATH;
use crate::fsutil::archive::extract_archive;
use crate::fsutil::copy::{copy_dir, copy_file};
use crate::fsutil::link::link_tree;
use crate::process;
use crate::recipe::{Derivation, DerivationName, RunSpec, Source};

use super::{BuildError, Compiler};

/// Directory inside a composed build where the run spec lands.
const RUN_SPEC_DIR: &str = "kintsugi/exec";

impl Compiler<'_> {
  pub(super) fn build_source(&self, drv: &Derivation, dest: &Path) -> Result<(), BuildError> {
    match &drv.src {
      Source::FetchLocal {
        path,
        exclude,
        post_fetch,
      } => self.build_local(path, exclude, post_fetch.as_deref(), dest),
      Source::FetchUrl {
        url,
        sha256,
        unpack,
        post_fetch,
      } => self.build_url(url, sha256, *unpack, post_fetch.as_deref(), dest),
      Source::FetchGit {
        url,
        rev,
        git_ref,
        post_fetch,
      } => self.build_git(url, rev.as_deref(), git_ref.as_deref(), post_fetch.as_deref(), dest),
      Source::FetchVase { vase } => self.build_vase(vase, dest),
      Source::WriteText { path, content } => write_output_file(dest, path, content.as_bytes()),
      Source::WriteJson { path, content } => {
        let data = serde_json::to_string_pretty(content)?;
        write_output_file(dest, path, data.as_bytes())
      }
      Source::WriteToml { path, content } => {
        let data = toml::to_string_pretty(content)?;
        write_output_file(dest, path, data.as_bytes())
      }
      Source::FetchBuild { .. } => self.build_composite(drv, dest),
      Source::RunInBuild {
        build,
        command,
        outputs,
      } => super::overlay::run_in_build(self.store(), build, command, outputs, dest),
      Source::BlankSource => {
        fs::create_dir_all(dest)?;
        Ok(())
      }
    }
  }

  /// Copy a local file or directory into the output.
  ///
  /// Relative paths resolve against the compiler's modpack root, falling
  /// back to `KINTSUGI_MODPACK_PATH` and finally the working directory.
  fn build_local(
    &self,
    path: &str,
    exclude: &[String],
    post_fetch: Option<&str>,
    dest: &Path,
  ) -> Result<(), BuildError> {
    let mut source = PathBuf::from(path);
    if source.is_relative() {
      let base = match self.modpack_root() {
        Some(root) => root.to_path_buf(),
        None => match std::env::var(ENV_MODPACK_PATH) {
          Ok(path) => PathBuf::from(path),
          Err(_) => std::env::current_dir()?,
        },
      };
      source = base.join(source);
    }

    if !source.exists() {
      return Err(BuildError::SourceMissing(source));
    }

    fs::create_dir_all(dest)?;
    if source.is_dir() {
      copy_dir(&source, dest, exclude)?;
    } else {
      let file_name = source.file_name().map(PathBuf::from).unwrap_or_else(|| "source".into());
      copy_file(&source, &dest.join(file_name))?;
    }

    process::run_shell(post_fetch.unwrap_or(""), dest, "postFetch")?;
    Ok(())
  }

  /// Download a file, verifying its SHA-256 while streaming to disk.
  fn build_url(
    &self,
    url: &str,
    expected_sha256: &str,
    unpack: bool,
    post_fetch: Option<&str>,
    dest: &Path,
  ) -> Result<(), BuildError> {
    info!(url, "downloading");

    let mut response = reqwest::blocking::get(url).map_err(|e| BuildError::Download {
      url: url.to_string(),
      message: e.to_string(),
    })?;
    if !response.status().is_success() {
      return Err(BuildError::Download {
        url: url.to_string(),
        message: format!("HTTP {}", response.status()),
      });
    }

    fs::create_dir_all(dest)?;
    let file_name = filename_from_url(url);
    let archive_path = dest.join(&file_name);

    let mut file = fs::File::create(&archive_path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
      let n = response.read(&mut buffer).map_err(|e| BuildError::Download {
        url: url.to_string(),
        message: e.to_string(),
      })?;
      if n == 0 {
        break;
      }
      hasher.update(&buffer[..n]);
      file.write_all(&buffer[..n])?;
    }
    file.flush()?;
    drop(file);

    let actual = hex::encode(hasher.finalize());
    if actual != expected_sha256 {
      return Err(BuildError::HashMismatch {
        url: url.to_string(),
        expected: expected_sha256.to_string(),
        actual,
      });
    }
    debug!(sha256 = %actual, "download verified");

    if unpack {
      extract_archive(&archive_path, dest)?;
      fs::remove_file(&archive_path)?;
      debug!(archive = %file_name, "extracted and removed archive");
    }

    process::run_shell(post_fetch.unwrap_or(""), dest, "postFetch")?;
    Ok(())
  }

  /// Clone a repository, check out the requested target (`rev` wins over
  /// `ref`), strip the `.git` metadata and copy the worktree.
  fn build_git(
    &self,
    url: &str,
    rev: Option<&str>,
    git_ref: Option<&str>,
    post_fetch: Option<&str>,
    dest: &Path,
  ) -> Result<(), BuildError> {
    fs::create_dir_all(dest)?;

    let scratch = tempfile::Builder::new()
      .prefix("kintsugi-git-")
      .tempdir()?;
    let checkout = scratch.path().to_string_lossy().into_owned();

    process::run_git(&["clone", url, &checkout]).map_err(BuildError::Git)?;

    if let Some(target) = rev.or(git_ref) {
      process::run_git(&["-C", &checkout, "checkout", target]).map_err(BuildError::Git)?;
    }

    let git_dir = scratch.path().join(".git");
    if git_dir.exists() {
      fs::remove_dir_all(&git_dir)?;
    }

    copy_dir(scratch.path(), dest, &[])?;
    process::run_shell(post_fetch.unwrap_or(""), dest, "postFetch")?;
    Ok(())
  }

  /// Hardlink-mirror a registered vase into the output.
  fn build_vase(&self, vase: &str, dest: &Path) -> Result<(), BuildError> {
    let vase_path = self.store().vase_path(vase);
    if !vase_path.exists() {
      return Err(BuildError::VaseMissing(vase.to_string()));
    }
    fs::create_dir_all(dest)?;
    link_tree(&vase_path, dest)?;
    Ok(())
  }

  /// Compose layers in order via hardlink trees; later layers overwrite
  /// earlier files. When an entrypoint is declared, the run spec for the
  /// external launcher is written into the composed tree.
  fn build_composite(&self, drv: &Derivation, dest: &Path) -> Result<(), BuildError> {
    let Source::FetchBuild {
      layers,
      entrypoint,
      args,
      env,
      umu,
      ..
    } = &drv.src
    else {
      unreachable!("build_composite dispatched for a non fetch_build source");
    };

    fs::create_dir_all(dest)?;

    for layer in layers {
      let layer_drv = self.store().load_recipe(layer)?;
      let layer_path = self.store().derivation_path(&layer_drv.out);
      debug!(layer = %layer_drv.out, "linking layer");
      link_tree(&layer_path, dest)?;
    }

    if let Some(entrypoint) = entrypoint.as_deref().filter(|e| !e.is_empty()) {
      let name = DerivationName::parse(&drv.out)
        .map(|n| n.name)
        .unwrap_or_else(|| "modpack".to_string());
      let spec = RunSpec {
        entrypoint: entrypoint.to_string(),
        umu: umu.clone(),
        args: args.clone(),
        env: env.clone(),
      };
      let spec_dir = dest.join(RUN_SPEC_DIR);
      fs::create_dir_all(&spec_dir)?;
      let data = serde_json::to_string_pretty(&spec)?;
      fs::write(spec_dir.join(format!("{}.run.json", name)), data)?;
    }

    Ok(())
  }
}

/// Create the parent directories for `rel` under `dest` and write the file.
fn write_output_file(dest: &Path, rel: &str, bytes: &[u8]) -> Result<(), BuildError> {
  let full = dest.join(rel);
  if let Some(parent) = full.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(full, bytes)?;
  Ok(())
}

/// Derive a file name from a URL: last path component, query string
/// stripped, with a fallback for opaque URLs.
fn filename_from_url(url: &str) -> String {
  let name = url.rsplit('/').next().unwrap_or("");
  let name = name.split('?').next().unwrap_or(name);
  if name.is_empty() || name == "." {
    "download".to_string()
  } else {
    name.to_string()
  }
}

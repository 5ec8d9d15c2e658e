//! Archive extraction, dispatched on file extension.
//!
//! ZIP and tarballs are handled in-process; `.7z` is delegated to the
//! external `7z` binary. Every entry path is validated against the
//! destination so a crafted archive cannot write outside it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::process::{self, ProcessError};

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("unsupported archive format: {0}")]
  Unsupported(String),

  #[error("archive entry escapes the destination directory: {0}")]
  PathEscape(PathBuf),

  #[error("failed to read zip archive: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("7z extraction failed: {0}")]
  SevenZip(#[from] ProcessError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Extract `src` into `dest`, choosing the format from the file name.
pub fn extract_archive(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
  fs::create_dir_all(dest)?;

  let name = src
    .file_name()
    .map(|n| n.to_string_lossy().to_lowercase())
    .unwrap_or_default();

  if name.ends_with(".zip") {
    extract_zip(src, dest)
  } else if name.ends_with(".7z") {
    process::extract_7z(src, dest)?;
    Ok(())
  } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    extract_tar(flate2::read::GzDecoder::new(fs::File::open(src)?), dest)
  } else if name.ends_with(".tar") {
    extract_tar(fs::File::open(src)?, dest)
  } else {
    Err(ArchiveError::Unsupported(name))
  }
}

fn extract_zip(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let file = fs::File::open(src)?;
  let mut archive = zip::ZipArchive::new(io::BufReader::new(file))?;

  debug!(entries = archive.len(), archive = %src.display(), "extracting zip");

  for index in 0..archive.len() {
    let mut entry = archive.by_index(index)?;

    // `enclosed_name` refuses absolute paths and `..` components.
    let rel = match entry.enclosed_name() {
      Some(rel) => rel,
      None => return Err(ArchiveError::PathEscape(PathBuf::from(entry.name()))),
    };
    let out_path = dest.join(rel);

    if entry.is_dir() {
      fs::create_dir_all(&out_path)?;
      continue;
    }

    if let Some(parent) = out_path.parent() {
      fs::create_dir_all(parent)?;
    }
    let mut out_file = fs::File::create(&out_path)?;
    io::copy(&mut entry, &mut out_file)?;

    if let Some(mode) = entry.unix_mode() {
      use std::os::unix::fs::PermissionsExt;
      fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
    }
  }

  Ok(())
}

fn extract_tar<R: io::Read>(reader: R, dest: &Path) -> Result<(), ArchiveError> {
  let mut archive = tar::Archive::new(reader);

  for entry in archive.entries()? {
    let mut entry = entry?;
    let rel = entry.path()?.into_owned();
    let out_path = safe_join(dest, &rel)?;

    if let Some(parent) = out_path.parent() {
      fs::create_dir_all(parent)?;
    }
    entry.unpack(&out_path)?;
  }

  Ok(())
}

/// Join a relative archive entry path onto `dest`, rejecting absolute paths
/// and parent traversal.
fn safe_join(dest: &Path, rel: &Path) -> Result<PathBuf, ArchiveError> {
  let escapes = rel
    .components()
    .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
  if escapes {
    return Err(ArchiveError::PathEscape(rel.to_path_buf()));
  }
  Ok(dest.join(rel))
}

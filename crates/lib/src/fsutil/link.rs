use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Mirror `src` into `dst`, replicating directories and hard-linking files.
///
/// An existing destination file is unlinked and the link retried, which is
/// what makes layered composition last-write-wins. If the link call fails
/// (cross-device, or the retry after unlink), fall back to a symbolic link
/// to the source file.
pub fn link_tree(src: &Path, dst: &Path) -> io::Result<()> {
  for entry in WalkDir::new(src).min_depth(1) {
    let entry = entry.map_err(io::Error::from)?;
    let rel = entry
      .path()
      .strip_prefix(src)
      .map_err(|e| io::Error::other(e.to_string()))?;
    let dest = dst.join(rel);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&dest)?;
      continue;
    }

    match fs::hard_link(entry.path(), &dest) {
      Ok(()) => {}
      Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
        fs::remove_file(&dest)?;
        if fs::hard_link(entry.path(), &dest).is_err() {
          std::os::unix::fs::symlink(entry.path(), &dest)?;
        }
      }
      Err(_) => {
        std::os::unix::fs::symlink(entry.path(), &dest)?;
      }
    }
  }
  Ok(())
}

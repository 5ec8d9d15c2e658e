use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::HASH_PREFIX_LEN;

/// A content-addressed hash identifying a recipe.
///
/// The hash is a 32-character truncated SHA-256 of the canonically
/// serialized recipe JSON (object keys sorted). Two derivations with
/// identical documents share the same hash and therefore the same output
/// path under the store.
///
/// # Format
///
/// Lowercase hexadecimal, e.g. `"a1b2c3d4e5f6789012ab34cd56ef7890"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeHash(pub String);

impl RecipeHash {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for RecipeHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<&str> for RecipeHash {
  fn from(s: &str) -> Self {
    RecipeHash(s.to_string())
  }
}

pub trait Hashable: Serialize {
  /// Compute the truncated content hash of this value.
  ///
  /// Serialization goes through `serde_json::Value`, whose object maps are
  /// key-ordered, so the digest is independent of field declaration order.
  fn recipe_hash(&self) -> Result<RecipeHash, serde_json::Error> {
    let canonical = serde_json::to_value(self)?.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let full = hex::encode(hasher.finalize());
    Ok(RecipeHash(full[..HASH_PREFIX_LEN].to_string()))
  }
}

/// Compute the full 64-character SHA-256 digest of a file, streaming.
///
/// Used for download verification, where the recipe pins the complete
/// digest rather than the truncated store prefix.
pub fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = std::fs::File::open(path)?;
  let mut hasher = Sha256::new();
  io::copy(&mut file, &mut hasher)?;
  Ok(hex::encode(hasher.finalize()))
}

//! Recipe data model and JSON codec.
//!
//! A recipe document (`recipes/<hash>.json`) describes one derivation:
//!
//! ```json
//! {
//!   "out": "<32-hex>-<name>-<version>",
//!   "src": { "type": "<kind>", ... },
//!   "dependencies": ["<32-hex>", ...],
//!   "postbuild": "optional shell"
//! }
//! ```
//!
//! The engine only reads these documents; the front-end writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::HASH_PREFIX_LEN;
use crate::util::hash::{Hashable, RecipeHash};

/// Launcher configuration for `umu-run`-mediated execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmuSpec {
  pub version: String,
  pub id: String,
}

/// The command executed inside a `run_in_build` overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCommand {
  pub entrypoint: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub umu: Option<UmuSpec>,
}

/// The source of a derivation, discriminated by the `type` field.
///
/// Unknown `type` values are a decode error; there is no lenient fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
  /// Download a file, verify its SHA-256, optionally extract it.
  FetchUrl {
    url: String,
    sha256: String,
    #[serde(default)]
    unpack: bool,
    #[serde(rename = "postFetch", default, skip_serializing_if = "Option::is_none")]
    post_fetch: Option<String>,
  },
  /// Clone a git repository; `rev` wins over `ref` when both are present.
  FetchGit {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    git_ref: Option<String>,
    #[serde(rename = "postFetch", default, skip_serializing_if = "Option::is_none")]
    post_fetch: Option<String>,
  },
  /// Copy a local file or directory, honouring exclusion globs.
  FetchLocal {
    path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    exclude: Vec<String>,
    #[serde(rename = "postFetch", default, skip_serializing_if = "Option::is_none")]
    post_fetch: Option<String>,
  },
  /// Hardlink-mirror a versioned vase from the registry.
  FetchVase { vase: String },
  /// Write a literal text file at a relative path.
  WriteText { path: String, content: String },
  /// Write arbitrary JSON, two-space indented.
  WriteJson { path: String, content: serde_json::Value },
  /// Write arbitrary JSON serialized as TOML.
  WriteToml { path: String, content: serde_json::Value },
  /// Compose previously built layers into one tree; later layers win.
  ///
  /// `entrypoint`, `args`, `env`, `permissions` and `umu` are launch
  /// metadata for the modpack runner and do not affect the composed tree
  /// beyond the run spec document written under `kintsugi/exec/`.
  FetchBuild {
    layers: Vec<RecipeHash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    umu: Option<UmuSpec>,
  },
  /// Run a command in a writable overlay over a built tree and capture the
  /// upper-layer paths matching `outputs`.
  RunInBuild {
    build: RecipeHash,
    command: RunCommand,
    outputs: Vec<String>,
  },
  /// An intentionally empty output directory.
  BlankSource,
}

impl Source {
  /// The wire name of this source kind, for logging.
  pub fn kind(&self) -> &'static str {
    match self {
      Source::FetchUrl { .. } => "fetch_url",
      Source::FetchGit { .. } => "fetch_git",
      Source::FetchLocal { .. } => "fetch_local",
      Source::FetchVase { .. } => "fetch_vase",
      Source::WriteText { .. } => "write_text",
      Source::WriteJson { .. } => "write_json",
      Source::WriteToml { .. } => "write_toml",
      Source::FetchBuild { .. } => "fetch_build",
      Source::RunInBuild { .. } => "run_in_build",
      Source::BlankSource => "blank_source",
    }
  }
}

/// A node in the build DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
  /// Store directory name, `<recipe-hash>-<name>-<version>`.
  pub out: String,
  pub src: Source,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<RecipeHash>,
  /// Shell snippet run in the output directory after materialisation.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub postbuild: Option<String>,
}

impl Hashable for Derivation {}

impl Derivation {
  /// Every recipe hash this derivation requires to be built first: declared
  /// dependencies, plus layer hashes for `fetch_build` and the build
  /// reference for `run_in_build`.
  ///
  /// The resolver and the garbage collector share this edge enumeration so
  /// the two can never disagree about reachability.
  pub fn references(&self) -> Vec<&RecipeHash> {
    let mut refs: Vec<&RecipeHash> = self.dependencies.iter().collect();
    match &self.src {
      Source::FetchBuild { layers, .. } => refs.extend(layers.iter()),
      Source::RunInBuild { build, .. } => refs.push(build),
      _ => {}
    }
    refs
  }

  pub fn name(&self) -> Option<DerivationName> {
    DerivationName::parse(&self.out)
  }
}

/// The run spec document written to `<store-out>/kintsugi/exec/<name>.run.json`
/// when a composed build declares an entrypoint. Consumed by the external
/// runner when launching a built modpack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
  pub entrypoint: String,
  pub umu: Option<UmuSpec>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}

/// Parsed form of a store directory name, `<32-hex>-<name>-<version>`.
///
/// `version` may be empty; `name` and `version` are split at the last dash
/// of the remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationName {
  pub hash: RecipeHash,
  pub name: String,
  pub version: String,
}

impl DerivationName {
  pub fn parse(out: &str) -> Option<Self> {
    let bytes = out.as_bytes();
    if bytes.len() < HASH_PREFIX_LEN + 2 {
      return None;
    }
    if !bytes[..HASH_PREFIX_LEN].iter().all(|b| b.is_ascii_hexdigit()) {
      return None;
    }
    if bytes[HASH_PREFIX_LEN] != b'-' {
      return None;
    }
    // The first 33 bytes are ASCII, so these slices sit on char boundaries.
    let hash = &out[..HASH_PREFIX_LEN];
    let rest = &out[HASH_PREFIX_LEN + 1..];
    let (name, version) = match rest.rsplit_once('-') {
      Some((name, version)) => (name, version),
      None => (rest, ""),
    };
    Some(DerivationName {
      hash: RecipeHash(hash.to_string()),
      name: name.to_string(),
      version: version.to_string(),
    })
  }
}

impl std::fmt::Display for DerivationName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}-{}-{}", self.hash, self.name, self.version)
  }
}

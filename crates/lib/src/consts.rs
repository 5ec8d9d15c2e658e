//! Shared constants.

/// Number of hex characters kept from a SHA-256 digest when forming a recipe
/// hash. A 128-bit prefix keeps store directory names short while leaving
/// ample collision resistance for a single-user store.
pub const HASH_PREFIX_LEN: usize = 32;

/// Default store root directory name under `$HOME`.
pub const DEFAULT_ROOT_DIR_NAME: &str = ".kintsugi";

/// Environment variable used to resolve relative `fetch_local` paths when no
/// explicit modpack root was handed to the compiler.
pub const ENV_MODPACK_PATH: &str = "KINTSUGI_MODPACK_PATH";

//! kintsugi-lib: the build engine behind kintsugi.
//!
//! A modpack is described by a DAG of *derivations* (JSON recipes written by
//! the front-end). This crate resolves the DAG, materialises each derivation
//! into a content-addressed directory under the store, composes layered
//! builds out of hardlink trees, and records per-modpack generations that
//! support rollback and garbage collection.
//!
//! The engine is deliberately serial: one build thread, blocking I/O, no
//! shared mutable state between builders.

pub mod compiler;
pub mod consts;
pub mod fsutil;
pub mod modpack;
pub mod process;
pub mod recipe;
pub mod store;
pub mod store_lock;
pub mod util;

pub use compiler::{BuildError, CancelToken, Compiler};
pub use modpack::{Generation, ModpackError, ModpackManager};
pub use recipe::{Derivation, DerivationName, Source};
pub use store::{Store, StoreError};
pub use util::hash::RecipeHash;

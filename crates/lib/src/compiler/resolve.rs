//! Dependency resolution: post-order linearisation of the recipe DAG.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::recipe::Derivation;
use crate::store::{Store, StoreError};
use crate::util::hash::RecipeHash;

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("dependency cycle detected in recipe graph")]
  Cycle,
}

/// Resolve the DAG rooted at `root` into build order.
///
/// The returned sequence is a depth-first post-order: for every derivation,
/// all of its references (dependencies, layers, run-in-build targets) appear
/// at earlier indices. The discovered edges are mirrored into a graph whose
/// topological sort doubles as the cycle check.
pub fn resolve(store: &Store, root: &RecipeHash) -> Result<Vec<Derivation>, ResolveError> {
  let mut walk = Walk {
    store,
    graph: DiGraph::new(),
    nodes: HashMap::new(),
    order: Vec::new(),
  };
  walk.visit(root)?;

  toposort(&walk.graph, None).map_err(|_| ResolveError::Cycle)?;

  debug!(steps = walk.order.len(), root = %root, "resolved build plan");
  Ok(walk.order)
}

struct Walk<'a> {
  store: &'a Store,
  graph: DiGraph<RecipeHash, ()>,
  nodes: HashMap<RecipeHash, NodeIndex>,
  order: Vec<Derivation>,
}

impl Walk<'_> {
  fn visit(&mut self, hash: &RecipeHash) -> Result<NodeIndex, ResolveError> {
    if let Some(&index) = self.nodes.get(hash) {
      return Ok(index);
    }
    let index = self.graph.add_node(hash.clone());
    self.nodes.insert(hash.clone(), index);

    let drv = self.store.load_recipe(hash)?;
    let references: Vec<RecipeHash> = drv.references().into_iter().cloned().collect();
    for reference in &references {
      let dep_index = self.visit(reference)?;
      self.graph.add_edge(dep_index, index, ());
    }

    self.order.push(drv);
    Ok(index)
  }
}

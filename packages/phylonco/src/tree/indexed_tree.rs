use crate::make_error;
use crate::tree::rooted_tree::RootedTree;
use eyre::Report;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
  pub name: Option<String>,
  pub parent: Option<usize>,
  pub children: Vec<usize>,
  pub age: f64,
}

/// Arena-backed rooted tree. Node `i` lives at `nodes[i]`.
///
/// Trees built from Newick place leaves first, in order of appearance, so that for `n` leaves the leaf indices
/// are `0..n`. This is a convention of the loaders, not something the sampler relies on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexedTree {
  nodes: Vec<TreeNode>,
  root: usize,
}

impl IndexedTree {
  pub fn new(nodes: Vec<TreeNode>, root: usize) -> Result<Self, Report> {
    if root >= nodes.len() {
      return make_error!("Root index {root} is out of bounds for a tree with {} nodes", nodes.len());
    }
    if let Some((i, _)) = nodes
      .iter()
      .enumerate()
      .find(|(_, node)| node.children.iter().any(|&c| c >= nodes.len()))
    {
      return make_error!("Node {i} refers to a child index which is out of bounds");
    }
    Ok(Self { nodes, root })
  }

  pub fn nodes(&self) -> &[TreeNode] {
    &self.nodes
  }

  pub fn leaves(&self) -> Vec<usize> {
    (0..self.nodes.len()).filter(|&i| self.nodes[i].children.is_empty()).collect_vec()
  }

  pub fn leaf_names(&self) -> Vec<&str> {
    self
      .leaves()
      .into_iter()
      .filter_map(|i| self.nodes[i].name.as_deref())
      .collect_vec()
  }

  pub fn find_by_name(&self, name: &str) -> Option<usize> {
    self.nodes.iter().position(|node| node.name.as_deref() == Some(name))
  }

  /// Replaces the children of `node` and rewires their parent links. Used by topology moves and tests.
  pub fn set_children(&mut self, node: usize, children: Vec<usize>) {
    for c in std::mem::take(&mut self.nodes[node].children) {
      self.nodes[c].parent = None;
    }
    for &c in &children {
      self.nodes[c].parent = Some(node);
    }
    self.nodes[node].children = children;
  }
}

impl RootedTree for IndexedTree {
  fn node_count(&self) -> usize {
    self.nodes.len()
  }

  fn root(&self) -> usize {
    self.root
  }

  fn children(&self, node: usize) -> &[usize] {
    &self.nodes[node].children
  }

  fn parent(&self, node: usize) -> Option<usize> {
    self.nodes[node].parent
  }

  fn age(&self, node: usize) -> f64 {
    self.nodes[node].age
  }

  fn name(&self, node: usize) -> Option<&str> {
    self.nodes[node].name.as_deref()
  }
}

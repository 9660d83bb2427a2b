use crate::make_error;
use crate::tree::rooted_tree::RootedTree;
use eyre::{Report, WrapErr};

/// Precomputed visiting orders over a validated binary tree.
///
/// Traversals are iterative, so deep (caterpillar-like) trees do not risk exhausting the call stack. The buffers are
/// reused between rebuilds.
#[derive(Clone, Debug, Default)]
pub struct TreeTraversal {
  pre_order: Vec<usize>,
  post_order: Vec<usize>,
  leaves: Vec<usize>,
  stack: Vec<usize>,
  visited: Vec<bool>,
}

impl TreeTraversal {
  pub fn new(tree: &dyn RootedTree) -> Result<Self, Report> {
    let mut traversal = Self::default();
    traversal.rebuild(tree)?;
    Ok(traversal)
  }

  /// Parents before children, root first.
  pub fn pre_order(&self) -> &[usize] {
    &self.pre_order
  }

  /// Children before parents, root last.
  pub fn post_order(&self) -> &[usize] {
    &self.post_order
  }

  pub fn leaves(&self) -> &[usize] {
    &self.leaves
  }

  pub fn node_count(&self) -> usize {
    self.pre_order.len()
  }

  /// Recomputes visiting orders for the current topology of `tree`, checking that every internal node has exactly
  /// two children and that parent and child links agree.
  pub fn rebuild(&mut self, tree: &dyn RootedTree) -> Result<(), Report> {
    self.visit(tree).wrap_err("When validating tree topology")
  }

  fn visit(&mut self, tree: &dyn RootedTree) -> Result<(), Report> {
    self.pre_order.clear();
    self.post_order.clear();
    self.leaves.clear();
    self.stack.clear();
    self.visited.clear();

    let n_nodes = tree.node_count();
    if n_nodes == 0 {
      return make_error!("Tree has no nodes");
    }

    let root = tree.root();
    if root >= n_nodes {
      return make_error!("Root index {root} is out of bounds for a tree with {n_nodes} nodes");
    }
    if let Some(parent) = tree.parent(root) {
      return make_error!("Root node {root} has a parent node {parent}");
    }

    self.visited.resize(n_nodes, false);
    self.stack.push(root);
    while let Some(node) = self.stack.pop() {
      if self.visited[node] {
        return make_error!("Node {node} is reachable along more than one path from the root");
      }
      self.visited[node] = true;
      self.pre_order.push(node);

      let children = tree.children(node);
      match children.len() {
        0 => self.leaves.push(node),
        2 => {}
        n_children => {
          return make_error!(
            "Node {node} has {n_children} children, but internal nodes of a binary tree must have exactly 2"
          );
        }
      }

      // reversed, so that the first child is visited first
      for &child in children.iter().rev() {
        if child >= n_nodes {
          return make_error!("Node {node} refers to child {child}, which is out of bounds");
        }
        let parent = tree.parent(child);
        if parent != Some(node) {
          return make_error!("Node {child} is listed as a child of node {node}, but its parent is {parent:?}");
        }
        self.stack.push(child);
      }
    }

    if let Some(orphan) = self.visited.iter().position(|visited| !visited) {
      return match tree.parent(orphan) {
        None => make_error!("Node {orphan} is not the root, but has no parent"),
        Some(_) => make_error!("Node {orphan} is not reachable from the root node {root}"),
      };
    }

    self.post_order.extend(self.pre_order.iter().rev());
    Ok(())
  }
}

/// Read access to a rooted time tree, addressed by integer node indices in `0..node_count()`.
///
/// Ages are measured backwards from the present: a parent is never younger than its children.
pub trait RootedTree: Send + Sync {
  fn node_count(&self) -> usize;

  fn root(&self) -> usize;

  fn children(&self, node: usize) -> &[usize];

  fn parent(&self, node: usize) -> Option<usize>;

  fn age(&self, node: usize) -> f64;

  fn name(&self, node: usize) -> Option<&str>;

  fn is_leaf(&self, node: usize) -> bool {
    self.children(node).is_empty()
  }

  fn is_root(&self, node: usize) -> bool {
    self.root() == node
  }
}

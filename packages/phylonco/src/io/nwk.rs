use crate::io::fs::read_file_to_string;
use crate::make_error;
use crate::tree::indexed_tree::{IndexedTree, TreeNode};
use bio::io::newick;
use eyre::{Report, WrapErr};
use std::io::Read;
use std::path::Path;

pub fn tree_from_nwk_file(nwk_file_path: impl AsRef<Path>) -> Result<IndexedTree, Report> {
  let nwk_file_path = nwk_file_path.as_ref();
  let nwk_str = read_file_to_string(nwk_file_path)?;
  tree_from_nwk_reader(nwk_str.as_bytes()).wrap_err_with(|| format!("When parsing Newick file {nwk_file_path:#?}"))
}

pub fn tree_from_nwk_str(nwk_str: impl AsRef<str>) -> Result<IndexedTree, Report> {
  let nwk_str = nwk_str.as_ref();
  tree_from_nwk_reader(nwk_str.as_bytes()).wrap_err_with(|| format!("When parsing Newick string:\n    '{nwk_str}'"))
}

/// Reads a Newick tree and converts branch lengths into node ages, with the youngest leaf at age 0.
///
/// Leaves receive indices `0..n_leaves` in order of appearance, internal nodes follow in post-order, so the root is
/// always the last node.
pub fn tree_from_nwk_reader(reader: impl Read) -> Result<IndexedTree, Report> {
  let nwk_tree = newick::read(reader)?;
  let g = &nwk_tree.g;
  let n_nodes = g.node_count();
  if n_nodes == 0 {
    return make_error!("Newick tree contains no nodes");
  }

  let mut parent_of: Vec<Option<(usize, f64)>> = vec![None; n_nodes];
  let mut children_of: Vec<Vec<usize>> = vec![vec![]; n_nodes];
  for edge in g.raw_edges() {
    let (source, target) = (edge.source().index(), edge.target().index());
    if parent_of[target].is_some() {
      return make_error!("Newick node {target} has more than one parent");
    }
    parent_of[target] = Some((source, f64::from(edge.weight)));
    children_of[source].push(target);
  }

  let roots: Vec<usize> = (0..n_nodes).filter(|&i| parent_of[i].is_none()).collect();
  let root = match roots.as_slice() {
    [root] => *root,
    _ => return make_error!("Expected exactly one root in Newick tree, but found {}", roots.len()),
  };

  // pre-order over Newick indices, accumulating root-to-node distances
  let mut depth = vec![0.0; n_nodes];
  let mut pre_order = Vec::with_capacity(n_nodes);
  let mut stack = vec![root];
  while let Some(node) = stack.pop() {
    pre_order.push(node);
    for &child in children_of[node].iter().rev() {
      let branch_length = parent_of[child].map_or(0.0, |(_, w)| if w.is_finite() { w } else { 0.0 });
      depth[child] = depth[node] + branch_length;
      stack.push(child);
    }
  }
  let max_depth = depth.iter().copied().fold(0.0, f64::max);

  let mut new_index = vec![usize::MAX; n_nodes];
  let mut next = 0;
  for &node in pre_order.iter().filter(|&&node| children_of[node].is_empty()) {
    new_index[node] = next;
    next += 1;
  }
  for &node in pre_order.iter().rev().filter(|&&node| !children_of[node].is_empty()) {
    new_index[node] = next;
    next += 1;
  }

  let mut nodes = vec![TreeNode::default(); n_nodes];
  for &old in &pre_order {
    let name = g.raw_nodes()[old].weight.trim();
    nodes[new_index[old]] = TreeNode {
      name: (!name.is_empty() && name != "N/A").then(|| name.to_owned()),
      parent: parent_of[old].map(|(p, _)| new_index[p]),
      children: children_of[old].iter().map(|&c| new_index[c]).collect(),
      age: max_depth - depth[old],
    };
  }

  IndexedTree::new(nodes, new_index[root])
}

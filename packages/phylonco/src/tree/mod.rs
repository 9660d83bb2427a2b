pub mod indexed_tree;
pub mod rooted_tree;
pub mod traversal;

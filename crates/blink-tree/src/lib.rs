//! Disk-backed B-link tree.
//!
//! A B-link tree is a B-tree whose nodes also link to their left and right
//! siblings on the same level. This crate provides:
//! - `BTreeClass`, the plug-in describing keys and leaf records
//! - `Node`, the in-memory node and its fixed-size on-disk image
//! - `BTree`, with create, find, insert, split, list, flush and debug
//! - `BTree::check`, a structural consistency walk
//!
//! Nodes are cached through `blink_cache::NodeStore`; the tree never reads
//! or writes the backing file itself.

mod check;
mod class;
pub mod classes;
mod node;
mod tree;

pub use check::TreeStats;
pub use class::{BTreeClass, InsertOutcome, Insertion, KeyCodec, NewLeaf, NewMode};
pub use classes::{IntegerClass, IntegerUdata};
pub use node::{Node, NodeContext, NodeLayout, Side, NODE_MAGIC};
pub use tree::{BTree, BracketPosition, CachedTree};

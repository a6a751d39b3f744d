//! The in-memory document: an ordered tree of role-classified nodes
//! projected from the overlay, addressed by root-relative tree paths.

mod builder;
pub mod markers;
mod node;
pub mod tree_path;

pub use builder::{BuildError, TreeBuilder};
pub use markers::TemplateMarker;
pub use node::{Document, Node, NodeContent, NodeKind};

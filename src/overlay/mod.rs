//! Overlay resolution: an ordered list of input roots merged into one
//! logical tree, higher-priority roots overriding lower ones.

mod resolver;

pub use resolver::{DirEntry, EntryKind, OverlayResolver, Resolved, ResolveError};

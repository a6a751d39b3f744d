use std::collections::HashMap;
use std::path::PathBuf;

use derive_more::Display;

use crate::document::markers::TemplateMarker;

/// Role of a node in the document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NodeKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
    #[display("executable")]
    Executable,
    #[display("module")]
    Module,
}

/// Content held by a node. Plain files are not read unless they carry a
/// template marker; structured files are read and parse-checked at build
/// time; directories, executables and query modules hold nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    Unread,
    Text(String),
    Fragment(String),
    Empty,
}

/// A node of the document tree, addressed by its tree path.
#[derive(Debug, Clone)]
pub struct Node {
    pub tree_path: String,
    pub name: String,
    pub kind: NodeKind,
    pub content: NodeContent,
    /// Child names in build order: directories before files, each group
    /// sorted byte-wise ascending.
    pub children: Vec<String>,
    pub template_marker: Option<TemplateMarker>,
    pub no_copy: bool,
    /// Overlay-resolved source path, captured at build time. Expansion
    /// never goes back to disk to re-resolve it.
    pub source: Option<PathBuf>,
}

impl Node {
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Priority bucket this node expands in.
    pub fn bucket(&self) -> u32 {
        self.template_marker.map(|marker| marker.bucket).unwrap_or(0)
    }

    /// Inner content as text; nodes whose content was never read
    /// contribute nothing to queries.
    pub fn inner(&self) -> &str {
        match &self.content {
            NodeContent::Text(text) | NodeContent::Fragment(text) => text,
            NodeContent::Unread | NodeContent::Empty => "",
        }
    }

    /// Canonical serialized form handed to the query evaluator: the inner
    /// content wrapped in a synthetic element carrying the node's
    /// identity. Fixpoint detection compares these strings.
    pub fn serialized(&self) -> String {
        format!(
            r#"<sylva:node path="{}" name="{}">{}</sylva:node>"#,
            self.tree_path,
            self.name,
            self.inner()
        )
    }

    /// Replaces the node's content with an expansion result, preserving
    /// the structured/plain distinction.
    pub fn replace_content(&mut self, inner: String) {
        self.content = match self.content {
            NodeContent::Fragment(_) => NodeContent::Fragment(inner),
            _ => NodeContent::Text(inner),
        };
    }
}

/// The document: an arena of nodes keyed by tree path, owning exactly one
/// root at the empty path. Built once per engine run, then mutated in
/// place by expansion; lookups always observe the current value.
#[derive(Debug, Default)]
pub struct Document {
    nodes: HashMap<String, Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.tree_path.clone(), node);
    }

    pub fn get(&self, tree_path: &str) -> Option<&Node> {
        self.nodes.get(tree_path)
    }

    pub fn get_mut(&mut self, tree_path: &str) -> Option<&mut Node> {
        self.nodes.get_mut(tree_path)
    }

    pub fn contains(&self, tree_path: &str) -> bool {
        self.nodes.contains_key(tree_path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::document::node::{Document, Node, NodeContent, NodeKind};
use crate::document::{markers, tree_path};
use crate::overlay::{DirEntry, EntryKind, OverlayResolver, Resolved, ResolveError};
use crate::query::{
    FunctionRegistry, ModuleError, QueryEvaluator, RejectedSnafu, parse_module_declaration,
};

/// Extensions parsed as structured fragments unless extended by the caller.
const STRUCTURED_EXTENSIONS: [&str; 2] = [".xml", ".xhtml"];
/// Extensions loaded as query modules.
const MODULE_EXTENSIONS: [&str; 4] = [".xq", ".xql", ".xqm", ".xqy"];

/// Projects the overlay into a document: a single depth-first pass,
/// directories before files, both sorted byte-wise ascending by name.
/// Executables and query modules encountered along the way are registered
/// with the function registry and the evaluator in traversal order.
pub struct TreeBuilder<'a, E> {
    resolver: &'a OverlayResolver,
    registry: &'a mut FunctionRegistry,
    evaluator: &'a mut E,
    structured_extensions: Vec<String>,
}

impl<'a, E: QueryEvaluator> TreeBuilder<'a, E> {
    pub fn new(
        resolver: &'a OverlayResolver,
        registry: &'a mut FunctionRegistry,
        evaluator: &'a mut E,
        extra_structured_extensions: &[String],
    ) -> Self {
        let structured_extensions = STRUCTURED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .chain(extra_structured_extensions.iter().cloned())
            .collect();
        Self {
            resolver,
            registry,
            evaluator,
            structured_extensions,
        }
    }

    /// Builds the whole document from the overlay root. The result is a
    /// snapshot: later filesystem changes are not observed.
    pub fn build(mut self) -> Result<Document, BuildError> {
        let mut document = Document::new();
        self.build_node("", &mut document)?;
        debug!("Built document with {} node(s)", document.len());
        Ok(document)
    }

    fn build_node(&mut self, path: &str, document: &mut Document) -> Result<(), BuildError> {
        let resolved = self.resolver.resolve(path).context(ResolveSnafu { path })?;
        match resolved {
            Resolved::NotFound => NotFoundSnafu { path }.fail(),
            Resolved::Directory(entries) => self.build_directory(path, entries, document),
            Resolved::File(source) => self.build_file(path, source, document),
        }
    }

    fn build_directory(
        &mut self,
        path: &str,
        entries: Vec<DirEntry>,
        document: &mut Document,
    ) -> Result<(), BuildError> {
        let mut directories = Vec::new();
        let mut files = Vec::new();
        for entry in entries {
            // Hidden entries are excluded at every level.
            if entry.name.starts_with('.') {
                continue;
            }
            if entry.kind == EntryKind::Directory {
                directories.push(entry);
            } else {
                files.push(entry);
            }
        }
        directories.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut children = Vec::with_capacity(directories.len() + files.len());
        for entry in directories.into_iter().chain(files) {
            let child_path = tree_path::join(path, &entry.name);
            self.build_node(&child_path, document)?;
            children.push(entry.name);
        }

        let name = tree_path::name(path).to_string();
        document.insert(Node {
            tree_path: path.to_string(),
            name: name.clone(),
            kind: NodeKind::Directory,
            content: NodeContent::Empty,
            children,
            template_marker: markers::template_marker(&name),
            no_copy: markers::has_no_copy_marker(&name),
            source: None,
        });
        Ok(())
    }

    fn build_file(
        &mut self,
        path: &str,
        source: PathBuf,
        document: &mut Document,
    ) -> Result<(), BuildError> {
        let name = tree_path::name(path).to_string();
        let template_marker = markers::template_marker(&name);
        let extension = name.rfind('.').map(|at| &name[at..]).unwrap_or("");

        let (kind, content) = if is_executable(&source).context(ResolveStatSnafu { path })? {
            let callable = markers::callable_name(&name);
            debug!("'{path}' is executable, binding function '{callable}'");
            // One binding serves both call signatures: args-only, and
            // args plus stdin.
            self.registry.register(callable, source.clone());
            (NodeKind::Executable, NodeContent::Empty)
        } else if self.structured_extensions.iter().any(|ext| ext == extension) {
            let text = std::fs::read_to_string(&source).context(ReadSnafu { path })?;
            parse_fragment(&name, &text).context(ParseSnafu { path })?;
            (NodeKind::File, NodeContent::Fragment(text))
        } else if MODULE_EXTENSIONS.contains(&extension) {
            let text = std::fs::read_to_string(&source).context(ReadSnafu { path })?;
            let declaration =
                parse_module_declaration(&text).context(ModuleSnafu { path })?;
            debug!("'{path}' declares module namespace '{}'", declaration.prefix);
            self.evaluator
                .register_module(&declaration, &text)
                .context(RejectedSnafu)
                .context(ModuleSnafu { path })?;
            (NodeKind::Module, NodeContent::Empty)
        } else if template_marker.is_some() {
            let text = std::fs::read_to_string(&source).context(ReadSnafu { path })?;
            (NodeKind::File, NodeContent::Text(text))
        } else {
            (NodeKind::File, NodeContent::Unread)
        };

        document.insert(Node {
            tree_path: path.to_string(),
            name: name.clone(),
            kind,
            content,
            children: Vec::new(),
            template_marker,
            no_copy: markers::has_no_copy_marker(&name),
            source: Some(source),
        });
        Ok(())
    }
}

/// Well-formedness check of a structured fragment, parsed under the
/// node's own synthetic wrapper tag so multi-rooted content is legal.
fn parse_fragment(name: &str, text: &str) -> Result<(), quick_xml::Error> {
    let wrapped = format!("<fragment name=\"{name}\">{text}</fragment>");
    let mut reader = quick_xml::Reader::from_str(&wrapped);
    loop {
        match reader.read_event()? {
            quick_xml::events::Event::Eof => return Ok(()),
            _ => continue,
        }
    }
}

fn is_executable(path: &Path) -> std::io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let meta = std::fs::metadata(path)?;
        Ok(meta.permissions().mode() & 0o111 != 0)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(false)
    }
}

#[derive(Debug, Snafu)]
pub enum BuildError {
    #[snafu(display("Path '{path}' does not exist in any input root"))]
    NotFound { path: String },
    #[snafu(display("Failed to resolve '{path}'"))]
    Resolve {
        path: String,
        source: ResolveError,
    },
    #[snafu(display("Failed to stat '{path}'"))]
    ResolveStat {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to read '{path}'"))]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Error parsing '{path}'"))]
    Parse {
        path: String,
        source: quick_xml::Error,
    },
    #[snafu(display("Invalid query module '{path}'"))]
    Module { path: String, source: ModuleError },
}

use std::io;
use std::path::{Path, PathBuf};

use hashlink::LinkedHashMap;
use snafu::{ResultExt, Snafu};
use tracing::debug;

/// Kind of a merged directory entry, as seen after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    /// Something that is neither; resolving it individually raises
    /// `ResolveError::InvalidObject`, or `NotFound` for dangling links.
    Other,
}

/// One entry of a merged directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub path: PathBuf,
}

/// Result of resolving a tree path against the overlay. `NotFound` is not
/// itself an error; callers decide.
#[derive(Debug)]
pub enum Resolved {
    File(PathBuf),
    Directory(Vec<DirEntry>),
    NotFound,
}

/// Merges an ordered list of root directories into single-path lookups
/// and directory listings, with left-to-right priority: index 0 wins.
#[derive(Debug, Clone)]
pub struct OverlayResolver {
    roots: Vec<PathBuf>,
}

impl OverlayResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Resolves a tree path. The first root holding it as a regular file
    /// wins outright, even over directories in lower-priority roots; if
    /// every root that has it holds a directory, their listings are
    /// merged with higher-priority entries overwriting same-named ones.
    pub fn resolve(&self, tree_path: &str) -> Result<Resolved, ResolveError> {
        let mut directories = Vec::new();
        for root in &self.roots {
            let full_path = if tree_path.is_empty() {
                root.clone()
            } else {
                root.join(tree_path)
            };
            match std::fs::metadata(&full_path) {
                Ok(meta) if meta.is_file() => return Ok(Resolved::File(full_path)),
                Ok(meta) if meta.is_dir() => directories.push(full_path),
                Ok(_) => return InvalidObjectSnafu { path: full_path }.fail(),
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err).context(StatSnafu { path: full_path }),
            }
        }

        if directories.is_empty() {
            debug!("'{tree_path}' not found in any root");
            return Ok(Resolved::NotFound);
        }

        // Lowest priority first, so a higher-priority root's entry of the
        // same name overwrites it in place.
        let mut merged: LinkedHashMap<String, DirEntry> = LinkedHashMap::new();
        for directory in directories.iter().rev() {
            for entry in self.list_directory(directory)? {
                merged.insert(entry.name.clone(), entry);
            }
        }
        Ok(Resolved::Directory(merged.into_iter().map(|(_, e)| e).collect()))
    }

    fn list_directory(&self, directory: &Path) -> Result<Vec<DirEntry>, ResolveError> {
        let mut entries = Vec::new();
        let listing = std::fs::read_dir(directory).context(ListingSnafu { path: directory })?;
        for entry in listing {
            let entry = entry.context(ListingSnafu { path: directory })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let kind = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => EntryKind::Directory,
                Ok(meta) if meta.is_file() => EntryKind::File,
                // Sockets, FIFOs, dangling links: classified when the
                // entry itself is resolved.
                Ok(_) | Err(_) => EntryKind::Other,
            };
            entries.push(DirEntry { name, kind, path });
        }
        Ok(entries)
    }
}

#[derive(Debug, Snafu)]
pub enum ResolveError {
    #[snafu(display("'{}' is not a file or directory", path.display()))]
    InvalidObject { path: PathBuf },
    #[snafu(display("Failed to stat '{}'", path.display()))]
    Stat {
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display("Failed to list directory '{}'", path.display()))]
    Listing {
        path: PathBuf,
        source: io::Error,
    },
}

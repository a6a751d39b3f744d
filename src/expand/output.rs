use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::document::{markers, tree_path};

/// Computes destination paths and performs directory creation, file
/// writing and verbatim copies for one expansion run.
#[derive(Debug)]
pub struct OutputMapper {
    output_dir: PathBuf,
    build_path: String,
}

impl OutputMapper {
    pub fn new(output_dir: PathBuf, build_path: String) -> Self {
        Self {
            output_dir,
            build_path,
        }
    }

    /// Maps a tree path to its output location: the build-path prefix is
    /// replaced by the output directory and the template marker is
    /// stripped from the final component.
    pub fn map(&self, path: &str) -> PathBuf {
        let relative = tree_path::strip_prefix(path, &self.build_path);
        let mut mapped = self.output_dir.clone();
        if relative.is_empty() {
            return mapped;
        }
        let mut components: Vec<&str> = relative.split('/').collect();
        let last = components.pop().unwrap_or_default();
        for component in components {
            mapped.push(component);
        }
        mapped.push(markers::strip_template_marker(last));
        mapped
    }

    /// Idempotent reset: the directory is emptied or freshly created, so
    /// each run produces a clean tree instead of merging with stale
    /// output.
    pub fn reset_dir(&self, path: &Path) -> io::Result<()> {
        if path.exists() {
            debug!("Emptying '{}'", path.display());
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)
    }

    pub fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!("Writing '{}'", path.display());
        std::fs::write(path, contents)
    }

    pub fn copy(&self, source: &Path, destination: &Path) -> io::Result<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(
            "Copying '{}' to '{}'",
            source.display(),
            destination.display()
        );
        std::fs::copy(source, destination).map(|_| ())
    }
}

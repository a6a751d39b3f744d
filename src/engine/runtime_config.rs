use std::path::PathBuf;

use crate::cli::Cli;

/// Resolved settings for one engine run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Input roots, index 0 = highest priority.
    pub roots: Vec<PathBuf>,
    pub output: PathBuf,
    /// Subtree to build; empty means the whole tree.
    pub build_path: String,
    /// Extra extensions parsed as structured fragments.
    pub structured_extensions: Vec<String>,
    pub tolerant: bool,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            // Empty components, as in "a::b", carry no root.
            roots: std::env::split_paths(&cli.input)
                .filter(|root| !root.as_os_str().is_empty())
                .collect(),
            output: cli.output,
            build_path: cli.path.trim_matches('/').to_string(),
            structured_extensions: cli.ext,
            tolerant: cli.keep_going,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::LogLevel;

    fn cli(input: &str) -> Cli {
        Cli {
            input: input.to_string(),
            output: PathBuf::from("out"),
            path: String::new(),
            ext: Vec::new(),
            keep_going: false,
            log_level: LogLevel::default(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn empty_input_path_components_are_dropped() {
        let config = RuntimeConfig::from(cli("a::b"));
        assert_eq!(config.roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[cfg(unix)]
    #[test]
    fn wholly_empty_input_yields_no_roots() {
        let config = RuntimeConfig::from(cli(""));
        assert!(config.roots.is_empty());
    }
}

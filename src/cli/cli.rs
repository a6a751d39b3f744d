use std::path::PathBuf;

use clap::Parser;

use crate::cli::LogLevel;

/// A simple directory-tree templating system.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Cli {
    /// List of input directories separated by the platform path
    /// delimiter; directories are merged with each one taking precedence
    /// over any directories to its right
    #[clap(value_name = "INPUT-PATH")]
    pub input: String,

    /// Output directory
    #[clap(value_name = "OUTPUT-DIRECTORY")]
    pub output: PathBuf,

    /// Relative path to build [default: the whole input tree]
    #[clap(long, default_value = "")]
    pub path: String,

    /// Treat files with extension .EXT as structured fragments
    #[clap(long = "ext", value_name = ".EXT")]
    pub ext: Vec<String>,

    /// Record expansion errors and keep going, failing at the end
    #[clap(long)]
    pub keep_going: bool,

    #[clap(long, short, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}

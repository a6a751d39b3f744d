use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use hashlink::LinkedHashMap;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, warn};

/// Exposes tree-resident executables as query-callable functions, scoped
/// to one engine instance. Each binding serves both call signatures:
/// args-only, and args plus stdin.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    bindings: LinkedHashMap<String, PathBuf>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a callable name to an executable's resolved path. The first
    /// registration wins; later ones for the same name reflect a lower
    /// overlay priority or later build order and are dropped.
    pub fn register(&mut self, name: String, path: PathBuf) {
        if self.bindings.contains_key(&name) {
            warn!(
                "Function '{}' is already bound; ignoring '{}'",
                name,
                path.display()
            );
            return;
        }
        debug!("Registered function '{}' -> '{}'", name, path.display());
        self.bindings.insert(name, path);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Synchronously runs the bound executable, feeding `stdin` if given,
    /// and captures standard output as the result. The engine blocks
    /// until the process exits.
    pub fn call(
        &self,
        name: &str,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<String, CallError> {
        let path = self
            .bindings
            .get(name)
            .context(UnknownFunctionSnafu { name })?;
        debug!("Calling function '{}' with {} arg(s)", name, args.len());

        let mut command = Command::new(path);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if stdin.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        let mut child = command.spawn().context(SpawnSnafu { name })?;
        if let Some(input) = stdin {
            // Taking the handle drops it after the write, closing the pipe.
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .context(FeedSnafu { name })?;
            }
        }

        let output = child.wait_with_output().context(WaitSnafu { name })?;
        ensure!(
            output.status.success(),
            UnsuccessfulExitSnafu {
                name,
                status: output.status.code().unwrap_or(-1),
            }
        );

        let mut stdout =
            String::from_utf8(output.stdout).ok().context(NonUtf8OutputSnafu { name })?;
        if stdout.ends_with('\n') {
            stdout.pop();
            if stdout.ends_with('\r') {
                stdout.pop();
            }
        }
        Ok(stdout)
    }
}

#[derive(Debug, Snafu)]
pub enum CallError {
    #[snafu(display("No function named '{name}' is registered"))]
    UnknownFunction { name: String },
    #[snafu(display("Failed to spawn function '{name}'"))]
    Spawn {
        name: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to feed stdin to function '{name}'"))]
    Feed {
        name: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to wait for function '{name}'"))]
    Wait {
        name: String,
        source: std::io::Error,
    },
    #[snafu(display("Function '{name}' failed with exit code {status}"))]
    UnsuccessfulExit { name: String, status: i32 },
    #[snafu(display("Function '{name}' produced non-UTF-8 output"))]
    NonUtf8Output { name: String },
}

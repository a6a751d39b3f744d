use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, info};

use crate::document::{BuildError, TreeBuilder};
use crate::engine::RuntimeConfig;
use crate::expand::{ExpandError, ExpansionOptions, ExpansionReport, ExpansionScheduler};
use crate::overlay::OverlayResolver;
use crate::query::{FunctionRegistry, QueryEvaluator};

pub struct Engine;

impl Engine {
    /// One full run: project the overlay into a document (registering
    /// tree-resident functions and modules on the way), then expand it
    /// into the output directory. The document lives for exactly this
    /// call.
    pub fn run<E: QueryEvaluator>(
        config: impl Into<RuntimeConfig>,
        evaluator: &mut E,
    ) -> Result<ExpansionReport, EngineError> {
        let config: RuntimeConfig = config.into();
        ensure!(
            !config.roots.is_empty() && config.roots.iter().all(|r| !r.as_os_str().is_empty()),
            EmptyInputSnafu
        );

        let resolver = OverlayResolver::new(config.roots.clone());
        let mut registry = FunctionRegistry::new();
        let mut document = TreeBuilder::new(
            &resolver,
            &mut registry,
            evaluator,
            &config.structured_extensions,
        )
        .build()
        .context(TreeBuildSnafu)?;
        debug!(
            "Document ready: {} node(s), {} bound function(s)",
            document.len(),
            registry.len()
        );

        let options = ExpansionOptions {
            tolerant: config.tolerant,
            ..Default::default()
        };
        let report =
            ExpansionScheduler::new(&mut document, &registry, evaluator, options)
                .expand(&config.output, &config.build_path)
                .context(ExpansionSnafu)?;
        info!("Expanded {} node(s)", report.len());
        Ok(report)
    }
}

#[derive(Debug, Snafu)]
pub enum EngineError {
    #[snafu(display("Input path must not be empty"))]
    EmptyInput,
    #[snafu(display("Critical failure while building the document tree"))]
    TreeBuild { source: BuildError },
    #[snafu(display("Critical failure during expansion"))]
    Expansion { source: ExpandError },
}

use clap::Parser as _;
use tracing::debug;

use crate::cli::Cli;
use crate::engine::{Engine, EngineError};
use crate::query::ReferenceEvaluator;

mod cli;
mod document;
mod engine;
mod expand;
mod ext;
mod overlay;
mod query;

#[snafu::report]
fn main() -> Result<(), EngineError> {
    let cli_args = Cli::parse();
    setup_tracing(&cli_args);
    debug!("Parsed CLI arguments: {cli_args:?}");

    let mut evaluator = ReferenceEvaluator::new();
    Engine::run(cli_args, &mut evaluator)?;

    Ok(())
}

fn setup_tracing(cli_args: &Cli) {
    if let Some(level) = Option::<tracing::Level>::from(cli_args.log_level) {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .without_time()
            .compact()
            .init();
    }
}

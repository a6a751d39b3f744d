//! Staged expansion: walking the document into priority buckets, fixpoint
//! evaluation of template nodes, and materializing the output tree.

mod output;
mod scheduler;

pub use output::OutputMapper;
pub use scheduler::{
    ExpandError, ExpansionOptions, ExpansionOutcome, ExpansionReport, ExpansionScheduler,
};

//! The query side of the engine: the evaluator contract, the per-engine
//! function registry backed by tree-resident executables, and query
//! module declarations.

mod evaluator;
mod functions;
mod modules;
mod reference;

pub use evaluator::{EvalContext, EvaluatedNode, EvaluationError, QueryEvaluator, VAR_NODE, VAR_PATH};
pub use functions::{CallError, FunctionRegistry};
pub use modules::{ModuleDeclaration, ModuleError, RejectedSnafu, parse_module_declaration};
pub use reference::ReferenceEvaluator;

use std::collections::HashMap;

use snafu::Snafu;

use crate::document::{Document, tree_path};
use crate::query::functions::FunctionRegistry;
use crate::query::modules::ModuleDeclaration;

/// Variable bound to the context node's directory tree path.
pub const VAR_PATH: &str = "path";
/// Variable bound to the context node's own tree path.
pub const VAR_NODE: &str = "node";

/// Everything an evaluation round may consult: the current document, the
/// context node, the bound variables, and the per-engine function
/// registry. The registry travels in the context rather than living in a
/// process-wide table, so engine instances cannot collide.
pub struct EvalContext<'a> {
    pub document: &'a Document,
    pub node_path: &'a str,
    pub variables: HashMap<String, String>,
    pub functions: &'a FunctionRegistry,
}

impl<'a> EvalContext<'a> {
    pub fn for_node(
        document: &'a Document,
        node_path: &'a str,
        functions: &'a FunctionRegistry,
    ) -> Self {
        let mut variables = HashMap::new();
        variables.insert(VAR_PATH.to_string(), tree_path::parent(node_path).to_string());
        variables.insert(VAR_NODE.to_string(), node_path.to_string());
        Self {
            document,
            node_path,
            variables,
            functions,
        }
    }
}

/// Result of one evaluation round: the canonical serialized form (what
/// fixpoint detection compares) and the inner content (what gets written
/// to the output on convergence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedNode {
    pub serialized: String,
    pub inner: String,
}

#[derive(Debug, Snafu)]
#[snafu(display("{message}"))]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Contract for the external query evaluator. The engine owns scheduling
/// and fixpoint detection; the evaluator owns expression syntax.
pub trait QueryEvaluator {
    /// Makes a named module available to later evaluations. The engine
    /// has already parsed and validated the namespace declaration.
    fn register_module(
        &mut self,
        declaration: &ModuleDeclaration,
        source: &str,
    ) -> Result<(), EvaluationError>;

    /// Evaluates one round over a node's serialized form.
    fn evaluate(
        &mut self,
        serialized: &str,
        ctx: &EvalContext<'_>,
    ) -> Result<EvaluatedNode, EvaluationError>;
}

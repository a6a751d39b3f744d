//! A minimal reference evaluator for the CLI and the integration tests.
//! It understands two self-closing directive elements inside a node's
//! serialized content:
//!
//! - `<sylva:include path="REL"/>` — replaced by the current inner
//!   content of the node at `REL`, resolved against the `$path` variable.
//! - `<sylva:exec name="NAME" args="A B" stdin="TEXT"/>` — replaced by
//!   the captured stdout of the registered function `NAME`.
//!
//! One round rewrites every directive currently present, left to right;
//! the scheduler's fixpoint loop handles directives introduced by a
//! replacement. The full query language lives outside this crate.

use hashlink::LinkedHashMap;
use tracing::debug;

use crate::document::tree_path;
use crate::ext::ErrorChainExt;
use crate::query::evaluator::{
    EvalContext, EvaluatedNode, EvaluationError, QueryEvaluator, VAR_PATH,
};
use crate::query::modules::ModuleDeclaration;

const INCLUDE_TAG: &str = "<sylva:include";
const EXEC_TAG: &str = "<sylva:exec";

#[derive(Debug, Default)]
pub struct ReferenceEvaluator {
    modules: LinkedHashMap<String, String>,
}

impl ReferenceEvaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryEvaluator for ReferenceEvaluator {
    fn register_module(
        &mut self,
        declaration: &ModuleDeclaration,
        _source: &str,
    ) -> Result<(), EvaluationError> {
        debug!(
            "Registered module prefix '{}' for '{}'",
            declaration.prefix, declaration.uri
        );
        self.modules
            .insert(declaration.prefix.clone(), declaration.uri.clone());
        Ok(())
    }

    fn evaluate(
        &mut self,
        serialized: &str,
        ctx: &EvalContext<'_>,
    ) -> Result<EvaluatedNode, EvaluationError> {
        let rewritten = rewrite_directives(serialized, ctx)?;
        let inner = inner_of(&rewritten).to_string();
        Ok(EvaluatedNode {
            serialized: rewritten,
            inner,
        })
    }
}

fn rewrite_directives(input: &str, ctx: &EvalContext<'_>) -> Result<String, EvaluationError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some((at, tag)) = next_directive(rest) {
        output.push_str(&rest[..at]);
        let directive = &rest[at..];
        let end = directive.find("/>").ok_or_else(|| {
            EvaluationError::new(format!("Unterminated directive in '{}'", ctx.node_path))
        })?;
        let attributes = parse_attributes(&directive[tag.len()..end], ctx)?;
        let replacement = match tag {
            INCLUDE_TAG => expand_include(&attributes, ctx)?,
            _ => expand_exec(&attributes, ctx)?,
        };
        output.push_str(&replacement);
        rest = &directive[end + 2..];
    }
    output.push_str(rest);
    Ok(output)
}

/// Position and tag of the leftmost directive, requiring a whitespace or
/// `/` boundary after the tag name.
fn next_directive(text: &str) -> Option<(usize, &'static str)> {
    let candidates = [INCLUDE_TAG, EXEC_TAG].into_iter().filter_map(|tag| {
        let mut from = 0;
        while let Some(found) = text[from..].find(tag) {
            let at = from + found;
            let boundary = text[at + tag.len()..].chars().next();
            if matches!(boundary, Some(c) if c.is_whitespace() || c == '/') {
                return Some((at, tag));
            }
            from = at + 1;
        }
        None
    });
    candidates.min_by_key(|(at, _)| *at)
}

fn parse_attributes(
    text: &str,
    ctx: &EvalContext<'_>,
) -> Result<Vec<(String, String)>, EvaluationError> {
    let malformed =
        || EvaluationError::new(format!("Malformed directive in '{}'", ctx.node_path));
    let mut attributes = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let equals = rest.find('=').ok_or_else(malformed)?;
        let name = rest[..equals].trim().to_string();
        let value_text = rest[equals + 1..]
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(malformed)?;
        let close = value_text.find('"').ok_or_else(malformed)?;
        attributes.push((name, value_text[..close].to_string()));
        rest = value_text[close + 1..].trim_start();
    }
    Ok(attributes)
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn expand_include(
    attributes: &[(String, String)],
    ctx: &EvalContext<'_>,
) -> Result<String, EvaluationError> {
    let relative = attribute(attributes, "path").ok_or_else(|| {
        EvaluationError::new(format!(
            "Include directive in '{}' has no path attribute",
            ctx.node_path
        ))
    })?;
    let base = ctx.variables.get(VAR_PATH).map(String::as_str).unwrap_or("");
    let target = tree_path::join_relative(base, relative);
    let node = ctx.document.get(&target).ok_or_else(|| {
        EvaluationError::new(format!("No such file or directory '{target}'"))
    })?;
    debug!("Including '{}' into '{}'", target, ctx.node_path);
    Ok(node.inner().to_string())
}

fn expand_exec(
    attributes: &[(String, String)],
    ctx: &EvalContext<'_>,
) -> Result<String, EvaluationError> {
    let name = attribute(attributes, "name").ok_or_else(|| {
        EvaluationError::new(format!(
            "Exec directive in '{}' has no name attribute",
            ctx.node_path
        ))
    })?;
    let args: Vec<String> = attribute(attributes, "args")
        .map(|text| text.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let stdin = attribute(attributes, "stdin");
    ctx.functions
        .call(name, &args, stdin)
        .map_err(|err| EvaluationError::new(err.error_chain()))
}

/// Strips the outer wrapper element, leaving the node's inner content.
fn inner_of(serialized: &str) -> &str {
    let Some(open) = serialized.find('>') else {
        return serialized;
    };
    let Some(close) = serialized.rfind("</") else {
        return serialized;
    };
    if close <= open {
        return "";
    }
    &serialized[open + 1..close]
}

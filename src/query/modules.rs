use snafu::Snafu;

use crate::query::evaluator::EvaluationError;

/// The `module namespace <prefix> = "<uri>";` declaration a query module
/// file must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDeclaration {
    pub prefix: String,
    pub uri: String,
}

/// Extracts the namespace declaration from a module's source text. The
/// declaration may appear on any line, but must be present and complete.
pub fn parse_module_declaration(source: &str) -> Result<ModuleDeclaration, ModuleError> {
    source
        .lines()
        .find_map(parse_declaration_line)
        .ok_or(ModuleError::MissingDeclaration)
}

fn parse_declaration_line(line: &str) -> Option<ModuleDeclaration> {
    let rest = strip_keyword(line.trim_start(), "module")?;
    let rest = strip_keyword(rest, "namespace")?;
    let equals = rest.find('=')?;
    let prefix = rest[..equals].trim_end();
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return None;
    }
    let rest = rest[equals + 1..].trim_start().strip_prefix('"')?;
    let close = rest.find('"')?;
    let uri = &rest[..close];
    if rest[close + 1..].trim() != ";" {
        return None;
    }
    Some(ModuleDeclaration {
        prefix: prefix.to_string(),
        uri: uri.to_string(),
    })
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ModuleError {
    #[snafu(display("Missing or malformed module namespace declaration"))]
    MissingDeclaration,
    #[snafu(display("Module rejected by the query evaluator"))]
    Rejected { source: EvaluationError },
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_more::Display;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::expand::output::OutputMapper;
use crate::ext::ErrorChainExt;
use crate::query::{EvalContext, EvaluationError, FunctionRegistry, QueryEvaluator};

/// Default cap on evaluation rounds per node.
const DEFAULT_MAX_ROUNDS: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct ExpansionOptions {
    /// Fixpoint iteration cap; exceeding it fails the node.
    pub max_rounds: u32,
    /// Record per-node failures and keep going instead of aborting,
    /// surfacing one aggregate error at the end.
    pub tolerant: bool,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tolerant: false,
        }
    }
}

/// Final state of one scheduled node.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ExpansionOutcome {
    #[display("written")]
    Written,
    #[display("skipped")]
    Skipped,
    #[display("failed: {_0}")]
    Failed(String),
}

/// Per-node outcomes of a run, in processing order.
#[derive(Debug, Default)]
pub struct ExpansionReport {
    pub outcomes: Vec<(String, ExpansionOutcome)>,
}

impl ExpansionReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcome_of(&self, path: &str) -> Option<&ExpansionOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, outcome)| outcome)
    }
}

/// Drives expansion: walks the document from the build path, groups leaf
/// nodes into ascending priority buckets, then evaluates each to a
/// fixpoint and writes or copies its output. The document is mutated in
/// place, so a later-scheduled node's query observes every earlier
/// node's committed result.
pub struct ExpansionScheduler<'a, E> {
    document: &'a mut Document,
    registry: &'a FunctionRegistry,
    evaluator: &'a mut E,
    options: ExpansionOptions,
}

impl<'a, E: QueryEvaluator> ExpansionScheduler<'a, E> {
    pub fn new(
        document: &'a mut Document,
        registry: &'a FunctionRegistry,
        evaluator: &'a mut E,
        options: ExpansionOptions,
    ) -> Self {
        Self {
            document,
            registry,
            evaluator,
            options,
        }
    }

    pub fn expand(
        mut self,
        output_dir: &Path,
        build_path: &str,
    ) -> Result<ExpansionReport, ExpandError> {
        ensure!(
            self.document.contains(build_path),
            BuildPathNotFoundSnafu { path: build_path }
        );
        let mapper = OutputMapper::new(output_dir.to_path_buf(), build_path.to_string());

        // The whole walk completes, creating output directories as it
        // goes, before any expansion begins.
        let mut buckets: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        self.schedule(build_path, &mapper, &mut buckets)?;
        let queue: Vec<String> = buckets.into_values().flatten().collect();
        info!("Scheduled {} node(s) for expansion", queue.len());

        let mut report = ExpansionReport::default();
        let mut failures = Vec::new();
        for path in queue {
            match self.expand_node(&path, &mapper) {
                Ok(outcome) => {
                    debug!("'{path}': {outcome}");
                    report.outcomes.push((path, outcome));
                }
                Err(err) if self.options.tolerant => {
                    let message = format!("{path}: {}", err.error_chain());
                    warn!("{message}");
                    failures.push(message.clone());
                    report.outcomes.push((path, ExpansionOutcome::Failed(message)));
                }
                Err(err) => return Err(err),
            }
        }

        ensure!(failures.is_empty(), AggregateSnafu { failures });
        Ok(report)
    }

    /// Walks a subtree, eagerly resetting output directories and
    /// appending leaf nodes to their buckets: the numeral carried by the
    /// template marker, or 0. Within a directory, files are queued
    /// before subdirectories are descended into.
    fn schedule(
        &mut self,
        path: &str,
        mapper: &OutputMapper,
        buckets: &mut BTreeMap<u32, Vec<String>>,
    ) -> Result<(), ExpandError> {
        let node = self
            .document
            .get(path)
            .context(BuildPathNotFoundSnafu { path })?;
        if !node.is_directory() {
            debug!("Adding '{path}' to bucket {}", node.bucket());
            buckets
                .entry(node.bucket())
                .or_default()
                .push(path.to_string());
            return Ok(());
        }

        let mapped = mapper.map(path);
        mapper
            .reset_dir(&mapped)
            .context(OutputSnafu { path: mapped })?;

        let children: Vec<String> = node
            .children
            .iter()
            .map(|name| crate::document::tree_path::join(path, name))
            .collect();
        let (directories, files): (Vec<_>, Vec<_>) = children.into_iter().partition(|child| {
            self.document
                .get(child)
                .is_some_and(|node| node.is_directory())
        });
        for child in files {
            self.schedule(&child, mapper, buckets)?;
        }
        for child in directories {
            self.schedule(&child, mapper, buckets)?;
        }
        Ok(())
    }

    fn expand_node(
        &mut self,
        path: &str,
        mapper: &OutputMapper,
    ) -> Result<ExpansionOutcome, ExpandError> {
        let node = self
            .document
            .get(path)
            .context(BuildPathNotFoundSnafu { path })?;
        let is_template = node.template_marker.is_some();
        let no_copy = node.no_copy;
        let source = node.source.clone();
        let output_path = mapper.map(path);

        if is_template {
            let inner = self.evaluate_fixpoint(path)?;
            if no_copy {
                debug!("'{path}' expanded but not written");
                return Ok(ExpansionOutcome::Skipped);
            }
            mapper
                .write(&output_path, &inner)
                .context(OutputSnafu { path: output_path })?;
            return Ok(ExpansionOutcome::Written);
        }

        if no_copy {
            return Ok(ExpansionOutcome::Skipped);
        }
        let source = source.context(MissingSourceSnafu { path })?;
        mapper
            .copy(&source, &output_path)
            .context(OutputSnafu { path: output_path })?;
        Ok(ExpansionOutcome::Written)
    }

    /// Repeatedly evaluates a node's serialized form, committing each
    /// round's result into the document, until it stops changing or the
    /// round cap is exceeded. Returns the converged inner content.
    fn evaluate_fixpoint(&mut self, path: &str) -> Result<String, ExpandError> {
        let mut serialized = self
            .document
            .get(path)
            .context(BuildPathNotFoundSnafu { path })?
            .serialized();
        for round in 1..=self.options.max_rounds {
            let ctx = EvalContext::for_node(self.document, path, self.registry);
            let result = self
                .evaluator
                .evaluate(&serialized, &ctx)
                .context(EvaluationSnafu { path })?;
            let converged = result.serialized == serialized;
            self.document
                .get_mut(path)
                .context(BuildPathNotFoundSnafu { path })?
                .replace_content(result.inner.clone());
            if converged {
                debug!("'{path}' converged after {round} round(s)");
                return Ok(result.inner);
            }
            serialized = result.serialized;
        }
        NonTerminationSnafu {
            path,
            rounds: self.options.max_rounds,
        }
        .fail()
    }
}

#[derive(Debug, Snafu)]
pub enum ExpandError {
    #[snafu(display("Path '{path}' does not exist in the document tree"))]
    BuildPathNotFound { path: String },
    #[snafu(display("Error expanding '{path}'"))]
    Evaluation {
        path: String,
        source: EvaluationError,
    },
    #[snafu(display("Expansion of '{path}' did not terminate after {rounds} round(s)"))]
    NonTermination { path: String, rounds: u32 },
    #[snafu(display("No source recorded for '{path}'"))]
    MissingSource { path: String },
    #[snafu(display("Failed to write output at '{}'", path.display()))]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("{} node(s) failed to expand:\n{}", failures.len(), failures.join("\n")))]
    Aggregate { failures: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::markers::TemplateMarker;
    use crate::document::{Node, NodeContent, NodeKind, tree_path};
    use crate::query::test_support::{ScriptedEvaluator, identity_evaluator};
    use crate::query::EvaluatedNode;
    use tempfile::TempDir;

    fn directory(path: &str, children: &[&str]) -> Node {
        Node {
            tree_path: path.to_string(),
            name: tree_path::name(path).to_string(),
            kind: NodeKind::Directory,
            content: NodeContent::Empty,
            children: children.iter().map(|c| c.to_string()).collect(),
            template_marker: None,
            no_copy: false,
            source: None,
        }
    }

    fn template(path: &str, text: &str, bucket: u32) -> Node {
        Node {
            tree_path: path.to_string(),
            name: tree_path::name(path).to_string(),
            kind: NodeKind::File,
            content: NodeContent::Text(text.to_string()),
            children: Vec::new(),
            template_marker: Some(TemplateMarker { bucket }),
            no_copy: false,
            source: None,
        }
    }

    #[test]
    fn buckets_concatenate_in_ascending_numeric_order() {
        let mut document = Document::new();
        document.insert(directory(
            "",
            &["late.sylva2.txt", "first.sylva.txt", "mid.sylva1.txt"],
        ));
        document.insert(template("late.sylva2.txt", "", 2));
        document.insert(template("first.sylva.txt", "alpha", 0));
        document.insert(template("mid.sylva1.txt", "", 1));

        let registry = FunctionRegistry::new();
        let mut evaluator = identity_evaluator();
        let out = TempDir::new().expect("temp dir");
        let report = ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "")
        .expect("expand");

        let order: Vec<&str> = report.outcomes.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            order,
            vec!["first.sylva.txt", "mid.sylva1.txt", "late.sylva2.txt"]
        );
        // Only the inner content reaches the output, never the wrapper.
        assert_eq!(
            std::fs::read_to_string(out.path().join("first.txt")).expect("read"),
            "alpha"
        );
    }

    #[test]
    fn later_buckets_observe_committed_earlier_results() {
        let mut document = Document::new();
        document.insert(directory("", &["early.sylva.txt", "late.sylva1.txt"]));
        document.insert(template("early.sylva.txt", "seed", 0));
        document.insert(template("late.sylva1.txt", "probe", 1));

        // Rewrites "seed" to "grown"; the bucket-1 probe reads whatever
        // the bucket-0 node holds at its own evaluation time.
        let mut evaluator = ScriptedEvaluator::new(|serialized: &str, ctx: &EvalContext<'_>| {
            if serialized.contains("probe") {
                let early = ctx.document.get("early.sylva.txt").expect("early").inner();
                let inner = format!("saw {early}");
                Ok(EvaluatedNode {
                    serialized: serialized.replace("probe", &inner),
                    inner,
                })
            } else {
                let inner = serialized.contains("seed").then(|| "grown".to_string());
                match inner {
                    Some(inner) => Ok(EvaluatedNode {
                        serialized: serialized.replace("seed", "grown"),
                        inner,
                    }),
                    None => Ok(EvaluatedNode {
                        serialized: serialized.to_string(),
                        inner: inner_text(serialized),
                    }),
                }
            }
        });

        let registry = FunctionRegistry::new();
        let out = TempDir::new().expect("temp dir");
        ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "")
        .expect("expand");

        assert_eq!(
            std::fs::read_to_string(out.path().join("late.txt")).expect("read"),
            "saw grown"
        );
    }

    #[test]
    fn earlier_buckets_see_only_unexpanded_later_content() {
        let mut document = Document::new();
        document.insert(directory("", &["first.sylva.txt", "second.sylva1.txt"]));
        document.insert(template("first.sylva.txt", "probe", 0));
        document.insert(template("second.sylva1.txt", "raw", 1));

        // The bucket-0 node reads its bucket-1 sibling at evaluation
        // time; the sibling rewrites itself to "cooked" when its own
        // turn comes.
        let mut evaluator = ScriptedEvaluator::new(|_: &str, ctx: &EvalContext<'_>| {
            let inner = match ctx.node_path {
                "first.sylva.txt" => {
                    let peer = ctx
                        .document
                        .get("second.sylva1.txt")
                        .expect("peer")
                        .inner();
                    format!("saw {peer}")
                }
                "second.sylva1.txt" => "cooked".to_string(),
                other => panic!("unexpected node '{other}'"),
            };
            Ok(EvaluatedNode {
                serialized: format!("<sylva:node>{inner}</sylva:node>"),
                inner,
            })
        });

        let registry = FunctionRegistry::new();
        let out = TempDir::new().expect("temp dir");
        ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "")
        .expect("expand");

        // Bucket 0 observed bucket 1 before its expansion, never after.
        assert_eq!(
            std::fs::read_to_string(out.path().join("first.txt")).expect("read"),
            "saw raw"
        );
        assert_eq!(
            std::fs::read_to_string(out.path().join("second.txt")).expect("read"),
            "cooked"
        );
    }

    fn inner_text(serialized: &str) -> String {
        let open = serialized.find('>').map(|i| i + 1).unwrap_or(0);
        let close = serialized.rfind("</").unwrap_or(serialized.len());
        serialized[open..close].to_string()
    }

    #[test]
    fn stable_content_converges_after_one_round() {
        let mut document = Document::new();
        document.insert(directory("", &["page.sylva.txt"]));
        document.insert(template("page.sylva.txt", "already stable", 0));

        let rounds = std::rc::Rc::new(std::cell::Cell::new(0u32));
        let counter = rounds.clone();
        let mut evaluator = ScriptedEvaluator::new(move |serialized: &str, _: &EvalContext<'_>| {
            counter.set(counter.get() + 1);
            Ok(EvaluatedNode {
                serialized: serialized.to_string(),
                inner: inner_text(serialized),
            })
        });
        let registry = FunctionRegistry::new();
        let out = TempDir::new().expect("temp dir");
        ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "")
        .expect("expand");
        assert_eq!(rounds.get(), 1);
        assert_eq!(
            std::fs::read_to_string(out.path().join("page.txt")).expect("read"),
            "already stable"
        );
    }

    #[test]
    fn diverging_evaluation_fails_after_exactly_the_round_cap() {
        let mut document = Document::new();
        document.insert(directory("", &["diverge.sylva.txt"]));
        document.insert(template("diverge.sylva.txt", "0", 0));

        let mut calls = 0u32;
        let mut evaluator = ScriptedEvaluator::new(move |serialized: &str, _: &EvalContext<'_>| {
            calls += 1;
            Ok(EvaluatedNode {
                serialized: format!("{serialized}{calls}"),
                inner: calls.to_string(),
            })
        });
        let registry = FunctionRegistry::new();
        let out = TempDir::new().expect("temp dir");
        let err = ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions {
                max_rounds: 4,
                tolerant: false,
            },
        )
        .expand(out.path(), "")
        .expect_err("should not terminate");
        assert!(
            matches!(err, ExpandError::NonTermination { ref path, rounds: 4 } if path == "diverge.sylva.txt")
        );
    }

    #[test]
    fn no_copy_nodes_are_never_written() {
        let mut document = Document::new();
        document.insert(directory("", &["hidden.sylva.in.txt", "ignored.in.txt"]));
        document.insert({
            let mut node = template("hidden.sylva.in.txt", "secret", 0);
            node.no_copy = true;
            node
        });
        document.insert({
            let mut node = template("ignored.in.txt", "", 0);
            node.template_marker = None;
            node.no_copy = true;
            node
        });

        let registry = FunctionRegistry::new();
        let mut evaluator = identity_evaluator();
        let out = TempDir::new().expect("temp dir");
        let report = ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "")
        .expect("expand");

        assert_eq!(
            report.outcome_of("hidden.sylva.in.txt"),
            Some(&ExpansionOutcome::Skipped)
        );
        assert_eq!(
            report.outcome_of("ignored.in.txt"),
            Some(&ExpansionOutcome::Skipped)
        );
        assert_eq!(std::fs::read_dir(out.path()).expect("list").count(), 0);
    }

    #[test]
    fn tolerant_mode_attempts_every_node_and_aggregates() {
        let mut document = Document::new();
        document.insert(directory("", &["bad.sylva.txt", "good.sylva.txt"]));
        document.insert(template("bad.sylva.txt", "boom", 0));
        document.insert(template("good.sylva.txt", "fine", 0));

        let mut evaluator = ScriptedEvaluator::new(|serialized: &str, _: &EvalContext<'_>| {
            if serialized.contains("boom") {
                Err(EvaluationError::new("synthetic failure"))
            } else {
                Ok(EvaluatedNode {
                    serialized: serialized.to_string(),
                    inner: inner_text(serialized),
                })
            }
        });
        let registry = FunctionRegistry::new();
        let out = TempDir::new().expect("temp dir");
        let err = ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions {
                tolerant: true,
                ..Default::default()
            },
        )
        .expand(out.path(), "")
        .expect_err("aggregate failure");

        match err {
            ExpandError::Aggregate { failures } => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("bad.sylva.txt"));
            }
            other => panic!("expected an aggregate error, got {other:?}"),
        }
        // The good node was still expanded and written.
        assert_eq!(
            std::fs::read_to_string(out.path().join("good.txt")).expect("read"),
            "fine"
        );
    }

    #[test]
    fn missing_build_path_is_fatal() {
        let mut document = Document::new();
        document.insert(directory("", &[]));
        let registry = FunctionRegistry::new();
        let mut evaluator = identity_evaluator();
        let out = TempDir::new().expect("temp dir");
        let err = ExpansionScheduler::new(
            &mut document,
            &registry,
            &mut evaluator,
            ExpansionOptions::default(),
        )
        .expand(out.path(), "nope")
        .expect_err("should fail");
        assert!(matches!(err, ExpandError::BuildPathNotFound { ref path } if path == "nope"));
    }
}

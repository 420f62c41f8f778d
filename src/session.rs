//! One coverage build session: accumulate raw samples and registered source
//! files, then compile them into the finished report tree.

use anyhow::{Context, Result};

use crate::analysis::AnalysisCache;
use crate::ast::SourceAst;
use crate::coverage::{ProcessedCoverage, RawSample};
use crate::tree::{self, Node};

/// Owns the accumulating merge table and the per-file analysis cache for
/// exactly one run. `finish` consumes the session, so a finished report can
/// never be appended to.
#[derive(Debug)]
pub struct CoverageSession {
    coverage: ProcessedCoverage,
    cache: AnalysisCache,
    path_coverage: bool,
}

impl Default for CoverageSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageSession {
    /// A session with annotation- and attribute-based ignores enabled and
    /// path coverage disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(true, true, false)
    }

    #[must_use]
    pub fn with_options(use_annotations: bool, use_attributes: bool, path_coverage: bool) -> Self {
        Self {
            coverage: ProcessedCoverage::new(),
            cache: AnalysisCache::new(use_annotations, use_attributes),
            path_coverage,
        }
    }

    /// Register a source file for analysis. Files registered here appear in
    /// the report even when no sample ever touches them.
    pub fn add_source(&mut self, path: &str, source: &str, ast: &SourceAst) {
        self.cache.analyse(path, source, ast);
    }

    /// Merge one raw sample recorded for `test_id`.
    pub fn append(&mut self, test_id: &str, sample: &RawSample) -> Result<()> {
        let sample = if self.path_coverage {
            sample.clone()
        } else {
            // Branch/path tables are dropped when path coverage is off.
            let mut stripped = sample.clone();
            for data in stripped.files.values_mut() {
                data.functions.clear();
            }
            stripped
        };
        self.coverage
            .merge_sample(test_id, &sample)
            .with_context(|| format!("merging sample for test '{test_id}'"))
    }

    /// Merge an untyped JSON sample, e.g. straight from a driver dump.
    pub fn append_json(&mut self, test_id: &str, value: &serde_json::Value) -> Result<()> {
        let sample = RawSample::from_json(value)
            .with_context(|| format!("decoding sample for test '{test_id}'"))?;
        self.append(test_id, &sample)
    }

    /// Combine another session's processed table into this one, enabling
    /// per-worker partial tables to be merged in any order.
    pub fn absorb(&mut self, other: ProcessedCoverage) {
        self.coverage.append(other);
    }

    #[must_use]
    pub fn processed(&self) -> &ProcessedCoverage {
        &self.coverage
    }

    /// Compile everything accumulated so far into the finalized report tree.
    pub fn finish(self) -> Result<Node> {
        let analysis = self.cache.into_results();
        tree::build(&self.coverage, &analysis).context("building report tree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExprKind, FunctionDecl, Item, Span, Stmt, StmtKind};

    fn one_function_ast() -> SourceAst {
        SourceAst {
            items: vec![Item::Function(FunctionDecl {
                name: "run".to_string(),
                namespaced_name: "run".to_string(),
                span: Span::new(1, 4),
                params: vec![],
                return_type: None,
                body: vec![
                    Stmt::new(2, StmtKind::Expr(Expr::new(2, ExprKind::Literal))),
                    Stmt::new(3, StmtKind::Expr(Expr::new(3, ExprKind::Literal))),
                ],
                attributes: vec![],
                doc_comment: None,
            })],
        }
    }

    #[test]
    fn test_session_end_to_end() {
        let mut session = CoverageSession::new();
        session.add_source("/src/run.php", "", &one_function_ast());
        session
            .append_json(
                "t1",
                &serde_json::json!({"/src/run.php": {"2": 1, "3": -1}}),
            )
            .unwrap();

        let root = session.finish().unwrap();
        assert!(root.is_finalized());
        assert_eq!(root.totals.executable_lines, 2);
        assert_eq!(root.totals.executed_lines, 1);
        assert_eq!(root.totals.functions, 1);
        assert_eq!(root.totals.tested_functions, 0);
    }

    #[test]
    fn test_unsampled_source_reported_uncovered() {
        let mut session = CoverageSession::new();
        session.add_source("/src/run.php", "", &one_function_ast());

        let root = session.finish().unwrap();
        assert_eq!(root.totals.executable_lines, 2);
        assert_eq!(root.totals.executed_lines, 0);
    }
}

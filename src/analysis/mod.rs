//! Static analyser: inspects each covered source file once to discover its
//! code units and classify every line as executable, ignored, or structural.

pub mod complexity;
pub mod lines;
pub mod units;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::ast::{SourceAst, Visibility};

/// (total, comment, non-comment) line counts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinesOfCode {
    pub total: u32,
    pub comment: u32,
    pub non_comment: u32,
}

/// A method as a coverage target.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub visibility: Visibility,
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    /// Cyclomatic complexity, always ≥ 1.
    pub ccn: u32,
}

#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub namespaced_name: String,
    pub namespace: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    /// Used trait names, resolved in a second pass once all traits in the
    /// file are known.
    pub traits: Vec<String>,
    pub methods: BTreeMap<String, Method>,
}

#[derive(Debug, Clone)]
pub struct Trait {
    pub name: String,
    pub namespaced_name: String,
    pub namespace: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub traits: Vec<String>,
    pub methods: BTreeMap<String, Method>,
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub namespaced_name: String,
    pub namespace: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub extends: Vec<String>,
}

/// A free function as a coverage target.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub namespaced_name: String,
    pub namespace: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub signature: String,
    pub ccn: u32,
}

/// Immutable result of analysing one source file.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub file: String,
    pub interfaces: BTreeMap<String, Interface>,
    pub classes: BTreeMap<String, Class>,
    pub traits: BTreeMap<String, Trait>,
    pub functions: BTreeMap<String, Function>,
    pub executable_lines: BTreeSet<u32>,
    pub ignored_lines: BTreeSet<u32>,
    pub lines_of_code: LinesOfCode,
}

/// Analyse one file. Pure: the same inputs always produce the same result,
/// which makes it cacheable per file content.
#[must_use]
pub fn analyse(
    file: &str,
    source: &str,
    ast: &SourceAst,
    use_annotations: bool,
    use_attributes: bool,
) -> AnalysisResult {
    let classification = lines::classify(source, ast, use_annotations, use_attributes);
    let units = units::extract(file, ast);

    AnalysisResult {
        file: file.to_string(),
        interfaces: units.interfaces,
        classes: units.classes,
        traits: units.traits,
        functions: units.functions,
        executable_lines: classification.executable,
        ignored_lines: classification.ignored,
        lines_of_code: classification.lines_of_code,
    }
}

/// Per-session memoization of analysis results, keyed by file path.
///
/// Owned by one build session; passing it explicitly (rather than keeping
/// ambient global state) pins the cache lifetime to the session.
#[derive(Debug)]
pub struct AnalysisCache {
    entries: HashMap<String, Arc<AnalysisResult>>,
    use_annotations: bool,
    use_attributes: bool,
}

impl AnalysisCache {
    #[must_use]
    pub fn new(use_annotations: bool, use_attributes: bool) -> Self {
        Self {
            entries: HashMap::new(),
            use_annotations,
            use_attributes,
        }
    }

    /// Analyse `file` or return the cached result from a previous call.
    pub fn analyse(&mut self, file: &str, source: &str, ast: &SourceAst) -> Arc<AnalysisResult> {
        if let Some(result) = self.entries.get(file) {
            return Arc::clone(result);
        }
        let result = Arc::new(analyse(
            file,
            source,
            ast,
            self.use_annotations,
            self.use_attributes,
        ));
        self.entries.insert(file.to_string(), Arc::clone(&result));
        result
    }

    #[must_use]
    pub fn get(&self, file: &str) -> Option<Arc<AnalysisResult>> {
        self.entries.get(file).map(Arc::clone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the cache, yielding results ordered by file path for the
    /// tree builder.
    #[must_use]
    pub fn into_results(self) -> BTreeMap<String, Arc<AnalysisResult>> {
        self.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExprKind, Item, Span, Stmt, StmtKind};

    fn tiny_ast() -> SourceAst {
        SourceAst {
            items: vec![Item::Function(crate::ast::FunctionDecl {
                name: "f".to_string(),
                namespaced_name: "f".to_string(),
                span: Span::new(1, 3),
                params: vec![],
                return_type: None,
                body: vec![Stmt::new(
                    2,
                    StmtKind::Expr(Expr::new(2, ExprKind::Literal)),
                )],
                attributes: vec![],
                doc_comment: None,
            })],
        }
    }

    #[test]
    fn test_analyse_assembles_units_and_lines() {
        let result = analyse("/src/f.php", "<?php\nf();\n", &tiny_ast(), true, true);
        assert_eq!(result.file, "/src/f.php");
        assert!(result.functions.contains_key("f"));
        assert!(result.executable_lines.contains(&2));
        assert_eq!(result.lines_of_code.total, 2);
    }

    #[test]
    fn test_cache_returns_same_result() {
        let mut cache = AnalysisCache::new(true, true);
        let first = cache.analyse("/src/f.php", "", &tiny_ast());
        let second = cache.analyse("/src/f.php", "", &tiny_ast());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}

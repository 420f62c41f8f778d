//! Tree builder: fuses the merged coverage table with per-file analysis
//! results into a directory/file node tree with rolled-up metrics.

pub mod node;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analysis::{AnalysisResult, Method};
use crate::coverage::{FileCoverage, LineStatus, ProcessedCoverage};
use crate::error::Result;
use crate::metrics::{crap_index, Percentage};

pub use node::{Node, NodeKind, RoutineMetrics, Totals, UnitMetrics, UnitRef};

/// Build the report tree. Every file with an `AnalysisResult` appears in the
/// tree; files without any observed sample are inserted fully uncovered.
pub fn build(
    coverage: &ProcessedCoverage,
    analysis: &BTreeMap<String, Arc<AnalysisResult>>,
) -> Result<Node> {
    let paths: Vec<String> = analysis.keys().cloned().collect();
    let (common, relatives) = reduce_paths(&paths);

    let mut root = Node::directory(common, ".");
    for (path, relative) in paths.iter().zip(&relatives) {
        let result = &analysis[path];
        let file_cov = coverage.file(path);
        let lines = normalized_lines(file_cov, result);
        let file_node = build_file_node(relative, result, &lines, file_cov);
        insert(&mut root, relative, file_node)?;
    }

    root.rollup();
    Ok(root)
}

// -- path reduction ----------------------------------------------------------

/// Split a path into segments, keeping `scheme://archive` wrappers atomic so
/// an archive is never split mid-name. Absolute paths keep a leading empty
/// segment so rejoining restores the leading slash.
fn split_segments(path: &str) -> Vec<String> {
    if let Some(idx) = path.find("://") {
        let scheme_end = idx + 3;
        let mut parts = path[scheme_end..].split('/');
        let archive = parts.next().unwrap_or_default();
        let mut segments = vec![format!("{}{}", &path[..scheme_end], archive)];
        segments.extend(parts.filter(|s| !s.is_empty()).map(str::to_string));
        segments
    } else {
        let mut segments: Vec<String> = Vec::new();
        for (i, part) in path.split('/').enumerate() {
            if part.is_empty() && i > 0 {
                continue;
            }
            segments.push(part.to_string());
        }
        segments
    }
}

fn join_segments(segments: &[String]) -> String {
    if segments.len() == 1 && segments[0].is_empty() {
        return "/".to_string();
    }
    segments.join("/")
}

/// Compute the longest common path prefix and the tree-relative paths.
/// A single path reduces to its own directory and basename; no common
/// prefix yields the root path `"."`.
#[must_use]
pub fn reduce_paths(paths: &[String]) -> (String, Vec<String>) {
    if paths.is_empty() {
        return (".".to_string(), Vec::new());
    }

    let split: Vec<Vec<String>> = paths.iter().map(|p| split_segments(p)).collect();

    let mut prefix = 0;
    let max_prefix = split.iter().map(Vec::len).min().unwrap_or(0).saturating_sub(1);
    'grow: while prefix < max_prefix {
        let segment = &split[0][prefix];
        for other in &split[1..] {
            if &other[prefix] != segment {
                break 'grow;
            }
        }
        prefix += 1;
    }

    let common = join_segments(&split[0][..prefix]);
    let common = if common.is_empty() {
        ".".to_string()
    } else {
        common
    };
    let relatives = split.iter().map(|s| s[prefix..].join("/")).collect();
    (common, relatives)
}

// -- file-level metrics ------------------------------------------------------

/// Reconcile the merged line table with the file's static analysis: only
/// analyser-executable lines survive (ignored lines were already removed by
/// the classifier), lines the driver called dead are dropped, and executable
/// lines with no observation are backfilled as uncovered.
fn normalized_lines(
    file_cov: Option<&FileCoverage>,
    result: &AnalysisResult,
) -> BTreeMap<u32, LineStatus> {
    let mut table = BTreeMap::new();
    for &line in &result.executable_lines {
        let status = match file_cov.and_then(|c| c.lines.get(&line)) {
            None => LineStatus::Uncovered,
            Some(LineStatus::NotExecutable) => continue,
            Some(status) => status.clone(),
        };
        table.insert(line, status);
    }
    table
}

fn span_counts(table: &BTreeMap<u32, LineStatus>, start: u32, end: u32) -> (u64, u64) {
    let mut executable = 0;
    let mut executed = 0;
    for (_, status) in table.range(start..=end) {
        executable += 1;
        if status.is_covered() {
            executed += 1;
        }
    }
    (executable, executed)
}

fn routine_metrics(
    name: &str,
    signature: &str,
    visibility: Option<&'static str>,
    start_line: u32,
    end_line: u32,
    ccn: u32,
    table: &BTreeMap<u32, LineStatus>,
) -> RoutineMetrics {
    let (executable_lines, executed_lines) = span_counts(table, start_line, end_line);
    let coverage = Percentage::new(executed_lines, executable_lines);
    let crap = crap_index(u64::from(ccn), coverage.as_float());
    RoutineMetrics {
        name: name.to_string(),
        signature: signature.to_string(),
        visibility,
        start_line,
        end_line,
        ccn,
        executable_lines,
        executed_lines,
        coverage,
        crap,
    }
}

fn method_metrics(method: &Method, table: &BTreeMap<u32, LineStatus>) -> RoutineMetrics {
    routine_metrics(
        &method.name,
        &method.signature,
        Some(method.visibility.as_str()),
        method.start_line,
        method.end_line,
        method.ccn,
        table,
    )
}

/// Aggregate a class-like unit from its method metrics.
fn unit_metrics(
    name: &str,
    namespace: &str,
    start_line: u32,
    end_line: u32,
    methods: BTreeMap<String, RoutineMetrics>,
) -> UnitMetrics {
    let mut executable_lines = 0;
    let mut executed_lines = 0;
    let mut ccn = 0;
    for method in methods.values() {
        executable_lines += method.executable_lines;
        executed_lines += method.executed_lines;
        ccn += method.ccn;
    }
    let coverage = Percentage::new(executed_lines, executable_lines);
    let crap = crap_index(u64::from(ccn.max(1)), coverage.as_float());
    UnitMetrics {
        name: name.to_string(),
        namespace: namespace.to_string(),
        start_line,
        end_line,
        ccn: ccn.max(1),
        executable_lines,
        executed_lines,
        coverage,
        crap,
        methods,
    }
}

/// A class/trait is tested when at least one of its methods was exercised;
/// a method or function is tested only at full coverage.
fn unit_is_tested(unit: &UnitMetrics) -> bool {
    unit.methods.values().any(|m| m.executed_lines > 0)
}

fn routine_is_tested(routine: &RoutineMetrics) -> bool {
    routine.executable_lines > 0 && routine.executed_lines == routine.executable_lines
}

fn build_file_node(
    relative: &str,
    result: &AnalysisResult,
    table: &BTreeMap<u32, LineStatus>,
    file_cov: Option<&FileCoverage>,
) -> Node {
    let mut classes = BTreeMap::new();
    for (fqn, class) in &result.classes {
        let methods: BTreeMap<String, RoutineMetrics> = class
            .methods
            .values()
            .map(|m| (m.name.clone(), method_metrics(m, table)))
            .collect();
        classes.insert(
            fqn.clone(),
            unit_metrics(
                &class.name,
                &class.namespace,
                class.start_line,
                class.end_line,
                methods,
            ),
        );
    }

    let mut traits = BTreeMap::new();
    for (fqn, tr) in &result.traits {
        let methods: BTreeMap<String, RoutineMetrics> = tr
            .methods
            .values()
            .map(|m| (m.name.clone(), method_metrics(m, table)))
            .collect();
        traits.insert(
            fqn.clone(),
            unit_metrics(&tr.name, &tr.namespace, tr.start_line, tr.end_line, methods),
        );
    }

    let mut functions = BTreeMap::new();
    for (fqn, function) in &result.functions {
        functions.insert(
            fqn.clone(),
            routine_metrics(
                &function.name,
                &function.signature,
                None,
                function.start_line,
                function.end_line,
                function.ccn,
                table,
            ),
        );
    }

    let mut totals = Totals::default();
    for unit in classes.values() {
        totals.classes += 1;
        if unit_is_tested(unit) {
            totals.tested_classes += 1;
        }
        add_routine_totals(&mut totals, unit.methods.values());
        totals.executable_lines += unit.executable_lines;
        totals.executed_lines += unit.executed_lines;
    }
    for unit in traits.values() {
        totals.traits += 1;
        if unit_is_tested(unit) {
            totals.tested_traits += 1;
        }
        add_routine_totals(&mut totals, unit.methods.values());
        totals.executable_lines += unit.executable_lines;
        totals.executed_lines += unit.executed_lines;
    }
    for function in functions.values() {
        if function.executable_lines > 0 {
            totals.functions += 1;
            if routine_is_tested(function) {
                totals.tested_functions += 1;
            }
        }
        totals.executable_lines += function.executable_lines;
        totals.executed_lines += function.executed_lines;
    }

    if let Some(cov) = file_cov {
        let (total, executed) = cov.branch_totals();
        totals.executable_branches = total;
        totals.executed_branches = executed;
        let (total, executed) = cov.path_totals();
        totals.executable_paths = total;
        totals.executed_paths = executed;
    }

    let name = relative.rsplit('/').next().unwrap_or(relative).to_string();
    Node::file(name, relative, totals, classes, traits, functions, table.clone())
}

fn add_routine_totals<'a>(
    totals: &mut Totals,
    methods: impl Iterator<Item = &'a RoutineMetrics>,
) {
    for method in methods {
        if method.executable_lines > 0 {
            totals.methods += 1;
            if routine_is_tested(method) {
                totals.tested_methods += 1;
            }
        }
    }
}

// -- construction ------------------------------------------------------------

fn insert(root: &mut Node, relative: &str, file_node: Node) -> Result<()> {
    let mut segments = split_segments(relative);
    segments.pop();
    // Paths that kept their leading slash (no common prefix was found)
    // carry an empty head segment; it adds no directory level.
    segments.retain(|s| !s.is_empty());

    let mut current = root;
    let mut id = String::new();
    for segment in segments {
        if id.is_empty() {
            id.clone_from(&segment);
        } else {
            id = format!("{id}/{segment}");
        }
        current = ensure_directory(current, &segment, &id);
    }
    current.add_child(file_node)
}

fn ensure_directory<'a>(parent: &'a mut Node, name: &str, id: &str) -> &'a mut Node {
    let NodeKind::Directory { children } = &mut parent.kind else {
        unreachable!("file nodes are only ever inserted as leaves");
    };
    if let Some(idx) = children
        .iter()
        .position(|c| c.is_directory() && c.name == name)
    {
        return &mut children[idx];
    }
    let idx = children.len();
    children.push(Node::directory(name, id));
    &mut children[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    // -- reduce_paths --------------------------------------------------------

    #[test]
    fn test_reduce_common_directory() {
        let (common, relatives) =
            reduce_paths(&paths(&["/a/b/Money.php", "/a/b/MoneyBag.php"]));
        assert_eq!(common, "/a/b");
        assert_eq!(relatives, vec!["Money.php", "MoneyBag.php"]);
    }

    #[test]
    fn test_reduce_single_path_uses_parent_directory() {
        let (common, relatives) = reduce_paths(&paths(&["/a/b/Money.php"]));
        assert_eq!(common, "/a/b");
        assert_eq!(relatives, vec!["Money.php"]);
    }

    #[test]
    fn test_reduce_no_common_prefix() {
        let (common, relatives) =
            reduce_paths(&paths(&["/a/Money.php", "phar://x.phar/Money.php"]));
        assert_eq!(common, ".");
        assert_eq!(relatives, vec!["/a/Money.php", "phar://x.phar/Money.php"]);
    }

    #[test]
    fn test_reduce_keeps_archive_segment_atomic() {
        let (common, relatives) = reduce_paths(&paths(&[
            "phar://project.phar/src/Money.php",
            "phar://project.phar/src/MoneyBag.php",
        ]));
        assert_eq!(common, "phar://project.phar/src");
        assert_eq!(relatives, vec!["Money.php", "MoneyBag.php"]);
    }

    #[test]
    fn test_reduce_mixed_depth() {
        let (common, relatives) =
            reduce_paths(&paths(&["/a/b/Money.php", "/a/b/util/Sums.php"]));
        assert_eq!(common, "/a/b");
        assert_eq!(relatives, vec!["Money.php", "util/Sums.php"]);
    }

    #[test]
    fn test_reduce_empty() {
        let (common, relatives) = reduce_paths(&[]);
        assert_eq!(common, ".");
        assert!(relatives.is_empty());
    }

    // -- normalization -------------------------------------------------------

    #[test]
    fn test_normalized_lines_backfills_uncovered() {
        let mut result = AnalysisResult::default();
        result.executable_lines.extend([3, 4, 5]);

        let mut cov = ProcessedCoverage::new();
        let mut sample = crate::coverage::RawSample::new();
        let mut data = crate::coverage::RawFileData::default();
        data.lines.insert(3, 1);
        // Line 4 dead per the driver; line 5 unobserved.
        data.lines.insert(4, -2);
        // Line 9 is not executable per analysis and must not survive.
        data.lines.insert(9, 1);
        sample.files.insert("/src/a.php".to_string(), data);
        cov.merge_sample("t1", &sample).unwrap();

        let table = normalized_lines(cov.file("/src/a.php"), &result);
        assert!(table[&3].is_covered());
        assert!(!table.contains_key(&4));
        assert_eq!(table[&5], LineStatus::Uncovered);
        assert!(!table.contains_key(&9));
    }
}

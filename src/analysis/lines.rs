//! Line classifier: decides, per physical line, whether it is executable,
//! structurally inert, or explicitly ignored, and counts lines of code.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::LinesOfCode;
use crate::ast::{
    Attribute, Expr, ExprKind, Item, Member, SourceAst, Stmt, StmtKind,
};

/// `@codeCoverageIgnore` as a whole word, so it does not match the
/// Start/End block markers.
static IGNORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@codeCoverageIgnore\b").unwrap());
static IGNORE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@codeCoverageIgnoreStart\b").unwrap());
static IGNORE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@codeCoverageIgnoreEnd\b").unwrap());

/// Attribute name that ignores a whole declaration.
const IGNORE_ATTRIBUTE: &str = "CodeCoverageIgnore";

/// Result of classifying one file.
#[derive(Debug, Clone, Default)]
pub struct LineClassification {
    /// Lines that begin a statement able to produce a runtime op, minus
    /// the ignored ones.
    pub executable: BTreeSet<u32>,
    pub ignored: BTreeSet<u32>,
    pub lines_of_code: LinesOfCode,
}

/// Classify every line of `source` given its parsed AST.
#[must_use]
pub fn classify(
    source: &str,
    ast: &SourceAst,
    use_annotations: bool,
    use_attributes: bool,
) -> LineClassification {
    let mut executable = BTreeSet::new();
    collect_executable(ast, &mut executable);

    let mut ignored = ignored_blocks(source);
    collect_unit_ignores(ast, use_annotations, use_attributes, &mut ignored);

    for line in &ignored {
        executable.remove(line);
    }

    LineClassification {
        executable,
        ignored,
        lines_of_code: count_loc(source),
    }
}

// -- executable lines --------------------------------------------------------

fn collect_executable(ast: &SourceAst, out: &mut BTreeSet<u32>) {
    for item in &ast.items {
        match item {
            // Interface method stubs have no bodies; nothing executes.
            Item::Interface(_) => {}
            Item::Class(c) => collect_members(&c.members, out),
            Item::Trait(t) => collect_members(&t.members, out),
            Item::Enum(e) => collect_members(&e.members, out),
            Item::Function(f) => walk_stmts(&f.body, out),
            Item::Stmt(s) => walk_stmt(s, out),
        }
    }
}

fn collect_members(members: &[Member], out: &mut BTreeSet<u32>) {
    for member in members {
        match member {
            Member::Method(m) => {
                if let Some(body) = &m.body {
                    walk_stmts(body, out);
                }
            }
            Member::UseTrait { .. } | Member::EnumCase(_) => {}
        }
    }
}

fn walk_stmts(stmts: &[Stmt], out: &mut BTreeSet<u32>) {
    for stmt in stmts {
        walk_stmt(stmt, out);
    }
}

fn walk_stmt(stmt: &Stmt, out: &mut BTreeSet<u32>) {
    out.insert(stmt.line);
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Throw(e) | StmtKind::Return(Some(e)) => walk_expr(e, out),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Echo(exprs) => {
            for e in exprs {
                walk_expr(e, out);
            }
        }
        StmtKind::If {
            cond,
            then,
            elseifs,
            else_branch,
        } => {
            walk_expr(cond, out);
            walk_stmts(then, out);
            for (cond, body) in elseifs {
                // The elseif condition is evaluated at runtime.
                out.insert(cond.line);
                walk_expr(cond, out);
                walk_stmts(body, out);
            }
            if let Some(body) = else_branch {
                walk_stmts(body, out);
            }
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            walk_expr(cond, out);
            walk_stmts(body, out);
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            for e in init.iter().chain(step) {
                walk_expr(e, out);
            }
            if let Some(cond) = cond {
                walk_expr(cond, out);
            }
            walk_stmts(body, out);
        }
        StmtKind::Foreach { subject, body } => {
            walk_expr(subject, out);
            walk_stmts(body, out);
        }
        StmtKind::Switch { subject, cases } => {
            walk_expr(subject, out);
            for case in cases {
                out.insert(case.line);
                if let Some(test) = &case.test {
                    walk_expr(test, out);
                }
                walk_stmts(&case.body, out);
            }
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            walk_stmts(body, out);
            for catch in catches {
                walk_stmts(&catch.body, out);
            }
            if let Some(body) = finally {
                walk_stmts(body, out);
            }
        }
    }
}

fn walk_expr(expr: &Expr, out: &mut BTreeSet<u32>) {
    match &expr.kind {
        ExprKind::Variable(_) | ExprKind::Literal => {}
        ExprKind::Assign { target, value } => {
            walk_expr(target, out);
            walk_expr(value, out);
        }
        ExprKind::Call { args, .. } | ExprKind::New { args, .. } => {
            for e in args {
                walk_expr(e, out);
            }
        }
        ExprKind::MethodCall { recv, args, .. } => {
            walk_expr(recv, out);
            for e in args {
                walk_expr(e, out);
            }
        }
        // Anonymous classes are not addressable units, but their method
        // bodies still execute.
        ExprKind::NewAnonymousClass { members, args } => {
            collect_members(members, out);
            for e in args {
                walk_expr(e, out);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, out);
            walk_expr(rhs, out);
        }
        ExprKind::Ternary {
            cond,
            then,
            else_branch,
        } => {
            walk_expr(cond, out);
            if let Some(then) = then {
                walk_expr(then, out);
            }
            walk_expr(else_branch, out);
        }
        ExprKind::Closure { body, .. } => walk_stmts(body, out),
        ExprKind::Match { subject, arms } => {
            walk_expr(subject, out);
            for arm in arms {
                out.insert(arm.line);
                if let Some(conditions) = &arm.conditions {
                    for e in conditions {
                        walk_expr(e, out);
                    }
                }
                walk_expr(&arm.body, out);
            }
        }
    }
}

// -- ignored lines -----------------------------------------------------------

/// Lines bracketed (inclusively) by `@codeCoverageIgnoreStart` and
/// `@codeCoverageIgnoreEnd` comment markers.
fn ignored_blocks(source: &str) -> BTreeSet<u32> {
    let mut ignored = BTreeSet::new();
    let mut start: Option<u32> = None;

    for (idx, text) in source.lines().enumerate() {
        let line = idx as u32 + 1;
        if IGNORE_START_RE.is_match(text) {
            start = Some(line);
        }
        if let Some(from) = start {
            if IGNORE_END_RE.is_match(text) {
                ignored.extend(from..=line);
                start = None;
            }
        }
    }

    // An unterminated start marker ignores through the end of the file.
    if let Some(from) = start {
        let last = source.lines().count() as u32;
        ignored.extend(from..=last);
    }

    ignored
}

fn collect_unit_ignores(
    ast: &SourceAst,
    use_annotations: bool,
    use_attributes: bool,
    out: &mut BTreeSet<u32>,
) {
    let ignored = |doc: &Option<String>, attrs: &[Attribute]| -> bool {
        let by_annotation = use_annotations
            && doc.as_deref().is_some_and(|d| IGNORE_RE.is_match(d));
        let by_attribute =
            use_attributes && attrs.iter().any(|a| a.name == IGNORE_ATTRIBUTE);
        by_annotation || by_attribute
    };

    let ignore_members = |members: &[Member], out: &mut BTreeSet<u32>| {
        for member in members {
            match member {
                Member::Method(m) => {
                    if ignored(&m.doc_comment, &m.attributes) {
                        out.extend(m.span.start..=m.span.end);
                    }
                }
                Member::EnumCase(c) => {
                    if ignored(&c.doc_comment, &c.attributes) {
                        out.extend(c.span.start..=c.span.end);
                    }
                }
                Member::UseTrait { .. } => {}
            }
        }
    };

    for item in &ast.items {
        match item {
            Item::Interface(_) | Item::Stmt(_) => {}
            Item::Class(c) => {
                if ignored(&c.doc_comment, &c.attributes) {
                    out.extend(c.span.start..=c.span.end);
                } else {
                    ignore_members(&c.members, out);
                }
            }
            Item::Trait(t) => {
                if ignored(&t.doc_comment, &t.attributes) {
                    out.extend(t.span.start..=t.span.end);
                } else {
                    ignore_members(&t.members, out);
                }
            }
            Item::Enum(e) => {
                if ignored(&e.doc_comment, &e.attributes) {
                    out.extend(e.span.start..=e.span.end);
                } else {
                    ignore_members(&e.members, out);
                }
            }
            Item::Function(f) => {
                if ignored(&f.doc_comment, &f.attributes) {
                    out.extend(f.span.start..=f.span.end);
                }
            }
        }
    }
}

// -- lines of code -----------------------------------------------------------

fn count_loc(source: &str) -> LinesOfCode {
    let mut total = 0;
    let mut comment = 0;
    let mut in_block = false;

    for raw in source.lines() {
        total += 1;
        let line = raw.trim_start();

        if in_block {
            comment += 1;
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }

        // `#[` opens an attribute, not a comment.
        if line.starts_with("//") || (line.starts_with('#') && !line.starts_with("#[")) {
            comment += 1;
        } else if line.starts_with("/*") {
            comment += 1;
            if !line.contains("*/") {
                in_block = true;
            }
        }
    }

    LinesOfCode {
        total,
        comment,
        non_comment: total - comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn stmt(line: u32) -> Stmt {
        Stmt::new(line, StmtKind::Expr(Expr::new(line, ExprKind::Literal)))
    }

    fn empty_ast_with_stmts(lines: &[u32]) -> SourceAst {
        SourceAst {
            items: lines.iter().map(|&l| Item::Stmt(stmt(l))).collect(),
        }
    }

    // -- executable ----------------------------------------------------------

    #[test]
    fn test_statement_start_lines_are_executable() {
        let ast = empty_ast_with_stmts(&[3, 5, 9]);
        let result = classify("", &ast, true, true);
        assert_eq!(
            result.executable.iter().copied().collect::<Vec<_>>(),
            vec![3, 5, 9]
        );
    }

    #[test]
    fn test_interface_stub_is_not_executable() {
        let ast = SourceAst {
            items: vec![Item::Interface(crate::ast::InterfaceDecl {
                name: "Money".to_string(),
                namespaced_name: "Money".to_string(),
                span: Span::new(1, 5),
                extends: vec![],
                methods: vec![],
                attributes: vec![],
                doc_comment: None,
            })],
        };
        let result = classify("", &ast, true, true);
        assert!(result.executable.is_empty());
    }

    #[test]
    fn test_closure_body_is_executable() {
        let closure = Expr::new(
            2,
            ExprKind::Closure {
                params: vec![],
                body: vec![stmt(3), stmt(4)],
            },
        );
        let ast = SourceAst {
            items: vec![Item::Stmt(Stmt::new(2, StmtKind::Expr(closure)))],
        };
        let result = classify("", &ast, true, true);
        assert!(result.executable.contains(&2));
        assert!(result.executable.contains(&3));
        assert!(result.executable.contains(&4));
    }

    #[test]
    fn test_switch_case_lines_are_executable() {
        let switch = Stmt::new(
            1,
            StmtKind::Switch {
                subject: Expr::new(1, ExprKind::Literal),
                cases: vec![crate::ast::SwitchCase {
                    line: 2,
                    test: Some(Expr::new(2, ExprKind::Literal)),
                    body: vec![stmt(3)],
                }],
            },
        );
        let ast = SourceAst {
            items: vec![Item::Stmt(switch)],
        };
        let result = classify("", &ast, true, true);
        assert_eq!(
            result.executable.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    // -- ignored -------------------------------------------------------------

    #[test]
    fn test_ignore_block_markers() {
        let source = "\
line one
// @codeCoverageIgnoreStart
ignored code
// @codeCoverageIgnoreEnd
line five
";
        let ast = empty_ast_with_stmts(&[1, 3, 5]);
        let result = classify(source, &ast, true, true);
        assert_eq!(
            result.ignored.iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        // Line 3 was executable but is ignored now.
        assert_eq!(
            result.executable.iter().copied().collect::<Vec<_>>(),
            vec![1, 5]
        );
    }

    #[test]
    fn test_ignore_annotation_on_function() {
        let ast = SourceAst {
            items: vec![Item::Function(crate::ast::FunctionDecl {
                name: "helper".to_string(),
                namespaced_name: "helper".to_string(),
                span: Span::new(2, 6),
                params: vec![],
                return_type: None,
                body: vec![stmt(3), stmt(4)],
                attributes: vec![],
                doc_comment: Some("/** @codeCoverageIgnore */".to_string()),
            })],
        };
        let result = classify("", &ast, true, true);
        assert!(result.executable.is_empty());
        assert_eq!(
            result.ignored.iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 4, 5, 6]
        );

        // With annotations disabled the function stays executable.
        let result = classify("", &ast, false, true);
        assert!(result.ignored.is_empty());
        assert_eq!(result.executable.len(), 2);
    }

    #[test]
    fn test_ignore_attribute_on_method() {
        let method = crate::ast::MethodDecl {
            name: "skipMe".to_string(),
            span: Span::new(4, 7),
            visibility: crate::ast::Visibility::Public,
            params: vec![],
            return_type: None,
            body: Some(vec![stmt(5)]),
            attributes: vec![Attribute::new("CodeCoverageIgnore")],
            doc_comment: None,
        };
        let ast = SourceAst {
            items: vec![Item::Class(crate::ast::ClassDecl {
                name: "Foo".to_string(),
                namespaced_name: "Foo".to_string(),
                span: Span::new(1, 10),
                parent: None,
                interfaces: vec![],
                members: vec![Member::Method(method)],
                attributes: vec![],
                doc_comment: None,
            })],
        };
        let result = classify("", &ast, true, true);
        assert_eq!(
            result.ignored.iter().copied().collect::<Vec<_>>(),
            vec![4, 5, 6, 7]
        );
        assert!(result.executable.is_empty());
    }

    #[test]
    fn test_ignore_annotation_does_not_match_block_markers() {
        // A doc comment mentioning the Start marker must not ignore the unit.
        let ast = SourceAst {
            items: vec![Item::Function(crate::ast::FunctionDecl {
                name: "f".to_string(),
                namespaced_name: "f".to_string(),
                span: Span::new(1, 3),
                params: vec![],
                return_type: None,
                body: vec![stmt(2)],
                attributes: vec![],
                doc_comment: Some("/** see @codeCoverageIgnoreStart docs */".to_string()),
            })],
        };
        let result = classify("", &ast, true, true);
        assert!(result.ignored.is_empty());
    }

    // -- lines of code -------------------------------------------------------

    #[test]
    fn test_loc_counts() {
        let source = "\
<?php
// a comment
$x = 1;
/* block
   still block */
$y = 2; // trailing comments do not count
#[Attribute]
# hash comment
";
        let loc = count_loc(source);
        assert_eq!(loc.total, 8);
        assert_eq!(loc.comment, 4);
        assert_eq!(loc.non_comment, 4);
    }
}

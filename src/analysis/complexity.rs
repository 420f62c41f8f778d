//! Cyclomatic complexity of function and method bodies.
//!
//! Decision points: `if`/`elseif`, ternaries, loop constructs, non-default
//! `case`/`match` labels, `catch` clauses, and the short-circuit operators
//! `&&`, `||`, `??`. The result is decision points + 1, so it is always ≥ 1.

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind};

#[must_use]
pub fn cyclomatic_complexity(body: &[Stmt]) -> u32 {
    1 + decision_points(body)
}

fn decision_points(stmts: &[Stmt]) -> u32 {
    stmts.iter().map(stmt_points).sum()
}

fn stmt_points(stmt: &Stmt) -> u32 {
    match &stmt.kind {
        StmtKind::Expr(e) | StmtKind::Throw(e) | StmtKind::Return(Some(e)) => expr_points(e),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => 0,
        StmtKind::Echo(exprs) => exprs.iter().map(expr_points).sum(),
        StmtKind::If {
            cond,
            then,
            elseifs,
            else_branch,
        } => {
            let mut n = 1 + expr_points(cond) + decision_points(then);
            for (cond, body) in elseifs {
                n += 1 + expr_points(cond) + decision_points(body);
            }
            if let Some(body) = else_branch {
                n += decision_points(body);
            }
            n
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
            1 + expr_points(cond) + decision_points(body)
        }
        StmtKind::For {
            init,
            cond,
            step,
            body,
        } => {
            let mut n = 1 + decision_points(body);
            n += init.iter().map(expr_points).sum::<u32>();
            n += step.iter().map(expr_points).sum::<u32>();
            if let Some(cond) = cond {
                n += expr_points(cond);
            }
            n
        }
        StmtKind::Foreach { subject, body } => 1 + expr_points(subject) + decision_points(body),
        StmtKind::Switch { subject, cases } => {
            let mut n = expr_points(subject);
            for case in cases {
                if let Some(test) = &case.test {
                    n += 1 + expr_points(test);
                }
                n += decision_points(&case.body);
            }
            n
        }
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            let mut n = decision_points(body);
            for catch in catches {
                n += 1 + decision_points(&catch.body);
            }
            if let Some(body) = finally {
                n += decision_points(body);
            }
            n
        }
    }
}

fn expr_points(expr: &Expr) -> u32 {
    match &expr.kind {
        ExprKind::Variable(_) | ExprKind::Literal => 0,
        ExprKind::Assign { target, value } => expr_points(target) + expr_points(value),
        ExprKind::Call { args, .. } | ExprKind::New { args, .. } => {
            args.iter().map(expr_points).sum()
        }
        ExprKind::MethodCall { recv, args, .. } => {
            expr_points(recv) + args.iter().map(expr_points).sum::<u32>()
        }
        // Anonymous-class methods are separate bodies; their decisions do
        // not belong to the enclosing function.
        ExprKind::NewAnonymousClass { args, .. } => args.iter().map(expr_points).sum(),
        ExprKind::Binary { op, lhs, rhs } => {
            let short_circuit = matches!(op, BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce);
            u32::from(short_circuit) + expr_points(lhs) + expr_points(rhs)
        }
        ExprKind::Ternary {
            cond,
            then,
            else_branch,
        } => {
            let mut n = 1 + expr_points(cond) + expr_points(else_branch);
            if let Some(then) = then {
                n += expr_points(then);
            }
            n
        }
        ExprKind::Closure { body, .. } => decision_points(body),
        ExprKind::Match { subject, arms } => {
            let mut n = expr_points(subject);
            for arm in arms {
                if let Some(conditions) = &arm.conditions {
                    n += conditions.len() as u32;
                    n += conditions.iter().map(expr_points).sum::<u32>();
                }
                n += expr_points(&arm.body);
            }
            n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CatchClause, SwitchCase};

    fn expr(line: u32, kind: ExprKind) -> Expr {
        Expr::new(line, kind)
    }

    fn lit(line: u32) -> Expr {
        expr(line, ExprKind::Literal)
    }

    #[test]
    fn test_empty_body_is_one() {
        assert_eq!(cyclomatic_complexity(&[]), 1);
    }

    #[test]
    fn test_straight_line_code_is_one() {
        let body = vec![
            Stmt::new(1, StmtKind::Expr(lit(1))),
            Stmt::new(2, StmtKind::Return(Some(lit(2)))),
        ];
        assert_eq!(cyclomatic_complexity(&body), 1);
    }

    #[test]
    fn test_if_elseif_else() {
        let body = vec![Stmt::new(
            1,
            StmtKind::If {
                cond: lit(1),
                then: vec![],
                elseifs: vec![(lit(3), vec![])],
                else_branch: Some(vec![]),
            },
        )];
        // if + elseif; plain else adds nothing
        assert_eq!(cyclomatic_complexity(&body), 3);
    }

    #[test]
    fn test_short_circuit_operators() {
        let cond = expr(
            1,
            ExprKind::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lit(1)),
                rhs: Box::new(expr(
                    1,
                    ExprKind::Binary {
                        op: BinaryOp::Coalesce,
                        lhs: Box::new(lit(1)),
                        rhs: Box::new(lit(1)),
                    },
                )),
            },
        );
        let body = vec![Stmt::new(
            1,
            StmtKind::If {
                cond,
                then: vec![],
                elseifs: vec![],
                else_branch: None,
            },
        )];
        // if + && + ??
        assert_eq!(cyclomatic_complexity(&body), 4);
    }

    #[test]
    fn test_switch_counts_non_default_cases() {
        let body = vec![Stmt::new(
            1,
            StmtKind::Switch {
                subject: lit(1),
                cases: vec![
                    SwitchCase {
                        line: 2,
                        test: Some(lit(2)),
                        body: vec![],
                    },
                    SwitchCase {
                        line: 4,
                        test: Some(lit(4)),
                        body: vec![],
                    },
                    SwitchCase {
                        line: 6,
                        test: None,
                        body: vec![],
                    },
                ],
            },
        )];
        assert_eq!(cyclomatic_complexity(&body), 3);
    }

    #[test]
    fn test_catch_clauses_count() {
        let body = vec![Stmt::new(
            1,
            StmtKind::Try {
                body: vec![],
                catches: vec![
                    CatchClause {
                        line: 3,
                        ty: "RuntimeException".to_string(),
                        body: vec![],
                    },
                    CatchClause {
                        line: 5,
                        ty: "LogicException".to_string(),
                        body: vec![],
                    },
                ],
                finally: None,
            },
        )];
        assert_eq!(cyclomatic_complexity(&body), 3);
    }

    #[test]
    fn test_closure_decisions_count_toward_enclosing_body() {
        let closure = expr(
            2,
            ExprKind::Closure {
                params: vec![],
                body: vec![Stmt::new(
                    3,
                    StmtKind::While {
                        cond: lit(3),
                        body: vec![],
                    },
                )],
            },
        );
        let body = vec![Stmt::new(2, StmtKind::Expr(closure))];
        assert_eq!(cyclomatic_complexity(&body), 2);
    }
}

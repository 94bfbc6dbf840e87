//! Parser tests.

use pretty_assertions::assert_eq;

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::Scanner;
use crate::parser::Parser;

fn parse(source: &str) -> Result<Program, ParserError> {
    let tokens = Scanner::new(source).scan_tokens().unwrap();
    Parser::new(tokens).parse()
}

fn parse_body(source: &str) -> Vec<Stmt> {
    let wrapped = format!("fun test() -> unit begin {} end", source);
    let program = parse(&wrapped).unwrap();
    match program.decls.into_iter().next().unwrap().kind {
        DeclKind::Function(function) => function.body,
        _ => panic!("Expected function declaration"),
    }
}

fn parse_expr(source: &str) -> Expr {
    match parse_body(source).into_iter().next().unwrap().kind {
        StmtKind::Expression(expr) => expr,
        other => panic!("Expected expression statement, got {:?}", other),
    }
}

fn int(expr: &Expr) -> u64 {
    match expr.kind {
        ExprKind::IntLiteral(n) => n,
        ref other => panic!("Expected integer literal, got {:?}", other),
    }
}

#[test]
fn test_function_declaration() {
    let program = parse("fun add(i32 a, u8 b) -> i64 begin return a end").unwrap();
    assert_eq!(program.decls.len(), 1);
    match &program.decls[0].kind {
        DeclKind::Function(function) => {
            assert_eq!(function.name, "add");
            assert_eq!(function.return_type, Type::I64);
            let params: Vec<_> = function
                .params
                .iter()
                .map(|p| (p.name.as_str(), p.ty))
                .collect();
            assert_eq!(params, vec![("a", Type::I32), ("b", Type::U8)]);
            assert_eq!(function.body.len(), 1);
        }
        other => panic!("Expected function, got {:?}", other),
    }
}

#[test]
fn test_top_level_var() {
    let program = parse("var limit : u16 = 10").unwrap();
    match &program.decls[0].kind {
        DeclKind::Var(var) => {
            assert_eq!(var.name, "limit");
            assert_eq!(var.ty, Type::U16);
            assert!(var.initializer.is_some());
        }
        other => panic!("Expected var, got {:?}", other),
    }
}

#[test]
fn test_expected_declaration() {
    assert!(matches!(
        parse("x = 1"),
        Err(ParserError::ExpectedDeclaration(..))
    ));
    assert!(matches!(
        parse("begin end"),
        Err(ParserError::ExpectedDeclaration(..))
    ));
}

#[test]
fn test_missing_type() {
    assert!(matches!(
        parse("fun f(x) -> unit begin end"),
        Err(ParserError::ExpectedType(..))
    ));
    assert!(matches!(
        parse("var x : int"),
        Err(ParserError::ExpectedType(..))
    ));
}

#[test]
fn test_missing_end() {
    assert!(matches!(
        parse("fun f() -> unit begin x = 1"),
        Err(ParserError::UnexpectedToken { .. })
    ));
}

fn expected_text(source: &str) -> (String, String) {
    match parse(source) {
        Err(ParserError::UnexpectedToken {
            expected, found, ..
        }) => (expected, found),
        other => panic!("Expected unexpected-token error, got {:?}", other),
    }
}

#[test]
fn test_diagnostics_name_the_construct() {
    let cases = [
        (
            "fun main() -> unit begin if 1 print(1) end end",
            "'then' after the if condition",
        ),
        (
            "fun main() -> unit begin match 1 begin 1 print(1) end end end",
            "'then' after the match pattern",
        ),
        ("fun main(u8 a -> unit begin end", "')' after the parameter list"),
        ("fun main() unit begin end", "'->' before the return type"),
        ("var x u8", "':' before the variable type"),
        ("fun 1() -> unit begin end", "function name (an identifier)"),
        ("fun f(u8) -> unit begin end", "parameter name (an identifier)"),
        ("var 3 : u8", "variable name (an identifier)"),
    ];
    for (source, expected) in cases {
        assert_eq!(expected_text(source).0, expected, "{}", source);
    }
}

#[test]
fn test_missing_end_reports_end_of_file() {
    let (expected, found) = expected_text("fun f() -> unit begin x = 1");
    assert_eq!(expected, "'end' to close a block");
    assert_eq!(found, "end of file");
}

#[test]
fn test_assignment_lookahead_rewinds() {
    // `x` followed by a non-assignment token is reparsed as an expression.
    let expr = parse_expr("x + 1");
    assert!(matches!(expr.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));

    let expr = parse_expr("x += 1");
    assert!(matches!(
        expr.kind,
        ExprKind::Assign {
            op: AssignOp::Add,
            ..
        }
    ));
}

#[test]
fn test_precedence() {
    // 1 + 2 * 3 parses as 1 + (2 * 3)
    let expr = parse_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => {
            assert_eq!(int(&left), 1);
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            ));
        }
        other => panic!("Expected add at top, got {:?}", other),
    }
}

#[test]
fn test_right_associative() {
    // a - b - c parses as a - (b - c)
    let expr = parse_expr("8 - 4 - 2");
    match expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Subtract,
            left,
            right,
        } => {
            assert_eq!(int(&left), 8);
            match right.kind {
                ExprKind::Binary {
                    op: BinaryOp::Subtract,
                    left,
                    right,
                } => {
                    assert_eq!(int(&left), 4);
                    assert_eq!(int(&right), 2);
                }
                other => panic!("Expected nested subtract, got {:?}", other),
            }
        }
        other => panic!("Expected subtract, got {:?}", other),
    }
}

#[test]
fn test_single_operand_builds_no_node() {
    let expr = parse_expr("(((7)))");
    assert_eq!(int(&expr), 7);
}

#[test]
fn test_operator_levels() {
    let cases = [
        ("a || b", BinaryOp::Or),
        ("a && b", BinaryOp::And),
        ("a | b", BinaryOp::BitOr),
        ("a ^ b", BinaryOp::BitXor),
        ("a & b", BinaryOp::BitAnd),
        ("a != b", BinaryOp::NotEqual),
        ("a >= b", BinaryOp::GreaterEqual),
        ("a << b", BinaryOp::ShiftLeft),
        ("a % b", BinaryOp::Modulo),
    ];
    for (source, expected) in cases {
        match parse_expr(source).kind {
            ExprKind::Binary { op, .. } => assert_eq!(op, expected, "{}", source),
            other => panic!("Expected binary for {}, got {:?}", source, other),
        }
    }
}

#[test]
fn test_comparison_binds_looser_than_shift() {
    // a < b << 1 parses as a < (b << 1)
    match parse_expr("a < b << 1").kind {
        ExprKind::Binary {
            op: BinaryOp::Less,
            right,
            ..
        } => assert!(matches!(
            right.kind,
            ExprKind::Binary {
                op: BinaryOp::ShiftLeft,
                ..
            }
        )),
        other => panic!("Expected less-than, got {:?}", other),
    }
}

#[test]
fn test_unary() {
    match parse_expr("-~!x").kind {
        ExprKind::Unary {
            op: UnaryOp::Negate,
            operand,
        } => match operand.kind {
            ExprKind::Unary {
                op: UnaryOp::BitNot,
                operand,
            } => assert!(matches!(
                operand.kind,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    ..
                }
            )),
            other => panic!("Expected bit-not, got {:?}", other),
        },
        other => panic!("Expected negate, got {:?}", other),
    }
}

#[test]
fn test_assignment_is_speculative() {
    match parse_expr("x += 2").kind {
        ExprKind::Assign { target, op, value } => {
            assert_eq!(target, "x");
            assert_eq!(op, AssignOp::Add);
            assert_eq!(int(&value), 2);
        }
        other => panic!("Expected assignment, got {:?}", other),
    }

    // Not followed by an assignment operator: falls back to `or`.
    assert!(matches!(
        parse_expr("x == 2").kind,
        ExprKind::Binary {
            op: BinaryOp::Equal,
            ..
        }
    ));
}

#[test]
fn test_chained_assignment() {
    match parse_expr("a = b = 3").kind {
        ExprKind::Assign { target, value, .. } => {
            assert_eq!(target, "a");
            assert!(matches!(value.kind, ExprKind::Assign { .. }));
        }
        other => panic!("Expected assignment, got {:?}", other),
    }
}

#[test]
fn test_call() {
    match parse_expr("foo(1, bar(2), x)").kind {
        ExprKind::Call { callee, arguments } => {
            assert_eq!(callee, "foo");
            assert_eq!(arguments.len(), 3);
            assert!(matches!(arguments[1].kind, ExprKind::Call { .. }));
        }
        other => panic!("Expected call, got {:?}", other),
    }
}

#[test]
fn test_booleans_are_integers() {
    assert_eq!(int(&parse_expr("true")), 1);
    assert_eq!(int(&parse_expr("false")), 0);
}

#[test]
fn test_if_else() {
    let body = parse_body("if x then print(1) else print(2) end");
    match &body[0].kind {
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            assert_eq!(then_branch.len(), 1);
            let else_branch = else_branch.as_ref().unwrap();
            assert!(matches!(&else_branch.kind, StmtKind::Block(stmts) if stmts.len() == 1));
        }
        other => panic!("Expected if, got {:?}", other),
    }
}

#[test]
fn test_elseif_chain() {
    // The inner `if` consumes the only `end`.
    let body = parse_body("if a then print(1) else if b then print(2) else print(3) end print(4)");
    assert_eq!(body.len(), 2);
    match &body[0].kind {
        StmtKind::If { else_branch, .. } => {
            let nested = else_branch.as_ref().unwrap();
            match &nested.kind {
                StmtKind::If { else_branch, .. } => assert!(matches!(
                    else_branch.as_deref().map(|s| &s.kind),
                    Some(StmtKind::Block(_))
                )),
                other => panic!("Expected nested if, got {:?}", other),
            }
        }
        other => panic!("Expected if, got {:?}", other),
    }
}

#[test]
fn test_if_without_else() {
    let body = parse_body("if x then end");
    assert!(matches!(
        &body[0].kind,
        StmtKind::If {
            else_branch: None,
            ..
        }
    ));
}

#[test]
fn test_while_and_block() {
    let body = parse_body("while i < 10 begin i += 1 end begin var y : u8 end");
    assert!(matches!(&body[0].kind, StmtKind::While { body, .. } if body.len() == 1));
    assert!(matches!(&body[1].kind, StmtKind::Block(stmts) if stmts.len() == 1));
}

#[test]
fn test_match_with_scrutinee() {
    let body = parse_body("match x begin 1 then print(1) end 2 then end end");
    match &body[0].kind {
        StmtKind::Match { scrutinee, arms } => {
            assert!(scrutinee.is_some());
            assert_eq!(arms.len(), 2);
            assert_eq!(arms[0].body.len(), 1);
            assert!(arms[1].body.is_empty());
        }
        other => panic!("Expected match, got {:?}", other),
    }
}

#[test]
fn test_match_without_scrutinee() {
    let body = parse_body("match begin x < 3 then print(1) end end");
    assert!(matches!(
        &body[0].kind,
        StmtKind::Match {
            scrutinee: None,
            arms,
        } if arms.len() == 1
    ));
}

#[test]
fn test_match_requires_an_arm() {
    assert!(parse("fun f() -> unit begin match x begin end end").is_err());
}

#[test]
fn test_return_forms() {
    let body = parse_body("if x then return else return 1 end return");
    match &body[0].kind {
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            assert!(matches!(then_branch[0].kind, StmtKind::Return(None)));
            match &else_branch.as_ref().unwrap().kind {
                StmtKind::Block(stmts) => {
                    assert!(matches!(stmts[0].kind, StmtKind::Return(Some(_))))
                }
                other => panic!("Expected block, got {:?}", other),
            }
        }
        other => panic!("Expected if, got {:?}", other),
    }
    assert!(matches!(body[1].kind, StmtKind::Return(None)));
}

#[test]
fn test_spans_point_at_source() {
    let program = parse("\nfun f() -> unit begin end").unwrap();
    assert_eq!(program.decls[0].span.line, 2);
    assert_eq!(program.decls[0].span.column, 1);
}

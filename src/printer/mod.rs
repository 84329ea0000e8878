//! Parenthesized tree rendering for the `parse` command.

use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};
use crate::lexer::tokens::Token;

/// Render a whole program, one top-level statement per line.
pub fn print_program(statements: &[Stmt]) -> String {
    statements
        .iter()
        .map(print_stmt)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_stmt(statement: &Stmt) -> String {
    match statement {
        Stmt::Expression { expression } => format!("(; {})", print_expr(expression)),
        Stmt::Print { expression } => format!("(print {})", print_expr(expression)),
        Stmt::Var { name, initializer } => match initializer {
            Some(initializer) => {
                format!("(var {} = {})", name.lexeme, print_expr(initializer))
            }
            None => format!("(var {})", name.lexeme),
        },
        Stmt::Block { statements } => {
            let mut out = String::from("(block");
            for statement in statements {
                out.push(' ');
                out.push_str(&print_stmt(statement));
            }
            out.push(')');
            out
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => match else_branch {
            Some(else_branch) => format!(
                "(if-else {} {} {})",
                print_expr(condition),
                print_stmt(then_branch),
                print_stmt(else_branch)
            ),
            None => format!("(if {} {})", print_expr(condition), print_stmt(then_branch)),
        },
        Stmt::While { condition, body } => {
            format!("(while {} {})", print_expr(condition), print_stmt(body))
        }
        Stmt::Break { .. } => "(break)".to_string(),
        Stmt::Continue { .. } => "(continue)".to_string(),
        Stmt::Function(decl) => print_function("fun", decl),
        Stmt::Return { value, .. } => match value {
            Some(value) => format!("(return {})", print_expr(value)),
            None => "(return)".to_string(),
        },
        Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
        } => {
            let mut out = format!("(class {}", name.lexeme);
            if let Some(superclass) = superclass {
                out.push_str(" < ");
                out.push_str(&print_expr(superclass));
            }
            for method in class_methods {
                out.push(' ');
                out.push_str(&print_function("static", method));
            }
            for method in methods {
                out.push(' ');
                out.push_str(&print_function("method", method));
            }
            out.push(')');
            out
        }
    }
}

fn print_function(kind: &str, decl: &FunctionDecl) -> String {
    let mut out = format!("({} {}(", kind, decl.name.lexeme);
    out.push_str(&param_list(&decl.params));
    out.push(')');
    for statement in decl.body.iter() {
        out.push(' ');
        out.push_str(&print_stmt(statement));
    }
    out.push(')');
    out
}

fn param_list(params: &[Token]) -> String {
    params
        .iter()
        .map(|param| param.lexeme.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value } => match value {
            LiteralValue::Nil => "nil".to_string(),
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::Number(n) => format!("{}", n),
            LiteralValue::Str(s) => s.clone(),
        },
        Expr::Grouping { expression } => format!("(group {})", print_expr(expression)),
        Expr::Unary { operator, right } => {
            format!("({} {})", operator.lexeme, print_expr(right))
        }
        Expr::Binary {
            left,
            operator,
            right,
        }
        | Expr::Logical {
            left,
            operator,
            right,
        } => format!(
            "({} {} {})",
            operator.lexeme,
            print_expr(left),
            print_expr(right)
        ),
        Expr::Ternary {
            condition,
            true_branch,
            false_branch,
        } => format!(
            "(?: {} {} {})",
            print_expr(condition),
            print_expr(true_branch),
            print_expr(false_branch)
        ),
        Expr::Variable { name, .. } => name.lexeme.clone(),
        Expr::Assign { name, value, .. } => {
            format!("(= {} {})", name.lexeme, print_expr(value))
        }
        Expr::Call {
            callee, arguments, ..
        } => {
            let mut out = format!("(call {}", print_expr(callee));
            for argument in arguments {
                out.push(' ');
                out.push_str(&print_expr(argument));
            }
            out.push(')');
            out
        }
        Expr::Get { object, name } => format!("(. {} {})", print_expr(object), name.lexeme),
        Expr::Set {
            object,
            name,
            value,
        } => format!(
            "(.= {} {} {})",
            print_expr(object),
            name.lexeme,
            print_expr(value)
        ),
        Expr::This { .. } => "this".to_string(),
        Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        Expr::Lambda { params, body } => {
            let mut out = format!("(lambda ({})", param_list(params));
            for statement in body.iter() {
                out.push(' ');
                out.push_str(&print_stmt(statement));
            }
            out.push(')');
            out
        }
    }
}

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::lexer::tokens::Token;

/// Identity of a resolvable expression node (variable, assignment, `this`,
/// `super`). The resolver keys its hop-count side table by these ids, so they
/// are drawn from a process-wide counter: successive parses feeding one
/// long-lived interpreter (the REPL) can never hand out colliding ids.
pub type ExprId = usize;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

pub fn next_expr_id() -> ExprId {
    NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug)]
pub enum Expr {
    Literal {
        value: LiteralValue,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    /// The comma operator is a Binary with a `,` operator token.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        true_branch: Box<Expr>,
        false_branch: Box<Expr>,
    },
    Variable {
        id: ExprId,
        name: Token,
    },
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        id: ExprId,
        keyword: Token,
    },
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },
    Lambda {
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
    },
}

/// A named function declaration. Parameter and body lists are `Rc`-shared so
/// the runtime closure object created each time the declaration executes can
/// hold them without cloning the tree.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Rc<Vec<Token>>,
    pub body: Rc<Vec<Stmt>>,
}

#[derive(Debug)]
pub enum Stmt {
    Expression {
        expression: Expr,
    },
    Print {
        expression: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break {
        keyword: Token,
    },
    Continue {
        keyword: Token,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        /// Always an `Expr::Variable` naming the superclass.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
        class_methods: Vec<Rc<FunctionDecl>>,
    },
}

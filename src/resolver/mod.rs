use std::collections::HashMap;
use std::fmt;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::interpreter::Interpreter;
use crate::lexer::tokens::{Token, TokenType};

#[derive(Debug, Clone)]
pub struct ResolveError {
    pub message: String,
    pub line: usize,
    pub location: String,
}

impl ResolveError {
    fn at(token: &Token, message: String) -> Self {
        Self {
            message,
            line: token.line,
            location: format!(" at '{}'", token.lexeme),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error{}: {}", self.line, self.location, self.message)
    }
}

impl std::error::Error for ResolveError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// What a scope knows about one declared name.
struct VarInfo {
    /// Declaring token, kept for error positions.
    name: Token,
    /// "variable", "parameter", "function", or "class" — used in wordings.
    kind: &'static str,
    /// False between declare and define, while the initializer runs.
    defined: bool,
    was_used: bool,
}

/// Static pass over the parsed tree. For every local variable reference it
/// records with the interpreter how many lexical scopes separate the
/// reference from its declaration; names that resolve to no scope fall back
/// to runtime lookup in the globals. It also enforces the compile-time rules:
/// no self-referential initializers, no redeclaration in one scope, no unused
/// locals, and the placement rules for `return`, `break`, `continue`, `this`
/// and `super`. Errors accumulate; the walk never stops early.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    scopes: Vec<HashMap<String, VarInfo>>,
    errors: Vec<ResolveError>,
    current_function: FunctionType,
    current_class: ClassType,
    // Deliberately not reset across function boundaries: the loop-placement
    // check ignores them (a lambda in a loop body may contain `break`).
    in_loop: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter) -> Self {
        Self {
            interpreter,
            scopes: Vec::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            in_loop: false,
        }
    }

    /// Resolve a whole program and return every error found. A non-empty
    /// result must prevent interpretation: the hop counts recorded for the
    /// valid parts are still consistent, but the program is rejected.
    pub fn resolve(mut self, statements: &[Stmt]) -> Vec<ResolveError> {
        self.resolve_statements(statements);
        self.errors
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expr(expression);
            }
            Stmt::Var { name, initializer } => {
                self.declare(name, "variable");
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                let enclosing = self.in_loop;
                self.in_loop = true;
                self.resolve_statement(body);
                self.in_loop = enclosing;
            }
            Stmt::Break { keyword } => {
                if !self.in_loop {
                    self.error(keyword, "'break' cannot appear outside of a loop".to_string());
                }
            }
            Stmt::Continue { keyword } => {
                if !self.in_loop {
                    self.error(
                        keyword,
                        "'continue' cannot appear outside of a loop".to_string(),
                    );
                }
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name, "function");
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.".to_string());
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(
                            keyword,
                            "Can't return a value from an initializer.".to_string(),
                        );
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.resolve_class(name, superclass.as_ref(), methods, class_methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[std::rc::Rc<FunctionDecl>],
        class_methods: &[std::rc::Rc<FunctionDecl>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name, "class");
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself.".to_string());
                }
            }
            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);
        }

        if superclass.is_some() {
            self.begin_scope();
            self.declare_synthetic("super");
        }

        // Both the instance methods and the class-level ("static") methods
        // see a `this` scope; statics are bound to the class object itself.
        self.begin_scope();
        self.declare_synthetic("this");

        for method in methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, declaration);
        }
        for method in class_methods {
            self.resolve_function(method, FunctionType::Method);
        }

        self.end_scope();
        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, function_type: FunctionType) {
        self.resolve_callable(&decl.params, &decl.body, function_type);
    }

    fn resolve_callable(&mut self, params: &[Token], body: &[Stmt], function_type: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = function_type;

        self.begin_scope();
        for param in params {
            self.declare(param, "parameter");
            self.define(param);
        }
        self.resolve_statements(body);
        self.end_scope();

        self.current_function = enclosing;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Ternary {
                condition,
                true_branch,
                false_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(true_branch);
                self.resolve_expr(false_branch);
            }
            Expr::Variable { id, name } => {
                if self.scopes.is_empty() {
                    return;
                }
                if let Some(defined) = self.resolve_local(*id, name, true) {
                    if !defined {
                        self.error(
                            name,
                            "Can't read local variable in its own initializer.".to_string(),
                        );
                    }
                }
            }
            Expr::Assign { id, name, value } => {
                // Assigning is not a use; only reads mark a variable used.
                self.resolve_expr(value);
                self.resolve_local(*id, name, false);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Get { object, .. } => self.resolve_expr(object),
            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.".to_string());
                    return;
                }
                self.resolve_local(*id, keyword, true);
            }
            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.".to_string());
                    }
                    ClassType::Class => {
                        self.error(
                            keyword,
                            "Can't use 'super' in a class with no superclass.".to_string(),
                        );
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(*id, keyword, true);
            }
            Expr::Lambda { params, body } => {
                self.resolve_callable(params, body, FunctionType::Lambda);
            }
        }
    }

    /// Search the scope stack from innermost to outermost; on a hit, record
    /// the hop count with the interpreter and report whether the slot was
    /// already defined. A miss leaves the reference for runtime global
    /// lookup.
    fn resolve_local(&mut self, id: usize, name: &Token, mark_used: bool) -> Option<bool> {
        let top = self.scopes.len();
        for i in (0..top).rev() {
            if let Some(info) = self.scopes[i].get_mut(&name.lexeme) {
                let defined = info.defined;
                if mark_used {
                    info.was_used = true;
                }
                self.interpreter.resolve(id, top - 1 - i);
                return Some(defined);
            }
        }
        None
    }

    fn declare(&mut self, name: &Token, kind: &'static str) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if let Some(existing) = scope.get(&name.lexeme) {
            let message = format!(
                "Already have a {} with this name in this scope.",
                existing.kind
            );
            let err = ResolveError::at(name, message);
            self.errors.push(err);
        }

        scope.insert(
            name.lexeme.clone(),
            VarInfo {
                name: name.clone(),
                kind,
                defined: false,
                was_used: false,
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(info) = scope.get_mut(&name.lexeme) {
                info.defined = true;
            }
        }
    }

    /// Insert a `this`/`super` binding: defined up front and pre-marked used,
    /// so the unused-variable policy never flags it.
    fn declare_synthetic(&mut self, name: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                VarInfo {
                    name: Token::new(TokenType::Identifier, name, None, 0),
                    kind: "variable",
                    defined: true,
                    was_used: true,
                },
            );
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop a scope and flag everything in it that was never read.
    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for (_, info) in scope {
            if !info.was_used {
                let message = format!("{} was defined but never used.", info.kind);
                self.errors.push(ResolveError::at(&info.name, message));
            }
        }
    }

    fn error(&mut self, token: &Token, message: String) {
        self.errors.push(ResolveError::at(token, message));
    }
}

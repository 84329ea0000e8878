pub mod environment;
pub mod object;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::ast::{Expr, ExprId, FunctionDecl, LiteralValue, Stmt};
use crate::lexer::tokens::{Token, TokenType};

use environment::Environment;
use object::{Class, Function, Instance};
use value::Value;

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub line: usize,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n[line {}]", self.message, self.line)
    }
}

impl std::error::Error for RuntimeError {}

/// How a statement finished. Non-local exits are a value threaded up the
/// execution stack, not an unwind: every caller decides whether a signal is
/// one it handles (a loop for Break/Continue, a call boundary for Return) or
/// one to pass through.
pub enum StmtResult {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Abrupt completion of an expression: a runtime error, or a loop signal
/// tunnelling out of a call whose body hit `break`/`continue`. Loop signals
/// abort the rest of the surrounding expression and keep unwinding until a
/// running loop catches them; only `return` stops at the call boundary.
pub(crate) enum Unwind {
    Error(RuntimeError),
    Break,
    Continue,
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

impl Unwind {
    /// In statement position a tunnelling loop signal becomes the enclosing
    /// statement's own completion; an error stays an error.
    fn into_result(self) -> Result<StmtResult, RuntimeError> {
        match self {
            Unwind::Error(error) => Err(error),
            Unwind::Break => Ok(StmtResult::Break),
            Unwind::Continue => Ok(StmtResult::Continue),
        }
    }
}

/// Tree-walking evaluator. Holds the global environment, the current scope
/// handle, and the resolver's hop-count side table keyed by expression node
/// identity.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// An interpreter writing `print` output to the given sink — used by the
    /// script-expectation tests to capture output.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Environment::new();
        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Resolver callback: the reference with this node id lives `hops`
    /// scopes out from wherever it is evaluated.
    pub fn resolve(&mut self, id: ExprId, hops: usize) {
        self.locals.insert(id, hops);
    }

    /// Run a resolved program. Top-level statements execute in sequence
    /// until the first runtime error, which is fatal to the whole run. A
    /// loop signal that reaches the top with no running loop to catch it
    /// ends the run quietly.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            match self.execute(statement)? {
                StmtResult::Normal => {}
                _ => break,
            }
        }
        Ok(())
    }

    // ── Statement execution ─────────────────────────────────────────────

    fn execute(&mut self, statement: &Stmt) -> Result<StmtResult, RuntimeError> {
        match statement {
            Stmt::Expression { expression } => match self.evaluate(expression) {
                Ok(_) => Ok(StmtResult::Normal),
                Err(unwind) => unwind.into_result(),
            },
            Stmt::Print { expression } => {
                let value = match self.evaluate(expression) {
                    Ok(value) => value,
                    Err(unwind) => return unwind.into_result(),
                };
                writeln!(self.output, "{}", value).map_err(|e| RuntimeError {
                    message: format!("Could not write output: {}", e),
                    line: 0,
                })?;
                Ok(StmtResult::Normal)
            }
            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(initializer) => {
                        let value = match self.evaluate(initializer) {
                            Ok(value) => value,
                            Err(unwind) => return unwind.into_result(),
                        };
                        self.environment.borrow_mut().define(&name.lexeme, value);
                    }
                    None => {
                        self.environment
                            .borrow_mut()
                            .define_unassigned(&name.lexeme);
                    }
                }
                Ok(StmtResult::Normal)
            }
            Stmt::Block { statements } => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, environment)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = match self.evaluate(condition) {
                    Ok(value) => value,
                    Err(unwind) => return unwind.into_result(),
                };
                if condition.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(StmtResult::Normal)
                }
            }
            Stmt::While { condition, body } => {
                loop {
                    // A signal surfacing from the condition itself (a call
                    // in it hit break/continue) is caught here too.
                    match self.evaluate(condition) {
                        Ok(value) => {
                            if !value.is_truthy() {
                                break;
                            }
                        }
                        Err(Unwind::Break) => break,
                        Err(Unwind::Continue) => continue,
                        Err(Unwind::Error(error)) => return Err(error),
                    }
                    match self.execute(body)? {
                        StmtResult::Normal | StmtResult::Continue => {}
                        StmtResult::Break => break,
                        result @ StmtResult::Return(_) => return Ok(result),
                    }
                }
                Ok(StmtResult::Normal)
            }
            Stmt::Break { .. } => Ok(StmtResult::Break),
            Stmt::Continue { .. } => Ok(StmtResult::Continue),
            Stmt::Function(decl) => {
                let function = Function::new(
                    &decl.name.lexeme,
                    Rc::clone(&decl.params),
                    Rc::clone(&decl.body),
                    Rc::clone(&self.environment),
                    false,
                );
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(StmtResult::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => match self.evaluate(value) {
                        Ok(value) => value,
                        Err(unwind) => return unwind.into_result(),
                    },
                    None => Value::Nil,
                };
                Ok(StmtResult::Return(value))
            }
            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, class_methods),
        }
    }

    /// Execute statements in the given environment, restoring the previous
    /// one on every exit path — normal, signal, or error.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<StmtResult, RuntimeError> {
        let previous = Rc::clone(&self.environment);
        self.environment = environment;

        let mut result = Ok(StmtResult::Normal);
        for statement in statements {
            match self.execute(statement) {
                Ok(StmtResult::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass_expr: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
        class_methods: &[Rc<FunctionDecl>],
    ) -> Result<StmtResult, RuntimeError> {
        let superclass = match superclass_expr {
            Some(expr) => match self.evaluate(expr) {
                Ok(Value::Class(class)) => Some(class),
                Ok(_) => {
                    return Err(RuntimeError {
                        message: "Superclass must be a class.".to_string(),
                        line: name.line,
                    });
                }
                Err(unwind) => return unwind.into_result(),
            },
            None => None,
        };

        self.environment
            .borrow_mut()
            .define_unassigned(&name.lexeme);

        // Methods close over an extra scope holding `super` when there is a
        // superclass; its shape must match the resolver's.
        let method_closure = match &superclass {
            Some(superclass) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                environment
                    .borrow_mut()
                    .define("super", Value::Class(Rc::clone(superclass)));
                environment
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function = Function::new(
                &method.name.lexeme,
                Rc::clone(&method.params),
                Rc::clone(&method.body),
                Rc::clone(&method_closure),
                is_initializer,
            );
            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let mut class_method_table = HashMap::new();
        for method in class_methods {
            let function = Function::new(
                &method.name.lexeme,
                Rc::clone(&method.params),
                Rc::clone(&method.body),
                Rc::clone(&method_closure),
                false,
            );
            class_method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Class::new(&name.lexeme, superclass, method_table, class_method_table);
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(Rc::new(class)));
        Ok(StmtResult::Normal)
    }

    // ── Expression evaluation ───────────────────────────────────────────

    pub(crate) fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal { value } => Ok(match value {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::string(s.clone()),
            }),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.token_type {
                    TokenType::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError {
                            message: "Operand must be a number.".to_string(),
                            line: operator.line,
                        }
                        .into()),
                    },
                    TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(RuntimeError {
                        message: format!("Unknown unary operator '{}'.", operator.lexeme),
                        line: operator.line,
                    }
                    .into()),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                // The comma operator: left evaluated for effect only.
                if operator.token_type == TokenType::Comma {
                    self.evaluate(left)?;
                    return self.evaluate(right);
                }
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(self.binary_op(&left, operator, &right)?)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                // Short-circuit to an operand value, not a coerced boolean.
                match operator.token_type {
                    TokenType::Or if left.is_truthy() => Ok(left),
                    TokenType::And if !left.is_truthy() => Ok(left),
                    _ => self.evaluate(right),
                }
            }
            Expr::Ternary {
                condition,
                true_branch,
                false_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(true_branch)
                } else {
                    self.evaluate(false_branch)
                }
            }
            Expr::Variable { id, name } => Ok(self.look_up_variable(*id, name)?),
            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(id) {
                    Some(&hops) => {
                        Environment::assign_at(&self.environment, hops, &name.lexeme, value.clone());
                    }
                    None => {
                        self.globals.borrow_mut().assign(
                            &name.lexeme,
                            value.clone(),
                            name.line,
                        )?;
                    }
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.call_value(callee, args, paren.line)
            }
            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        Ok(Instance::get(&instance, &name.lexeme, name.line)?)
                    }
                    // Classes are property targets too: class-level fields,
                    // then static methods.
                    Value::Class(class) => Ok(Class::get(&class, &name.lexeme, name.line)?),
                    _ => Err(RuntimeError {
                        message: "Only instances have properties.".to_string(),
                        line: name.line,
                    }
                    .into()),
                }
            }
            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(&name.lexeme, value.clone());
                        Ok(value)
                    }
                    Value::Class(class) => {
                        let value = self.evaluate(value)?;
                        class.set(&name.lexeme, value.clone());
                        Ok(value)
                    }
                    _ => Err(RuntimeError {
                        message: "Only instances have fields.".to_string(),
                        line: name.line,
                    }
                    .into()),
                }
            }
            Expr::This { id, keyword } => Ok(self.look_up_variable(*id, keyword)?),
            Expr::Super {
                id,
                keyword,
                method,
            } => {
                let hops = self.locals.get(id).copied().unwrap_or(0);
                let superclass =
                    Environment::get_at(&self.environment, hops, "super", keyword.line)?;
                // `this` sits one scope inside the one holding `super`.
                let object = Environment::get_at(
                    &self.environment,
                    hops.saturating_sub(1),
                    "this",
                    keyword.line,
                )?;

                let Value::Class(superclass) = superclass else {
                    return Err(RuntimeError {
                        message: "Superclass must be a class.".to_string(),
                        line: keyword.line,
                    }
                    .into());
                };
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(object)))),
                    None => Err(RuntimeError {
                        message: format!("Undefined property '{}'.", method.lexeme),
                        line: method.line,
                    }
                    .into()),
                }
            }
            Expr::Lambda { params, body } => {
                let function = Function::lambda(
                    Rc::clone(params),
                    Rc::clone(body),
                    Rc::clone(&self.environment),
                );
                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&hops) => Environment::get_at(&self.environment, hops, &name.lexeme, name.line),
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value, Unwind> {
        let arity = match &callee {
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),
            _ => {
                return Err(RuntimeError {
                    message: "Can only call functions and classes.".to_string(),
                    line,
                }
                .into());
            }
        };

        if arguments.len() != arity {
            return Err(RuntimeError {
                message: format!(
                    "Expected {} arguments but got {}.",
                    arity,
                    arguments.len()
                ),
                line,
            }
            .into());
        }

        match callee {
            Value::Function(function) => function.call(self, arguments),
            Value::Class(class) => Class::instantiate(&class, self, arguments),
            _ => unreachable!(),
        }
    }

    fn binary_op(
        &self,
        left: &Value,
        operator: &Token,
        right: &Value,
    ) -> Result<Value, RuntimeError> {
        let line = operator.line;
        match operator.token_type {
            TokenType::Plus => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => {
                    Ok(Value::string(format!("{}{}", a, b)))
                }
                _ => Err(RuntimeError {
                    message: "Operands must be two numbers or two strings.".to_string(),
                    line,
                }),
            },
            TokenType::Minus => self.numeric_op(left, right, line, |a, b| a - b),
            TokenType::Star => self.numeric_op(left, right, line, |a, b| a * b),
            TokenType::Slash => match (left, right) {
                (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(RuntimeError {
                    message: "Division by zero.".to_string(),
                    line,
                }),
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => Err(RuntimeError {
                    message: "Operands must be numbers.".to_string(),
                    line,
                }),
            },
            TokenType::Greater => self.comparison_op(left, right, line, |a, b| a > b),
            TokenType::GreaterEqual => self.comparison_op(left, right, line, |a, b| a >= b),
            TokenType::Less => self.comparison_op(left, right, line, |a, b| a < b),
            TokenType::LessEqual => self.comparison_op(left, right, line, |a, b| a <= b),
            TokenType::EqualEqual => Ok(Value::Bool(left.equals(right))),
            TokenType::BangEqual => Ok(Value::Bool(!left.equals(right))),
            _ => Err(RuntimeError {
                message: format!("Unknown binary operator '{}'.", operator.lexeme),
                line,
            }),
        }
    }

    fn numeric_op(
        &self,
        left: &Value,
        right: &Value,
        line: usize,
        op: fn(f64, f64) -> f64,
    ) -> Result<Value, RuntimeError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(*a, *b))),
            _ => Err(RuntimeError {
                message: "Operands must be numbers.".to_string(),
                line,
            }),
        }
    }

    fn comparison_op(
        &self,
        left: &Value,
        right: &Value,
        line: usize,
        op: fn(f64, f64) -> bool,
    ) -> Result<Value, RuntimeError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(op(*a, *b))),
            _ => Err(RuntimeError {
                message: "Operands must be numbers.".to_string(),
                line,
            }),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

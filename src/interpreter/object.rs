use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Stmt;
use crate::lexer::tokens::Token;

use super::environment::Environment;
use super::value::Value;
use super::{Interpreter, RuntimeError, StmtResult, Unwind};

/// A function or lambda value: a shared parameter/body pair plus the
/// environment captured at its point of definition. Method binding produces
/// a fresh `Function` whose closure chains a `this` scope in front.
pub struct Function {
    name: String,
    params: Rc<Vec<Token>>,
    body: Rc<Vec<Stmt>>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        name: &str,
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            params,
            body,
            closure,
            is_initializer,
        }
    }

    /// Lambdas are anonymous and never initializers.
    pub fn lambda(
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
    ) -> Self {
        Self::new("lambda", params, body, closure, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// Rebind this method to one receiver: a fresh environment in front of
    /// the closure whose only binding is `this`.
    pub fn bind(&self, instance: Value) -> Function {
        let environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.borrow_mut().define("this", instance);
        Function {
            name: self.name.clone(),
            params: Rc::clone(&self.params),
            body: Rc::clone(&self.body),
            closure: environment,
            is_initializer: self.is_initializer,
        }
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        let environment = Environment::with_enclosing(Rc::clone(&self.closure));
        {
            let mut env = environment.borrow_mut();
            for (param, argument) in self.params.iter().zip(arguments) {
                env.define(&param.lexeme, argument);
            }
        }

        // Only `return` completes at the call boundary. A Break/Continue
        // signal left uncaught by the body keeps tunnelling outward until a
        // loop in a dynamically enclosing frame catches it.
        match interpreter.execute_block(&self.body, environment)? {
            StmtResult::Break => Err(Unwind::Break),
            StmtResult::Continue => Err(Unwind::Continue),
            // An initializer evaluates to its bound `this`, whatever the
            // body returned.
            _ if self.is_initializer => {
                Ok(Environment::get_at(&self.closure, 0, "this", 0)?)
            }
            StmtResult::Return(value) => Ok(value),
            StmtResult::Normal => Ok(Value::Nil),
        }
    }
}

/// A class: instance-method table, a separate table of class-level
/// ("static") methods, an optional superclass, and its own field map so the
/// class object itself behaves like an instance.
pub struct Class {
    name: String,
    superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<Function>>,
    class_methods: HashMap<String, Rc<Function>>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Class {
    pub fn new(
        name: &str,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
        class_methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            superclass,
            methods,
            class_methods,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance-method lookup, walking up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Class-method lookup. Statics are not inherited.
    pub fn find_class_method(&self, name: &str) -> Option<Rc<Function>> {
        self.class_methods.get(name).map(Rc::clone)
    }

    /// Calling a class allocates an instance and runs `init` when present.
    /// The instance is the result no matter what `init` returns.
    pub fn instantiate(
        class: &Rc<Class>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));
        let value = Value::Instance(Rc::clone(&instance));
        if let Some(initializer) = class.find_method("init") {
            initializer.bind(value.clone()).call(interpreter, arguments)?;
        }
        Ok(value)
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Property get on the class object: class-level fields shadow statics.
    pub fn get(class: &Rc<Class>, name: &str, line: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = class.fields.borrow().get(name) {
            return Ok(value.clone());
        }
        if let Some(method) = class.find_class_method(name) {
            let bound = method.bind(Value::Class(Rc::clone(class)));
            return Ok(Value::Function(Rc::new(bound)));
        }
        Err(RuntimeError {
            message: format!("Undefined property '{}'.", name),
            line,
        })
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

/// An instance: its class plus fields, populated lazily on first assignment.
pub struct Instance {
    class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Fields shadow methods; a method hit produces a freshly bound method
    /// value rather than invoking it.
    pub fn get(
        instance: &Rc<RefCell<Instance>>,
        name: &str,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.borrow().fields.get(name) {
            return Ok(value.clone());
        }
        if let Some(method) = instance.borrow().class.find_method(name) {
            let bound = method.bind(Value::Instance(Rc::clone(instance)));
            return Ok(Value::Function(Rc::new(bound)));
        }
        Err(RuntimeError {
            message: format!("Undefined property '{}'.", name),
            line,
        })
    }

    /// Property set always writes the instance's own field map; the class is
    /// never consulted.
    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }
}

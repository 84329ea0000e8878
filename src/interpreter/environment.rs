use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;
use super::RuntimeError;

/// A declared-but-uninitialized slot is distinct from an absent name: the
/// former is a "cannot read unassigned variable" error, the latter an
/// "undefined variable" error.
#[derive(Clone)]
enum Slot {
    Unassigned,
    Assigned(Value),
}

/// One scope in the lexical chain. Environments are created per block, per
/// call, and per method bind, and they live exactly as long as something
/// still references them — a closure, a pending call, or an inner scope.
/// The link outward is a strong shared handle; cycles only arise through
/// explicit value graphs, never the chain itself.
pub struct Environment {
    enclosing: Option<Rc<RefCell<Environment>>>,
    values: HashMap<String, Slot>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            enclosing: None,
            values: HashMap::new(),
        }))
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment {
            enclosing: Some(enclosing),
            values: HashMap::new(),
        }))
    }

    /// Introduce or overwrite a binding in this scope only.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Slot::Assigned(value));
    }

    /// Introduce a binding in the unassigned state (`var x;`).
    pub fn define_unassigned(&mut self, name: &str) {
        self.values.insert(name.to_string(), Slot::Unassigned);
    }

    /// Walk outward until the name is found — used only for globals and
    /// names the resolver left unannotated.
    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        match self.values.get(name) {
            Some(Slot::Assigned(value)) => Ok(value.clone()),
            Some(Slot::Unassigned) => Err(RuntimeError {
                message: format!("Cannot read unassigned variable '{}'.", name),
                line,
            }),
            None => match &self.enclosing {
                Some(enclosing) => enclosing.borrow().get(name, line),
                None => Err(RuntimeError {
                    message: format!("Undefined variable '{}'.", name),
                    line,
                }),
            },
        }
    }

    /// Rebind the nearest scope that declares the name.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), Slot::Assigned(value));
            return Ok(());
        }
        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value, line),
            None => Err(RuntimeError {
                message: format!("Undefined variable '{}'.", name),
                line,
            }),
        }
    }

    /// Jump exactly `hops` scopes outward and read there. The resolver
    /// guarantees the scope at that distance declares the name; failure to
    /// find it would mean the two passes disagree about scope shape.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        hops: usize,
        name: &str,
        line: usize,
    ) -> Result<Value, RuntimeError> {
        let target = Environment::ancestor(env, hops);
        let borrowed = target.borrow();
        match borrowed.values.get(name) {
            Some(Slot::Assigned(value)) => Ok(value.clone()),
            Some(Slot::Unassigned) => Err(RuntimeError {
                message: format!("Cannot read unassigned variable '{}'.", name),
                line,
            }),
            None => Err(RuntimeError {
                message: format!("Undefined variable '{}'.", name),
                line,
            }),
        }
    }

    /// Jump exactly `hops` scopes outward and rebind there.
    pub fn assign_at(env: &Rc<RefCell<Environment>>, hops: usize, name: &str, value: Value) {
        let target = Environment::ancestor(env, hops);
        let mut borrowed = target.borrow_mut();
        borrowed.values.insert(name.to_string(), Slot::Assigned(value));
    }

    fn ancestor(env: &Rc<RefCell<Environment>>, hops: usize) -> Rc<RefCell<Environment>> {
        let mut current = Rc::clone(env);
        for _ in 0..hops {
            let next = current
                .borrow()
                .enclosing
                .as_ref()
                .map(Rc::clone)
                .unwrap_or_else(|| Rc::clone(&current));
            current = next;
        }
        current
    }
}

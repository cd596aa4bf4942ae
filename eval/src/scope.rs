//! Local variable scopes.
//!
//! Every method invocation starts a fresh root scope. Blocks get a
//! child scope whose parent is the scope the block literal appeared
//! in, so assignments to outer variables from inside a block are seen
//! by the enclosing code.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use nodemarshal::Symbol;
use rustc_hash::FxHashMap;

use crate::value::Value;

#[derive(Default)]
struct Frame {
    vars: FxHashMap<Symbol, Value>,
    parent: Option<Env>,
}

#[derive(Clone, Default)]
pub struct Env(Rc<RefCell<Frame>>);

impl Env {
    pub fn child(&self) -> Env {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    pub fn get(&self, name: &Symbol) -> Option<Value> {
        let frame = self.0.borrow();
        match frame.vars.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    /// Assign to the innermost scope that already has `name`, or
    /// create it in this one.
    pub fn set(&self, name: &Symbol, value: Value) {
        if let Some(owner) = self.owner(name) {
            owner.0.borrow_mut().vars.insert(name.clone(), value);
        } else {
            self.define(name.clone(), value);
        }
    }

    /// Create `name` in this scope, shadowing any outer variable. Used
    /// for parameters.
    pub fn define(&self, name: Symbol, value: Value) {
        self.0.borrow_mut().vars.insert(name, value);
    }

    fn owner(&self, name: &Symbol) -> Option<Env> {
        let frame = self.0.borrow();
        if frame.vars.contains_key(name) {
            return Some(self.clone());
        }
        frame.parent.as_ref().and_then(|p| p.owner(name))
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<_> = frame.vars.keys().collect();
        names.sort();
        f.debug_struct("Env")
            .field("vars", &names)
            .field("parent", &frame.parent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use nodemarshal::Symbol;

    use super::Env;
    use crate::value::Value;

    #[test]
    fn blocks_write_through() {
        let outer = Env::default();
        let sum = Symbol::from("sum");
        outer.set(&sum, Value::int(0));

        let inner = outer.child();
        inner.set(&sum, Value::int(5));
        inner.set(&Symbol::from("tmp"), Value::Nil);

        assert_eq!(Some(Value::int(5)), outer.get(&sum));
        assert_eq!(None, outer.get(&Symbol::from("tmp")));
    }

    #[test]
    fn parameters_shadow() {
        let outer = Env::default();
        let x = Symbol::from("x");
        outer.set(&x, Value::int(1));

        let inner = outer.child();
        inner.define(x.clone(), Value::int(2));
        assert_eq!(Some(Value::int(2)), inner.get(&x));
        assert_eq!(Some(Value::int(1)), outer.get(&x));
    }
}

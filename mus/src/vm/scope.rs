use std::cell::RefCell;
use std::collections::BTreeSet;

use crate::value::{Value, ValueMap};

/// What a name resolves to.
pub(crate) enum Resolved<'s> {
    Value(Value),
    /// The name is a macro bound in the given frame.
    Macro(&'s Scope<'s>),
}

/// One frame of the scope chain.
///
/// Lookups walk from the innermost frame to the root.  Writes always go to
/// the frame they are made on, so a `set` inside a `for` body does not leak
/// to the enclosing frame.  A macro bound into a frame closes over that
/// frame: the macro body renders in a child of it.
pub(crate) struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    vars: RefCell<ValueMap>,
    macros: RefCell<BTreeSet<String>>,
}

impl<'p> Scope<'p> {
    pub fn new(vars: ValueMap) -> Scope<'static> {
        Scope {
            parent: None,
            vars: RefCell::new(vars),
            macros: RefCell::default(),
        }
    }

    pub fn child(&'p self) -> Scope<'p> {
        Scope {
            parent: Some(self),
            vars: RefCell::default(),
            macros: RefCell::default(),
        }
    }

    pub fn set(&self, name: &str, value: Value) {
        self.macros.borrow_mut().remove(name);
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Binds the macro `name` to this frame, shadowing a variable of the
    /// same name.
    pub fn bind_macro(&self, name: &str) {
        let mut vars = self.vars.borrow_mut();
        #[cfg(feature = "preserve_order")]
        vars.shift_remove(name);
        #[cfg(not(feature = "preserve_order"))]
        vars.remove(name);
        drop(vars);
        self.macros.borrow_mut().insert(name.to_string());
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved<'_>> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(value) = scope.vars.borrow().get(name) {
                return Some(Resolved::Value(value.clone()));
            }
            if scope.macros.borrow().contains(name) {
                return Some(Resolved::Macro(scope));
            }
            frame = scope.parent;
        }
        None
    }

    /// Returns `true` if `name` resolves to a bound macro.
    pub fn has_macro(&self, name: &str) -> bool {
        matches!(self.resolve(name), Some(Resolved::Macro(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing() {
        let mut vars = ValueMap::new();
        vars.insert("a".into(), Value::from(1));
        let root = Scope::new(vars);
        let child = root.child();
        child.set("a", Value::from(2));
        child.set("b", Value::from(3));
        assert!(matches!(child.resolve("a"), Some(Resolved::Value(v)) if v == Value::from(2)));
        assert!(matches!(root.resolve("a"), Some(Resolved::Value(v)) if v == Value::from(1)));
        assert!(root.resolve("b").is_none());
    }

    #[test]
    fn test_macro_binding() {
        let root = Scope::new(ValueMap::new());
        root.set("before", Value::from(1));
        root.set("greet", Value::from("x"));
        root.set("after", Value::from(2));
        root.bind_macro("greet");
        assert!(matches!(root.resolve("greet"), Some(Resolved::Macro(_))));
        let expected: &[&str] = if cfg!(feature = "preserve_order") {
            &["before", "after"]
        } else {
            &["after", "before"]
        };
        assert_eq!(
            root.vars.borrow().keys().map(|x| x.as_str()).collect::<Vec<_>>(),
            expected
        );
        let child = root.child();
        assert!(child.has_macro("greet"));
        child.set("greet", Value::from("y"));
        assert!(!child.has_macro("greet"));
        assert!(root.has_macro("greet"));
    }
}

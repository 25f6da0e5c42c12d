use std::collections::BTreeMap;
use std::fmt;

use crate::ast::MacroDecl;
use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::filters::BoxedFilter;
use crate::utils::AutoEscape;
use crate::value::Value;
use crate::vm::scope::{Resolved, Scope};

/// The per-render context: the environment plus the macro table built from
/// the template's declarations.
pub(crate) struct Context<'env> {
    env: &'env Environment,
    macros: BTreeMap<&'env str, &'env MacroDecl>,
}

impl<'env> Context<'env> {
    pub fn new(env: &'env Environment) -> Context<'env> {
        Context {
            env,
            macros: BTreeMap::new(),
        }
    }

    /// Registers macro declarations.  A later declaration with the same
    /// name replaces an earlier one.
    pub fn with_macros<I: IntoIterator<Item = &'env MacroDecl>>(mut self, decls: I) -> Self {
        for decl in decls {
            self.macros.insert(decl.signature().name(), decl);
        }
        self
    }
}

/// Provides access to the current execution state of the engine.
///
/// A read only reference is passed to filter functions so they can look up
/// variables in the current scope or inspect the environment.  The state is
/// threaded explicitly through every evaluation, nothing about a render is
/// stored globally, so any number of renders can run in parallel.
///
/// **Notes on lifetimes:** the state object exposes some of the internal
/// lifetimes through the type.  You should always elide these lifetimes
/// as there might be lifetimes added or removed between releases.
pub struct State<'scope, 'env> {
    pub(crate) ctx: &'scope Context<'env>,
    pub(crate) root: &'scope Scope<'scope>,
    pub(crate) scope: &'scope Scope<'scope>,
    pub(crate) depth: usize,
}

impl fmt::Debug for State<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ds = f.debug_struct("State");
        ds.field("auto_escape", &self.auto_escape());
        ds.field("macros", &self.ctx.macros.keys().collect::<Vec<_>>());
        ds.field("depth", &self.depth);
        ds.finish()
    }
}

impl<'scope, 'env> State<'scope, 'env> {
    pub(crate) fn new(ctx: &'scope Context<'env>, root: &'scope Scope<'scope>) -> Self {
        State {
            ctx,
            root,
            scope: root,
            depth: 0,
        }
    }

    /// Returns a state for the same render that evaluates in `scope`.
    pub(crate) fn with_scope<'b>(&'b self, scope: &'b Scope<'b>) -> State<'b, 'env> {
        State {
            ctx: self.ctx,
            root: self.root,
            scope,
            depth: self.depth,
        }
    }

    /// Returns a reference to the current environment.
    #[inline(always)]
    pub fn env(&self) -> &'env Environment {
        self.ctx.env
    }

    /// Returns the auto escape mode of the render.
    #[inline(always)]
    pub fn auto_escape(&self) -> AutoEscape {
        self.ctx.env.auto_escape()
    }

    /// Looks up a variable by name in the current scope.
    ///
    /// Names bound to macros are not values and return `None`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        match self.scope.resolve(name) {
            Some(Resolved::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the number of macro invocations currently on the stack.
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline(always)]
    pub(crate) fn scope(&self) -> &'scope Scope<'scope> {
        self.scope
    }

    pub(crate) fn get_filter(&self, name: &str) -> Result<&'env BoxedFilter, Error> {
        self.ctx
            .env
            .get_filter(name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownFilter, name.to_string()))
    }

    pub(crate) fn get_macro(&self, name: &str) -> Option<&'env MacroDecl> {
        self.ctx.macros.get(name).copied()
    }

    /// Binds the declared macro `name` into the current frame unless it is
    /// already bound somewhere up the chain.  Returns `false` if no such
    /// macro is declared.
    pub(crate) fn bind_macro(&self, name: &str) -> bool {
        if self.get_macro(name).is_none() {
            return false;
        }
        if !self.scope.has_macro(name) {
            debug!(name, depth = self.depth, "binding macro");
            self.scope.bind_macro(name);
        }
        true
    }
}

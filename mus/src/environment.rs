use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::ast::Template;
use crate::error::Error;
use crate::filters::{self, BoxedFilter};
use crate::utils::AutoEscape;
use crate::value::{ArgType, FunctionArgs, FunctionResult};
use crate::vm::Vm;

/// The default maximum number of nested macro invocations.
const DEFAULT_RECURSION_LIMIT: usize = 100;

/// An abstraction that holds the engine configuration.
///
/// The environment holds the filter table, the auto escape mode and the
/// macro recursion limit.  It carries no per-render state: rendering only
/// needs a shared reference, so one environment can serve any number of
/// concurrent renders.
///
/// There are generally two ways to construct an environment:
///
/// * [`Environment::new`] creates an environment with the built-in filters
///   as fallback for the user filter table.
/// * [`Environment::empty`] creates a completely blank environment.
#[derive(Clone)]
pub struct Environment {
    filters: BTreeMap<Cow<'static, str>, BoxedFilter>,
    builtin_filters: BTreeMap<&'static str, BoxedFilter>,
    auto_escape: AutoEscape,
    recursion_limit: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field(
                "builtin_filters",
                &self.builtin_filters.keys().collect::<Vec<_>>(),
            )
            .field("auto_escape", &self.auto_escape)
            .field("recursion_limit", &self.recursion_limit)
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with sensible defaults.
    ///
    /// The user filter table starts out empty and the built-in filters
    /// are consulted for names it does not contain.
    pub fn new() -> Environment {
        Environment {
            builtin_filters: filters::get_builtin_filters(),
            ..Environment::empty()
        }
    }

    /// Creates a completely empty environment.
    ///
    /// This environment has no filters at all.
    pub fn empty() -> Environment {
        Environment {
            filters: BTreeMap::new(),
            builtin_filters: BTreeMap::new(),
            auto_escape: AutoEscape::default(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    /// Adds a new filter function.
    ///
    /// A filter registered here shadows a built-in filter of the same
    /// name.  For details about filters have a look at
    /// [`Filter`](crate::filters::Filter).
    pub fn add_filter<N, F, V, Rv, Args>(&mut self, name: N, f: F)
    where
        N: Into<Cow<'static, str>>,
        F: filters::Filter<V, Rv, Args>,
        V: ArgType,
        Rv: FunctionResult,
        Args: FunctionArgs,
    {
        self.filters.insert(name.into(), BoxedFilter::new(f));
    }

    /// Removes a filter by name.
    ///
    /// Built-in filters are not affected.
    pub fn remove_filter(&mut self, name: &str) {
        self.filters.remove(name);
    }

    /// Sets the auto escape mode.
    ///
    /// The default is [`AutoEscape::Html`].  Output of expressions marked
    /// `safe` and values that are safe strings are never escaped.
    pub fn set_auto_escape(&mut self, auto_escape: AutoEscape) {
        self.auto_escape = auto_escape;
    }

    /// Returns the auto escape mode.
    pub fn auto_escape(&self) -> AutoEscape {
        self.auto_escape
    }

    /// Sets the maximum number of nested macro invocations.
    ///
    /// A render that exceeds it fails with
    /// [`InvalidOperation`](crate::ErrorKind::InvalidOperation).  The
    /// default is 100.  Every invocation nests several native stack frames,
    /// so raising the limit far beyond that needs a thread with a larger
    /// stack.
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    /// Returns the maximum number of nested macro invocations.
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Renders a template against a context.
    ///
    /// The context is anything serializable to a map (or `()` for an empty
    /// scope).  Each call builds its own root scope and macro table, so
    /// renders never observe each other.
    ///
    /// ```
    /// # use mus::{Environment, Template, Node};
    /// # use serde_json::json;
    /// let env = Environment::new();
    /// let tmpl = Template::new(vec![
    ///     Node::text("Hello "),
    ///     Node::expression("name | default('stranger')").unwrap(),
    ///     Node::text("!"),
    /// ]);
    /// assert_eq!(env.render(&tmpl, json!({"name": "<John>"})).unwrap(), "Hello &lt;John&gt;!");
    /// assert_eq!(env.render(&tmpl, json!({"name": null})).unwrap(), "Hello stranger!");
    /// ```
    pub fn render<S: Serialize>(&self, template: &Template, ctx: S) -> Result<String, Error> {
        Vm::new(self).render(template, ctx)
    }

    pub(crate) fn get_filter(&self, name: &str) -> Option<&BoxedFilter> {
        self.filters
            .get(name)
            .or_else(|| self.builtin_filters.get(name))
    }
}

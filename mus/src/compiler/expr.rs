use serde::Serialize;

use crate::compiler::ast::Expr;
use crate::compiler::lexer::tokenize;
use crate::compiler::parser::{parse_args, parse_expr};
use crate::compiler::tokens::{Fragment, FragmentKind};
use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::value::Value;
use crate::vm::State;

/// One `| name(args)` step of a filter pipeline.
#[derive(Debug, Clone)]
pub struct FilterCall {
    pub(crate) name: String,
    pub(crate) args: Vec<Expr>,
}

impl FilterCall {
    /// The name of the filter.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An interpolation expression with an optional filter pipeline.
///
/// Created by [`compile_expression`].
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    source: String,
    base: Expr,
    filters: Vec<FilterCall>,
    safe: bool,
}

fn trim_spaces(mut fragments: &[Fragment]) -> &[Fragment] {
    while let Some((first, rest)) = fragments.split_first() {
        if !first.is_space() {
            break;
        }
        fragments = rest;
    }
    while let Some((last, rest)) = fragments.split_last() {
        if !last.is_space() {
            break;
        }
        fragments = rest;
    }
    fragments
}

fn join_text(fragments: &[Fragment]) -> String {
    fragments.iter().map(|x| x.text.as_str()).collect()
}

/// Compiles a filter step.  `None` is the `safe` marker.
fn compile_filter(fragments: &[Fragment]) -> Result<Option<FilterCall>, Error> {
    let fragments = trim_spaces(fragments);
    let (name, rest) = match fragments.split_first() {
        Some((name, rest)) if name.kind == FragmentKind::Path => (name, trim_spaces(rest)),
        Some((other, _)) => {
            return Err(Error::new(
                ErrorKind::SyntaxError,
                format!("expected filter name, got `{}`", other.text),
            ))
        }
        None => return Err(Error::new(ErrorKind::SyntaxError, "missing filter name")),
    };

    if name.text == "safe" {
        return Ok(None);
    }

    let args = if rest.is_empty() {
        Vec::new()
    } else if rest[0].is_operator("(") && rest[rest.len() - 1].is_operator(")") {
        ok!(parse_args(rest))
    } else {
        return Err(Error::new(
            ErrorKind::SyntaxError,
            format!("filter invalid: {}", join_text(rest)),
        ));
    };

    Ok(Some(FilterCall {
        name: name.text.clone(),
        args,
    }))
}

/// Compiles an interpolation expression.
///
/// The expression is split at `|` into a base expression and a filter
/// pipeline.  Filters compose left to right, so `x | f1 | f2` computes
/// `f2(f1(x))`.  A filter step may carry arguments in parentheses which are
/// passed after the value.  The name `safe` is not a filter but marks the
/// result as pre-escaped.
///
/// ```
/// use mus::compiler::compile_expression;
/// let expr = compile_expression("user.name | upper | default('anon')").unwrap();
/// assert_eq!(expr.filter_names().collect::<Vec<_>>(), vec!["upper", "default"]);
/// assert!(!expr.is_safe());
/// ```
pub fn compile_expression(source: &str) -> Result<CompiledExpression, Error> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(Error::new(
            ErrorKind::SyntaxError,
            "parse error, expression is empty",
        ));
    }

    let fragments = tokenize(trimmed);
    let mut segments = fragments.split(|x| x.is_operator("|"));
    let base_fragments = segments.next().unwrap_or_default();
    let base = ok!(parse_expr(base_fragments));

    let mut filters = Vec::new();
    let mut safe = false;
    for segment in segments {
        match ok!(compile_filter(segment)) {
            Some(filter) => filters.push(filter),
            None => safe = true,
        }
    }

    trace!(
        source = trimmed,
        filters = filters.len(),
        safe,
        "compiled expression"
    );
    Ok(CompiledExpression {
        source: trimmed.to_string(),
        base,
        filters,
        safe,
    })
}

impl CompiledExpression {
    /// The trimmed source of the expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the expression carries the `safe` marker.
    pub fn is_safe(&self) -> bool {
        self.safe
    }

    /// Iterates over the names of the filters in application order.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|x| x.name())
    }

    /// If the base expression calls a bare identifier, returns its name.
    ///
    /// Expression nodes use this to bind the macro of that name before
    /// evaluating.
    pub fn macro_name(&self) -> Option<&str> {
        match self.base {
            Expr::Call(ref call) => call.expr.as_identifier(),
            _ => None,
        }
    }

    /// Evaluates the expression against the state's scope.
    ///
    /// A name that is not in scope is undefined.  Calling a name that is
    /// neither a variable nor a declared macro makes the whole result the
    /// empty string.  Undefined and null become the empty string both
    /// before the filters run and at the end, so `missing | default('x')`
    /// is `x`.
    pub(crate) fn evaluate(&self, state: &State) -> Result<Value, Error> {
        match self.evaluate_unguarded(state) {
            Err(err) if err.is_undefined_variable() => {
                trace!(source = %self.source, error = %err, "unresolved identifier");
                Ok(Value::from(""))
            }
            rv => rv,
        }
    }

    fn evaluate_unguarded(&self, state: &State) -> Result<Value, Error> {
        let mut filters = Vec::with_capacity(self.filters.len());
        for call in &self.filters {
            filters.push(ok!(state.get_filter(&call.name)));
        }

        let mut rv = ok!(state.eval(&self.base));
        if rv.is_none_or_undefined() {
            rv = Value::from("");
        }
        for (call, filter) in self.filters.iter().zip(filters) {
            let mut args = Vec::with_capacity(call.args.len() + 1);
            args.push(rv);
            for arg in &call.args {
                args.push(ok!(state.eval(arg)));
            }
            rv = ok!(filter.apply_to(state, &args));
        }
        if rv.is_none_or_undefined() {
            rv = Value::from("");
        }
        Ok(rv)
    }

    /// Evaluates the expression against a fresh scope built from `ctx`.
    ///
    /// ```
    /// # use mus::{Environment, compiler::compile_expression};
    /// # use serde_json::json;
    /// let env = Environment::new();
    /// let expr = compile_expression("items.length > 1 ? 'many' : 'few'").unwrap();
    /// let rv = expr.eval(&env, json!({"items": [1, 2, 3]})).unwrap();
    /// assert_eq!(rv.to_string(), "many");
    /// ```
    pub fn eval<S: Serialize>(&self, env: &Environment, ctx: S) -> Result<Value, Error> {
        crate::vm::with_root_state(env, ctx, |state| self.evaluate(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_pipeline() {
        let expr = compile_expression("value | upper | replace('A', 'b')").unwrap();
        assert_eq!(expr.filter_names().collect::<Vec<_>>(), ["upper", "replace"]);
        assert_eq!(expr.filters[1].args.len(), 2);
    }

    #[test]
    fn test_safe_marker() {
        let expr = compile_expression("value | safe").unwrap();
        assert!(expr.is_safe());
        assert_eq!(expr.filter_names().count(), 0);
    }

    #[test]
    fn test_or_is_not_a_pipe() {
        let expr = compile_expression("a || b").unwrap();
        assert_eq!(expr.filter_names().count(), 0);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            compile_expression("   ").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
        assert_eq!(
            compile_expression("x | upper y").unwrap_err().to_string(),
            "syntax error: filter invalid: y"
        );
        assert_eq!(
            compile_expression("x | 'upper'").unwrap_err().to_string(),
            "syntax error: expected filter name, got `'upper'`"
        );
    }

    #[test]
    fn test_macro_name() {
        let expr = compile_expression("greet('x') | upper").unwrap();
        assert_eq!(expr.macro_name(), Some("greet"));
        let expr = compile_expression("user.greet('x')").unwrap();
        assert_eq!(expr.macro_name(), None);
    }
}

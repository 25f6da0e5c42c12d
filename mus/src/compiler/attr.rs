use serde::Serialize;

use crate::compiler::ast::Expr;
use crate::compiler::lexer::tokenize;
use crate::compiler::parser::parse_expr;
use crate::compiler::tokens::{Fragment, FragmentKind};
use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::utils::strip_scope;
use crate::value::{Value, ValueMap};
use crate::vm::State;

/// A compiled attribute list such as `class="x" id=y`.
///
/// Created by [`compile_attribute`].
#[derive(Debug, Clone)]
pub struct CompiledAttribute {
    entries: Vec<(String, Expr)>,
}

/// `=` is an assignment unless it completes a comparison (`<=`, `>=`, `!=`).
fn is_assignment(fragments: &[Fragment], idx: usize) -> bool {
    if !fragments[idx].is_operator("=") {
        return false;
    }
    match idx.checked_sub(1).map(|prev| &fragments[prev]) {
        Some(prev) => !(prev.kind == FragmentKind::Operator
            && matches!(prev.text.as_str(), "<" | ">" | "!")),
        None => true,
    }
}

fn trim_spaces(fragments: &[Fragment]) -> &[Fragment] {
    let start = fragments
        .iter()
        .position(|x| !x.is_space())
        .unwrap_or(fragments.len());
    let end = fragments
        .iter()
        .rposition(|x| !x.is_space())
        .map_or(start, |x| x + 1);
    &fragments[start..end]
}

struct AttributeBuilder<'a> {
    default_name: &'a str,
    key: Option<String>,
    entries: Vec<(String, Expr)>,
}

impl<'a> AttributeBuilder<'a> {
    fn set_value(&mut self, fragments: &[Fragment]) -> Result<(), Error> {
        let fragments = trim_spaces(fragments);
        let name = match self.key.take() {
            Some(key) => key,
            None if fragments.is_empty() => return Ok(()),
            None => self.default_name.to_string(),
        };
        if fragments.is_empty() {
            return Err(Error::new(
                ErrorKind::SyntaxError,
                format!("missing value for attribute `{}`", name),
            ));
        }
        let expr = ok!(parse_expr(fragments));
        self.entries.push((name, expr));
        Ok(())
    }
}

/// Compiles an attribute assignment list.
///
/// Each `key=value` pair becomes one entry.  The key is the text between
/// the last space before `=` and the `=` itself, with surrounding quotes
/// removed.  A value without a key is stored under `default_name`.
///
/// ```
/// # use mus::{Environment, compiler::compile_attribute};
/// # use serde_json::json;
/// let attr = compile_attribute(r#"class="x" id=y"#, "default").unwrap();
/// let rv = attr.eval(&Environment::new(), json!({"y": 42})).unwrap();
/// assert_eq!(rv.get_attr("class").unwrap().to_string(), "x");
/// assert_eq!(rv.get_attr("id").unwrap().to_string(), "42");
/// ```
pub fn compile_attribute(source: &str, default_name: &str) -> Result<CompiledAttribute, Error> {
    let fragments = tokenize(source);
    let mut builder = AttributeBuilder {
        default_name,
        key: None,
        entries: Vec::new(),
    };

    let mut start = 0;
    for idx in 0..fragments.len() {
        if !is_assignment(&fragments, idx) {
            continue;
        }
        let segment = trim_spaces(&fragments[start..idx]);
        match segment.iter().rposition(Fragment::is_space) {
            Some(sep) => {
                ok!(builder.set_value(&segment[..sep]));
                builder.key = Some(strip_scope(&join(&segment[sep + 1..])).to_string());
            }
            None => {
                ok!(builder.set_value(&[]));
                builder.key = Some(strip_scope(&join(segment)).to_string());
            }
        }
        if builder.key.as_deref() == Some("") {
            return Err(Error::new(ErrorKind::SyntaxError, "missing attribute name"));
        }
        start = idx + 1;
    }
    ok!(builder.set_value(&fragments[start..]));

    trace!(source, entries = builder.entries.len(), "compiled attribute");
    Ok(CompiledAttribute {
        entries: builder.entries,
    })
}

fn join(fragments: &[Fragment]) -> String {
    fragments.iter().map(|x| x.text.as_str()).collect()
}

impl CompiledAttribute {
    /// Iterates over the attribute names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|x| x.0.as_str())
    }

    /// Evaluates every attribute into `target`, overriding existing keys.
    ///
    /// An unresolved identifier in a value makes that value undefined.
    pub(crate) fn evaluate_into(&self, state: &State, target: &mut ValueMap) -> Result<(), Error> {
        for (name, expr) in &self.entries {
            let value = match state.eval(expr) {
                Err(err) if err.is_undefined_variable() => Value::UNDEFINED,
                rv => ok!(rv),
            };
            target.insert(name.clone(), value);
        }
        Ok(())
    }

    pub(crate) fn evaluate(&self, state: &State) -> Result<Value, Error> {
        let mut rv = ValueMap::new();
        ok!(self.evaluate_into(state, &mut rv));
        Ok(Value::from(rv))
    }

    /// Evaluates the attributes against a fresh scope built from `ctx` and
    /// returns them as a map.
    pub fn eval<S: Serialize>(&self, env: &Environment, ctx: S) -> Result<Value, Error> {
        crate::vm::with_root_state(env, ctx, |state| self.evaluate(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names() {
        let attr = compile_attribute("\"x\" 'data-id'=1 title = 'a b'", "default").unwrap();
        assert_eq!(attr.names().collect::<Vec<_>>(), ["default", "data-id", "title"]);
    }

    #[test]
    fn test_keyless_value() {
        let attr = compile_attribute("user.name", "text").unwrap();
        assert_eq!(attr.names().collect::<Vec<_>>(), ["text"]);
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        let attr = compile_attribute("enabled=a<=b", "default").unwrap();
        assert_eq!(attr.names().collect::<Vec<_>>(), ["enabled"]);
    }

    #[test]
    fn test_missing_value() {
        let err = compile_attribute("a=1 b=", "default").unwrap_err();
        assert_eq!(err.to_string(), "syntax error: missing value for attribute `b`");
    }
}

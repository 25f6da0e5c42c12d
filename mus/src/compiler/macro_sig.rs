use crate::compiler::ast::Expr;
use crate::compiler::lexer::tokenize;
use crate::compiler::parser::parse_expr;
use crate::compiler::tokens::{Fragment, FragmentKind};
use crate::error::{Error, ErrorKind};
use crate::utils::strip_scope;
use crate::value::Value;
use crate::vm::State;

/// A declared macro parameter.
#[derive(Debug, Clone)]
pub struct MacroParam {
    name: String,
    default: Option<Expr>,
}

impl MacroParam {
    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the parameter declares a default expression.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A compiled macro signature such as `greet(name, greeting="hi")`.
///
/// Created by [`compile_macro_signature`].
#[derive(Debug, Clone)]
pub struct MacroSignature {
    name: String,
    params: Vec<MacroParam>,
}

fn syntax_error<D: Into<std::borrow::Cow<'static, str>>>(msg: D) -> Error {
    Error::new(ErrorKind::SyntaxError, msg)
}

fn is_identifier(s: &str) -> bool {
    !s.starts_with(|c: char| c.is_ascii_digit())
        && !s.is_empty()
        && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Splits fragments at depth-zero commas.
///
/// Brackets are tracked on a stack and a closing bracket only pops the
/// stack if it matches the innermost open bracket.
fn split_arguments(fragments: &[Fragment]) -> Vec<&[Fragment]> {
    let mut stack: Vec<char> = Vec::new();
    let mut rv = Vec::new();
    let mut start = 0;
    for (idx, fragment) in fragments.iter().enumerate() {
        if fragment.kind != FragmentKind::Operator {
            continue;
        }
        match fragment.text.as_str() {
            "(" => stack.push(')'),
            "[" => stack.push(']'),
            "{" => stack.push('}'),
            close @ (")" | "]" | "}") => {
                if stack.last().map_or(false, |&c| close.starts_with(c)) {
                    stack.pop();
                }
            }
            "," if stack.is_empty() => {
                rv.push(&fragments[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    rv.push(&fragments[start..]);
    rv
}

fn compile_param(fragments: &[Fragment]) -> Result<MacroParam, Error> {
    let assign = fragments.iter().position(|x| x.is_operator("="));
    let (key, default) = match assign {
        Some(idx) => (&fragments[..idx], Some(&fragments[idx + 1..])),
        None => (fragments, None),
    };
    let key_text: String = key.iter().map(|x| x.text.as_str()).collect();
    let name = strip_scope(&key_text);
    if !is_identifier(name) {
        return Err(syntax_error(format!("invalid macro parameter `{}`", key_text.trim())));
    }
    let default = match default {
        Some(fragments) if fragments.iter().all(Fragment::is_space) => {
            return Err(syntax_error(format!(
                "missing default value for macro parameter `{}`",
                name
            )))
        }
        Some(fragments) => Some(ok!(parse_expr(fragments))),
        None => None,
    };
    Ok(MacroParam {
        name: name.to_string(),
        default,
    })
}

/// Compiles a macro signature.
///
/// The name is the text before the first `(`, the parameters are the
/// comma separated list up to the last `)`.  Each parameter is a bare
/// identifier or `identifier=default`.  Commas nested inside brackets of a
/// default expression do not separate parameters.
///
/// ```
/// use mus::compiler::compile_macro_signature;
/// let sig = compile_macro_signature("card(title, opts={a: 1, b: [2, 3]})").unwrap();
/// assert_eq!(sig.name(), "card");
/// assert_eq!(sig.params().iter().map(|x| x.name()).collect::<Vec<_>>(), ["title", "opts"]);
/// ```
pub fn compile_macro_signature(source: &str) -> Result<MacroSignature, Error> {
    let source = source.trim();
    let (name, args) = match source.find('(') {
        None => (source, ""),
        Some(0) => return Err(syntax_error("missing macro name")),
        Some(start) => {
            let end = match source.rfind(')') {
                Some(end) if end > start => end,
                _ => return Err(syntax_error("unclosed macro argument list")),
            };
            if !source[end + 1..].trim().is_empty() {
                return Err(syntax_error(format!(
                    "unexpected `{}` after macro arguments",
                    source[end + 1..].trim()
                )));
            }
            (source[..start].trim(), source[start + 1..end].trim())
        }
    };
    if !is_identifier(name) {
        return Err(syntax_error(format!("invalid macro name `{}`", name)));
    }

    let mut params = Vec::new();
    if !args.is_empty() {
        let fragments = tokenize(args);
        let parts = split_arguments(&fragments);
        let last = parts.len() - 1;
        for (idx, part) in parts.into_iter().enumerate() {
            if part.iter().all(Fragment::is_space) {
                // a trailing comma is fine, an empty parameter is not
                if idx == last {
                    continue;
                }
                return Err(syntax_error("empty macro parameter"));
            }
            params.push(ok!(compile_param(part)));
        }
    }

    trace!(name, params = params.len(), "compiled macro signature");
    Ok(MacroSignature {
        name: name.to_string(),
        params,
    })
}

impl MacroSignature {
    /// The name of the macro.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameters in order.
    pub fn params(&self) -> &[MacroParam] {
        &self.params
    }

    /// Binds call arguments into the state's current scope.
    ///
    /// Positional arguments fill parameters in order, extra arguments are
    /// ignored.  A parameter without an argument evaluates its default in
    /// the current scope (so defaults can refer to earlier parameters) or
    /// becomes the empty string.
    pub(crate) fn bind_arguments(&self, state: &State, args: &[Value]) -> Result<(), Error> {
        for (idx, param) in self.params.iter().enumerate() {
            let value = match (args.get(idx), &param.default) {
                (Some(arg), _) => arg.clone(),
                (None, Some(default)) => match state.eval(default) {
                    Err(err) if err.is_undefined_variable() => Value::UNDEFINED,
                    rv => ok!(rv),
                },
                (None, None) => Value::from(""),
            };
            state.scope().set(&param.name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param_names(sig: &MacroSignature) -> Vec<&str> {
        sig.params().iter().map(|x| x.name()).collect()
    }

    #[test]
    fn test_signatures() {
        let sig = compile_macro_signature("greet(name, greeting=\"hi\")").unwrap();
        assert_eq!(sig.name(), "greet");
        assert_eq!(param_names(&sig), ["name", "greeting"]);
        assert!(!sig.params()[0].has_default());
        assert!(sig.params()[1].has_default());

        let sig = compile_macro_signature("divider").unwrap();
        assert_eq!(sig.name(), "divider");
        assert!(sig.params().is_empty());

        let sig = compile_macro_signature("list(items=[1, (2), 3], sep=',',)").unwrap();
        assert_eq!(param_names(&sig), ["items", "sep"]);
    }

    #[test]
    fn test_bracket_stack() {
        let fragments = tokenize("a={x: [1, 2]}, b=f(1, 2), c");
        let parts = split_arguments(&fragments);
        assert_eq!(parts.len(), 3);
    }

    #[test]
    fn test_signature_errors() {
        assert_eq!(
            compile_macro_signature("(a)").unwrap_err().to_string(),
            "syntax error: missing macro name"
        );
        assert_eq!(
            compile_macro_signature("f(a").unwrap_err().to_string(),
            "syntax error: unclosed macro argument list"
        );
        assert_eq!(
            compile_macro_signature("f(a, , b)").unwrap_err().to_string(),
            "syntax error: empty macro parameter"
        );
        assert_eq!(
            compile_macro_signature("f(a.b)").unwrap_err().to_string(),
            "syntax error: invalid macro parameter `a.b`"
        );
        assert_eq!(
            compile_macro_signature("f(a=)").unwrap_err().to_string(),
            "syntax error: missing default value for macro parameter `a`"
        );
    }
}

//! Filter functions and abstractions.
//!
//! Filters transform the value of an interpolation.  In the expression
//! `user.name | upper | default('anon')` the value of `user.name` is passed
//! to `upper` and its result to `default` together with the extra argument
//! `'anon'`.
//!
//! The library below is available when the `builtins` feature is enabled.
//! Filters registered with [`add_filter`](crate::Environment::add_filter)
//! take precedence over built-in filters of the same name.
//!
//! # Custom Filters
//!
//! A custom filter is a function which takes the [`State`] by reference,
//! the value, and then up to three further arguments:
//!
//! ```
//! # use mus::Environment;
//! # let mut env = Environment::new();
//! use mus::State;
//!
//! fn slugify(_state: &State, value: String) -> String {
//!     value.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
//! }
//!
//! env.add_filter("slugify", slugify);
//! ```
//!
//! Arguments are converted through [`ArgType`](crate::value::ArgType) and the
//! return value through [`FunctionResult`](crate::value::FunctionResult), so
//! a filter can also fail:
//!
//! ```
//! # use mus::{Environment, State, Error, ErrorKind};
//! # let mut env = Environment::new();
//! fn repeat(_state: &State, value: String, times: usize) -> Result<String, Error> {
//!     if times > 100 {
//!         return Err(Error::new(ErrorKind::InvalidArguments, "too many repetitions"));
//!     }
//!     Ok(value.repeat(times))
//! }
//!
//! env.add_filter("repeat", repeat);
//! ```
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::value::{ArgType, FunctionArgs, FunctionResult, Value};
use crate::vm::State;

type FilterFunc = dyn Fn(&State, &[Value]) -> Result<Value, Error> + Sync + Send + 'static;

/// A boxed filter.
#[derive(Clone)]
pub(crate) struct BoxedFilter(Arc<FilterFunc>, &'static str);

/// A utility trait that represents filters.
///
/// It is implemented for functions of the form
/// `Fn(&State, V, A, B, C) -> Rv` where the value and the arguments
/// implement [`ArgType`] and `Rv` implements [`FunctionResult`].
pub trait Filter<V, Rv, Args>: Send + Sync + 'static {
    /// Applies a filter to value with the given arguments.
    fn apply_to(&self, state: &State, value: V, args: Args) -> Rv;
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<Func, V, Rv, $($name),*> Filter<V, Rv, ($($name,)*)> for Func
        where
            Func: Fn(&State, V, $($name),*) -> Rv + Send + Sync + 'static
        {
            fn apply_to(&self, state: &State, value: V, args: ($($name,)*)) -> Rv {
                #[allow(non_snake_case)]
                let ($($name,)*) = args;
                (self)(state, value, $($name,)*)
            }
        }
    };
}

tuple_impls! {}
tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }

impl BoxedFilter {
    /// Creates a new boxed filter.
    pub fn new<F, V, Rv, Args>(f: F) -> BoxedFilter
    where
        F: Filter<V, Rv, Args>,
        V: ArgType,
        Rv: FunctionResult,
        Args: FunctionArgs,
    {
        BoxedFilter(
            Arc::new(move |state, args| -> Result<Value, Error> {
                let (value, rest) = match args.split_first() {
                    Some((value, rest)) => (Some(value), rest),
                    None => (None, args),
                };
                f.apply_to(
                    state,
                    ok!(V::from_value(value)),
                    ok!(Args::from_values(rest)),
                )
                .into_result()
            }),
            std::any::type_name::<F>(),
        )
    }

    /// Applies the filter.  The first argument is the filtered value.
    pub fn apply_to(&self, state: &State, args: &[Value]) -> Result<Value, Error> {
        (self.0)(state, args)
    }
}

impl fmt::Debug for BoxedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.1)
    }
}

#[cfg(feature = "builtins")]
pub(crate) fn get_builtin_filters() -> std::collections::BTreeMap<&'static str, BoxedFilter> {
    let mut rv = std::collections::BTreeMap::new();
    rv.insert("upper", BoxedFilter::new(upper));
    rv.insert("lower", BoxedFilter::new(lower));
    rv.insert("capitalize", BoxedFilter::new(capitalize));
    rv.insert("trim", BoxedFilter::new(trim));
    rv.insert("default", BoxedFilter::new(default));
    rv.insert("escape", BoxedFilter::new(escape));
    rv.insert("e", BoxedFilter::new(escape));
    rv.insert("length", BoxedFilter::new(length));
    rv.insert("count", BoxedFilter::new(length));
    rv.insert("first", BoxedFilter::new(first));
    rv.insert("last", BoxedFilter::new(last));
    rv.insert("join", BoxedFilter::new(join));
    rv.insert("reverse", BoxedFilter::new(reverse));
    rv.insert("replace", BoxedFilter::new(replace));
    rv.insert("abs", BoxedFilter::new(abs));
    rv.insert("round", BoxedFilter::new(round));
    rv.insert("int", BoxedFilter::new(int));
    rv.insert("float", BoxedFilter::new(float));
    rv.insert("nl2br", BoxedFilter::new(nl2br));
    #[cfg(feature = "json")]
    {
        rv.insert("tojson", BoxedFilter::new(tojson));
    }
    #[cfg(feature = "urlencode")]
    {
        rv.insert("urlencode", BoxedFilter::new(urlencode));
    }
    rv
}

#[cfg(not(feature = "builtins"))]
pub(crate) fn get_builtin_filters() -> std::collections::BTreeMap<&'static str, BoxedFilter> {
    std::collections::BTreeMap::new()
}

#[cfg(feature = "builtins")]
mod builtins {
    use super::*;

    use crate::error::ErrorKind;
    use crate::utils::{write_escaped, AutoEscape};
    use crate::value::{ops, ValueKind, ValueRepr};

    /// HTML escapes a value and marks it safe.  Safe values pass unchanged.
    ///
    /// This is also available as `e`.
    pub fn escape(_state: &State, v: Value) -> Result<Value, Error> {
        if v.is_safe() {
            return Ok(v);
        }
        let mut rv = String::new();
        ok!(write_escaped(&mut rv, AutoEscape::Html, &v));
        Ok(Value::from_safe_string(rv))
    }

    /// Converts a value to uppercase.
    pub fn upper(_state: &State, v: String) -> String {
        v.to_uppercase()
    }

    /// Converts a value to lowercase.
    pub fn lower(_state: &State, v: String) -> String {
        v.to_lowercase()
    }

    /// Converts the first character to uppercase and the rest to lowercase.
    pub fn capitalize(_state: &State, text: String) -> String {
        let mut chars = text.chars();
        match chars.next() {
            None => String::new(),
            Some(f) => f.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        }
    }

    /// Trims leading and trailing whitespace.
    pub fn trim(_state: &State, s: String) -> String {
        s.trim().to_string()
    }

    /// Falls back to another value if the value is empty.
    ///
    /// Undefined, null and the empty string count as empty.  Without a
    /// fallback the result is the empty string.
    pub fn default(_state: &State, value: Value, other: Option<Value>) -> Value {
        if value.is_none_or_undefined() || value.as_str() == Some("") {
            other.unwrap_or_else(|| Value::from(""))
        } else {
            value
        }
    }

    /// Returns the length of a string, sequence or map.
    ///
    /// This is also available as `count`.
    pub fn length(_state: &State, v: Value) -> Result<Value, Error> {
        v.len().map(Value::from).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot calculate length of value of type {}", v.kind()),
            )
        })
    }

    /// Returns the first item of a sequence or the first character of a
    /// string.  Anything else is undefined.
    pub fn first(_state: &State, value: Value) -> Value {
        match value.0 {
            ValueRepr::String(ref s, _) => s.chars().next().map_or(Value::UNDEFINED, Value::from),
            ValueRepr::Seq(ref items) => items.first().cloned().unwrap_or(Value::UNDEFINED),
            _ => Value::UNDEFINED,
        }
    }

    /// Returns the last item of a sequence or the last character of a
    /// string.  Anything else is undefined.
    pub fn last(_state: &State, value: Value) -> Value {
        match value.0 {
            ValueRepr::String(ref s, _) => {
                s.chars().next_back().map_or(Value::UNDEFINED, Value::from)
            }
            ValueRepr::Seq(ref items) => items.last().cloned().unwrap_or(Value::UNDEFINED),
            _ => Value::UNDEFINED,
        }
    }

    /// Joins a sequence by a separator (the empty string by default).
    ///
    /// Null and undefined items render as empty strings.
    pub fn join(_state: &State, val: Value, joiner: Option<String>) -> Result<String, Error> {
        let joiner = joiner.as_deref().unwrap_or("");
        match val.0 {
            ValueRepr::Undefined | ValueRepr::None => Ok(String::new()),
            ValueRepr::String(ref s, _) => {
                let chars: Vec<String> = s.chars().map(String::from).collect();
                Ok(chars.join(joiner))
            }
            ValueRepr::Seq(ref items) => {
                let mut rv = String::new();
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        rv.push_str(joiner);
                    }
                    if !item.is_none_or_undefined() {
                        rv.push_str(&item.to_string());
                    }
                }
                Ok(rv)
            }
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot join value of type {}", val.kind()),
            )),
        }
    }

    /// Reverses a string or a sequence.
    pub fn reverse(_state: &State, v: Value) -> Result<Value, Error> {
        match v.0 {
            ValueRepr::String(ref s, _) => Ok(Value::from(s.chars().rev().collect::<String>())),
            ValueRepr::Seq(ref items) => Ok(items.iter().rev().cloned().collect()),
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot reverse value of type {}", v.kind()),
            )),
        }
    }

    /// Replaces all occurrences of `from` with `to`.
    pub fn replace(_state: &State, v: String, from: String, to: String) -> String {
        v.replace(&from, &to)
    }

    /// Returns the absolute value of a number.
    pub fn abs(_state: &State, value: Value) -> Result<Value, Error> {
        match value.0 {
            ValueRepr::I64(x) => Ok(x
                .checked_abs()
                .map(Value::from)
                .unwrap_or_else(|| Value::from((x as f64).abs()))),
            ValueRepr::F64(x) => Ok(Value::from(x.abs())),
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot get absolute value of {}", value.kind()),
            )),
        }
    }

    /// Rounds a number to a number of decimal places (0 by default).
    pub fn round(_state: &State, value: Value, precision: Option<i64>) -> Result<Value, Error> {
        match value.0 {
            ValueRepr::I64(_) => Ok(value),
            ValueRepr::F64(val) => {
                let precision = precision.unwrap_or(0).clamp(-300, 300) as i32;
                let x = 10f64.powi(precision);
                Ok(Value::from((x * val).round() / x))
            }
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot round value of type {}", value.kind()),
            )),
        }
    }

    /// Converts a value into an integer, truncating decimals.
    ///
    /// Values that do not convert to a finite number become `0`.
    pub fn int(_state: &State, value: Value) -> Value {
        match value.0 {
            ValueRepr::I64(_) => value,
            _ => match ops::to_number(&value) {
                Some(x) if x.is_finite() => Value::from(x.trunc() as i64),
                _ => Value::from(0),
            },
        }
    }

    /// Converts a value into a float.  Values that do not convert become
    /// `0.0`.
    pub fn float(_state: &State, value: Value) -> Value {
        match value.kind() {
            ValueKind::Seq | ValueKind::Map | ValueKind::Regex => Value::from(0.0),
            _ => Value::from(ops::to_number(&value).unwrap_or(0.0)),
        }
    }

    /// Escapes the value and turns newlines into `<br>` tags.
    pub fn nl2br(state: &State, value: Value) -> Result<Value, Error> {
        let escaped = ok!(escape(state, value));
        let rv = escaped.to_string().replace("\r\n", "\n").replace('\n', "<br>\n");
        Ok(Value::from_safe_string(rv))
    }

    /// Dumps a value to JSON.
    ///
    /// The result is marked safe and `<`, `>`, `&` and `'` are escaped so
    /// it can be embedded into HTML attributes and script tags.
    #[cfg(feature = "json")]
    pub fn tojson(_state: &State, value: Value) -> Result<Value, Error> {
        serde_json::to_string(&value)
            .map_err(|err| {
                Error::new(ErrorKind::InvalidOperation, "cannot serialize to JSON").with_source(err)
            })
            .map(|s| {
                let mut rv = String::with_capacity(s.len());
                for c in s.chars() {
                    match c {
                        '<' => rv.push_str("\\u003c"),
                        '>' => rv.push_str("\\u003e"),
                        '&' => rv.push_str("\\u0026"),
                        '\'' => rv.push_str("\\u0027"),
                        _ => rv.push(c),
                    }
                }
                Value::from_safe_string(rv)
            })
    }

    /// URL encodes a value.
    ///
    /// A map is encoded as a query string, skipping null and undefined
    /// values.  Everything else is encoded by its string form.
    #[cfg(feature = "urlencode")]
    pub fn urlencode(_state: &State, value: Value) -> Result<String, Error> {
        use std::fmt::Write;

        const SET: &percent_encoding::AsciiSet = &percent_encoding::NON_ALPHANUMERIC
            .remove(b'/')
            .remove(b'.')
            .remove(b'-')
            .remove(b'_')
            .add(b' ');

        match value.0 {
            ValueRepr::Map(ref items) => {
                let mut rv = String::new();
                for (k, v) in items.iter() {
                    if v.is_none_or_undefined() {
                        continue;
                    }
                    if !rv.is_empty() {
                        rv.push('&');
                    }
                    ok!(write!(
                        rv,
                        "{}={}",
                        percent_encoding::utf8_percent_encode(k, SET),
                        percent_encoding::utf8_percent_encode(&v.to_string(), SET)
                    )
                    .map_err(Error::from));
                }
                Ok(rv)
            }
            ValueRepr::None | ValueRepr::Undefined => Ok(String::new()),
            _ => Ok(percent_encoding::utf8_percent_encode(&value.to_string(), SET).to_string()),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        use crate::Environment;

        fn apply(name: &str, args: &[Value]) -> Result<Value, Error> {
            let env = Environment::new();
            crate::vm::with_root_state(&env, (), |state| {
                ok!(state.get_filter(name)).apply_to(state, args)
            })
        }

        #[test]
        fn test_basics() {
            assert_eq!(apply("upper", &[Value::from("abc")]).unwrap(), Value::from("ABC"));
            assert_eq!(
                apply("capitalize", &[Value::from("hELLO")]).unwrap(),
                Value::from("Hello")
            );
            assert_eq!(
                apply("default", &[Value::from(""), Value::from("x")]).unwrap(),
                Value::from("x")
            );
            assert_eq!(
                apply("default", &[Value::from(0), Value::from("x")]).unwrap(),
                Value::from(0)
            );
            assert_eq!(
                apply("join", &[Value::from(vec![1, 2, 3]), Value::from("-")]).unwrap(),
                Value::from("1-2-3")
            );
            assert_eq!(apply("abs", &[Value::from(-3)]).unwrap(), Value::from(3));
            assert_eq!(
                apply("round", &[Value::from(2.456), Value::from(2)]).unwrap(),
                Value::from(2.46)
            );
            assert_eq!(apply("int", &[Value::from("42.9")]).unwrap(), Value::from(42));
        }

        #[test]
        fn test_escape_is_safe() {
            let rv = apply("escape", &[Value::from("<b>")]).unwrap();
            assert!(rv.is_safe());
            assert_eq!(rv.to_string(), "&lt;b&gt;");
            let rv = apply("e", &[rv]).unwrap();
            assert_eq!(rv.to_string(), "&lt;b&gt;");
        }

        #[test]
        fn test_length_errors() {
            let err = apply("length", &[Value::from(42)]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        }

        #[cfg(feature = "json")]
        #[test]
        fn test_tojson() {
            let value = Value::from_serializable(&serde_json::json!({"a": "<x>"}));
            let rv = apply("tojson", &[value]).unwrap();
            assert!(rv.is_safe());
            assert_eq!(rv.to_string(), r#"{"a":"\u003cx\u003e"}"#);
        }

        #[cfg(feature = "urlencode")]
        #[test]
        fn test_urlencode() {
            let value = Value::from_serializable(&serde_json::json!({"q": "a b", "x": null}));
            assert_eq!(apply("urlencode", &[value]).unwrap(), Value::from("q=a%20b"));
        }
    }
}

#[cfg(feature = "builtins")]
pub use self::builtins::*;

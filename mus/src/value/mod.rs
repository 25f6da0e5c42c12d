//! Provides a dynamic value type abstraction.
//!
//! This module gives access to the dynamically typed value that expressions
//! evaluate to while a template renders.  The value model mirrors the data a
//! template sees: undefined, null, booleans, numbers, strings, sequences,
//! maps and compiled regular expressions.
//!
//! # Converting Values
//!
//! Values are typically created via the [`From`] trait:
//!
//! ```
//! # use mus::value::Value;
//! let value = Value::from(42);
//! ```
//!
//! When a template is rendered the context is converted with the help of
//! [`serde`].  This can also be triggered manually by using the
//! [`Value::from_serializable`] method:
//!
//! ```
//! # use mus::value::Value;
//! let value = Value::from_serializable(&[1, 2, 3]);
//! assert_eq!(value.len(), Some(3));
//! ```
//!
//! # Memory Management
//!
//! Values are immutable objects which are internally reference counted which
//! means they can be copied relatively cheaply.
//!
//! # HTML Escaping
//!
//! Output is HTML escaped unless a value is marked as safe.  Within templates
//! the `safe` marker of an expression does that, outside of templates the
//! [`Value::from_safe_string`] method can be used to achieve the same result.
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, ErrorKind};

pub use crate::value::argtypes::{from_args, ArgType, FunctionArgs, FunctionResult};
pub use crate::value::serialize::serializing_for_value;

mod argtypes;
pub(crate) mod methods;
pub(crate) mod ops;
mod serialize;

/// The map type used by values.
///
/// With the `preserve_order` feature (on by default) maps remember the order
/// in which keys were inserted, otherwise they are sorted by key.
#[cfg(feature = "preserve_order")]
pub type ValueMap = indexmap::IndexMap<String, Value>;

/// The map type used by values.
///
/// With the `preserve_order` feature (on by default) maps remember the order
/// in which keys were inserted, otherwise they are sorted by key.
#[cfg(not(feature = "preserve_order"))]
pub type ValueMap = std::collections::BTreeMap<String, Value>;

/// Describes the kind of value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is undefined
    Undefined,
    /// The value is null
    None,
    /// The value is a [`bool`]
    Bool,
    /// The value is an integer or a float.
    Number,
    /// The value is a string.
    String,
    /// The value is an array of other values.
    Seq,
    /// The value is a key/value mapping.
    Map,
    /// The value is a compiled regular expression.
    Regex,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Undefined => "undefined",
            ValueKind::None => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
            ValueKind::Regex => "regex",
        })
    }
}

/// The type of string.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum StringType {
    Normal,
    Safe,
}

/// A regular expression literal (`r/pattern/flags`).
pub(crate) struct RegexValue {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

impl RegexValue {
    /// `g` makes replacements apply to every match.
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

#[derive(Clone)]
pub(crate) enum ValueRepr {
    Undefined,
    None,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(Arc<str>, StringType),
    Seq(Arc<Vec<Value>>),
    Map(Arc<ValueMap>),
    Regex(Arc<RegexValue>),
}

impl fmt::Debug for ValueRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRepr::Undefined => f.write_str("undefined"),
            ValueRepr::None => f.write_str("null"),
            ValueRepr::Bool(val) => fmt::Debug::fmt(val, f),
            ValueRepr::I64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::F64(val) => fmt::Debug::fmt(val, f),
            ValueRepr::String(val, _) => fmt::Debug::fmt(val, f),
            ValueRepr::Seq(val) => f.debug_list().entries(val.iter()).finish(),
            ValueRepr::Map(val) => f.debug_map().entries(val.iter()).finish(),
            ValueRepr::Regex(val) => write!(f, "/{}/{}", val.source, val.flags),
        }
    }
}

/// Represents a dynamically typed value in the template engine.
#[derive(Clone)]
pub struct Value(pub(crate) ValueRepr);

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (ValueRepr::Undefined, ValueRepr::Undefined) => true,
            (ValueRepr::None, ValueRepr::None) => true,
            (ValueRepr::Bool(a), ValueRepr::Bool(b)) => a == b,
            (ValueRepr::String(a, _), ValueRepr::String(b, _)) => a == b,
            (ValueRepr::Seq(a), ValueRepr::Seq(b)) => a == b,
            (ValueRepr::Map(a), ValueRepr::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (ValueRepr::Regex(a), ValueRepr::Regex(b)) => {
                a.source == b.source && a.flags == b.flags
            }
            _ => match ops::coerce(self, other) {
                Some(ops::CoerceResult::I64(a, b)) => a == b,
                Some(ops::CoerceResult::F64(a, b)) => a == b,
                None => false,
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self.0, &other.0) {
            (ValueRepr::String(a, _), ValueRepr::String(b, _)) => a.partial_cmp(b),
            _ => match ops::coerce(self, other) {
                Some(ops::CoerceResult::I64(a, b)) => a.partial_cmp(&b),
                Some(ops::CoerceResult::F64(a, b)) => a.partial_cmp(&b),
                None => None,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

fn format_number(f: &mut fmt::Formatter<'_>, val: f64) -> fmt::Result {
    if val.is_nan() {
        f.write_str("NaN")
    } else if val.is_infinite() {
        f.write_str(if val > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{}", val)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ValueRepr::Undefined => f.write_str("undefined"),
            ValueRepr::None => f.write_str("null"),
            ValueRepr::Bool(val) => write!(f, "{}", val),
            ValueRepr::I64(val) => write!(f, "{}", val),
            ValueRepr::F64(val) => format_number(f, val),
            ValueRepr::String(ref val, _) => f.write_str(val),
            ValueRepr::Seq(ref values) => {
                for (idx, val) in values.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(","));
                    }
                    // sequences print missing values as empty slots
                    if !val.is_none_or_undefined() {
                        ok!(fmt::Display::fmt(val, f));
                    }
                }
                Ok(())
            }
            ValueRepr::Map(_) => f.write_str("[object Object]"),
            ValueRepr::Regex(ref re) => write!(f, "/{}/{}", re.source, re.flags),
        }
    }
}

impl Default for Value {
    fn default() -> Value {
        ValueRepr::Undefined.into()
    }
}

impl From<ValueRepr> for Value {
    #[inline(always)]
    fn from(val: ValueRepr) -> Value {
        Value(val)
    }
}

impl<'a> From<&'a str> for Value {
    #[inline(always)]
    fn from(val: &'a str) -> Self {
        ValueRepr::String(Arc::from(val), StringType::Normal).into()
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(val: String) -> Self {
        ValueRepr::String(Arc::from(val), StringType::Normal).into()
    }
}

impl From<Arc<str>> for Value {
    #[inline(always)]
    fn from(val: Arc<str>) -> Self {
        ValueRepr::String(val, StringType::Normal).into()
    }
}

impl From<char> for Value {
    #[inline(always)]
    fn from(val: char) -> Self {
        let mut buf = [0u8; 4];
        Value::from(&*val.encode_utf8(&mut buf))
    }
}

impl From<()> for Value {
    #[inline(always)]
    fn from(_: ()) -> Self {
        ValueRepr::None.into()
    }
}

impl From<bool> for Value {
    #[inline(always)]
    fn from(val: bool) -> Self {
        ValueRepr::Bool(val).into()
    }
}

impl From<u64> for Value {
    #[inline(always)]
    fn from(val: u64) -> Self {
        match i64::try_from(val) {
            Ok(val) => ValueRepr::I64(val).into(),
            Err(_) => ValueRepr::F64(val as f64).into(),
        }
    }
}

impl From<usize> for Value {
    #[inline(always)]
    fn from(val: usize) -> Self {
        Value::from(val as u64)
    }
}

impl From<ValueMap> for Value {
    fn from(val: ValueMap) -> Self {
        ValueRepr::Map(Arc::new(val)).into()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(val: Vec<T>) -> Self {
        ValueRepr::Seq(Arc::new(val.into_iter().map(Into::into).collect())).into()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(val: Option<T>) -> Self {
        match val {
            Some(val) => val.into(),
            None => ValueRepr::None.into(),
        }
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ValueRepr::Seq(Arc::new(iter.into_iter().map(Into::into).collect())).into()
    }
}

macro_rules! value_from {
    ($src:ty, $dst:ident) => {
        impl From<$src> for Value {
            #[inline(always)]
            fn from(val: $src) -> Self {
                ValueRepr::$dst(val as _).into()
            }
        }
    };
}

value_from!(u8, I64);
value_from!(u16, I64);
value_from!(u32, I64);
value_from!(i8, I64);
value_from!(i16, I64);
value_from!(i32, I64);
value_from!(i64, I64);
value_from!(f32, F64);
value_from!(f64, F64);

impl From<Value> for String {
    fn from(val: Value) -> Self {
        val.to_string()
    }
}

impl Value {
    /// The undefined value
    pub const UNDEFINED: Value = Value(ValueRepr::Undefined);

    /// Creates a value from a safe string.
    ///
    /// A safe string is one that will bypass auto escaping.  For instance if you
    /// want to have the template engine render some HTML without the user having to
    /// supply the `safe` marker, you can use a value of this type instead.
    pub fn from_safe_string(value: String) -> Value {
        ValueRepr::String(Arc::from(value), StringType::Safe).into()
    }

    /// Compiles a regular expression value from a pattern and flags.
    ///
    /// The flags follow the `r/pattern/flags` literal convention: `i` for case
    /// insensitive matching, `m` for multi line mode, `g` for replacing all
    /// matches and `y` which is accepted and ignored.
    pub fn from_regex(source: &str, flags: &str) -> Result<Value, Error> {
        // `\/` is the escaped literal delimiter
        let mut builder = regex::RegexBuilder::new(&source.replace("\\/", "/"));
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                'g' | 'y' => {}
                other => {
                    return Err(Error::new(
                        ErrorKind::SyntaxError,
                        format!("unknown regex flag `{}`", other),
                    ))
                }
            }
        }
        let regex = ok!(builder.build().map_err(|err| {
            Error::new(ErrorKind::SyntaxError, "invalid regular expression").with_source(err)
        }));
        Ok(ValueRepr::Regex(Arc::new(RegexValue {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        }))
        .into())
    }

    /// Returns the value kind.
    pub fn kind(&self) -> ValueKind {
        match self.0 {
            ValueRepr::Undefined => ValueKind::Undefined,
            ValueRepr::None => ValueKind::None,
            ValueRepr::Bool(_) => ValueKind::Bool,
            ValueRepr::I64(_) | ValueRepr::F64(_) => ValueKind::Number,
            ValueRepr::String(..) => ValueKind::String,
            ValueRepr::Seq(_) => ValueKind::Seq,
            ValueRepr::Map(_) => ValueKind::Map,
            ValueRepr::Regex(_) => ValueKind::Regex,
        }
    }

    /// Is this value considered true?
    ///
    /// Undefined, null, `false`, zero, `NaN` and the empty string are false.
    /// Every other value, including empty sequences and maps, is true.
    pub fn is_true(&self) -> bool {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => false,
            ValueRepr::Bool(val) => val,
            ValueRepr::I64(val) => val != 0,
            ValueRepr::F64(val) => val != 0.0 && !val.is_nan(),
            ValueRepr::String(ref val, _) => !val.is_empty(),
            ValueRepr::Seq(_) | ValueRepr::Map(_) | ValueRepr::Regex(_) => true,
        }
    }

    /// Returns `true` if this value is safe.
    pub fn is_safe(&self) -> bool {
        matches!(&self.0, ValueRepr::String(_, StringType::Safe))
    }

    /// Returns `true` if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(&self.0, ValueRepr::Undefined)
    }

    /// Returns `true` if this value is null.
    pub fn is_none(&self) -> bool {
        matches!(&self.0, ValueRepr::None)
    }

    pub(crate) fn is_none_or_undefined(&self) -> bool {
        matches!(&self.0, ValueRepr::None | ValueRepr::Undefined)
    }

    /// If the value is a string, return it.
    pub fn as_str(&self) -> Option<&str> {
        match self.0 {
            ValueRepr::String(ref s, _) => Some(s),
            _ => None,
        }
    }

    /// If the value is a number, returns it as float.
    pub fn as_f64(&self) -> Option<f64> {
        match self.0 {
            ValueRepr::I64(val) => Some(val as f64),
            ValueRepr::F64(val) => Some(val),
            _ => None,
        }
    }

    /// If the value is a sequence, returns its items.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self.0 {
            ValueRepr::Seq(ref items) => Some(&items[..]),
            _ => None,
        }
    }

    /// If the value is a map, returns it.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self.0 {
            ValueRepr::Map(ref map) => Some(map),
            _ => None,
        }
    }

    pub(crate) fn as_regex(&self) -> Option<&RegexValue> {
        match self.0 {
            ValueRepr::Regex(ref re) => Some(re),
            _ => None,
        }
    }

    /// Returns the length of the contained value.
    ///
    /// Strings count characters, sequences their items and maps their keys.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Option<usize> {
        match self.0 {
            ValueRepr::String(ref s, _) => Some(s.chars().count()),
            ValueRepr::Seq(ref items) => Some(items.len()),
            ValueRepr::Map(ref items) => Some(items.len()),
            _ => None,
        }
    }

    /// Looks up an attribute by attribute name.
    ///
    /// Reading an attribute of undefined or null is an error, missing
    /// attributes of other values are undefined.
    pub fn get_attr(&self, key: &str) -> Result<Value, Error> {
        match self.0 {
            ValueRepr::Undefined | ValueRepr::None => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot read property `{}` of {}", key, self.kind()),
            )),
            _ => Ok(self.get_attr_opt(key).unwrap_or(Value::UNDEFINED)),
        }
    }

    fn get_attr_opt(&self, key: &str) -> Option<Value> {
        match self.0 {
            ValueRepr::Map(ref items) => items.get(key).cloned(),
            ValueRepr::Seq(ref items) => {
                if key == "length" {
                    Some(Value::from(items.len()))
                } else {
                    items.get(some!(key.parse::<usize>().ok())).cloned()
                }
            }
            ValueRepr::String(ref s, _) => {
                if key == "length" {
                    Some(Value::from(s.chars().count()))
                } else {
                    s.chars().nth(some!(key.parse::<usize>().ok())).map(Value::from)
                }
            }
            ValueRepr::Regex(ref re) => match key {
                "source" => Some(Value::from(re.source.as_str())),
                "flags" => Some(Value::from(re.flags.as_str())),
                "global" => Some(Value::from(re.is_global())),
                _ => None,
            },
            _ => None,
        }
    }

    /// Looks up an item (or attribute) by key.
    ///
    /// This is similar to [`get_attr`](Value::get_attr) but instead of using
    /// a string key this can be any key.  For instance this can be used to
    /// index into sequences.
    pub fn get_item(&self, key: &Value) -> Result<Value, Error> {
        if self.is_none_or_undefined() {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot read property `{}` of {}", key, self.kind()),
            ));
        }
        let rv = match (&self.0, &key.0) {
            (ValueRepr::Seq(items), ValueRepr::I64(idx)) => usize::try_from(*idx)
                .ok()
                .and_then(|idx| items.get(idx).cloned()),
            (ValueRepr::String(s, _), ValueRepr::I64(idx)) => usize::try_from(*idx)
                .ok()
                .and_then(|idx| s.chars().nth(idx))
                .map(Value::from),
            (_, ValueRepr::String(name, _)) => self.get_attr_opt(name),
            _ => self.get_attr_opt(&key.to_string()),
        };
        Ok(rv.unwrap_or(Value::UNDEFINED))
    }

    /// Walks a dotted property path.
    ///
    /// Unlike [`get_attr`](Value::get_attr) this never fails: a missing
    /// segment anywhere along the path makes the whole path undefined.
    pub fn get_path<'a, I: IntoIterator<Item = &'a str>>(&self, path: I) -> Value {
        let mut rv = self.clone();
        for segment in path {
            if rv.is_none_or_undefined() {
                return Value::UNDEFINED;
            }
            rv = rv.get_attr_opt(segment).unwrap_or(Value::UNDEFINED);
        }
        rv
    }

    /// Returns the key/value pairs a `for` block iterates over.
    ///
    /// Sequences and strings yield their 0-based positions as keys, maps
    /// yield their keys.  Every other value iterates zero times.
    pub(crate) fn iteration_pairs(&self) -> Vec<(Value, Value)> {
        match self.0 {
            ValueRepr::Seq(ref items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| (Value::from(idx), item.clone()))
                .collect(),
            ValueRepr::Map(ref items) => items
                .iter()
                .map(|(key, value)| (Value::from(key.as_str()), value.clone()))
                .collect(),
            ValueRepr::String(ref s, _) => s
                .chars()
                .enumerate()
                .map(|(idx, c)| (Value::from(idx), Value::from(c)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Calls a built-in method on the value.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        methods::call_method(self, name, args)
    }
}

/// Utility macro to create a value from a literal
#[cfg(test)]
macro_rules! value {
    ($value:expr) => {
        $crate::value::Value::from_serializable(&$value)
    };
}

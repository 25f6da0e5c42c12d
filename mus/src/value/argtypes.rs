use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueRepr};

/// A utility trait that represents the return value of filters.
///
/// It's implemented for the following types:
///
/// * `Rv` where `Rv` implements `Into<Value>`
/// * `Result<Rv, Error>` where `Rv` implements `Into<Value>`
pub trait FunctionResult {
    #[doc(hidden)]
    fn into_result(self) -> Result<Value, Error>;
}

impl<I: Into<Value>> FunctionResult for Result<I, Error> {
    fn into_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<I: Into<Value>> FunctionResult for I {
    fn into_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Helper trait representing valid filter arguments.
///
/// Filters are written with concrete types instead of values.  This trait
/// performs the conversion of the positional arguments and is implemented
/// for tuples of up to four [`ArgType`]s.
pub trait FunctionArgs: Sized {
    /// Converts to function arguments from a slice of values.
    #[doc(hidden)]
    fn from_values(values: &[Value]) -> Result<Self, Error>;
}

/// Utility function to convert a slice of values into arguments.
///
/// ```
/// use mus::value::{from_args, Value};
/// # fn foo() -> Result<(), mus::Error> {
/// let args = vec![Value::from("foo"), Value::from(42i64)];
/// let (string, num): (String, i64) = from_args(&args)?;
/// assert_eq!((string.as_str(), num), ("foo", 42));
/// # Ok(()) } fn main() { foo().unwrap(); }
/// ```
#[inline(always)]
pub fn from_args<Args: FunctionArgs>(values: &[Value]) -> Result<Args, Error> {
    Args::from_values(values)
}

/// A trait implemented by all filter argument types.
///
/// It's implemented for the following types:
///
/// * integers: [`i64`], [`usize`]
/// * floats: [`f64`]
/// * bool: [`bool`] (any value, converted by truthiness)
/// * string: [`String`] (any value, undefined and null become the empty string)
/// * values: [`Value`]
/// * vectors: [`Vec<Value>`]
///
/// Optional parameters are declared as `Option<T>`: a missing, undefined or
/// null argument becomes `None`.
pub trait ArgType: Sized {
    /// Converts a single argument.  `None` means the argument is missing.
    fn from_value(value: Option<&Value>) -> Result<Self, Error>;
}

fn missing_argument() -> Error {
    Error::new(ErrorKind::InvalidArguments, "missing argument")
}

fn wrong_type(value: &Value, expected: &str) -> Error {
    Error::new(
        ErrorKind::InvalidArguments,
        format!("expected {}, got {}", expected, value.kind()),
    )
}

impl ArgType for Value {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        Ok(value.cloned().unwrap_or(Value::UNDEFINED))
    }
}

impl ArgType for String {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            Some(value) if !value.is_none_or_undefined() => Ok(value.to_string()),
            _ => Ok(String::new()),
        }
    }
}

impl ArgType for bool {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        Ok(value.map_or(false, Value::is_true))
    }
}

impl ArgType for f64 {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match value.0 {
            ValueRepr::I64(x) => Ok(x as f64),
            ValueRepr::F64(x) => Ok(x),
            ValueRepr::String(ref s, _) => s.trim().parse().map_err(|_| wrong_type(value, "number")),
            _ => Err(wrong_type(value, "number")),
        }
    }
}

impl ArgType for i64 {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match value.0 {
            ValueRepr::I64(x) => Ok(x),
            ValueRepr::F64(x) if x.is_finite() => Ok(x.trunc() as i64),
            ValueRepr::String(ref s, _) => s.trim().parse().map_err(|_| wrong_type(value, "integer")),
            _ => Err(wrong_type(value, "integer")),
        }
    }
}

impl ArgType for usize {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let rv = ok!(i64::from_value(value));
        usize::try_from(rv).map_err(|_| {
            Error::new(
                ErrorKind::InvalidArguments,
                format!("expected non-negative integer, got {}", rv),
            )
        })
    }
}

impl ArgType for Vec<Value> {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        let value = ok!(value.ok_or_else(missing_argument));
        match value.0 {
            ValueRepr::Seq(ref items) => Ok(items.to_vec()),
            ValueRepr::String(ref s, _) => Ok(s.chars().map(Value::from).collect()),
            _ => Err(wrong_type(value, "sequence")),
        }
    }
}

impl<T: ArgType> ArgType for Option<T> {
    fn from_value(value: Option<&Value>) -> Result<Self, Error> {
        match value {
            None => Ok(None),
            Some(value) if value.is_none_or_undefined() => Ok(None),
            Some(value) => T::from_value(Some(value)).map(Some),
        }
    }
}

macro_rules! tuple_impls {
    ( $( $name:ident )* ) => {
        impl<$($name: ArgType,)*> FunctionArgs for ($($name,)*) {
            fn from_values(values: &[Value]) -> Result<Self, Error> {
                #![allow(non_snake_case, unused)]
                let mut idx = 0;
                $(
                    let $name = ok!($name::from_value(values.get(idx)));
                    idx += 1;
                )*
                if values.len() > idx {
                    Err(Error::new(
                        ErrorKind::InvalidArguments,
                        format!("too many arguments (expected at most {})", idx),
                    ))
                } else {
                    Ok(( $($name,)* ))
                }
            }
        }
    };
}

tuple_impls! {}
tuple_impls! { A }
tuple_impls! { A B }
tuple_impls! { A B C }
tuple_impls! { A B C D }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_args() {
        let (a, b): (String, Option<i64>) = from_args(&[Value::from("x")]).unwrap();
        assert_eq!(a, "x");
        assert_eq!(b, None);
        let (b,): (Option<i64>,) = from_args(&[Value::from(())]).unwrap();
        assert_eq!(b, None);
    }

    #[test]
    fn test_string_conversion() {
        let (a, b): (String, String) = from_args(&[Value::UNDEFINED, Value::from(42)]).unwrap();
        assert_eq!(a, "");
        assert_eq!(b, "42");
    }

    #[test]
    fn test_too_many_arguments() {
        let err = from_args::<(i64,)>(&[Value::from(1), Value::from(2)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
        assert_eq!(
            err.to_string(),
            "invalid arguments: too many arguments (expected at most 1)"
        );
    }

    #[test]
    fn test_wrong_type() {
        let err = from_args::<(f64,)>(&[Value::from(vec![1])]).unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: expected number, got sequence");
    }
}

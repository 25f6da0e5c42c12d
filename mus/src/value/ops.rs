use std::cmp::Ordering;

use crate::error::{Error, ErrorKind};
use crate::value::{Value, ValueKind, ValueRepr};

pub enum CoerceResult {
    I64(i64, i64),
    F64(f64, f64),
}

/// Coerces two numbers into a common representation.
pub fn coerce(a: &Value, b: &Value) -> Option<CoerceResult> {
    match (&a.0, &b.0) {
        (ValueRepr::I64(a), ValueRepr::I64(b)) => Some(CoerceResult::I64(*a, *b)),
        (ValueRepr::F64(a), ValueRepr::F64(b)) => Some(CoerceResult::F64(*a, *b)),
        (ValueRepr::I64(a), ValueRepr::F64(b)) => Some(CoerceResult::F64(*a as f64, *b)),
        (ValueRepr::F64(a), ValueRepr::I64(b)) => Some(CoerceResult::F64(*a, *b as f64)),
        _ => None,
    }
}

/// Converts a primitive value into a number.
///
/// Undefined and unparsable strings become `NaN`, null and the empty
/// string become zero.  Sequences, maps and regexes cannot be converted.
pub fn to_number(value: &Value) -> Option<f64> {
    Some(match value.0 {
        ValueRepr::Undefined => f64::NAN,
        ValueRepr::None => 0.0,
        ValueRepr::Bool(x) => x as i64 as f64,
        ValueRepr::I64(x) => x as f64,
        ValueRepr::F64(x) => x,
        ValueRepr::String(ref s, _) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse().unwrap_or(f64::NAN)
            }
        }
        ValueRepr::Seq(_) | ValueRepr::Map(_) | ValueRepr::Regex(_) => return None,
    })
}

fn is_stringish(value: &Value) -> bool {
    matches!(
        value.kind(),
        ValueKind::String | ValueKind::Seq | ValueKind::Map | ValueKind::Regex
    )
}

fn number_value(val: f64) -> Value {
    if val.fract() == 0.0 && val.abs() < i64::MAX as f64 {
        Value::from(val as i64)
    } else {
        Value::from(val)
    }
}

fn impossible_op(op: &str, lhs: &Value, rhs: &Value) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!(
            "tried to use {} operator on unsupported types {} and {}",
            op,
            lhs.kind(),
            rhs.kind()
        ),
    )
}

fn numbers(op: &str, lhs: &Value, rhs: &Value) -> Result<(f64, f64), Error> {
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(impossible_op(op, lhs, rhs)),
    }
}

macro_rules! math_binop {
    ($name:ident, $int:ident, $float:tt) => {
        pub fn $name(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
            if let Some(CoerceResult::I64(a, b)) = coerce(lhs, rhs) {
                if let Some(val) = a.$int(b) {
                    return Ok(Value::from(val));
                }
            }
            let (a, b) = ok!(numbers(stringify!($float), lhs, rhs));
            Ok(Value::from(a $float b))
        }
    }
}

/// Adds two values, concatenating if either side is not a primitive
/// number, boolean or null.
pub fn add(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    if is_stringish(lhs) || is_stringish(rhs) {
        return Ok(string_concat(lhs, rhs));
    }
    if let Some(CoerceResult::I64(a, b)) = coerce(lhs, rhs) {
        if let Some(val) = a.checked_add(b) {
            return Ok(Value::from(val));
        }
    }
    let (a, b) = ok!(numbers("+", lhs, rhs));
    Ok(Value::from(a + b))
}

math_binop!(sub, checked_sub, -);
math_binop!(mul, checked_mul, *);
math_binop!(rem, checked_rem, %);

/// Divides two values.  The result is always a float.
pub fn div(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    let (a, b) = ok!(numbers("/", lhs, rhs));
    Ok(Value::from(a / b))
}

/// Implements an unary `neg` operation on value.
pub fn neg(val: &Value) -> Result<Value, Error> {
    match val.0 {
        ValueRepr::I64(x) => Ok(x
            .checked_neg()
            .map(Value::from)
            .unwrap_or_else(|| Value::from(-(x as f64)))),
        ValueRepr::F64(x) => Ok(Value::from(-x)),
        _ => match to_number(val) {
            Some(x) => Ok(number_value(-x)),
            None => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot negate {}", val.kind()),
            )),
        },
    }
}

/// Implements the unary `+` operation which converts into a number.
pub fn pos(val: &Value) -> Result<Value, Error> {
    match val.0 {
        ValueRepr::I64(_) | ValueRepr::F64(_) => Ok(val.clone()),
        _ => match to_number(val) {
            Some(x) => Ok(number_value(x)),
            None => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("cannot convert {} to a number", val.kind()),
            )),
        },
    }
}

/// Concatenates the string representations of two values.
pub fn string_concat(left: &Value, right: &Value) -> Value {
    Value::from(format!("{}{}", left, right))
}

/// Loose equality (`==`).
///
/// Null and undefined are equal to each other and nothing else.  Numbers,
/// numeric strings and booleans compare by their numeric value.
pub fn loose_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.kind(), rhs.kind()) {
        (ValueKind::Undefined | ValueKind::None, ValueKind::Undefined | ValueKind::None) => true,
        (ValueKind::Undefined | ValueKind::None, _) | (_, ValueKind::Undefined | ValueKind::None) => {
            false
        }
        (a, b) if a == b => lhs == rhs,
        (ValueKind::Seq | ValueKind::Map | ValueKind::Regex, _)
        | (_, ValueKind::Seq | ValueKind::Map | ValueKind::Regex) => {
            lhs.to_string() == rhs.to_string()
        }
        _ => match (to_number(lhs), to_number(rhs)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Strict equality (`===`): values of different kinds are never equal.
pub fn strict_eq(lhs: &Value, rhs: &Value) -> bool {
    lhs.kind() == rhs.kind() && lhs == rhs
}

/// Relational comparison.
///
/// Two strings compare lexicographically, everything else compares
/// numerically.  `None` means the values are not comparable and every
/// relational operator yields `false`.
pub fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (lhs.as_str(), rhs.as_str()) {
        return Some(a.cmp(b));
    }
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_adding() {
        assert_eq!(
            add(&Value::from(1), &Value::from(2)).unwrap(),
            Value::from(3)
        );
        assert_eq!(
            add(&Value::from("foo"), &Value::from(1)).unwrap(),
            Value::from("foo1")
        );
        assert_eq!(
            add(&Value::from(1.5), &Value::from(true)).unwrap(),
            Value::from(2.5)
        );
        assert_eq!(
            add(&Value::from(i64::MAX), &Value::from(1)).unwrap(),
            Value::from(i64::MAX as f64 + 1.0)
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            sub(&Value::from("5"), &Value::from(2)).unwrap(),
            Value::from(3.0)
        );
        assert_eq!(
            mul(&Value::from(4), &Value::from(2)).unwrap(),
            Value::from(8)
        );
        assert_eq!(div(&Value::from(7), &Value::from(2)).unwrap(), Value::from(3.5));
        assert_eq!(rem(&Value::from(-7), &Value::from(2)).unwrap(), Value::from(-1));
        assert!(div(&Value::from(1), &Value::from(0))
            .unwrap()
            .as_f64()
            .unwrap()
            .is_infinite());
        assert_eq!(
            sub(&Value::from(vec![1]), &Value::from(1))
                .unwrap_err()
                .to_string(),
            "invalid operation: tried to use - operator on unsupported types sequence and number"
        );
    }

    #[test]
    fn test_equality() {
        assert!(loose_eq(&Value::from(()), &Value::UNDEFINED));
        assert!(!strict_eq(&Value::from(()), &Value::UNDEFINED));
        assert!(loose_eq(&Value::from("1"), &Value::from(1)));
        assert!(!strict_eq(&Value::from("1"), &Value::from(1)));
        assert!(loose_eq(&Value::from(true), &Value::from(1)));
        assert!(strict_eq(&Value::from(1), &Value::from(1.0)));
        assert!(!loose_eq(&Value::from(0), &Value::from(())));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&Value::from("a"), &Value::from("b")), Some(Ordering::Less));
        assert_eq!(compare(&Value::from(10), &Value::from("9")), Some(Ordering::Greater));
        assert_eq!(compare(&Value::UNDEFINED, &Value::from(1)), None);
    }

    #[test]
    fn test_neg() {
        assert_eq!(neg(&Value::from(2)).unwrap(), Value::from(-2));
        assert_eq!(neg(&Value::from("3")).unwrap(), Value::from(-3));
        assert_eq!(pos(&Value::from("4.5")).unwrap(), Value::from(4.5));
    }
}

use std::sync::Arc;

use crate::error::{Error, ErrorKind};
use crate::value::argtypes::from_args;
use crate::value::ops::strict_eq;
use crate::value::{Value, ValueRepr};

fn unknown_method(value: &Value, name: &str) -> Error {
    Error::new(
        ErrorKind::InvalidOperation,
        format!("{} has no method named {}", value.kind(), name),
    )
}

/// Resolves a possibly negative index against a length.
fn relative_index(idx: i64, len: usize) -> usize {
    if idx < 0 {
        (len as i64 + idx).max(0) as usize
    } else {
        (idx as usize).min(len)
    }
}

fn slice_bounds(args: &[Value], len: usize) -> Result<(usize, usize), Error> {
    let (start, end): (Option<i64>, Option<i64>) = ok!(from_args(args));
    let start = relative_index(start.unwrap_or(0), len);
    let end = end.map_or(len, |end| relative_index(end, len));
    Ok((start, end.max(start)))
}

pub fn call_method(value: &Value, name: &str, args: &[Value]) -> Result<Value, Error> {
    if value.is_none_or_undefined() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot call method `{}` of {}", name, value.kind()),
        ));
    }
    if name == "toString" {
        ok!(from_args::<()>(args));
        return Ok(Value::from(value.to_string()));
    }
    match value.0 {
        ValueRepr::String(ref s, _) => string_method(value, s, name, args),
        ValueRepr::Seq(ref items) => seq_method(value, items, name, args),
        ValueRepr::Regex(ref re) => match name {
            "test" => {
                let (haystack,): (String,) = ok!(from_args(args));
                Ok(Value::from(re.regex.is_match(&haystack)))
            }
            _ => Err(unknown_method(value, name)),
        },
        _ => Err(unknown_method(value, name)),
    }
}

fn string_method(value: &Value, s: &str, name: &str, args: &[Value]) -> Result<Value, Error> {
    match name {
        "toUpperCase" => {
            ok!(from_args::<()>(args));
            Ok(Value::from(s.to_uppercase()))
        }
        "toLowerCase" => {
            ok!(from_args::<()>(args));
            Ok(Value::from(s.to_lowercase()))
        }
        "trim" => {
            ok!(from_args::<()>(args));
            Ok(Value::from(s.trim()))
        }
        "split" => {
            let (sep, limit): (Option<Value>, Option<usize>) = ok!(from_args(args));
            let mut parts: Vec<Value> = match sep {
                None => vec![Value::from(s)],
                Some(sep) => match sep.as_regex() {
                    Some(re) => re.regex.split(s).map(Value::from).collect(),
                    None => {
                        let sep = sep.to_string();
                        if sep.is_empty() {
                            s.chars().map(Value::from).collect()
                        } else {
                            s.split(sep.as_str()).map(Value::from).collect()
                        }
                    }
                },
            };
            if let Some(limit) = limit {
                parts.truncate(limit);
            }
            Ok(Value::from(parts))
        }
        "indexOf" => {
            let (needle,): (String,) = ok!(from_args(args));
            Ok(Value::from(match s.find(&needle) {
                Some(byte_idx) => s[..byte_idx].chars().count() as i64,
                None => -1,
            }))
        }
        "includes" => {
            let (needle,): (String,) = ok!(from_args(args));
            Ok(Value::from(s.contains(&needle)))
        }
        "startsWith" => {
            let (needle,): (String,) = ok!(from_args(args));
            Ok(Value::from(s.starts_with(&needle)))
        }
        "endsWith" => {
            let (needle,): (String,) = ok!(from_args(args));
            Ok(Value::from(s.ends_with(&needle)))
        }
        "replace" => {
            let (pattern, replacement): (Value, String) = ok!(from_args(args));
            Ok(Value::from(match pattern.as_regex() {
                Some(re) if re.is_global() => re.regex.replace_all(s, replacement.as_str()).into_owned(),
                Some(re) => re.regex.replace(s, replacement.as_str()).into_owned(),
                None => s.replacen(&pattern.to_string(), &replacement, 1),
            }))
        }
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = ok!(slice_bounds(args, chars.len()));
            Ok(Value::from(chars[start..end].iter().collect::<String>()))
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end): (i64, Option<i64>) = ok!(from_args(args));
            let clamp = |idx: i64| (idx.max(0) as usize).min(chars.len());
            let start = clamp(start);
            let end = end.map_or(chars.len(), clamp);
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            Ok(Value::from(chars[start..end].iter().collect::<String>()))
        }
        "charAt" => {
            let (idx,): (Option<usize>,) = ok!(from_args(args));
            Ok(s
                .chars()
                .nth(idx.unwrap_or(0))
                .map(Value::from)
                .unwrap_or_else(|| Value::from("")))
        }
        _ => Err(unknown_method(value, name)),
    }
}

fn seq_method(value: &Value, items: &Arc<Vec<Value>>, name: &str, args: &[Value]) -> Result<Value, Error> {
    match name {
        "join" => {
            let (sep,): (Option<String>,) = ok!(from_args(args));
            let sep = sep.as_deref().unwrap_or(",");
            let mut rv = String::new();
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    rv.push_str(sep);
                }
                if !item.is_none_or_undefined() {
                    rv.push_str(&item.to_string());
                }
            }
            Ok(Value::from(rv))
        }
        "indexOf" => {
            let (needle,): (Value,) = ok!(from_args(args));
            Ok(Value::from(
                items
                    .iter()
                    .position(|item| strict_eq(item, &needle))
                    .map_or(-1, |idx| idx as i64),
            ))
        }
        "includes" => {
            let (needle,): (Value,) = ok!(from_args(args));
            Ok(Value::from(items.iter().any(|item| strict_eq(item, &needle))))
        }
        "slice" => {
            let (start, end) = ok!(slice_bounds(args, items.len()));
            Ok(Value::from(items[start..end].to_vec()))
        }
        "concat" => {
            let mut rv = items.to_vec();
            for arg in args {
                match arg.as_slice() {
                    Some(other) => rv.extend(other.iter().cloned()),
                    None => rv.push(arg.clone()),
                }
            }
            Ok(Value::from(rv))
        }
        _ => Err(unknown_method(value, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn call(value: Value, name: &str, args: &[Value]) -> Value {
        call_method(&value, name, args).unwrap()
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(call(Value::from("abc"), "toUpperCase", &[]), Value::from("ABC"));
        assert_eq!(
            call(Value::from("a,b,c"), "split", &[Value::from(",")]).to_string(),
            "a,b,c"
        );
        assert_eq!(
            call(Value::from("hello"), "slice", &[Value::from(-3)]),
            Value::from("llo")
        );
        assert_eq!(
            call(Value::from("hello"), "substring", &[Value::from(3), Value::from(1)]),
            Value::from("el")
        );
        assert_eq!(
            call(Value::from("hello"), "indexOf", &[Value::from("l")]),
            Value::from(2)
        );
        assert_eq!(
            call(Value::from("hello"), "charAt", &[Value::from(9)]),
            Value::from("")
        );
    }

    #[test]
    fn test_replace() {
        let re = Value::from_regex("o", "g").unwrap();
        assert_eq!(
            call(Value::from("foo boo"), "replace", &[re, Value::from("0")]),
            Value::from("f00 b00")
        );
        let re = Value::from_regex("o", "").unwrap();
        assert_eq!(
            call(Value::from("foo"), "replace", &[re, Value::from("0")]),
            Value::from("f0o")
        );
        assert_eq!(
            call(Value::from("a.a"), "replace", &[Value::from("."), Value::from("-")]),
            Value::from("a-a")
        );
    }

    #[test]
    fn test_seq_methods() {
        let seq = Value::from(vec![Value::from(1), Value::from(()), Value::from(3)]);
        assert_eq!(call(seq.clone(), "join", &[Value::from("-")]), Value::from("1--3"));
        assert_eq!(call(seq.clone(), "indexOf", &[Value::from(3)]), Value::from(2));
        assert_eq!(call(seq.clone(), "includes", &[Value::from("1")]), Value::from(false));
        assert_eq!(
            call(seq, "concat", &[Value::from(vec![4, 5])]).len(),
            Some(5)
        );
    }

    #[test]
    fn test_regex_test() {
        let re = Value::from_regex("^h", "i").unwrap();
        assert_eq!(call(re, "test", &[Value::from("Hello")]), Value::from(true));
    }

    #[test]
    fn test_method_errors() {
        let err = call_method(&Value::from(()), "trim", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        let err = call_method(&Value::from(1), "trim", &[]).unwrap_err();
        assert_eq!(err.to_string(), "invalid operation: number has no method named trim");
    }
}

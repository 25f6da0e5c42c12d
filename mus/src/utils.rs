use std::char::decode_utf16;
use std::fmt::{self, Write};
use std::iter::{once, repeat};
use std::str::Chars;

use crate::error::{Error, ErrorKind};
use crate::value::{StringType, Value, ValueRepr};

/// Controls the autoescaping behavior.
///
/// For more information see
/// [`set_auto_escape`](crate::Environment::set_auto_escape).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum AutoEscape {
    /// Do not apply auto escaping.
    None,
    /// Use HTML auto escaping rules.
    ///
    /// Any value will be converted into a string and the following characters
    /// will be escaped in ways compatible to XML and HTML: `<`, `>`, `&`, `"`,
    /// `'`, and `/`.
    #[default]
    Html,
}

/// Writes a value to the output, escaping it unless it is safe.
pub(crate) fn write_escaped(
    out: &mut String,
    auto_escape: AutoEscape,
    value: &Value,
) -> Result<(), Error> {
    if let ValueRepr::String(ref s, ty) = value.0 {
        if matches!(ty, StringType::Safe) || matches!(auto_escape, AutoEscape::None) {
            out.push_str(s);
            return Ok(());
        }
        return write!(out, "{}", HtmlEscape(s)).map_err(Error::from);
    }
    match auto_escape {
        AutoEscape::None => write!(out, "{}", value).map_err(Error::from),
        AutoEscape::Html => write!(out, "{}", HtmlEscape(&value.to_string())).map_err(Error::from),
    }
}

/// Helper to HTML escape a string.
pub struct HtmlEscape<'a>(pub &'a str);

impl<'a> fmt::Display for HtmlEscape<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "v_htmlescape")]
        {
            fmt::Display::fmt(&v_htmlescape::escape(self.0), f)
        }
        #[cfg(not(feature = "v_htmlescape"))]
        {
            let mut start = 0;
            for (idx, c) in self.0.char_indices() {
                let replacement = match c {
                    '<' => "&lt;",
                    '>' => "&gt;",
                    '&' => "&amp;",
                    '"' => "&quot;",
                    '\'' => "&#x27;",
                    '/' => "&#x2f;",
                    _ => continue,
                };
                if start < idx {
                    ok!(f.write_str(&self.0[start..idx]));
                }
                ok!(f.write_str(replacement));
                start = idx + 1;
            }
            f.write_str(&self.0[start..])
        }
    }
}

/// Removes surrounding whitespace and quotes from an attribute or
/// parameter name.
pub(crate) fn strip_scope(key: &str) -> &str {
    key.trim().trim_matches(|c| c == '\'' || c == '"')
}

struct Unescaper {
    out: String,
    pending_surrogate: u16,
}

impl Unescaper {
    fn unescape(mut self, s: &str) -> Result<String, Error> {
        let mut char_iter = s.chars();

        while let Some(c) = char_iter.next() {
            if c == '\\' {
                match char_iter.next() {
                    None => return Err(ErrorKind::BadEscape.into()),
                    Some(d) => match d {
                        '"' | '\\' | '/' | '\'' => ok!(self.push_char(d)),
                        'b' => ok!(self.push_char('\x08')),
                        'f' => ok!(self.push_char('\x0C')),
                        'n' => ok!(self.push_char('\n')),
                        'r' => ok!(self.push_char('\r')),
                        't' => ok!(self.push_char('\t')),
                        'u' => {
                            let val = ok!(self.parse_u16(&mut char_iter));
                            ok!(self.push_u16(val));
                        }
                        other => ok!(self.push_char(other)),
                    },
                }
            } else {
                ok!(self.push_char(c));
            }
        }

        if self.pending_surrogate != 0 {
            Err(ErrorKind::BadEscape.into())
        } else {
            Ok(self.out)
        }
    }

    fn parse_u16(&self, chars: &mut Chars) -> Result<u16, Error> {
        let hexnum = chars.chain(repeat('\0')).take(4).collect::<String>();
        u16::from_str_radix(&hexnum, 16).map_err(|_| ErrorKind::BadEscape.into())
    }

    fn push_u16(&mut self, c: u16) -> Result<(), Error> {
        match (self.pending_surrogate, (0xD800..=0xDFFF).contains(&c)) {
            (0, false) => match decode_utf16(once(c)).next() {
                Some(Ok(c)) => self.out.push(c),
                _ => return Err(ErrorKind::BadEscape.into()),
            },
            (_, false) => return Err(ErrorKind::BadEscape.into()),
            (0, true) => self.pending_surrogate = c,
            (prev, true) => match decode_utf16(once(prev).chain(once(c))).next() {
                Some(Ok(c)) => {
                    self.out.push(c);
                    self.pending_surrogate = 0;
                }
                _ => return Err(ErrorKind::BadEscape.into()),
            },
        }
        Ok(())
    }

    fn push_char(&mut self, c: char) -> Result<(), Error> {
        if self.pending_surrogate != 0 {
            Err(ErrorKind::BadEscape.into())
        } else {
            self.out.push(c);
            Ok(())
        }
    }
}

/// Un-escape a quoted string literal body.
///
/// Backslash escapes follow the usual conventions.  Unknown escapes yield
/// the escaped character itself.
pub(crate) fn unescape(s: &str) -> Result<String, Error> {
    Unescaper {
        out: String::new(),
        pending_surrogate: 0,
    }
    .unescape(s)
}

/// Turns a quoted string fragment (delimiters included) into its value.
///
/// A doubled delimiter inside the literal stands for one delimiter.
pub(crate) fn parse_string_literal(fragment: &str) -> Result<String, Error> {
    let mut chars = fragment.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(Error::new(ErrorKind::SyntaxError, "expected string literal")),
    };
    if fragment.len() < 2 || !fragment.ends_with(quote) {
        return Err(Error::new(
            ErrorKind::SyntaxError,
            "unterminated string literal",
        ));
    }
    let body = &fragment[1..fragment.len() - 1];
    let mut doubled = String::with_capacity(2);
    doubled.push(quote);
    doubled.push(quote);
    let mut single = String::with_capacity(2);
    single.push('\\');
    single.push(quote);
    unescape(&body.replace(&doubled, &single))
}

/// Runs a closure when dropped.
pub struct OnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> OnDrop<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnOnce()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        let input = "<>&\"'/";
        let output = HtmlEscape(input).to_string();
        assert_eq!(output, "&lt;&gt;&amp;&quot;&#x27;&#x2f;");
        assert_eq!(HtmlEscape("plain ünïcode").to_string(), "plain ünïcode");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"foo☃bar").unwrap(), "foo\u{2603}bar");
        assert_eq!(unescape(r"\t\b\f\r\n\\\/").unwrap(), "\t\x08\x0c\r\n\\/");
        assert_eq!(unescape("foobarbaz").unwrap(), "foobarbaz");
        assert_eq!(unescape(r"💩").unwrap(), "💩");
        assert_eq!(unescape(r"\ud83d").unwrap_err().kind(), ErrorKind::BadEscape);
    }

    #[test]
    fn test_parse_string_literal() {
        assert_eq!(parse_string_literal("'it''s'").unwrap(), "it's");
        assert_eq!(parse_string_literal(r#""a\"b""#).unwrap(), "a\"b");
        assert_eq!(parse_string_literal("\"a,b\"").unwrap(), "a,b");
        assert_eq!(
            parse_string_literal("'open").unwrap_err().kind(),
            ErrorKind::SyntaxError
        );
    }

    #[test]
    fn test_strip_scope() {
        assert_eq!(strip_scope("'data-id'"), "data-id");
        assert_eq!(strip_scope("\"class\""), "class");
        assert_eq!(strip_scope(" id "), "id");
    }
}

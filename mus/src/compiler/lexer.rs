use crate::compiler::tokens::{Fragment, FragmentKind, Token};
use crate::error::{Error, ErrorKind};
use crate::utils::parse_string_literal;

const OPEN_BRACKETS: &str = "{([";
const CLOSE_BRACKETS: &str = "})]";
const OPERATORS: &str = "{([})]%+-<>!?*/:=&|, \t\r\n";
const REGEX_FLAGS: &str = "igmy";

/// Operators recognized when adjacent operator fragments are joined,
/// longest first.
const OPERATOR_TOKENS: [(&str, Token<'static>); 21] = [
    ("===", Token::StrictEq),
    ("!==", Token::StrictNe),
    ("==", Token::Eq),
    ("!=", Token::Ne),
    ("<=", Token::Lte),
    (">=", Token::Gte),
    ("&&", Token::And),
    ("||", Token::Or),
    ("!", Token::Bang),
    ("<", Token::Lt),
    (">", Token::Gt),
    ("+", Token::Plus),
    ("-", Token::Minus),
    ("*", Token::Mul),
    ("/", Token::Div),
    ("%", Token::Mod),
    ("?", Token::Question),
    (":", Token::Colon),
    ("=", Token::Assign),
    (",", Token::Comma),
    ("|", Token::Pipe),
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_literal(word: &str) -> bool {
    if matches!(word, "true" | "false" | "null" | "NaN" | "undefined") {
        return true;
    }
    let (int, frac) = match word.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (word, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.map_or(true, all_digits)
}

fn is_path(word: &str) -> bool {
    let mut segments = word.split('.');
    let root = segments.next().unwrap_or("");
    !root.is_empty()
        && root.chars().all(is_word_char)
        && segments.all(|seg| {
            !seg.is_empty()
                && seg
                    .chars()
                    .all(|c| is_word_char(c) || c == '-' || c == '\'' || c == '"')
        })
}

fn classify(word: &str) -> FragmentKind {
    if is_literal(word) {
        FragmentKind::Literal
    } else if is_path(word) {
        FragmentKind::Path
    } else {
        FragmentKind::Opaque
    }
}

struct Tokenizer {
    fragments: Vec<Fragment>,
    word: String,
    last_op: Option<usize>,
    last_word: Option<usize>,
}

impl Tokenizer {
    fn push_fragment(&mut self, fragment: Fragment) {
        self.last_word = Some(self.fragments.len());
        self.fragments.push(fragment);
    }

    /// Flushes the pending word, mapping word operators.
    fn flush_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word);
        match word.as_str() {
            "not" => self.push_operator("!"),
            "or" => self.push_operator("||"),
            "and" => self.push_operator("&&"),
            _ => {
                let kind = classify(&word);
                self.push_fragment(Fragment::new(word, kind));
            }
        }
    }

    fn push_operator(&mut self, op: &str) {
        let op = match op {
            "\r" => return,
            "\n" | "\t" => " ",
            other => other,
        };

        if let Some(last) = self.fragments.last_mut() {
            if last.kind == FragmentKind::Operator
                && op.len() == 1
                && !OPEN_BRACKETS.contains(op)
                && !CLOSE_BRACKETS.contains(op)
                && last.text.chars().all(|c| op.starts_with(c))
            {
                last.text.push_str(op);
                return;
            }
        }

        if op == ":" {
            let after_open = self
                .last_op
                .map_or(false, |idx| matches!(self.fragments[idx].text.as_str(), "{" | ","));
            if after_open {
                if let Some(idx) = self.last_word {
                    if self.fragments[idx].kind == FragmentKind::Path {
                        self.fragments[idx].kind = FragmentKind::ObjectKey;
                    }
                }
            }
        }

        if op != " " {
            self.last_op = Some(self.fragments.len());
        }
        self.fragments.push(Fragment::new(op, FragmentKind::Operator));
    }
}

/// Splits an expression into classified fragments.
///
/// Quoted strings (a doubled quote continues the string), `r/pattern/flags`
/// regex literals, operators and words are recognized.  Words are
/// classified as literals, property paths or left opaque; the word
/// operators `not`, `or` and `and` become `!`, `||` and `&&`.  Runs of the
/// same non-bracket operator merge into one fragment.  A property path
/// followed by `:` right after `{` or `,` becomes an object key.
///
/// ```
/// use mus::compiler::{tokenize, FragmentKind};
/// let fragments = tokenize("a.b.c");
/// assert_eq!(fragments.len(), 1);
/// assert_eq!(fragments[0].kind, FragmentKind::Path);
/// ```
pub fn tokenize(expr: &str) -> Vec<Fragment> {
    let mut t = Tokenizer {
        fragments: Vec::new(),
        word: String::new(),
        last_op: None,
        last_word: None,
    };
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' || c == '"' {
            t.flush_word();
            let mut text = String::from(c);
            let mut escaped = false;
            let mut closed = false;
            while let Some(c2) = chars.next() {
                text.push(c2);
                if escaped {
                    escaped = false;
                } else if c2 == '\\' {
                    escaped = true;
                } else if c2 == c {
                    if chars.peek() == Some(&c) {
                        text.push(c);
                        chars.next();
                    } else {
                        closed = true;
                        break;
                    }
                }
            }
            let kind = if closed {
                FragmentKind::Str
            } else {
                FragmentKind::Opaque
            };
            t.push_fragment(Fragment::new(text, kind));
            continue;
        }

        if !OPERATORS.contains(c) {
            t.word.push(c);
            continue;
        }

        if c == '/' && t.word == "r" {
            t.word.clear();
            let mut text = String::from('/');
            let mut escaped = false;
            while let Some(c2) = chars.next() {
                text.push(c2);
                if c2 == '/' && !escaped {
                    while let Some(&flag) = chars.peek() {
                        if !REGEX_FLAGS.contains(flag) {
                            break;
                        }
                        text.push(flag);
                        chars.next();
                    }
                    break;
                }
                escaped = c2 == '\\' && !escaped;
            }
            t.push_fragment(Fragment::new(text, FragmentKind::Regex));
            continue;
        }

        t.flush_word();
        let mut buf = [0u8; 4];
        t.push_operator(c.encode_utf8(&mut buf));
    }

    t.flush_word();
    trace!(expr, fragments = t.fragments.len(), "tokenized expression");
    t.fragments
}

fn syntax_error(msg: String) -> Error {
    Error::new(ErrorKind::SyntaxError, msg)
}

fn push_operators<'a>(tokens: &mut Vec<Token<'a>>, mut ops: &str) -> Result<(), Error> {
    'outer: while !ops.is_empty() {
        for (text, token) in OPERATOR_TOKENS.iter() {
            if let Some(rest) = ops.strip_prefix(text) {
                tokens.push(token.clone());
                ops = rest;
                continue 'outer;
            }
        }
        return Err(syntax_error(format!("unexpected operator `{}`", ops)));
    }
    Ok(())
}

fn split_regex(text: &str) -> Result<(&str, &str), Error> {
    match text.rfind('/') {
        Some(end) if end > 0 => Ok((&text[1..end], &text[end + 1..])),
        _ => Err(syntax_error(format!("unterminated regex literal `{}`", text))),
    }
}

fn number_token(text: &str) -> Option<Token<'_>> {
    if let Ok(val) = text.parse::<i64>() {
        Some(Token::Int(val))
    } else if text.starts_with(|c: char| c.is_ascii_digit()) {
        text.parse::<f64>().ok().map(Token::Float)
    } else {
        None
    }
}

/// Turns fragments into the parser's token stream.
///
/// Whitespace is dropped.  Operator fragments that touch each other are
/// joined and split greedily, so `<` followed by `=` is `<=`.
pub fn fragments_to_tokens(fragments: &[Fragment]) -> Result<Vec<Token<'_>>, Error> {
    let mut tokens = Vec::with_capacity(fragments.len());
    let mut pending_ops = String::new();

    for fragment in fragments {
        if fragment.kind == FragmentKind::Operator && !fragment.is_space() {
            let text = fragment.text.as_str();
            if text.len() == 1 && (OPEN_BRACKETS.contains(text) || CLOSE_BRACKETS.contains(text)) {
                ok!(push_operators(&mut tokens, &std::mem::take(&mut pending_ops)));
                tokens.push(match text {
                    "(" => Token::ParenOpen,
                    ")" => Token::ParenClose,
                    "[" => Token::BracketOpen,
                    "]" => Token::BracketClose,
                    "{" => Token::BraceOpen,
                    _ => Token::BraceClose,
                });
            } else {
                pending_ops.push_str(text);
            }
            continue;
        }
        ok!(push_operators(&mut tokens, &std::mem::take(&mut pending_ops)));

        let text = fragment.text.as_str();
        match fragment.kind {
            FragmentKind::Operator => {}
            FragmentKind::Str => tokens.push(Token::Str(ok!(parse_string_literal(text)))),
            FragmentKind::Regex => {
                let (source, flags) = ok!(split_regex(text));
                tokens.push(Token::Regex(source, flags));
            }
            FragmentKind::Literal => tokens.push(match text {
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                "null" => Token::Null,
                "undefined" => Token::Undefined,
                "NaN" => Token::Float(f64::NAN),
                _ => ok!(number_token(text)
                    .ok_or_else(|| syntax_error(format!("invalid number `{}`", text)))),
            }),
            FragmentKind::Path => tokens.push(number_token(text).unwrap_or(Token::Path(text))),
            FragmentKind::ObjectKey => tokens.push(Token::ObjectKey(text)),
            FragmentKind::Opaque => {
                // attribute access after a call or subscript: `.name.other`
                match text.strip_prefix('.') {
                    Some(rest) if rest.split('.').all(|seg| !seg.is_empty() && seg.chars().all(is_word_char)) => {
                        for seg in rest.split('.') {
                            tokens.push(Token::Dot);
                            tokens.push(Token::Ident(seg));
                        }
                    }
                    _ => return Err(syntax_error(format!("unexpected `{}`", text))),
                }
            }
        }
    }
    ok!(push_operators(&mut tokens, &pending_ops));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|x| x.text.as_str()).collect()
    }

    #[test]
    fn test_basic_fragments() {
        insta::assert_debug_snapshot!(tokenize("a.b + 'x' * 2"), @r###"
        [
            Path("a.b"),
            Operator(" "),
            Operator("+"),
            Operator(" "),
            Str("'x'"),
            Operator(" "),
            Operator("*"),
            Operator(" "),
            Literal("2"),
        ]
        "###);
    }

    #[test]
    fn test_operator_merging() {
        assert_eq!(texts(&tokenize("a===b")), vec!["a", "===", "b"]);
        assert_eq!(texts(&tokenize("f()")), vec!["f", "(", ")"]);
        assert_eq!(texts(&tokenize("a  \r\n b")), vec!["a", "    ", "b"]);
    }

    #[test]
    fn test_regex_literal() {
        let fragments = tokenize("r/a\\/b/gi.test(x)");
        assert_eq!(fragments[0], Fragment::new("/a\\/b/gi", FragmentKind::Regex));
        assert_eq!(fragments[1], Fragment::new(".test", FragmentKind::Opaque));
    }

    #[test]
    fn test_object_keys() {
        let fragments = tokenize("{a: x, b: y}");
        let kinds: Vec<_> = fragments
            .iter()
            .filter(|x| !x.is_space())
            .map(|x| x.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                FragmentKind::Operator,
                FragmentKind::ObjectKey,
                FragmentKind::Operator,
                FragmentKind::Path,
                FragmentKind::Operator,
                FragmentKind::ObjectKey,
                FragmentKind::Operator,
                FragmentKind::Path,
                FragmentKind::Operator,
            ]
        );
    }

    #[test]
    fn test_token_joining() {
        let fragments = tokenize("a<=-1");
        let tokens = fragments_to_tokens(&fragments).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Path("a"), Token::Lte, Token::Minus, Token::Int(1)]
        );
    }

    #[test]
    fn test_postfix_attribute() {
        let fragments = tokenize("items[0].name");
        let tokens = fragments_to_tokens(&fragments).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Path("items"),
                Token::BracketOpen,
                Token::Int(0),
                Token::BracketClose,
                Token::Dot,
                Token::Ident("name"),
            ]
        );
    }

    #[test]
    fn test_opaque_is_rejected() {
        let fragments = tokenize("a $ b");
        let err = fragments_to_tokens(&fragments).unwrap_err();
        assert_eq!(err.to_string(), "syntax error: unexpected `$`");
    }
}

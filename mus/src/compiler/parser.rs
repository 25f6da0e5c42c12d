use std::borrow::Cow;
use std::fmt;

use crate::compiler::ast::{self, Expr};
use crate::compiler::lexer::fragments_to_tokens;
use crate::compiler::tokens::{Fragment, Token};
use crate::error::{Error, ErrorKind};
use crate::value::Value;

const MAX_RECURSION: usize = 150;

fn unexpected<D: fmt::Display>(unexpected: D, expected: &str) -> Error {
    Error::new(
        ErrorKind::SyntaxError,
        format!("unexpected {}, expected {}", unexpected, expected),
    )
}

fn unexpected_eof(expected: &str) -> Error {
    unexpected("end of expression", expected)
}

fn syntax_error(msg: Cow<'static, str>) -> Error {
    Error::new(ErrorKind::SyntaxError, msg)
}

macro_rules! syntax_error {
    ($msg:expr) => {{
        return Err(syntax_error(Cow::Borrowed($msg)));
    }};
    ($msg:expr, $($tt:tt)*) => {{
        return Err(syntax_error(Cow::Owned(format!($msg, $($tt)*))));
    }};
}

macro_rules! expect_token {
    ($parser:expr, $expectation:expr) => {{
        match $parser.stream.next() {
            Some(rv) => rv,
            None => return Err(unexpected_eof($expectation)),
        }
    }};
    ($parser:expr, $match:pat, $expectation:expr) => {{
        match $parser.stream.next() {
            Some(token @ $match) => token,
            Some(token) => return Err(unexpected(token, $expectation)),
            None => return Err(unexpected_eof($expectation)),
        }
    }};
    ($parser:expr, $match:pat => $target:expr, $expectation:expr) => {{
        match $parser.stream.next() {
            Some($match) => $target,
            Some(token) => return Err(unexpected(token, $expectation)),
            None => return Err(unexpected_eof($expectation)),
        }
    }};
}

macro_rules! matches_token {
    ($p:expr, $match:pat) => {
        matches!($p.stream.current(), Some($match))
    };
}

macro_rules! skip_token {
    ($p:expr, $match:pat) => {
        match $p.stream.current() {
            Some($match) => {
                $p.stream.next();
                true
            }
            _ => false,
        }
    };
}

macro_rules! binop {
    ($func:ident, $next:ident, { $($tok:tt)* }) => {
        fn $func(&mut self) -> Result<Expr, Error> {
            let mut left = ok!(self.$next());
            loop {
                let op = match self.stream.current() {
                    $($tok)*
                    _ => break,
                };
                self.stream.next();
                let right = ok!(self.$next());
                left = Expr::BinOp(Box::new(ast::BinOp { op, left, right }));
            }
            Ok(left)
        }
    };
}

macro_rules! with_recursion_guard {
    ($parser:expr, $expr:expr) => {{
        $parser.depth += 1;
        if $parser.depth > MAX_RECURSION {
            syntax_error!("expression nested too deeply");
        }
        let rv = $expr;
        $parser.depth -= 1;
        rv
    }};
}

struct TokenStream<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
    current: Option<Token<'a>>,
}

impl<'a> TokenStream<'a> {
    fn new(tokens: Vec<Token<'a>>) -> TokenStream<'a> {
        let mut tokens = tokens.into_iter();
        let current = tokens.next();
        TokenStream { tokens, current }
    }

    /// Advance the stream.
    fn next(&mut self) -> Option<Token<'a>> {
        std::mem::replace(&mut self.current, self.tokens.next())
    }

    /// Look at the current token
    fn current(&self) -> Option<&Token<'a>> {
        self.current.as_ref()
    }
}

struct Parser<'a> {
    stream: TokenStream<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(fragments: &'a [Fragment]) -> Result<Parser<'a>, Error> {
        Ok(Parser {
            stream: TokenStream::new(ok!(fragments_to_tokens(fragments))),
            depth: 0,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, Error> {
        with_recursion_guard!(self, self.parse_ifexpr())
    }

    fn parse_ifexpr(&mut self) -> Result<Expr, Error> {
        let test_expr = ok!(self.parse_or());
        if !skip_token!(self, Token::Question) {
            return Ok(test_expr);
        }
        let true_expr = ok!(self.parse_expr());
        expect_token!(self, Token::Colon, "`:`");
        let false_expr = ok!(self.parse_expr());
        Ok(Expr::IfExpr(Box::new(ast::IfExpr {
            test_expr,
            true_expr,
            false_expr,
        })))
    }

    binop!(parse_or, parse_and, {
        Some(Token::Or) => ast::BinOpKind::ScOr,
    });
    binop!(parse_and, parse_equality, {
        Some(Token::And) => ast::BinOpKind::ScAnd,
    });
    binop!(parse_equality, parse_compare, {
        Some(Token::Eq) => ast::BinOpKind::Eq,
        Some(Token::Ne) => ast::BinOpKind::Ne,
        Some(Token::StrictEq) => ast::BinOpKind::StrictEq,
        Some(Token::StrictNe) => ast::BinOpKind::StrictNe,
    });
    binop!(parse_compare, parse_math1, {
        Some(Token::Lt) => ast::BinOpKind::Lt,
        Some(Token::Lte) => ast::BinOpKind::Lte,
        Some(Token::Gt) => ast::BinOpKind::Gt,
        Some(Token::Gte) => ast::BinOpKind::Gte,
    });
    binop!(parse_math1, parse_math2, {
        Some(Token::Plus) => ast::BinOpKind::Add,
        Some(Token::Minus) => ast::BinOpKind::Sub,
    });
    binop!(parse_math2, parse_unary, {
        Some(Token::Mul) => ast::BinOpKind::Mul,
        Some(Token::Div) => ast::BinOpKind::Div,
        Some(Token::Mod) => ast::BinOpKind::Rem,
    });

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let op = match self.stream.current() {
            Some(Token::Bang) => ast::UnaryOpKind::Not,
            Some(Token::Minus) => ast::UnaryOpKind::Neg,
            Some(Token::Plus) => ast::UnaryOpKind::Pos,
            _ => {
                let expr = ok!(self.parse_primary());
                return self.parse_postfix(expr);
            }
        };
        self.stream.next();
        let expr = ok!(with_recursion_guard!(self, self.parse_unary()));
        Ok(Expr::UnaryOp(Box::new(ast::UnaryOp { op, expr })))
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, Error> {
        loop {
            match self.stream.current() {
                Some(Token::Dot) => {
                    self.stream.next();
                    let name = expect_token!(self, Token::Ident(name) => name, "identifier");
                    expr = Expr::GetAttr(Box::new(ast::GetAttr {
                        expr,
                        name: name.to_string(),
                    }));
                }
                Some(Token::BracketOpen) => {
                    self.stream.next();
                    if matches_token!(self, Token::BracketClose) {
                        syntax_error!("empty subscript");
                    }
                    let subscript_expr = ok!(self.parse_expr());
                    expect_token!(self, Token::BracketClose, "`]`");
                    expr = Expr::GetItem(Box::new(ast::GetItem {
                        expr,
                        subscript_expr,
                    }));
                }
                Some(Token::ParenOpen) => {
                    let args = ok!(self.parse_args());
                    expr = Expr::Call(Box::new(ast::Call { expr, args }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, Error> {
        expect_token!(self, Token::ParenOpen, "`(`");
        let mut args = Vec::new();
        loop {
            if skip_token!(self, Token::ParenClose) {
                break;
            }
            if !args.is_empty() {
                expect_token!(self, Token::Comma, "`,`");
                if skip_token!(self, Token::ParenClose) {
                    break;
                }
            }
            args.push(ok!(self.parse_expr()));
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        with_recursion_guard!(self, self.parse_primary_impl())
    }

    fn parse_primary_impl(&mut self) -> Result<Expr, Error> {
        let token = expect_token!(self, "expression");
        Ok(match token {
            Token::Path(path) => {
                let mut segments = path.split('.');
                let root = segments.next().unwrap_or_default().to_string();
                Expr::Path(Box::new(ast::Path {
                    root,
                    segments: segments.map(|x| x.to_string()).collect(),
                }))
            }
            Token::Str(val) => Expr::Const(Value::from(val)),
            Token::Int(val) => Expr::Const(Value::from(val)),
            Token::Float(val) => Expr::Const(Value::from(val)),
            Token::Bool(val) => Expr::Const(Value::from(val)),
            Token::Null => Expr::Const(Value::from(())),
            Token::Undefined => Expr::Const(Value::UNDEFINED),
            Token::Regex(source, flags) => Expr::Const(ok!(Value::from_regex(source, flags))),
            Token::ParenOpen => {
                let expr = ok!(self.parse_expr());
                expect_token!(self, Token::ParenClose, "`)`");
                expr
            }
            Token::BracketOpen => ok!(self.parse_list()),
            Token::BraceOpen => ok!(self.parse_map()),
            token => return Err(unexpected(token, "expression")),
        })
    }

    fn parse_list(&mut self) -> Result<Expr, Error> {
        let mut items = Vec::new();
        loop {
            if skip_token!(self, Token::BracketClose) {
                break;
            }
            if !items.is_empty() {
                expect_token!(self, Token::Comma, "`,`");
                if skip_token!(self, Token::BracketClose) {
                    break;
                }
            }
            items.push(ok!(self.parse_expr()));
        }
        Ok(Expr::List(items))
    }

    fn parse_map(&mut self) -> Result<Expr, Error> {
        let mut items = Vec::new();
        loop {
            if skip_token!(self, Token::BraceClose) {
                break;
            }
            if !items.is_empty() {
                expect_token!(self, Token::Comma, "`,`");
                if skip_token!(self, Token::BraceClose) {
                    break;
                }
            }
            let key = match expect_token!(self, "object key") {
                Token::ObjectKey(key) | Token::Path(key) => key.to_string(),
                Token::Str(key) => key,
                Token::Int(key) => key.to_string(),
                Token::Float(key) => Value::from(key).to_string(),
                token => return Err(unexpected(token, "object key")),
            };
            expect_token!(self, Token::Colon, "`:`");
            items.push((key, ok!(self.parse_expr())));
        }
        Ok(Expr::Map(items))
    }

    fn expect_end(&mut self) -> Result<(), Error> {
        match self.stream.next() {
            None => Ok(()),
            Some(token) => Err(unexpected(token, "end of expression")),
        }
    }
}

/// Parses a complete expression from fragments.
pub fn parse_expr(fragments: &[Fragment]) -> Result<Expr, Error> {
    let mut parser = ok!(Parser::new(fragments));
    if parser.stream.current().is_none() {
        syntax_error!("expression is empty");
    }
    let rv = ok!(parser.parse_expr());
    ok!(parser.expect_end());
    Ok(rv)
}

/// Parses a parenthesized argument list (`(a, b)`) from fragments.
pub fn parse_args(fragments: &[Fragment]) -> Result<Vec<Expr>, Error> {
    let mut parser = ok!(Parser::new(fragments));
    let rv = ok!(parser.parse_args());
    ok!(parser.expect_end());
    Ok(rv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::tokenize;

    fn parse(source: &str) -> Result<Expr, Error> {
        parse_expr(&tokenize(source))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a || b && c == 1 + 2 * 3").unwrap();
        insta::assert_debug_snapshot!(expr, @r###"
        BinOp(
            BinOp {
                op: ScOr,
                left: Path(
                    Path {
                        root: "a",
                        segments: [],
                    },
                ),
                right: BinOp(
                    BinOp {
                        op: ScAnd,
                        left: Path(
                            Path {
                                root: "b",
                                segments: [],
                            },
                        ),
                        right: BinOp(
                            BinOp {
                                op: Eq,
                                left: Path(
                                    Path {
                                        root: "c",
                                        segments: [],
                                    },
                                ),
                                right: BinOp(
                                    BinOp {
                                        op: Add,
                                        left: Const(
                                            1,
                                        ),
                                        right: BinOp(
                                            BinOp {
                                                op: Mul,
                                                left: Const(
                                                    2,
                                                ),
                                                right: Const(
                                                    3,
                                                ),
                                            },
                                        ),
                                    },
                                ),
                            },
                        ),
                    },
                ),
            },
        )
        "###);
    }

    #[test]
    fn test_paths_and_calls() {
        let expr = parse("user.name.toUpperCase()").unwrap();
        match expr {
            Expr::Call(call) => match call.expr {
                Expr::Path(path) => {
                    assert_eq!(path.root, "user");
                    assert_eq!(path.segments, vec!["name", "toUpperCase"]);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            parse("a +").unwrap_err().to_string(),
            "syntax error: unexpected end of expression, expected expression"
        );
        assert_eq!(
            parse("a b").unwrap_err().to_string(),
            "syntax error: unexpected path, expected end of expression"
        );
        assert_eq!(
            parse("[1, 2").unwrap_err().to_string(),
            "syntax error: unexpected end of expression, expected `,`"
        );
        assert_eq!(
            parse("a & b").unwrap_err().to_string(),
            "syntax error: unexpected operator `&`"
        );
    }

    #[test]
    fn test_literals() {
        assert!(parse("{a: 1, 'b': [1, 2,], c: {}}").is_ok());
        assert!(parse("x ? 1 : y ? 2 : 3").is_ok());
        assert!(parse("r/^a+$/i.test(s)").is_ok());
        assert!(parse("-(1.5)").is_ok());
    }

    #[test]
    fn test_recursion_limit() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(
            parse(&source).unwrap_err().to_string(),
            "syntax error: expression nested too deeply"
        );
    }
}

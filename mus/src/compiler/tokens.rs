use std::fmt;

/// The classification of a [`Fragment`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FragmentKind {
    /// A quoted string including its delimiters.
    Str,
    /// A regular expression literal, `/pattern/flags`.
    Regex,
    /// `true`, `false`, `null`, `NaN`, `undefined` or a number.
    Literal,
    /// A dotted property path that resolves against the scope.
    Path,
    /// An operator, a bracket or whitespace.
    Operator,
    /// A property path that turned out to be the key of an object literal.
    ObjectKey,
    /// Anything else.
    Opaque,
}

/// One classified piece of an expression.
#[derive(Clone, PartialEq, Eq)]
pub struct Fragment {
    /// The source text of the fragment.
    pub text: String,
    /// What the fragment is.
    pub kind: FragmentKind,
}

impl Fragment {
    pub(crate) fn new<S: Into<String>>(text: S, kind: FragmentKind) -> Fragment {
        Fragment {
            text: text.into(),
            kind,
        }
    }

    /// Returns `true` if this is a whitespace operator.
    pub fn is_space(&self) -> bool {
        self.kind == FragmentKind::Operator && self.text.chars().all(|c| c == ' ')
    }

    /// Returns `true` if this is the given operator.
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == FragmentKind::Operator && self.text == op
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.text)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Represents a token in the parser's stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// A scope path (`a.b.c`).
    Path(&'a str),
    /// A plain identifier following a dot.
    Ident(&'a str),
    /// The key of an object literal.
    ObjectKey(&'a str),
    /// A string literal, already unescaped.
    Str(String),
    /// An integer (limited to i64)
    Int(i64),
    /// A float
    Float(f64),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// A regular expression literal.
    Regex(&'a str, &'a str),
    /// A plus (`+`) operator.
    Plus,
    /// A minus (`-`) operator.
    Minus,
    /// A mul (`*`) operator.
    Mul,
    /// A div (`/`) operator.
    Div,
    /// A mod (`%`) operator.
    Mod,
    /// The `!` operator.
    Bang,
    /// The `&&` operator.
    And,
    /// The `||` operator.
    Or,
    /// `==` operator
    Eq,
    /// `!=` operator
    Ne,
    /// `===` operator
    StrictEq,
    /// `!==` operator
    StrictNe,
    /// `>` operator
    Gt,
    /// `>=` operator
    Gte,
    /// `<` operator
    Lt,
    /// `<=` operator
    Lte,
    /// The `?` of a conditional expression.
    Question,
    /// The colon operator (`:`)
    Colon,
    /// The comma operator (`,`)
    Comma,
    /// A dot operator (`.`)
    Dot,
    /// The assignment operator (`=`)
    Assign,
    /// The pipe symbol.
    Pipe,
    /// Open Bracket
    BracketOpen,
    /// Close Bracket
    BracketClose,
    /// Open Parenthesis
    ParenOpen,
    /// Close Parenthesis
    ParenClose,
    /// Open Brace
    BraceOpen,
    /// Close Brace
    BraceClose,
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Path(_) => f.write_str("path"),
            Token::Ident(_) => f.write_str("identifier"),
            Token::ObjectKey(_) => f.write_str("object key"),
            Token::Str(_) => f.write_str("string"),
            Token::Int(_) | Token::Float(_) => f.write_str("number"),
            Token::Bool(_) | Token::Null | Token::Undefined => f.write_str("literal"),
            Token::Regex(..) => f.write_str("regex"),
            Token::Plus => f.write_str("`+`"),
            Token::Minus => f.write_str("`-`"),
            Token::Mul => f.write_str("`*`"),
            Token::Div => f.write_str("`/`"),
            Token::Mod => f.write_str("`%`"),
            Token::Bang => f.write_str("`!`"),
            Token::And => f.write_str("`&&`"),
            Token::Or => f.write_str("`||`"),
            Token::Eq => f.write_str("`==`"),
            Token::Ne => f.write_str("`!=`"),
            Token::StrictEq => f.write_str("`===`"),
            Token::StrictNe => f.write_str("`!==`"),
            Token::Gt => f.write_str("`>`"),
            Token::Gte => f.write_str("`>=`"),
            Token::Lt => f.write_str("`<`"),
            Token::Lte => f.write_str("`<=`"),
            Token::Question => f.write_str("`?`"),
            Token::Colon => f.write_str("`:`"),
            Token::Comma => f.write_str("`,`"),
            Token::Dot => f.write_str("`.`"),
            Token::Assign => f.write_str("`=`"),
            Token::Pipe => f.write_str("`|`"),
            Token::BracketOpen => f.write_str("`[`"),
            Token::BracketClose => f.write_str("`]`"),
            Token::ParenOpen => f.write_str("`(`"),
            Token::ParenClose => f.write_str("`)`"),
            Token::BraceOpen => f.write_str("`{`"),
            Token::BraceClose => f.write_str("`}`"),
        }
    }
}

use std::borrow::Cow;
use std::fmt;

/// Represents compile and render errors.
///
/// Errors carry an [`ErrorKind`] and an optional detail message.  Errors
/// raised by user supplied filters can attach their own cause with
/// [`with_source`](Error::with_source).
///
/// ```rust
/// # use mus::{Environment, Template, Node};
/// let env = Environment::new();
/// let tmpl = Template::new(vec![Node::expression("name | missing").unwrap()]);
/// match env.render(&tmpl, ()) {
///     Ok(result) => println!("{}", result),
///     Err(err) => eprintln!("could not render template: {}", err),
/// }
/// ```
pub struct Error {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = f.debug_struct("Error");
        err.field("kind", &self.kind);
        if let Some(ref detail) = self.detail {
            err.field("detail", detail);
        }
        if let Some(ref source) = self.source {
            err.field("source", source);
        }
        err.finish()
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An expression, attribute list or macro signature could not be parsed.
    SyntaxError,
    /// A filter was referenced that is neither registered nor built in.
    UnknownFilter,
    /// An operation failed while evaluating an expression.
    InvalidOperation,
    /// A filter or method was called with arguments it cannot take.
    InvalidArguments,
    /// A called name is neither a variable nor a declared macro.
    ///
    /// Compiled expressions swallow this error and produce an empty
    /// string instead, so it normally never reaches a render caller.
    UndefinedVariable,
    /// A string literal contained an invalid escape sequence.
    BadEscape,
    /// A value could not be serialized into the internal format.
    BadSerialization,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::UnknownFilter => "unknown filter",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::InvalidArguments => "invalid arguments",
            ErrorKind::UndefinedVariable => "undefined variable",
            ErrorKind::BadEscape => "bad string escape",
            ErrorKind::BadSerialization => "could not serialize to internal format",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            write!(f, "{}: {}", self.kind, detail)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            kind,
            detail: Some(detail.into()),
            source: None,
        }
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error detail
    ///
    /// The detail is an error message that provides further details about
    /// the error kind.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns `true` if this error only signals an unresolved identifier.
    pub(crate) fn is_undefined_variable(&self) -> bool {
        self.kind == ErrorKind::UndefinedVariable
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            detail: None,
            source: None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::InvalidOperation, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}

#[test]
fn test_error_display() {
    let err = Error::new(ErrorKind::UnknownFilter, "upcase");
    assert_eq!(err.to_string(), "unknown filter: upcase");
    assert_eq!(
        Error::from(ErrorKind::SyntaxError).to_string(),
        "syntax error"
    );
}

use crate::value::Value;

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(Value),
    Path(Box<Path>),
    GetAttr(Box<GetAttr>),
    GetItem(Box<GetItem>),
    Call(Box<Call>),
    UnaryOp(Box<UnaryOp>),
    BinOp(Box<BinOp>),
    IfExpr(Box<IfExpr>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
}

impl Expr {
    /// Returns the name if this is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Path(path) if path.segments.is_empty() => Some(&path.root),
            _ => None,
        }
    }
}

/// A scope lookup: `root.segment.segment`.
///
/// A root missing from the scope and missing segments are undefined.
#[derive(Debug, Clone)]
pub struct Path {
    pub root: String,
    pub segments: Vec<String>,
}

/// Strict attribute access (`expr.name`).
#[derive(Debug, Clone)]
pub struct GetAttr {
    pub expr: Expr,
    pub name: String,
}

/// Subscript access (`expr[subscript]`).
#[derive(Debug, Clone)]
pub struct GetItem {
    pub expr: Expr,
    pub subscript_expr: Expr,
}

/// A call: a macro call for bare identifiers, otherwise a method call.
#[derive(Debug, Clone)]
pub struct Call {
    pub expr: Expr,
    pub args: Vec<Expr>,
}

/// The kind of unary operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    Neg,
    Pos,
}

/// A unary operator expression.
#[derive(Debug, Clone)]
pub struct UnaryOp {
    pub op: UnaryOpKind,
    pub expr: Expr,
}

/// The kind of binary operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOpKind {
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Lte,
    Gt,
    Gte,
    ScAnd,
    ScOr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A binary operator expression.
#[derive(Debug, Clone)]
pub struct BinOp {
    pub op: BinOpKind,
    pub left: Expr,
    pub right: Expr,
}

/// A conditional expression (`test ? a : b`).
#[derive(Debug, Clone)]
pub struct IfExpr {
    pub test_expr: Expr,
    pub true_expr: Expr,
    pub false_expr: Expr,
}

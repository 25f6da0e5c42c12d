//! The template tree rendered by [`Environment::render`](crate::Environment::render).
//!
//! Templates are not parsed from text by this crate.  A front end builds the
//! tree out of [`Node`]s and the constructors here compile the embedded
//! source strings (interpolations, loop iterables, conditions, macro
//! signatures) right away, so a [`Template`] holds nothing but compiled,
//! immutable evaluators and can be rendered any number of times from any
//! number of threads.
//!
//! ```
//! use mus::{Environment, Template};
//! use mus::ast::{ForBlock, IfBlock, Node};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), mus::Error> {
//! let tmpl = Template::new(vec![
//!     Node::text("<ul>"),
//!     ForBlock::new("item", "items", vec![
//!         Node::text("<li>"),
//!         Node::expression("item | upper")?,
//!         Node::text("</li>"),
//!     ])?
//!     .into(),
//!     Node::text("</ul>"),
//!     IfBlock::new("items.length == 0", vec![Node::text("empty")])?.into(),
//! ]);
//! let rv = Environment::new().render(&tmpl, json!({"items": ["a", "b"]}))?;
//! assert_eq!(rv, "<ul><li>A</li><li>B</li></ul>");
//! # Ok(()) }
//! ```
use crate::compiler::{
    compile_expression, compile_macro_signature, CompiledExpression, MacroSignature,
};
use crate::error::Error;

/// A node in the template tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// Raw template text, emitted verbatim.
    Text(String),
    /// An interpolation.
    Expr(ExprNode),
    /// A control block.
    Block(Block),
}

impl Node {
    /// Creates a text node.
    pub fn text<S: Into<String>>(text: S) -> Node {
        Node::Text(text.into())
    }

    /// Compiles an interpolation into an expression node.
    pub fn expression(source: &str) -> Result<Node, Error> {
        ExprNode::new(source).map(Node::Expr)
    }
}

/// The control blocks.
#[derive(Debug, Clone)]
pub enum Block {
    For(ForBlock),
    If(IfBlock),
    Set(SetBlock),
    Raw(RawBlock),
}

macro_rules! impl_into_node {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for Node {
            fn from(block: $ty) -> Node {
                Node::Block(Block::$variant(block))
            }
        }
    };
}

impl_into_node!(ForBlock, For);
impl_into_node!(IfBlock, If);
impl_into_node!(SetBlock, Set);
impl_into_node!(RawBlock, Raw);

impl From<ExprNode> for Node {
    fn from(node: ExprNode) -> Node {
        Node::Expr(node)
    }
}

/// An interpolation: a compiled expression plus node level filters.
///
/// Node filters take no arguments and run after the expression's own
/// filter pipeline, right before escaping.
#[derive(Debug, Clone)]
pub struct ExprNode {
    pub(crate) expr: CompiledExpression,
    pub(crate) filters: Vec<String>,
}

impl ExprNode {
    pub fn new(source: &str) -> Result<ExprNode, Error> {
        Ok(ExprNode {
            expr: ok!(compile_expression(source)),
            filters: Vec::new(),
        })
    }

    /// Appends a node level filter.
    pub fn with_filter<S: Into<String>>(mut self, name: S) -> Self {
        self.filters.push(name.into());
        self
    }

    pub fn expr(&self) -> &CompiledExpression {
        &self.expr
    }

    /// The macro this node calls, if its expression calls a bare identifier.
    pub fn macro_name(&self) -> Option<&str> {
        self.expr.macro_name()
    }
}

/// `for value_name[, index_name] in iterable`.
#[derive(Debug, Clone)]
pub struct ForBlock {
    pub(crate) value_name: String,
    pub(crate) index_name: Option<String>,
    pub(crate) iterable: CompiledExpression,
    pub(crate) body: Vec<Node>,
}

impl ForBlock {
    pub fn new<S: Into<String>>(
        value_name: S,
        iterable: &str,
        body: Vec<Node>,
    ) -> Result<ForBlock, Error> {
        Ok(ForBlock {
            value_name: value_name.into(),
            index_name: None,
            iterable: ok!(compile_expression(iterable)),
            body,
        })
    }

    /// Binds the position (sequences) or key (maps) to `name`.
    pub fn with_index<S: Into<String>>(mut self, name: S) -> Self {
        self.index_name = Some(name.into());
        self
    }
}

/// `if` with any number of `elseif` branches and an optional `else`.
#[derive(Debug, Clone)]
pub struct IfBlock {
    pub(crate) cond: CompiledExpression,
    pub(crate) body: Vec<Node>,
    pub(crate) elseifs: Vec<ElseIf>,
    pub(crate) else_body: Option<Vec<Node>>,
}

/// One `elseif` branch of an [`IfBlock`].
#[derive(Debug, Clone)]
pub struct ElseIf {
    pub(crate) cond: CompiledExpression,
    pub(crate) body: Vec<Node>,
}

impl IfBlock {
    pub fn new(cond: &str, body: Vec<Node>) -> Result<IfBlock, Error> {
        Ok(IfBlock {
            cond: ok!(compile_expression(cond)),
            body,
            elseifs: Vec::new(),
            else_body: None,
        })
    }

    /// Adds an `elseif` branch.  Branches are tested in the order added.
    pub fn elseif(mut self, cond: &str, body: Vec<Node>) -> Result<IfBlock, Error> {
        self.elseifs.push(ElseIf {
            cond: ok!(compile_expression(cond)),
            body,
        });
        Ok(self)
    }

    /// Sets the `else` branch.
    pub fn otherwise(mut self, body: Vec<Node>) -> IfBlock {
        self.else_body = Some(body);
        self
    }
}

/// `set key = expr`, writing into the current frame.
#[derive(Debug, Clone)]
pub struct SetBlock {
    pub(crate) key: String,
    pub(crate) expr: CompiledExpression,
}

impl SetBlock {
    pub fn new<S: Into<String>>(key: S, expr: &str) -> Result<SetBlock, Error> {
        Ok(SetBlock {
            key: key.into(),
            expr: ok!(compile_expression(expr)),
        })
    }
}

/// Renders its children against the root frame of the render.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub(crate) body: Vec<Node>,
}

impl RawBlock {
    pub fn new(body: Vec<Node>) -> RawBlock {
        RawBlock { body }
    }
}

/// A macro declaration: a compiled signature and the body it renders.
#[derive(Debug, Clone)]
pub struct MacroDecl {
    signature: MacroSignature,
    body: Vec<Node>,
}

impl MacroDecl {
    /// Compiles `signature` (for instance `greet(name, greeting="hi")`).
    pub fn new(signature: &str, body: Vec<Node>) -> Result<MacroDecl, Error> {
        Ok(MacroDecl {
            signature: ok!(compile_macro_signature(signature)),
            body,
        })
    }

    pub fn signature(&self) -> &MacroSignature {
        &self.signature
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }
}

/// A renderable template: the root nodes and the macro declarations.
///
/// Macros are not scoped to where they are declared.  Every declared macro
/// can be called from anywhere in the template and from other macros.
#[derive(Debug, Clone, Default)]
pub struct Template {
    nodes: Vec<Node>,
    macros: Vec<MacroDecl>,
}

impl Template {
    /// Creates a template from its root nodes.
    pub fn new(nodes: Vec<Node>) -> Template {
        Template {
            nodes,
            macros: Vec::new(),
        }
    }

    /// Declares a macro.
    pub fn with_macro(mut self, decl: MacroDecl) -> Template {
        self.add_macro(decl);
        self
    }

    /// Declares a macro.  A later declaration replaces an earlier one of
    /// the same name.
    pub fn add_macro(&mut self, decl: MacroDecl) {
        self.macros.push(decl);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn macros(&self) -> &[MacroDecl] {
        &self.macros
    }
}

//! Mus is the expression compiler and tree renderer at the core of a small
//! HTML template engine.
//!
//! It does not parse template files.  A front end hands it a pre-built tree
//! of [`Node`]s whose interpolations, loop iterables, conditions, attribute
//! lists and macro signatures are small source strings.  Mus compiles those
//! strings once and then renders the tree against any `serde` serializable
//! context, as often as needed and from as many threads as needed.
//!
//! ```
//! use mus::{Environment, Template};
//! use mus::ast::{IfBlock, MacroDecl, Node};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), mus::Error> {
//! let tmpl = Template::new(vec![
//!     Node::expression("greet(user.name)")?,
//!     IfBlock::new("user.admin", vec![Node::text(" (admin)")])?.into(),
//! ])
//! .with_macro(MacroDecl::new(
//!     "greet(name, greeting='Hello')",
//!     vec![
//!         Node::expression("greeting")?,
//!         Node::text(", "),
//!         Node::expression("name | capitalize")?,
//!     ],
//! )?);
//!
//! let env = Environment::new();
//! let rv = env.render(&tmpl, json!({"user": {"name": "jane", "admin": true}}))?;
//! assert_eq!(rv, "Hello, Jane (admin)");
//! # Ok(()) }
//! ```
//!
//! # Expressions
//!
//! Interpolations use a small JavaScript flavored expression language:
//! property paths (`user.name`), literals (`'str'`, `42`, `1.5`, `true`,
//! `null`, `[1, 2]`, `{a: 1}`, `r/pattern/flags`), the usual arithmetic,
//! comparison and logical operators (`not`, `and` and `or` are spelled out
//! alternatives for `!`, `&&` and `||`), the ternary operator and method
//! calls such as `name.trim()`.  A trailing filter pipeline transforms the
//! result: `user.name | upper | default('anon')`.  The pseudo filter `safe`
//! disables escaping for the expression.
//!
//! Referencing an identifier that is not in scope is not an error: it is
//! undefined, which renders as the empty string and reaches filters as the
//! empty string.  Calling an undeclared macro renders the whole
//! interpolation as the empty string.  Every other failure, such as calling
//! a method on `null` or `undefined` or using an unknown filter, fails the
//! render with an [`Error`].
//!
//! # Optional Features
//!
//! There are some additional features that can be enabled:
//!
//! - `builtins`: enables the built-in [`filters`]. (default)
//! - `preserve_order`: keeps maps in insertion order. (default)
//! - `json`: adds the `tojson` filter.
//! - `urlencode`: adds the `urlencode` filter.
//! - `speedups`: uses `v_htmlescape` for faster HTML escaping.
//! - `tracing`: emits `tracing` events from the compilers and the renderer.
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_borrowed_reference)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod macros;

mod environment;
mod error;
mod utils;
mod vm;

pub mod ast;
pub mod compiler;
pub mod filters;
pub mod value;

pub use self::ast::{Node, Template};
pub use self::environment::Environment;
pub use self::error::{Error, ErrorKind};
pub use self::utils::{AutoEscape, HtmlEscape};
pub use self::value::Value;
pub use self::vm::State;

//! Compilers for the three string forms found in templates.
//!
//! All three share a [`tokenize`] step that splits a source string into
//! [`Fragment`]s:
//!
//! * [`compile_attribute`] turns `class="x" id=y` into named expressions.
//! * [`compile_macro_signature`] turns `greet(name, greeting="hi")` into a
//!   macro name plus parameters with optional defaults.
//! * [`compile_expression`] turns `user.name | upper | default('anon')`
//!   into a base expression and a filter pipeline.
//!
//! Compiled forms are immutable and can be shared between threads and
//! evaluated any number of times.
pub mod ast;
mod attr;
mod expr;
mod lexer;
mod macro_sig;
mod parser;
pub mod tokens;

pub use self::attr::{compile_attribute, CompiledAttribute};
pub use self::expr::{compile_expression, CompiledExpression, FilterCall};
pub use self::lexer::tokenize;
pub use self::macro_sig::{compile_macro_signature, MacroParam, MacroSignature};
pub use self::tokens::{Fragment, FragmentKind};

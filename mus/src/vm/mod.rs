use std::fmt::Write;

use serde::Serialize;

use crate::ast::{Block, ForBlock, IfBlock, Node, Template};
use crate::environment::Environment;
use crate::error::{Error, ErrorKind};
use crate::utils::write_escaped;
use crate::value::{Value, ValueMap, ValueRepr};

pub use crate::vm::state::State;

use crate::vm::scope::Scope;
use crate::vm::state::Context;

mod eval;
mod scope;
mod state;

/// Builds the root frame from the render context.
///
/// The context must serialize to a map.  Unit and none render against an
/// empty scope.
fn root_scope<S: Serialize>(ctx: S) -> Result<Scope<'static>, Error> {
    let ctx = ok!(Value::try_from_serializable(&ctx));
    match ctx.0 {
        ValueRepr::Map(ref vars) => Ok(Scope::new(ValueMap::clone(vars))),
        ValueRepr::None | ValueRepr::Undefined => Ok(Scope::new(ValueMap::new())),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("render context must be a map, got {}", ctx.kind()),
        )),
    }
}

/// Runs `f` with a state over a fresh root frame and no macros.
pub(crate) fn with_root_state<S, R, F>(env: &Environment, ctx: S, f: F) -> Result<R, Error>
where
    S: Serialize,
    F: FnOnce(&State) -> Result<R, Error>,
{
    let root = ok!(root_scope(ctx));
    let context = Context::new(env);
    f(&State::new(&context, &root))
}

fn loop_value(idx: usize, length: usize) -> Value {
    let mut rv = ValueMap::new();
    rv.insert("index".into(), Value::from(idx + 1));
    rv.insert("index0".into(), Value::from(idx));
    rv.insert("length".into(), Value::from(length));
    rv.insert("first".into(), Value::from(idx == 0));
    rv.insert("last".into(), Value::from(idx + 1 == length));
    Value::from(rv)
}

/// Walks a template tree and writes the output.
pub(crate) struct Vm<'env> {
    env: &'env Environment,
}

impl<'env> Vm<'env> {
    /// Creates a new VM.
    pub fn new(env: &'env Environment) -> Vm<'env> {
        Vm { env }
    }

    /// Renders a template.
    ///
    /// The macro table and the root frame live exactly as long as this
    /// call.
    pub fn render<S: Serialize>(&self, template: &Template, ctx: S) -> Result<String, Error> {
        let root = ok!(root_scope(ctx));
        let context = Context::new(self.env).with_macros(template.macros());
        let state = State::new(&context, &root);
        debug!(
            nodes = template.nodes().len(),
            macros = template.macros().len(),
            "render start"
        );
        let mut out = String::new();
        ok!(self.render_nodes(&state, template.nodes(), &mut out));
        debug!(bytes = out.len(), "render finished");
        Ok(out)
    }

    pub fn render_nodes(
        &self,
        state: &State,
        nodes: &[Node],
        out: &mut String,
    ) -> Result<(), Error> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Expr(node) => {
                    if let Some(name) = node.macro_name() {
                        state.bind_macro(name);
                    }
                    let mut value = ok!(node.expr.evaluate(state));
                    for name in &node.filters {
                        let filter = ok!(state.get_filter(name));
                        value = ok!(filter.apply_to(state, &[value]));
                    }
                    if node.expr.is_safe() {
                        ok!(write!(out, "{}", value).map_err(Error::from));
                    } else {
                        ok!(write_escaped(out, state.auto_escape(), &value));
                    }
                }
                Node::Block(Block::For(block)) => ok!(self.render_for(state, block, out)),
                Node::Block(Block::If(block)) => ok!(self.render_if(state, block, out)),
                Node::Block(Block::Set(block)) => {
                    let value = ok!(block.expr.evaluate(state));
                    state.scope().set(&block.key, value);
                }
                Node::Block(Block::Raw(block)) => {
                    ok!(self.render_nodes(&state.with_scope(state.root), &block.body, out));
                }
            }
        }
        Ok(())
    }

    /// Every iteration renders in its own child frame so assignments do not
    /// leak into sibling iterations or the enclosing frame.
    fn render_for(&self, state: &State, block: &ForBlock, out: &mut String) -> Result<(), Error> {
        let iterable = ok!(block.iterable.evaluate(state));
        let pairs = iterable.iteration_pairs();
        let length = pairs.len();
        for (idx, (key, value)) in pairs.into_iter().enumerate() {
            let frame = state.scope().child();
            frame.set(&block.value_name, value);
            if let Some(ref index_name) = block.index_name {
                frame.set(index_name, key);
            }
            frame.set("loop", loop_value(idx, length));
            ok!(self.render_nodes(&state.with_scope(&frame), &block.body, out));
        }
        Ok(())
    }

    fn render_if(&self, state: &State, block: &IfBlock, out: &mut String) -> Result<(), Error> {
        if ok!(block.cond.evaluate(state)).is_true() {
            return self.render_nodes(state, &block.body, out);
        }
        for branch in &block.elseifs {
            if ok!(branch.cond.evaluate(state)).is_true() {
                return self.render_nodes(state, &branch.body, out);
            }
        }
        match block.else_body {
            Some(ref body) => self.render_nodes(state, body, out),
            None => Ok(()),
        }
    }
}

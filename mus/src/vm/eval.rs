use std::cmp::Ordering;

use crate::compiler::ast::{self, BinOpKind, Expr, UnaryOpKind};
use crate::error::{Error, ErrorKind};
use crate::value::{ops, Value, ValueMap};
use crate::vm::scope::{Resolved, Scope};
use crate::vm::state::State;
use crate::vm::Vm;

fn undefined_variable(name: &str) -> Error {
    Error::new(
        ErrorKind::UndefinedVariable,
        format!("`{}` is not defined", name),
    )
}

impl<'scope, 'env> State<'scope, 'env> {
    /// Evaluates an expression tree against the current scope.
    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, Error> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Path(path) => self.eval_path(&path.root, &path.segments),
            Expr::GetAttr(attr) => ok!(self.eval(&attr.expr)).get_attr(&attr.name),
            Expr::GetItem(item) => {
                let value = ok!(self.eval(&item.expr));
                let subscript = ok!(self.eval(&item.subscript_expr));
                value.get_item(&subscript)
            }
            Expr::Call(call) => self.eval_call(call),
            Expr::UnaryOp(unary) => {
                let value = ok!(self.eval(&unary.expr));
                match unary.op {
                    UnaryOpKind::Not => Ok(Value::from(!value.is_true())),
                    UnaryOpKind::Neg => ops::neg(&value),
                    UnaryOpKind::Pos => ops::pos(&value),
                }
            }
            Expr::BinOp(binop) => self.eval_binop(binop),
            Expr::IfExpr(if_expr) => {
                if ok!(self.eval(&if_expr.test_expr)).is_true() {
                    self.eval(&if_expr.true_expr)
                } else {
                    self.eval(&if_expr.false_expr)
                }
            }
            Expr::List(items) => {
                let mut rv = Vec::with_capacity(items.len());
                for item in items {
                    rv.push(ok!(self.eval(item)));
                }
                Ok(Value::from(rv))
            }
            Expr::Map(items) => {
                let mut rv = ValueMap::new();
                for (key, value) in items {
                    rv.insert(key.clone(), ok!(self.eval(value)));
                }
                Ok(Value::from(rv))
            }
        }
    }

    /// Resolves the root against the scope and walks the remaining
    /// segments leniently.  A root naming a macro calls it without
    /// arguments, a root that is not in scope is undefined.
    fn eval_path(&self, root: &str, segments: &[String]) -> Result<Value, Error> {
        let value = match self.scope.resolve(root) {
            Some(Resolved::Value(value)) => value,
            Some(Resolved::Macro(frame)) => ok!(self.call_macro(frame, root, &[])),
            None if self.bind_macro(root) => ok!(self.call_named(root, &[])),
            None => Value::UNDEFINED,
        };
        Ok(value.get_path(segments.iter().map(|x| x.as_str())))
    }

    fn eval_call(&self, call: &ast::Call) -> Result<Value, Error> {
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(ok!(self.eval(arg)));
        }
        match call.expr {
            Expr::Path(ref path) => match path.segments.split_last() {
                None => self.call_named(&path.root, &args),
                Some((method, receiver)) => {
                    ok!(self.eval_path(&path.root, receiver)).call_method(method, &args)
                }
            },
            Expr::GetAttr(ref attr) => ok!(self.eval(&attr.expr)).call_method(&attr.name, &args),
            _ => Err(Error::new(
                ErrorKind::InvalidOperation,
                "expression is not callable",
            )),
        }
    }

    /// Calls the macro bound to `name`, binding a declared macro into the
    /// current frame on first use.
    fn call_named(&self, name: &str, args: &[Value]) -> Result<Value, Error> {
        match self.scope.resolve(name) {
            Some(Resolved::Macro(frame)) => self.call_macro(frame, name, args),
            Some(Resolved::Value(value)) => Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("`{}` is not callable (got {})", name, value.kind()),
            )),
            None if self.bind_macro(name) => self.call_named(name, args),
            None => Err(undefined_variable(name)),
        }
    }

    /// Invokes a macro.  The body renders in a fresh child of the frame the
    /// macro is bound to and the output is returned as a safe string.
    pub(crate) fn call_macro(
        &self,
        frame: &Scope<'_>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        let decl = match self.get_macro(name) {
            Some(decl) => decl,
            None => return Err(undefined_variable(name)),
        };
        if self.depth >= self.env().recursion_limit() {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!(
                    "recursion limit exceeded while calling macro `{}`",
                    name
                ),
            ));
        }

        debug!(name, args = args.len(), depth = self.depth, "invoking macro");
        let macro_frame = frame.child();
        let state = State {
            ctx: self.ctx,
            root: self.root,
            scope: &macro_frame,
            depth: self.depth + 1,
        };
        ok!(decl.signature().bind_arguments(&state, args));
        let mut out = String::new();
        ok!(Vm::new(self.env()).render_nodes(&state, decl.body(), &mut out));
        Ok(Value::from_safe_string(out))
    }

    fn eval_binop(&self, binop: &ast::BinOp) -> Result<Value, Error> {
        let left = ok!(self.eval(&binop.left));
        match binop.op {
            BinOpKind::ScAnd => {
                return if left.is_true() {
                    self.eval(&binop.right)
                } else {
                    Ok(left)
                };
            }
            BinOpKind::ScOr => {
                return if left.is_true() {
                    Ok(left)
                } else {
                    self.eval(&binop.right)
                };
            }
            _ => {}
        }
        let right = ok!(self.eval(&binop.right));
        let ordering = || ops::compare(&left, &right);
        Ok(match binop.op {
            BinOpKind::Eq => Value::from(ops::loose_eq(&left, &right)),
            BinOpKind::Ne => Value::from(!ops::loose_eq(&left, &right)),
            BinOpKind::StrictEq => Value::from(ops::strict_eq(&left, &right)),
            BinOpKind::StrictNe => Value::from(!ops::strict_eq(&left, &right)),
            BinOpKind::Lt => Value::from(matches!(ordering(), Some(Ordering::Less))),
            BinOpKind::Lte => Value::from(matches!(
                ordering(),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinOpKind::Gt => Value::from(matches!(ordering(), Some(Ordering::Greater))),
            BinOpKind::Gte => Value::from(matches!(
                ordering(),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinOpKind::Add => ok!(ops::add(&left, &right)),
            BinOpKind::Sub => ok!(ops::sub(&left, &right)),
            BinOpKind::Mul => ok!(ops::mul(&left, &right)),
            BinOpKind::Div => ok!(ops::div(&left, &right)),
            BinOpKind::Rem => ok!(ops::rem(&left, &right)),
            BinOpKind::ScAnd | BinOpKind::ScOr => unreachable!(),
        })
    }
}

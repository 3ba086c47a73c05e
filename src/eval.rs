use std::borrow::Cow;

use tracing::trace;

use crate::ast::*;
use crate::error::RenderError;
use crate::value::{Context, Value};

/// Whether the first/last literal of a node run sits next to a trimming tag
/// of the enclosing `IF`/`END` pair.
#[derive(Debug, Clone, Copy, Default)]
struct Edges {
    start: bool,
    end: bool,
}

pub struct Evaluator<'a> {
    context: &'a Context,
}

impl<'a> Evaluator<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    pub fn render(&self, template: &Template) -> Result<String, RenderError> {
        let mut output = String::new();
        self.render_nodes(template.nodes(), Edges::default(), &mut output)?;
        Ok(output)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        edges: Edges,
        output: &mut String,
    ) -> Result<(), RenderError> {
        for (i, node) in nodes.iter().enumerate() {
            match node {
                Node::Literal(text) => {
                    let after_tag = match i.checked_sub(1) {
                        Some(prev) => nodes[prev].trims_after(),
                        None => edges.start,
                    };
                    let before_tag = match nodes.get(i + 1) {
                        Some(next) => next.trims_before(),
                        None => edges.end,
                    };
                    output.push_str(trim_literal(text, after_tag, before_tag));
                }
                Node::Output { expr, position, .. } => {
                    let value = self.eval_expr(expr)?;
                    match &*value {
                        Value::Array(_) => {
                            return Err(RenderError::UnrenderableSequence {
                                expr: expr.to_string(),
                                position: *position,
                            })
                        }
                        Value::Map(_) => {
                            return Err(RenderError::UnrenderableMapping {
                                expr: expr.to_string(),
                                position: *position,
                            })
                        }
                        scalar => {
                            if let Some(text) = scalar.to_text() {
                                output.push_str(&text);
                            }
                        }
                    }
                }
                Node::If {
                    cond,
                    body,
                    open,
                    close,
                    position,
                } => {
                    let taken = self.eval_expr(cond)?.is_truthy();
                    trace!(line = position.line, column = position.column, taken, "IF {}", cond);
                    if taken {
                        let edges = Edges {
                            start: open.trailing,
                            end: close.leading,
                        };
                        self.render_nodes(body.nodes(), edges, output)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Evaluate an expression. Only the selected branch of `?:`, `||` and
    /// `&&` is evaluated.
    pub fn eval_expr(&self, expr: &Expr) -> Result<Cow<'a, Value>, RenderError> {
        match expr {
            Expr::Path(segments) => Ok(Cow::Borrowed(self.context.lookup(segments.as_slice()))),
            Expr::Literal(lit) => Ok(Cow::Owned(match lit {
                Literal::String(s) => Value::String(s.clone()),
                Literal::Integer(n) => Value::Integer(*n),
                Literal::Float(n) => Value::Float(*n),
                Literal::Bool(b) => Value::Bool(*b),
            })),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.eval_expr(then)
                } else {
                    self.eval_expr(otherwise)
                }
            }
            Expr::DefaultOr { primary, fallback } => {
                let value = self.eval_expr(primary)?;
                if value.is_truthy() {
                    Ok(value)
                } else {
                    self.eval_expr(fallback)
                }
            }
            Expr::And(lhs, rhs) => {
                let value = self.eval_expr(lhs)?;
                if value.is_truthy() {
                    self.eval_expr(rhs)
                } else {
                    Ok(value)
                }
            }
            Expr::Not(inner) => Ok(Cow::Owned(Value::Bool(!self.eval_expr(inner)?.is_truthy()))),
            Expr::Compare(lhs, op, rhs) => {
                let l = self.eval_expr(lhs)?;
                let r = self.eval_expr(rhs)?;
                let equal = l.loosely_equals(&r);
                Ok(Cow::Owned(Value::Bool(match op {
                    BinOp::Eq => equal,
                    BinOp::Ne => !equal,
                })))
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                position,
            } => {
                let mismatch = |kind: &'static str| RenderError::TypeMismatch {
                    method: method.name().to_string(),
                    kind,
                    position: *position,
                };
                match method {
                    Method::Join => {
                        let receiver = self.eval_expr(receiver)?;
                        let Value::Array(items) = &*receiver else {
                            return Err(mismatch(receiver.kind()));
                        };
                        let separator = match args.first() {
                            Some(arg) => {
                                let value = self.eval_expr(arg)?;
                                value.to_text().ok_or_else(|| mismatch(value.kind()))?
                            }
                            None => " ".to_string(),
                        };
                        let parts = items
                            .iter()
                            .map(|item| item.to_text().ok_or_else(|| mismatch(item.kind())))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Cow::Owned(Value::String(parts.join(&separator))))
                    }
                }
            }
        }
    }
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Apply `-%]` (after a tag) and `[%-` (before a tag) trimming to a literal.
/// Only whitespace is ever removed.
fn trim_literal(text: &str, after_tag: bool, before_tag: bool) -> &str {
    let mut text = text;
    if after_tag {
        text = chomp_front(text);
    }
    if before_tag {
        text = chomp_back(text);
    }
    text
}

/// Drop leading blanks plus one newline. A literal that is blank to its end
/// is dropped entirely; otherwise nothing is removed.
fn chomp_front(text: &str) -> &str {
    let rest = text.trim_start_matches(is_blank);
    if let Some(after) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
        after
    } else if rest.is_empty() {
        rest
    } else {
        text
    }
}

/// Drop trailing blanks plus the newline before them. A literal that is
/// blank from its start is dropped entirely; otherwise nothing is removed.
fn chomp_back(text: &str) -> &str {
    let rest = text.trim_end_matches(is_blank);
    if let Some(before) = rest.strip_suffix('\n') {
        before.strip_suffix('\r').unwrap_or(before)
    } else if rest.is_empty() {
        rest
    } else {
        text
    }
}

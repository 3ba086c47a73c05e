use std::fmt;

use crate::error::Position;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
}

/// Methods callable with `receiver.name(args)`. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Join,
}

impl Method {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "join" => Some(Method::Join),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Join => "join",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(Vec<String>), // a.b.c
    Literal(Literal),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    DefaultOr {
        primary: Box<Expr>,
        fallback: Box<Expr>,
    }, // a || b, a ? a : b
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, BinOp, Box<Expr>),
    MethodCall {
        receiver: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
        position: Position,
    },
}

impl Expr {
    fn is_atomic(&self) -> bool {
        matches!(
            self,
            Expr::Path(_) | Expr::Literal(_) | Expr::MethodCall { .. }
        )
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{}", self)
        } else {
            write!(f, "({})", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Path(segments) => write!(f, "{}", segments.join(".")),
            Expr::Literal(Literal::String(s)) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            Expr::Literal(Literal::Integer(n)) => write!(f, "{}", n),
            Expr::Literal(Literal::Float(n)) => write!(f, "{}", n),
            Expr::Literal(Literal::Bool(b)) => write!(f, "{}", b),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                cond.fmt_operand(f)?;
                f.write_str(" ? ")?;
                then.fmt_operand(f)?;
                f.write_str(" : ")?;
                otherwise.fmt_operand(f)
            }
            Expr::DefaultOr { primary, fallback } => {
                primary.fmt_operand(f)?;
                f.write_str(" || ")?;
                fallback.fmt_operand(f)
            }
            Expr::And(lhs, rhs) => {
                lhs.fmt_operand(f)?;
                f.write_str(" && ")?;
                rhs.fmt_operand(f)
            }
            Expr::Not(inner) => {
                f.write_str("!")?;
                inner.fmt_operand(f)
            }
            Expr::Compare(lhs, op, rhs) => {
                lhs.fmt_operand(f)?;
                f.write_str(match op {
                    BinOp::Eq => " == ",
                    BinOp::Ne => " != ",
                })?;
                rhs.fmt_operand(f)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                receiver.fmt_operand(f)?;
                write!(f, ".{}(", method.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Whitespace-trim markers on one directive: `[%-` is leading, `-%]` trailing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trim {
    pub leading: bool,
    pub trailing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(String),
    Output {
        expr: Expr,
        trim: Trim,
        position: Position,
    },
    If {
        cond: Expr,
        body: Template,
        open: Trim,  // the `[% IF ... %]` tag
        close: Trim, // the matching `[% END %]` tag
        position: Position,
    },
}

impl Node {
    /// Whether the literal right after this node should lose its leading whitespace.
    pub(crate) fn trims_after(&self) -> bool {
        match self {
            Node::Literal(_) => false,
            Node::Output { trim, .. } => trim.trailing,
            Node::If { close, .. } => close.trailing,
        }
    }

    /// Whether the literal right before this node should lose its trailing whitespace.
    pub(crate) fn trims_before(&self) -> bool {
        match self {
            Node::Literal(_) => false,
            Node::Output { trim, .. } => trim.leading,
            Node::If { open, .. } => open.leading,
        }
    }
}

/// A parsed template: an immutable, ordered sequence of nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

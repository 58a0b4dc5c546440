//! Typed formula tree.
//!
//! A formula is parsed once into an [`Expr`] with unresolved [`Expr::Name`]
//! leaves, then [`Expr::resolve`] swaps every name for an [`Expr::Column`]
//! position. The resolved tree is interpreted once per group.

use std::collections::BTreeSet;
use std::fmt;

use crate::builtins::Function;

/// Position of the block-index pseudo-column.
pub const BLOCK_POSITION: usize = 0;

/// Name reserved for the block-index pseudo-column.
pub const BLOCK_NAME: &str = "hline";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
            BinaryOp::Pow => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Column reference as written: bare name, `$N`, or quoted name.
    Name { name: String, quoted: bool },
    /// Resolved column position (`0` is the block index).
    Column(usize),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call { function: Function, args: Vec<Expr> },
}

const UNARY_PRECEDENCE: u8 = 3;
const ATOM_PRECEDENCE: u8 = 5;

impl Expr {
    /// Replace every [`Expr::Name`] with the position returned by `lookup`.
    pub fn resolve<E>(
        self,
        lookup: &mut impl FnMut(&str, bool) -> Result<usize, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Name { name, quoted } => Expr::Column(lookup(&name, quoted)?),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.resolve(lookup)?)),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op,
                lhs: Box::new(lhs.resolve(lookup)?),
                rhs: Box::new(rhs.resolve(lookup)?),
            },
            Expr::Call { function, args } => Expr::Call {
                function,
                args: args
                    .into_iter()
                    .map(|arg| arg.resolve(lookup))
                    .collect::<Result<_, _>>()?,
            },
            leaf => leaf,
        })
    }

    /// Collect every resolved column position referenced by the tree.
    pub fn columns(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<usize>) {
        match self {
            Expr::Column(position) => {
                out.insert(*position);
            }
            Expr::Neg(inner) => inner.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_columns(out)),
            Expr::Number(_) | Expr::Name { .. } => {}
        }
    }

    /// The position when the whole formula is a single column reference.
    pub fn as_column(&self) -> Option<usize> {
        match self {
            Expr::Column(position) => Some(*position),
            _ => None,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Neg(_) => UNARY_PRECEDENCE,
            _ => ATOM_PRECEDENCE,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Name { name, quoted: true } => write!(f, "'{}'", name),
            Expr::Name { name, .. } => f.write_str(name),
            Expr::Column(BLOCK_POSITION) => f.write_str(BLOCK_NAME),
            Expr::Column(position) => write!(f, "${}", position),
            Expr::Neg(inner) => {
                f.write_str("-")?;
                inner.fmt_child(f, UNARY_PRECEDENCE)
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                // `^` is right-associative, the others left-associative.
                let (left_min, right_min) = if *op == BinaryOp::Pow {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                lhs.fmt_child(f, left_min)?;
                write!(f, "{}", op.symbol())?;
                rhs.fmt_child(f, right_min)
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

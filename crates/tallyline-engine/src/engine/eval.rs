//! Formula interpretation over one group of rows.

use super::ast::{BinaryOp, Expr};
use super::format::AngleMode;
use super::value::{Value, symbolic_operand};
use crate::builtins;

/// Per-group column data seen by the evaluator.
pub trait SequenceSource {
    /// Parsed values of the column at `position`, one per member row, in source order.
    fn sequence(&self, position: usize) -> &[Value];

    /// Number of rows in the group.
    fn row_count(&self) -> usize;
}

/// Result of evaluating a (sub)formula.
#[derive(Clone, Debug, PartialEq)]
pub enum Evaluated {
    Scalar(Value),
    Sequence(Vec<Value>),
}

impl Evaluated {
    /// Apply `f` to the scalar or to every element of the sequence.
    pub fn map(&self, f: impl Fn(&Value) -> Value) -> Evaluated {
        match self {
            Evaluated::Scalar(value) => Evaluated::Scalar(f(value)),
            Evaluated::Sequence(values) => Evaluated::Sequence(values.iter().map(f).collect()),
        }
    }

    /// Flatten into a sequence; a scalar becomes a one-element sequence.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Evaluated::Scalar(Value::Empty) => Vec::new(),
            Evaluated::Scalar(value) => vec![value],
            Evaluated::Sequence(values) => values,
        }
    }
}

pub fn evaluate(expr: &Expr, source: &dyn SequenceSource, angle: AngleMode) -> Evaluated {
    match expr {
        Expr::Number(n) => Evaluated::Scalar(Value::Number(*n)),
        // Unresolved names only reach here when a tree is evaluated without
        // resolution; they pass through as text.
        Expr::Name { name, .. } => Evaluated::Scalar(Value::Text(name.clone())),
        Expr::Column(position) => Evaluated::Sequence(source.sequence(*position).to_vec()),
        Expr::Neg(inner) => evaluate(inner, source, angle).map(Value::negate),
        Expr::Binary { op, lhs, rhs } => combine(
            *op,
            evaluate(lhs, source, angle),
            evaluate(rhs, source, angle),
        ),
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, source, angle))
                .collect();
            builtins::apply(*function, args, source.row_count(), angle)
        }
    }
}

fn combine(op: BinaryOp, lhs: Evaluated, rhs: Evaluated) -> Evaluated {
    use Evaluated::{Scalar, Sequence};

    match (lhs, rhs) {
        (Scalar(a), Scalar(b)) => Scalar(Value::binary(op, &a, &b)),
        (Sequence(xs), Scalar(b)) => Sequence(xs.iter().map(|x| Value::binary(op, x, &b)).collect()),
        (Scalar(a), Sequence(ys)) => Sequence(ys.iter().map(|y| Value::binary(op, &a, y)).collect()),
        (Sequence(xs), Sequence(ys)) if xs.len() == ys.len() => Sequence(
            xs.iter()
                .zip(&ys)
                .map(|(x, y)| Value::binary(op, x, y))
                .collect(),
        ),
        (Sequence(xs), Sequence(ys)) => Scalar(Value::Text(format!(
            "{} {} {}",
            bracketed(&xs),
            op.symbol(),
            bracketed(&ys)
        ))),
    }
}

fn bracketed(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(symbolic_operand).collect();
    format!("[{}]", items.join(", "))
}

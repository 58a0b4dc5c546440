//! Built-in formula functions and their metadata.
//!
//! Conventions:
//! - Formula-facing names are lowercase (e.g. `sum`, `mean`); lookup ignores case.
//! - Every aggregate also answers to a `v`-prefixed alias (`vsum`, `vmean`), which
//!   collapses to the canonical spelling when a formula is parsed.
//! - If you add a new function, add it to `BUILTINS` and handle it in `apply`.

use std::cmp::Ordering;

use crate::engine::{AngleMode, BinaryOp, Evaluated, Value, symbolic_operand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    List,
    Sum,
    Prod,
    Mean,
    MeanErr,
    HarmonicMean,
    GeometricMean,
    Median,
    Min,
    Max,
    Var,
    PopVar,
    Sdev,
    PopSdev,
    Cov,
    PopCov,
    Corr,
    Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathFn {
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Floor,
    Ceil,
    Round,
    Sin,
    Cos,
    Tan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Aggregate(Aggregate),
    Math(MathFn),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    /// `count()` counts rows, `count(X)` counts values.
    ZeroOrOne,
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::ZeroOrOne => n <= 1,
        }
    }
}

pub struct Builtin {
    pub name: &'static str,
    pub function: Function,
    pub arity: Arity,
    pub description: &'static str,
}

macro_rules! aggregate {
    ($name:literal, $agg:ident, $arity:expr, $desc:literal) => {
        Builtin {
            name: $name,
            function: Function::Aggregate(Aggregate::$agg),
            arity: $arity,
            description: $desc,
        }
    };
}

macro_rules! math {
    ($name:literal, $f:ident, $desc:literal) => {
        Builtin {
            name: $name,
            function: Function::Math(MathFn::$f),
            arity: Arity::Exactly(1),
            description: $desc,
        }
    };
}

pub const BUILTINS: &[Builtin] = &[
    aggregate!("count", Count, Arity::ZeroOrOne, "Number of rows, or of non-empty values"),
    aggregate!("list", List, Arity::Exactly(1), "Comma-separated values in source order"),
    aggregate!("sum", Sum, Arity::Exactly(1), "Sum of values"),
    aggregate!("prod", Prod, Arity::Exactly(1), "Product of values"),
    aggregate!("mean", Mean, Arity::Exactly(1), "Arithmetic mean"),
    aggregate!("meane", MeanErr, Arity::Exactly(1), "Mean with standard error"),
    aggregate!("hmean", HarmonicMean, Arity::Exactly(1), "Harmonic mean"),
    aggregate!("gmean", GeometricMean, Arity::Exactly(1), "Geometric mean"),
    aggregate!("median", Median, Arity::Exactly(1), "Median value"),
    aggregate!("min", Min, Arity::Exactly(1), "Smallest value"),
    aggregate!("max", Max, Arity::Exactly(1), "Largest value"),
    aggregate!("var", Var, Arity::Exactly(1), "Sample variance"),
    aggregate!("pvar", PopVar, Arity::Exactly(1), "Population variance"),
    aggregate!("sdev", Sdev, Arity::Exactly(1), "Sample standard deviation"),
    aggregate!("psdev", PopSdev, Arity::Exactly(1), "Population standard deviation"),
    aggregate!("cov", Cov, Arity::Exactly(2), "Sample covariance of two columns"),
    aggregate!("pcov", PopCov, Arity::Exactly(2), "Population covariance of two columns"),
    aggregate!("corr", Corr, Arity::Exactly(2), "Correlation coefficient of two columns"),
    aggregate!("span", Span, Arity::Exactly(1), "Largest minus smallest value"),
    math!("abs", Abs, "Absolute value"),
    math!("sqrt", Sqrt, "Square root"),
    math!("exp", Exp, "Exponential"),
    math!("ln", Ln, "Natural logarithm"),
    math!("log10", Log10, "Base-10 logarithm"),
    math!("floor", Floor, "Round down"),
    math!("ceil", Ceil, "Round up"),
    math!("round", Round, "Round to nearest integer"),
    math!("sin", Sin, "Sine (angle mode applies)"),
    math!("cos", Cos, "Cosine (angle mode applies)"),
    math!("tan", Tan, "Tangent (angle mode applies)"),
];

/// Look up a function by name, accepting the `v` alias prefix on aggregates.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    let lower = name.to_ascii_lowercase();
    if let Some(b) = BUILTINS.iter().find(|b| b.name == lower) {
        return Some(b);
    }
    let alias = lower.strip_prefix('v')?;
    BUILTINS
        .iter()
        .find(|b| b.name == alias && matches!(b.function, Function::Aggregate(_)))
}

impl Function {
    /// Canonical spelling.
    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|b| b.function == self)
            .map(|b| b.name)
            .unwrap_or("?")
    }
}

/// Apply a function to already-evaluated arguments.
pub fn apply(function: Function, args: Vec<Evaluated>, row_count: usize, angle: AngleMode) -> Evaluated {
    match function {
        Function::Math(f) => {
            let Some(arg) = args.into_iter().next() else {
                return Evaluated::Scalar(Value::Empty);
            };
            arg.map(|v| apply_math(f, v, angle))
        }
        Function::Aggregate(Aggregate::Count) if args.is_empty() => {
            Evaluated::Scalar(Value::Number(row_count as f64))
        }
        Function::Aggregate(agg @ (Aggregate::Cov | Aggregate::PopCov | Aggregate::Corr)) => {
            let mut it = args.into_iter().map(Evaluated::into_values);
            let (xs, ys) = match (it.next(), it.next()) {
                (Some(xs), Some(ys)) => (xs, ys),
                _ => return Evaluated::Scalar(Value::Empty),
            };
            Evaluated::Scalar(reduce_pair(agg, &xs, &ys))
        }
        Function::Aggregate(agg) => {
            let values = args
                .into_iter()
                .next()
                .map(Evaluated::into_values)
                .unwrap_or_default();
            Evaluated::Scalar(reduce(agg, &values))
        }
    }
}

fn apply_math(f: MathFn, value: &Value, angle: AngleMode) -> Value {
    let n = match value {
        Value::Number(n) => *n,
        Value::Empty => return Value::Empty,
        Value::Duration(s) if matches!(f, MathFn::Abs | MathFn::Round | MathFn::Floor | MathFn::Ceil) => {
            return Value::Duration(apply_math_f64(f, *s, angle));
        }
        other => return Value::Text(format!("{}({})", Function::Math(f).name(), other)),
    };
    Value::Number(apply_math_f64(f, n, angle))
}

fn apply_math_f64(f: MathFn, n: f64, angle: AngleMode) -> f64 {
    let radians = |x: f64| match angle {
        AngleMode::Degrees => x.to_radians(),
        AngleMode::Radians => x,
    };
    match f {
        MathFn::Abs => n.abs(),
        MathFn::Sqrt => n.sqrt(),
        MathFn::Exp => n.exp(),
        MathFn::Ln => n.ln(),
        MathFn::Log10 => n.log10(),
        MathFn::Floor => n.floor(),
        MathFn::Ceil => n.ceil(),
        MathFn::Round => n.round(),
        MathFn::Sin => radians(n).sin(),
        MathFn::Cos => radians(n).cos(),
        MathFn::Tan => radians(n).tan(),
    }
}

/// Unit a numeric projection is converted back into after a reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Number,
    Date,
    Duration,
}

impl Kind {
    fn of(value: &Value) -> Kind {
        match value {
            Value::Date { .. } => Kind::Date,
            Value::Duration(_) => Kind::Duration,
            _ => Kind::Number,
        }
    }

    fn wrap(self, n: f64) -> Value {
        match self {
            Kind::Number => Value::Number(n),
            Kind::Date => Value::date_from_days(n),
            Kind::Duration => Value::Duration(n),
        }
    }
}

/// Project a sequence to floats, with the kind shared by every element
/// (mixed kinds fall back to plain numbers). `None` when any element is text.
fn numeric(values: &[Value]) -> Option<(Vec<f64>, Kind)> {
    let mut kind = values.first().map(Kind::of).unwrap_or(Kind::Number);
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        out.push(value.as_f64()?);
        if Kind::of(value) != kind {
            kind = Kind::Number;
        }
    }
    Some((out, kind))
}

fn symbolic_call(agg: Aggregate, values: &[Value]) -> Value {
    let args = values
        .iter()
        .map(symbolic_operand)
        .collect::<Vec<_>>()
        .join(", ");
    Value::Text(format!("{}({})", Function::Aggregate(agg).name(), args))
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sum_sq_dev(xs: &[f64]) -> f64 {
    let m = mean(xs);
    xs.iter().map(|x| (x - m) * (x - m)).sum()
}

fn sample_var(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        0.0
    } else {
        sum_sq_dev(xs) / (xs.len() - 1) as f64
    }
}

fn pop_var(xs: &[f64]) -> f64 {
    sum_sq_dev(xs) / xs.len() as f64
}

fn total_cmp(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Reduce one sequence. Empty values never reach here except as scalars.
pub fn reduce(agg: Aggregate, values: &[Value]) -> Value {
    let values: Vec<Value> = values.iter().filter(|v| !v.is_empty()).cloned().collect();

    match agg {
        Aggregate::Count => return Value::Number(values.len() as f64),
        Aggregate::List => {
            return Value::Text(
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        Aggregate::Sum => {
            return fold(&values, BinaryOp::Add).unwrap_or(Value::Number(0.0));
        }
        Aggregate::Prod => {
            return fold(&values, BinaryOp::Mul).unwrap_or(Value::Number(1.0));
        }
        _ => {}
    }

    if values.is_empty() {
        return Value::Empty;
    }
    let Some((xs, kind)) = numeric(&values) else {
        return symbolic_call(agg, &values);
    };

    match agg {
        Aggregate::Mean => kind.wrap(mean(&xs)),
        Aggregate::MeanErr => Value::Uncertain {
            mean: mean(&xs),
            err: (sample_var(&xs) / xs.len() as f64).sqrt(),
        },
        Aggregate::HarmonicMean => {
            Value::Number(xs.len() as f64 / xs.iter().map(|x| 1.0 / x).sum::<f64>())
        }
        Aggregate::GeometricMean => {
            if xs.iter().any(|x| *x < 0.0) {
                Value::Number(f64::NAN)
            } else {
                Value::Number((xs.iter().map(|x| x.ln()).sum::<f64>() / xs.len() as f64).exp())
            }
        }
        Aggregate::Median => {
            let mut sorted = xs.clone();
            sorted.sort_by(total_cmp);
            let mid = sorted.len() / 2;
            let median = if sorted.len() % 2 == 1 {
                sorted[mid]
            } else {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            };
            kind.wrap(median)
        }
        Aggregate::Min => kind.wrap(xs.iter().copied().fold(f64::INFINITY, f64::min)),
        Aggregate::Max => kind.wrap(xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        Aggregate::Span => {
            let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            match kind {
                Kind::Duration => Value::Duration(hi - lo),
                _ => Value::Number(hi - lo),
            }
        }
        Aggregate::Var => Value::Number(sample_var(&xs)),
        Aggregate::PopVar => Value::Number(pop_var(&xs)),
        Aggregate::Sdev => spread(kind, sample_var(&xs).sqrt()),
        Aggregate::PopSdev => spread(kind, pop_var(&xs).sqrt()),
        Aggregate::Count
        | Aggregate::List
        | Aggregate::Sum
        | Aggregate::Prod
        | Aggregate::Cov
        | Aggregate::PopCov
        | Aggregate::Corr => symbolic_call(agg, &values),
    }
}

fn spread(kind: Kind, n: f64) -> Value {
    match kind {
        Kind::Duration => Value::Duration(n),
        _ => Value::Number(n),
    }
}

fn fold(values: &[Value], op: BinaryOp) -> Option<Value> {
    let (first, rest) = values.split_first()?;
    Some(
        rest.iter()
            .fold(first.clone(), |acc, v| Value::binary(op, &acc, v)),
    )
}

/// Two-sequence statistics. Sequences must have the same, non-zero length.
pub fn reduce_pair(agg: Aggregate, xs: &[Value], ys: &[Value]) -> Value {
    let pair = || {
        Value::Text(format!(
            "{}([{}], [{}])",
            Function::Aggregate(agg).name(),
            xs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
            ys.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "),
        ))
    };
    if xs.len() != ys.len() || xs.is_empty() {
        return pair();
    }
    let (Some((xs_f, _)), Some((ys_f, _))) = (numeric(xs), numeric(ys)) else {
        return pair();
    };

    let n = xs_f.len() as f64;
    let (mx, my) = (mean(&xs_f), mean(&ys_f));
    let cross: f64 = xs_f
        .iter()
        .zip(&ys_f)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum();

    match agg {
        Aggregate::Cov if xs_f.len() < 2 => Value::Number(0.0),
        Aggregate::Cov => Value::Number(cross / (n - 1.0)),
        Aggregate::PopCov => Value::Number(cross / n),
        Aggregate::Corr => {
            let sx = pop_var(&xs_f).sqrt();
            let sy = pop_var(&ys_f).sqrt();
            Value::Number(cross / n / (sx * sy))
        }
        _ => pair(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(xs: &[f64]) -> Vec<Value> {
        xs.iter().map(|x| Value::Number(*x)).collect()
    }

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("sum").unwrap().name, "sum");
        assert_eq!(lookup("vsum").unwrap().name, "sum");
        assert_eq!(lookup("VMEAN").unwrap().name, "mean");
        assert_eq!(lookup("var").unwrap().name, "var");
        assert_eq!(lookup("vvar").unwrap().name, "var");
        assert!(lookup("vabs").is_none());
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_function_names_roundtrip() {
        for b in BUILTINS {
            assert_eq!(b.function.name(), b.name);
        }
    }

    #[test]
    fn test_basic_reductions() {
        let xs = nums(&[30.0, 25.0]);
        assert_eq!(reduce(Aggregate::Mean, &xs), Value::Number(27.5));
        assert_eq!(reduce(Aggregate::Sum, &xs), Value::Number(55.0));
        assert_eq!(reduce(Aggregate::Prod, &xs), Value::Number(750.0));
        assert_eq!(reduce(Aggregate::Count, &xs), Value::Number(2.0));
        assert_eq!(reduce(Aggregate::Min, &xs), Value::Number(25.0));
        assert_eq!(reduce(Aggregate::Max, &xs), Value::Number(30.0));
        assert_eq!(reduce(Aggregate::Span, &xs), Value::Number(5.0));
        assert_eq!(reduce(Aggregate::Median, &nums(&[3.0, 1.0, 2.0])), Value::Number(2.0));
        assert_eq!(reduce(Aggregate::Median, &nums(&[4.0, 1.0, 2.0, 3.0])), Value::Number(2.5));
    }

    #[test]
    fn test_spread_statistics() {
        let xs = nums(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(reduce(Aggregate::PopVar, &xs), Value::Number(4.0));
        assert_eq!(reduce(Aggregate::PopSdev, &xs), Value::Number(2.0));
        assert_eq!(reduce(Aggregate::Var, &xs), Value::Number(32.0 / 7.0));
        assert_eq!(reduce(Aggregate::Var, &nums(&[5.0])), Value::Number(0.0));
        assert_eq!(reduce(Aggregate::HarmonicMean, &nums(&[1.0, 4.0, 4.0])), Value::Number(2.0));
        let Value::Number(g) = reduce(Aggregate::GeometricMean, &nums(&[2.0, 8.0])) else {
            panic!("expected a number");
        };
        assert!((g - 4.0).abs() < 1e-12);
        let Value::Uncertain { mean, err } = reduce(Aggregate::MeanErr, &nums(&[1.0, 3.0])) else {
            panic!("expected mean with error");
        };
        assert_eq!(mean, 2.0);
        assert!((err - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_sequences() {
        assert_eq!(reduce(Aggregate::Sum, &[]), Value::Number(0.0));
        assert_eq!(reduce(Aggregate::Prod, &[]), Value::Number(1.0));
        assert_eq!(reduce(Aggregate::Count, &[]), Value::Number(0.0));
        assert_eq!(reduce(Aggregate::Mean, &[]), Value::Empty);
    }

    #[test]
    fn test_pair_statistics() {
        let xs = nums(&[1.0, 2.0, 3.0]);
        let ys = nums(&[2.0, 4.0, 6.0]);
        assert_eq!(reduce_pair(Aggregate::Cov, &xs, &ys), Value::Number(2.0));
        let Value::Number(pcov) = reduce_pair(Aggregate::PopCov, &xs, &ys) else {
            panic!("expected a number");
        };
        assert!((pcov - 4.0 / 3.0).abs() < 1e-12);
        let Value::Number(r) = reduce_pair(Aggregate::Corr, &xs, &ys) else {
            panic!("expected a number");
        };
        assert!((r - 1.0).abs() < 1e-12);
        assert!(matches!(reduce_pair(Aggregate::Corr, &xs, &nums(&[1.0])), Value::Text(_)));
    }

    #[test]
    fn test_symbolic_passthrough() {
        let values = vec![Value::Text("a".into()), Value::Number(2.0)];
        assert_eq!(reduce(Aggregate::Sum, &values), Value::Text("a + 2".into()));
        assert_eq!(reduce(Aggregate::Mean, &values), Value::Text("mean(a, 2)".into()));
    }

    #[test]
    fn test_duration_kinds_preserved() {
        let values = vec![Value::Duration(3600.0), Value::Duration(1800.0)];
        assert_eq!(reduce(Aggregate::Sum, &values), Value::Duration(5400.0));
        assert_eq!(reduce(Aggregate::Mean, &values), Value::Duration(2700.0));
        assert_eq!(reduce(Aggregate::Span, &values), Value::Duration(1800.0));
    }

    #[test]
    fn test_math_respects_angle_mode() {
        let v = apply_math(MathFn::Sin, &Value::Number(90.0), AngleMode::Degrees);
        assert_eq!(v, Value::Number(1.0));
        let v = apply_math(MathFn::Cos, &Value::Number(0.0), AngleMode::Radians);
        assert_eq!(v, Value::Number(1.0));
    }
}

//! Typed values and cell-text parsing.
//!
//! Every source cell is read into one [`Value`] kind before a formula sees it:
//!
//! - empty text -> [`Value::Empty`] (dropped from sequences), or NaN in keep-empty mode
//! - numeric literals, including scientific notation -> [`Value::Number`]
//! - ISO dates and org timestamps (`<2024-01-31 Wed 10:00>`) -> [`Value::Date`]
//! - `h:mm[:ss]` -> [`Value::Duration`] in seconds
//! - anything else -> [`Value::Text`], kept verbatim and carried symbolically

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use super::ast::BinaryOp;
use super::format::{NumericFormatContext, OutputFormat, format_value};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// A single typed value flowing through the evaluator.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Date { at: NaiveDateTime, with_time: bool },
    /// Elapsed time in seconds.
    Duration(f64),
    /// A mean together with its standard error (`meane`).
    Uncertain { mean: f64, err: f64 },
    Text(String),
}

/// How cell text is turned into values for one output column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ParseMode {
    /// Coerce every non-numeric value to zero.
    pub numbers_only: bool,
    /// Keep empty cells as NaN instead of dropping them.
    pub keep_empty: bool,
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$")
            .expect("number regex must compile")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?<y>[0-9]{4})-(?<m>[0-9]{1,2})-(?<d>[0-9]{1,2})(?:[ T]+(?:(?<weekday>\p{L}+\.?)\s*)?(?:(?<hh>[0-9]{1,2}):(?<mm>[0-9]{2})(?::(?<ss>[0-9]{2}))?)?)?$",
        )
        .expect("date regex must compile")
    })
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<sign>[+-]?)(?<h>[0-9]+):(?<m>[0-9]{2})(?::(?<s>[0-9]{2}(?:\.[0-9]+)?))?$")
            .expect("duration regex must compile")
    })
}

/// Parse one cell of source text into a typed value.
pub fn parse_cell(text: &str, mode: ParseMode) -> Value {
    let trimmed = text.trim();
    let value = if trimmed.is_empty() {
        if mode.keep_empty {
            Value::Number(f64::NAN)
        } else {
            Value::Empty
        }
    } else if let Some(n) = parse_number(trimmed) {
        Value::Number(n)
    } else if let Some(date) = parse_date(trimmed) {
        date
    } else if let Some(seconds) = parse_duration(trimmed) {
        Value::Duration(seconds)
    } else {
        Value::Text(trimmed.to_string())
    };

    if mode.numbers_only {
        value.coerce_numeric()
    } else {
        value
    }
}

/// Parse a plain numeric literal. Rejects `inf`/`nan` spellings that `f64::from_str` accepts.
pub fn parse_number(text: &str) -> Option<f64> {
    if !number_re().is_match(text) {
        return None;
    }
    text.parse::<f64>().ok()
}

/// Parse an ISO date or an org timestamp (`<...>` active, `[...]` inactive).
pub fn parse_date(text: &str) -> Option<Value> {
    let (inner, bracketed) = match strip_timestamp_brackets(text) {
        Some(inner) => (inner.trim(), true),
        None => (text.trim(), false),
    };
    let caps = date_re().captures(inner)?;
    // A day name belongs to org timestamps only; `2024-01-31 Meeting` is text.
    if caps.name("weekday").is_some() && !bracketed {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(
        caps["y"].parse().ok()?,
        caps["m"].parse().ok()?,
        caps["d"].parse().ok()?,
    )?;

    let (time, with_time) = match caps.name("hh") {
        Some(hh) => {
            let ss = caps.name("ss").map_or(Some(0), |m| m.as_str().parse().ok())?;
            let time = NaiveTime::from_hms_opt(hh.as_str().parse().ok()?, caps["mm"].parse().ok()?, ss)?;
            (time, true)
        }
        None => (NaiveTime::MIN, false),
    };

    Some(Value::Date {
        at: date.and_time(time),
        with_time,
    })
}

fn strip_timestamp_brackets(text: &str) -> Option<&str> {
    [('<', '>'), ('[', ']')]
        .into_iter()
        .find_map(|(open, close)| text.strip_prefix(open)?.strip_suffix(close))
}

/// Parse `h:mm` or `h:mm:ss` into seconds.
pub fn parse_duration(text: &str) -> Option<f64> {
    let caps = duration_re().captures(text)?;
    let hours: f64 = caps["h"].parse().ok()?;
    let minutes: f64 = caps["m"].parse().ok()?;
    let seconds: f64 = caps.name("s").map_or(Some(0.0), |m| m.as_str().parse().ok())?;
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    Some(if &caps["sign"] == "-" { -total } else { total })
}

fn days_since_epoch(at: &NaiveDateTime) -> f64 {
    let delta = *at - NaiveDateTime::default();
    delta.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

fn shift_seconds(at: &NaiveDateTime, seconds: f64) -> Option<NaiveDateTime> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return None;
    }
    at.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
}

impl Value {
    /// Build a date value from fractional days since 1970-01-01.
    pub fn date_from_days(days: f64) -> Value {
        match shift_seconds(&NaiveDateTime::default(), days * SECONDS_PER_DAY) {
            Some(at) => Value::Date {
                with_time: at.time() != NaiveTime::MIN,
                at,
            },
            None => Value::Number(days),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Numeric projection used by statistics: dates as days, durations as seconds.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Duration(s) => Some(*s),
            Value::Date { at, .. } => Some(days_since_epoch(at)),
            Value::Uncertain { mean, .. } => Some(*mean),
            Value::Empty | Value::Text(_) => None,
        }
    }

    /// Numbers-only coercion: anything that is not a number becomes zero.
    pub fn coerce_numeric(self) -> Value {
        match self {
            Value::Number(_) | Value::Empty => self,
            _ => Value::Number(0.0),
        }
    }

    pub fn negate(&self) -> Value {
        match self {
            Value::Empty => Value::Empty,
            Value::Number(n) => Value::Number(-n),
            Value::Duration(s) => Value::Duration(-s),
            Value::Uncertain { mean, err } => Value::Uncertain {
                mean: -mean,
                err: *err,
            },
            other => Value::Text(format!("-{}", symbolic_operand(other))),
        }
    }

    /// Combine two scalar values. Kind mismatches never fail: they fall back to a
    /// symbolic rendering of the operation.
    pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
        use BinaryOp::*;
        use Value::*;

        match (op, lhs, rhs) {
            (_, Empty, _) | (_, _, Empty) => Empty,
            (_, Text(_), _) | (_, _, Text(_)) => symbolic(op, lhs, rhs),
            (_, Number(a), Number(b)) => Number(op.apply(*a, *b)),

            (Sub, Date { at: a, .. }, Date { at: b, .. }) => {
                Number(days_since_epoch(a) - days_since_epoch(b))
            }
            (Add, Date { at, with_time }, Number(days))
            | (Add, Number(days), Date { at, with_time }) => {
                shifted(lhs, rhs, op, at, days * SECONDS_PER_DAY, *with_time)
            }
            (Sub, Date { at, with_time }, Number(days)) => {
                shifted(lhs, rhs, op, at, -days * SECONDS_PER_DAY, *with_time)
            }
            (Add, Date { at, .. }, Duration(s)) | (Add, Duration(s), Date { at, .. }) => {
                shifted(lhs, rhs, op, at, *s, true)
            }
            (Sub, Date { at, .. }, Duration(s)) => shifted(lhs, rhs, op, at, -s, true),

            (Add | Sub, Duration(a), Duration(b)) => Duration(op.apply(*a, *b)),
            (Mul, Duration(a), Number(b)) | (Mul, Number(b), Duration(a)) => Duration(a * b),
            (Div, Duration(a), Number(b)) => Duration(a / b),
            (Div, Duration(a), Duration(b)) => Number(a / b),

            (Add | Sub, Uncertain { mean, err }, Number(b)) => Uncertain {
                mean: op.apply(*mean, *b),
                err: *err,
            },
            (Add, Number(b), Uncertain { mean, err }) => Uncertain {
                mean: b + mean,
                err: *err,
            },
            (Sub, Number(b), Uncertain { mean, err }) => Uncertain {
                mean: b - mean,
                err: *err,
            },
            (Mul, Uncertain { mean, err }, Number(b)) | (Mul, Number(b), Uncertain { mean, err }) => {
                Uncertain {
                    mean: mean * b,
                    err: err * b.abs(),
                }
            }
            (Div, Uncertain { mean, err }, Number(b)) => Uncertain {
                mean: mean / b,
                err: err / b.abs(),
            },

            _ => symbolic(op, lhs, rhs),
        }
    }
}

fn shifted(
    lhs: &Value,
    rhs: &Value,
    op: BinaryOp,
    at: &NaiveDateTime,
    seconds: f64,
    with_time: bool,
) -> Value {
    match shift_seconds(at, seconds) {
        Some(at) => Value::Date {
            with_time: with_time || at.time() != NaiveTime::MIN,
            at,
        },
        None => symbolic(op, lhs, rhs),
    }
}

fn symbolic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    Value::Text(format!(
        "{} {} {}",
        symbolic_operand(lhs),
        op.symbol(),
        symbolic_operand(rhs)
    ))
}

/// Render a value as an operand of a symbolic expression, parenthesized when compound.
pub(crate) fn symbolic_operand(value: &Value) -> String {
    let text = value.to_string();
    if text.contains(' ') {
        format!("({})", text)
    } else {
        text
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format_value(
            self,
            &OutputFormat::default(),
            &NumericFormatContext::default(),
        );
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_cell_kinds() {
        let mode = ParseMode::default();
        assert_eq!(parse_cell("", mode), Value::Empty);
        assert_eq!(parse_cell("  42 ", mode), Value::Number(42.0));
        assert_eq!(parse_cell("-1.5e3", mode), Value::Number(-1500.0));
        assert_eq!(parse_cell(".5", mode), Value::Number(0.5));
        assert_eq!(parse_cell("1:30", mode), Value::Duration(5400.0));
        assert_eq!(parse_cell("0:00:45", mode), Value::Duration(45.0));
        assert_eq!(parse_cell("Monday", mode), Value::Text("Monday".into()));
        assert_eq!(parse_cell("inf", mode), Value::Text("inf".into()));
    }

    #[test]
    fn test_parse_cell_dates() {
        let mode = ParseMode::default();
        assert_eq!(
            parse_cell("2024-01-31", mode),
            Value::Date {
                at: date(2024, 1, 31),
                with_time: false
            }
        );
        assert_eq!(
            parse_cell("<2024-01-31 Wed>", mode),
            Value::Date {
                at: date(2024, 1, 31),
                with_time: false
            }
        );
        let Value::Date { at, with_time } = parse_cell("[2024-01-31 Wed 10:15]", mode) else {
            panic!("expected a date");
        };
        assert!(with_time);
        assert_eq!(at.format("%H:%M").to_string(), "10:15");
        assert!(matches!(parse_cell("2024-13-01", mode), Value::Text(_)));
    }

    #[test]
    fn test_day_name_only_inside_timestamp() {
        let mode = ParseMode::default();
        assert_eq!(
            parse_cell("2024-01-31 Meeting", mode),
            Value::Text("2024-01-31 Meeting".into())
        );
        assert!(matches!(parse_cell("2024-01-31 Wed", mode), Value::Text(_)));
        assert!(matches!(
            parse_cell("<2024-01-31 Wed 10:00>", mode),
            Value::Date { with_time: true, .. }
        ));
        assert!(matches!(
            parse_cell("2024-01-31 10:00", mode),
            Value::Date { with_time: true, .. }
        ));
    }

    #[test]
    fn test_parse_cell_modes() {
        let keep = ParseMode {
            keep_empty: true,
            ..ParseMode::default()
        };
        assert!(matches!(parse_cell("", keep), Value::Number(n) if n.is_nan()));

        let numbers = ParseMode {
            numbers_only: true,
            ..ParseMode::default()
        };
        assert_eq!(parse_cell("abc", numbers), Value::Number(0.0));
        assert_eq!(parse_cell("1:00", numbers), Value::Number(0.0));
        assert_eq!(parse_cell("7", numbers), Value::Number(7.0));
        assert_eq!(parse_cell("", numbers), Value::Empty);
    }

    #[test]
    fn test_duration_rejects_bad_minutes() {
        assert_eq!(parse_duration("1:75"), None);
        assert_eq!(parse_duration("-0:30"), Some(-1800.0));
    }

    #[test]
    fn test_binary_number_and_kinds() {
        let two = Value::Number(2.0);
        let three = Value::Number(3.0);
        assert_eq!(Value::binary(BinaryOp::Mul, &two, &three), Value::Number(6.0));

        let hour = Value::Duration(3600.0);
        assert_eq!(
            Value::binary(BinaryOp::Add, &hour, &hour),
            Value::Duration(7200.0)
        );
        assert_eq!(Value::binary(BinaryOp::Div, &hour, &two), Value::Duration(1800.0));
        assert_eq!(Value::binary(BinaryOp::Div, &hour, &hour), Value::Number(1.0));

        let jan1 = Value::Date {
            at: date(2024, 1, 1),
            with_time: false,
        };
        let jan3 = Value::Date {
            at: date(2024, 1, 3),
            with_time: false,
        };
        assert_eq!(Value::binary(BinaryOp::Sub, &jan3, &jan1), Value::Number(2.0));
        assert_eq!(Value::binary(BinaryOp::Add, &jan1, &two), jan3);
    }

    #[test]
    fn test_binary_symbolic_passthrough() {
        let a = Value::Text("apple".into());
        let one = Value::Number(1.0);
        assert_eq!(
            Value::binary(BinaryOp::Add, &a, &one),
            Value::Text("apple + 1".into())
        );
        let hour = Value::Duration(3600.0);
        assert!(matches!(Value::binary(BinaryOp::Add, &hour, &one), Value::Text(_)));
    }

    #[test]
    fn test_date_from_days_roundtrip() {
        let jan3 = Value::Date {
            at: date(2024, 1, 3),
            with_time: false,
        };
        let days = jan3.as_f64().unwrap();
        assert_eq!(Value::date_from_days(days), jan3);
    }
}

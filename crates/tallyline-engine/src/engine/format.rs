//! Output formatting for computed cells.
//!
//! A column's format segment is a run of single-letter flags, e.g. `f2`, `p6N`,
//! `T`, or a printf pattern such as `%.1f`. Flags override the invocation-wide
//! [`NumericFormatContext`].

use serde::{Deserialize, Serialize};

use super::error::FormulaError;
use super::eval::Evaluated;
use super::value::{ParseMode, Value};

const NAN_TEXT: &str = "#NAN!";
const INF_TEXT: &str = "#INF!";

/// Largest denominator tried when rendering fractions.
const MAX_DENOMINATOR: i64 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleMode {
    #[default]
    Degrees,
    Radians,
}

/// Float notation; the payload is the number of digits after the point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatStyle {
    #[default]
    Normal,
    Fixed(u8),
    Scientific(u8),
    Engineering(u8),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DurationStyle {
    /// `hh:mm:ss`
    #[default]
    Clock,
    /// `hh:mm`
    HoursMinutes,
    /// Fractional hours as a plain number.
    FractionalHours,
}

/// Invocation-wide numeric defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericFormatContext {
    /// Significant digits for normal notation.
    pub precision: usize,
    pub angle_mode: AngleMode,
    pub float_style: FloatStyle,
    pub prefer_fraction: bool,
}

impl Default for NumericFormatContext {
    fn default() -> Self {
        Self {
            precision: 12,
            angle_mode: AngleMode::Degrees,
            float_style: FloatStyle::Normal,
            prefer_fraction: false,
        }
    }
}

/// Per-column format flags parsed from a spec's format segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputFormat {
    pub float_style: Option<FloatStyle>,
    pub precision: Option<usize>,
    pub printf: Option<Printf>,
    /// `N`
    pub numbers_only: bool,
    /// `E`
    pub keep_empty: bool,
    /// `L`
    pub literal: bool,
    pub duration: DurationStyle,
    pub angle_mode: Option<AngleMode>,
    /// `F` sets `Some(true)`, `S` sets `Some(false)`.
    pub fractions: Option<bool>,
}

impl OutputFormat {
    pub fn parse(segment: &str) -> Result<Self, FormulaError> {
        let mut format = Self::default();
        format.merge_segment(segment)?;
        Ok(format)
    }

    /// Apply the flags of one format segment on top of the current ones.
    pub fn merge_segment(&mut self, segment: &str) -> Result<(), FormulaError> {
        let bytes = segment.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let flag = bytes[i];
            let at = i;
            i += 1;
            match flag {
                b'f' | b's' | b'e' | b'p' => {
                    let start = i;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    let digits: usize = segment[start..i].parse().map_err(|_| {
                        FormulaError::new(format!("flag `{}` needs a digit count", flag as char), at)
                    })?;
                    let short = digits.min(u8::MAX as usize) as u8;
                    match flag {
                        b'f' => self.float_style = Some(FloatStyle::Fixed(short)),
                        b's' => self.float_style = Some(FloatStyle::Scientific(short)),
                        b'e' => self.float_style = Some(FloatStyle::Engineering(short)),
                        _ => self.precision = Some(digits.max(1)),
                    }
                }
                b'%' => {
                    self.printf = Some(Printf::parse(&segment[at..]).map_err(|e| {
                        FormulaError::new(e.message, at + e.offset)
                    })?);
                    break;
                }
                b'N' => self.numbers_only = true,
                b'E' => self.keep_empty = true,
                b'L' => self.literal = true,
                b'T' => self.duration = DurationStyle::Clock,
                b'U' => self.duration = DurationStyle::HoursMinutes,
                b't' => self.duration = DurationStyle::FractionalHours,
                b'D' => self.angle_mode = Some(AngleMode::Degrees),
                b'R' => self.angle_mode = Some(AngleMode::Radians),
                b'F' => self.fractions = Some(true),
                b'S' => self.fractions = Some(false),
                c if c.is_ascii_whitespace() => {}
                _ => {
                    let ch = segment[at..].chars().next().unwrap_or('?');
                    return Err(FormulaError::new(format!("unknown format flag `{}`", ch), at));
                }
            }
        }
        Ok(())
    }

    pub fn parse_mode(&self) -> ParseMode {
        ParseMode {
            numbers_only: self.numbers_only,
            keep_empty: self.keep_empty,
        }
    }

    pub fn angle_mode(&self, ctx: &NumericFormatContext) -> AngleMode {
        self.angle_mode.unwrap_or(ctx.angle_mode)
    }
}

/// Render one value.
pub fn format_value(value: &Value, format: &OutputFormat, ctx: &NumericFormatContext) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(text) => text.clone(),
        Value::Number(n) => format_number(*n, format, ctx),
        Value::Duration(seconds) => match format.duration {
            DurationStyle::Clock => clock(*seconds, true),
            DurationStyle::HoursMinutes => clock(*seconds, false),
            DurationStyle::FractionalHours => format_number(seconds / 3600.0, format, ctx),
        },
        Value::Date { at, with_time } => {
            if *with_time {
                at.format("%Y-%m-%d %H:%M").to_string()
            } else {
                at.format("%Y-%m-%d").to_string()
            }
        }
        Value::Uncertain { mean, err } => format!(
            "{} +/- {}",
            format_number(*mean, format, ctx),
            format_number(*err, format, ctx)
        ),
    }
}

/// Render an evaluation result; a leftover sequence renders as `[a, b, c]`.
pub fn format_evaluated(result: &Evaluated, format: &OutputFormat, ctx: &NumericFormatContext) -> String {
    match result {
        Evaluated::Scalar(value) => format_value(value, format, ctx),
        Evaluated::Sequence(values) => {
            let items: Vec<String> = values
                .iter()
                .map(|v| format_value(v, format, ctx))
                .collect();
            format!("[{}]", items.join(", "))
        }
    }
}

pub fn format_number(n: f64, format: &OutputFormat, ctx: &NumericFormatContext) -> String {
    if n.is_nan() {
        return NAN_TEXT.to_string();
    }
    if n.is_infinite() {
        return INF_TEXT.to_string();
    }
    if let Some(printf) = &format.printf {
        return printf.render(n, ctx.precision);
    }

    if format.fractions.unwrap_or(ctx.prefer_fraction) && n.fract() != 0.0 {
        if let Some((num, den)) = as_fraction(n) {
            return format!("{}/{}", num, den);
        }
    }

    let precision = format.precision.unwrap_or(ctx.precision).max(1);
    match format.float_style.unwrap_or(ctx.float_style) {
        FloatStyle::Normal => general(n, precision),
        FloatStyle::Fixed(digits) => format!("{:.*}", digits as usize, n),
        FloatStyle::Scientific(digits) => format!("{:.*e}", digits as usize, n),
        FloatStyle::Engineering(digits) => engineering(n, digits as usize),
    }
}

/// Integers without decimals, everything else with `precision` significant
/// digits and trailing zeros trimmed.
fn general(n: f64, precision: usize) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let (mantissa, exponent) = split_exponent(n, precision - 1);
    if exponent < -5 || exponent >= precision as i32 {
        format!("{}e{}", trim_zeros(&mantissa), exponent)
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, n)).to_string()
    }
}

/// Rust's `{:e}` output split into mantissa text and decimal exponent.
fn split_exponent(n: f64, decimals: usize) -> (String, i32) {
    let text = format!("{:.*e}", decimals, n);
    match text.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

fn engineering(n: f64, digits: usize) -> String {
    if n == 0.0 {
        return format!("{:.*}", digits, 0.0);
    }
    let mut exponent = (n.abs().log10() / 3.0).floor() as i32 * 3;
    let mut mantissa = n / 10f64.powi(exponent);
    let scale = 10f64.powi(digits as i32);
    if ((mantissa.abs() * scale).round() / scale) >= 1000.0 {
        exponent += 3;
        mantissa = n / 10f64.powi(exponent);
    }
    format!("{:.*}e{}", digits, mantissa, exponent)
}

fn clock(seconds: f64, with_seconds: bool) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total = seconds.abs();
    if with_seconds {
        let total = total.round() as u64;
        format!("{}{:02}:{:02}:{:02}", sign, total / 3600, total / 60 % 60, total % 60)
    } else {
        let minutes = (total / 60.0).round() as u64;
        format!("{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
    }
}

/// Best rational approximation with a small denominator, only when exact.
fn as_fraction(n: f64) -> Option<(i64, i64)> {
    let (mut h0, mut h1) = (0i64, 1i64);
    let (mut k0, mut k1) = (1i64, 0i64);
    let mut x = n;
    for _ in 0..32 {
        let a = x.floor();
        if a.abs() > i64::MAX as f64 / 2.0 {
            return None;
        }
        let a = a as i64;
        let h2 = a.checked_mul(h1)?.checked_add(h0)?;
        let k2 = a.checked_mul(k1)?.checked_add(k0)?;
        if k2 > MAX_DENOMINATOR {
            return None;
        }
        (h0, h1, k0, k1) = (h1, h2, k1, k2);
        if (h1 as f64 / k1 as f64 - n).abs() <= 1e-12 * n.abs().max(1.0) {
            return Some((h1, k1));
        }
        let rest = x - a as f64;
        if rest == 0.0 {
            return None;
        }
        x = 1.0 / rest;
    }
    None
}

/// A parsed printf-style pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct Printf {
    pieces: Vec<Piece>,
}

#[derive(Clone, Debug, PartialEq)]
enum Piece {
    Literal(String),
    Conversion(Conversion),
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Conversion {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    kind: char,
}

impl Printf {
    pub fn parse(pattern: &str) -> Result<Self, FormulaError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.char_indices().peekable();

        while let Some((at, ch)) = chars.next() {
            if ch != '%' {
                literal.push(ch);
                continue;
            }
            if chars.next_if(|&(_, c)| c == '%').is_some() {
                literal.push('%');
                continue;
            }

            let mut conv = Conversion::default();
            while let Some((_, c)) = chars.next_if(|&(_, c)| "-+ 0#".contains(c)) {
                match c {
                    '-' => conv.left = true,
                    '+' => conv.plus = true,
                    ' ' => conv.space = true,
                    '0' => conv.zero = true,
                    _ => conv.alternate = true,
                }
            }
            while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_digit()) {
                conv.width = conv.width * 10 + c.to_digit(10).unwrap_or(0) as usize;
            }
            if chars.next_if(|&(_, c)| c == '.').is_some() {
                let mut precision = 0;
                while let Some((_, c)) = chars.next_if(|&(_, c)| c.is_ascii_digit()) {
                    precision = precision * 10 + c.to_digit(10).unwrap_or(0) as usize;
                }
                conv.precision = Some(precision);
            }
            match chars.next() {
                Some((_, kind)) if "difFeEgGsxXo".contains(kind) => conv.kind = kind,
                Some((offset, kind)) => {
                    return Err(FormulaError::new(
                        format!("unknown printf conversion `%{}`", kind),
                        offset,
                    ));
                }
                None => return Err(FormulaError::new("incomplete printf conversion", at)),
            }

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(Piece::Conversion(conv));
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(Self { pieces })
    }

    /// Render `n` into every conversion of the pattern.
    pub fn render(&self, n: f64, default_precision: usize) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Conversion(conv) => out.push_str(&conv.render(n, default_precision)),
            }
        }
        out
    }
}

impl Conversion {
    fn render(&self, n: f64, default_precision: usize) -> String {
        let negative = n.is_sign_negative() && n != 0.0;
        let magnitude = n.abs();
        let (body, numeric) = match self.kind {
            'd' | 'i' => (format!("{}", magnitude.round() as u64), true),
            'f' | 'F' => (format!("{:.*}", self.precision.unwrap_or(6), magnitude), true),
            'e' | 'E' => (c_exponent(magnitude, self.precision.unwrap_or(6), self.kind == 'E'), true),
            'g' | 'G' => (self.c_general(magnitude), true),
            'x' => (self.prefixed(format!("{:x}", magnitude.round() as u64), "0x"), true),
            'X' => (self.prefixed(format!("{:X}", magnitude.round() as u64), "0X"), true),
            'o' => (self.prefixed(format!("{:o}", magnitude.round() as u64), "0"), true),
            _ => {
                let text = general(n, default_precision.max(1));
                let text = match self.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                };
                (text, false)
            }
        };

        let sign = if !numeric {
            ""
        } else if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };

        let len = sign.len() + body.chars().count();
        let pad = self.width.saturating_sub(len);
        if self.left {
            format!("{}{}{}", sign, body, " ".repeat(pad))
        } else if self.zero && numeric {
            format!("{}{}{}", sign, "0".repeat(pad), body)
        } else {
            format!("{}{}{}", " ".repeat(pad), sign, body)
        }
    }

    fn prefixed(&self, digits: String, prefix: &str) -> String {
        if self.alternate && digits != "0" {
            format!("{}{}", prefix, digits)
        } else {
            digits
        }
    }

    fn c_general(&self, magnitude: f64) -> String {
        let precision = match self.precision {
            Some(0) => 1,
            Some(p) => p,
            None => 6,
        };
        let upper = self.kind == 'G';
        if magnitude == 0.0 {
            return "0".to_string();
        }
        let (_, exponent) = split_exponent(magnitude, precision - 1);
        let text = if exponent < -4 || exponent >= precision as i32 {
            c_exponent(magnitude, precision - 1, upper)
        } else {
            let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
            format!("{:.*}", decimals, magnitude)
        };
        if self.alternate {
            return text;
        }
        match text.find(['e', 'E']) {
            Some(pos) => format!("{}{}", trim_zeros(&text[..pos]), &text[pos..]),
            None => trim_zeros(&text).to_string(),
        }
    }
}

/// C-style exponent notation: `1.500000e+03`.
fn c_exponent(magnitude: f64, decimals: usize, upper: bool) -> String {
    let (mantissa, exponent) = split_exponent(magnitude, decimals);
    let e = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}{}{}{:02}", mantissa, e, sign, exponent.abs())
}

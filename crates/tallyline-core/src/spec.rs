//! Column spec mini-language.
//!
//! A spec list is whitespace-separated; each spec is
//! `formula[;format][;^sort][;<invisible>][;'name']` with the segments after the
//! formula in any order. Quotes protect `;` and whitespace, and a single quote
//! protects double quotes (and vice versa).

use std::collections::BTreeSet;

use tallyline_engine::engine::{Expr, OutputFormat};

use crate::error::{Result, TallylineError};
use crate::sort::SortKey;

/// Sort segment of a spec, before it is attached to an output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
    pub strength: Option<u32>,
}

/// A spec split into its segments, columns not yet resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct RawColumnSpec {
    /// The column spec exactly as written.
    pub text: String,
    pub formula: String,
    pub format: OutputFormat,
    pub sort: Option<SortSpec>,
    pub invisible: bool,
    pub name: Option<String>,
}

/// What an output column computes.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnKind {
    /// A bare column reference: groups rows and copies the key value.
    Key(usize),
    /// `list(col)`: raw cells joined in source order.
    List(usize),
    /// `L` flag: the formula text itself.
    Literal,
    Formula(Expr),
}

/// A fully resolved output column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub formula: String,
    pub format: OutputFormat,
    pub sort: Option<SortSpec>,
    pub invisible: bool,
    pub name: Option<String>,
    /// Canonical rendering with every column as `$N` (or `hline`).
    pub positional_formula: String,
    pub referenced_positions: BTreeSet<usize>,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    /// Output header text: the explicit name, else the formula as written.
    pub fn header(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.formula)
    }

    pub fn key_position(&self) -> Option<usize> {
        match self.kind {
            ColumnKind::Key(position) => Some(position),
            _ => None,
        }
    }
}

/// Split a spec list on whitespace outside quotes and parentheses.
pub fn split_spec_list(text: &str) -> Result<Vec<String>> {
    let mut specs = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                c if c.is_whitespace() && depth == 0 => {
                    if !current.is_empty() {
                        specs.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }

    if quote.is_some() {
        return Err(TallylineError::spec(&current, "unmatched quote"));
    }
    if !current.is_empty() {
        specs.push(current);
    }
    Ok(specs)
}

/// Split one spec on `;` outside quotes.
fn split_segments(spec: &str) -> Result<Vec<&str>> {
    let mut segments = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in spec.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => {
                segments.push(&spec[start..i]);
                start = i + 1;
            }
            None => {}
        }
    }
    if quote.is_some() {
        return Err(TallylineError::spec(spec, "unmatched quote"));
    }
    segments.push(&spec[start..]);
    Ok(segments)
}

fn parse_sort(spec: &str, segment: &str) -> Result<SortSpec> {
    let mut chars = segment.chars();
    let letter = chars
        .next()
        .ok_or_else(|| TallylineError::spec(spec, "missing sort key after `^`"))?;
    let (key, descending) = match letter {
        'a' => (SortKey::Alphabetic, false),
        'A' => (SortKey::Alphabetic, true),
        'n' => (SortKey::Numeric, false),
        'N' => (SortKey::Numeric, true),
        't' => (SortKey::Time, false),
        'T' => (SortKey::Time, true),
        other => {
            return Err(TallylineError::spec(
                spec,
                format!("unknown sort key `{}` (expected one of a A n N t T)", other),
            ));
        }
    };
    let digits = chars.as_str();
    let strength = if digits.is_empty() {
        None
    } else {
        Some(digits.parse::<u32>().map_err(|_| {
            TallylineError::spec(spec, format!("invalid sort strength `{}`", digits))
        })?)
    };
    Ok(SortSpec {
        key,
        descending,
        strength,
    })
}

/// Strip one pair of matching single or double quotes.
pub(crate) fn unquote(segment: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|q| {
        segment
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
    })
}

/// Parse one column spec into its segments.
pub fn parse_column_spec(text: &str) -> Result<RawColumnSpec> {
    let segments = split_segments(text)?;
    let formula = segments[0].trim();
    if formula.is_empty() {
        return Err(TallylineError::spec(text, "empty formula"));
    }

    let mut spec = RawColumnSpec {
        text: text.to_string(),
        formula: formula.to_string(),
        format: OutputFormat::default(),
        sort: None,
        invisible: false,
        name: None,
    };

    for segment in segments[1..].iter().map(|s| s.trim()) {
        if segment.is_empty() {
            continue;
        }
        if let Some(rest) = segment.strip_prefix('^') {
            if spec.sort.is_some() {
                return Err(TallylineError::spec(text, "more than one sort segment"));
            }
            spec.sort = Some(parse_sort(text, rest)?);
        } else if segment.starts_with('<') {
            if !segment.ends_with('>') {
                return Err(TallylineError::spec(text, "unterminated `<...>` segment"));
            }
            spec.invisible = true;
        } else if let Some(name) = unquote(segment) {
            if spec.name.is_some() {
                return Err(TallylineError::spec(text, "more than one name segment"));
            }
            spec.name = Some(name.to_string());
        } else {
            spec.format
                .merge_segment(segment)
                .map_err(|e| TallylineError::spec(text, e.message))?;
        }
    }

    Ok(spec)
}

/// Parse a whole spec list.
pub fn parse_spec_list(text: &str) -> Result<Vec<RawColumnSpec>> {
    split_spec_list(text)?
        .iter()
        .map(|spec| parse_column_spec(spec))
        .collect()
}

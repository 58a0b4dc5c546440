//! Row filter predicates.
//!
//! A filter is a Rhai expression over column references, e.g.
//! `Level > 30 && Day != "Sunday"`. References outside string literals are
//! rewritten to `row[i]` and the row is bound explicitly for each call:
//!
//! - `row[0]` is the block index (INT)
//! - `row[i]` is cell `i` as FLOAT when numeric, as a string otherwise
//!
//! Rows that are too short, fail to evaluate, or yield a non-bool are rejected.

use std::sync::OnceLock;

use log::trace;
use regex::{Captures, Regex};
use rhai::{AST, Array, Dynamic, Engine, Scope};

use super::ast::{BLOCK_NAME, BLOCK_POSITION};
use super::error::FormulaError;
use super::value::parse_number;

const ROW_VAR: &str = "row";
const MAX_OPERATIONS: u64 = 100_000;

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"'(?<quoted>[^']*)'|\$(?<pos>[0-9]+)|\b(?<ident>[\p{Alphabetic}_][\p{Alphabetic}\p{N}_.]*)")
            .expect("reference regex must compile")
    })
}

/// A compiled row predicate.
pub struct RowFilter {
    source: String,
    engine: Engine,
    ast: AST,
}

impl std::fmt::Debug for RowFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowFilter")
            .field("source", &self.source)
            .finish()
    }
}

impl RowFilter {
    /// Compile `expression`, mapping column references to positions with
    /// `resolve(name, quoted)`. Unknown `$N` or quoted references fail here;
    /// unknown bare names are left to Rhai, which rejects undefined variables.
    pub fn compile(
        expression: &str,
        mut resolve: impl FnMut(&str, bool) -> Option<usize>,
    ) -> Result<Self, FormulaError> {
        let mut unresolved = None;
        let script = rewrite_references(expression, &mut |name: &str, quoted: bool, offset: usize| {
            let position = if !quoted && name == BLOCK_NAME {
                Some(BLOCK_POSITION)
            } else {
                resolve(name, quoted)
            };
            if position.is_none() && (quoted || name.starts_with('$')) && unresolved.is_none() {
                unresolved = Some(FormulaError::new(format!("unknown column `{}`", name), offset));
            }
            position
        });
        if let Some(err) = unresolved {
            return Err(err);
        }

        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_operations(MAX_OPERATIONS);

        let mut scope = Scope::new();
        scope.push_constant(ROW_VAR, Array::new());
        let ast = engine
            .compile_expression_with_scope(&scope, &script)
            .map_err(|e| {
                let offset = e.1.position().unwrap_or(0).saturating_sub(1);
                FormulaError::new(e.to_string(), offset)
            })?;

        Ok(Self {
            source: expression.to_string(),
            engine,
            ast,
        })
    }

    /// Whether the row passes. Any failure rejects the row.
    pub fn accepts(&self, cells: &[String], block: usize) -> bool {
        match self.evaluate(cells, block) {
            Ok(keep) => keep,
            Err(err) => {
                trace!("filter `{}` rejected row {:?}: {}", self.source, cells, err);
                false
            }
        }
    }

    pub fn evaluate(&self, cells: &[String], block: usize) -> Result<bool, Box<rhai::EvalAltResult>> {
        let mut row = Array::with_capacity(cells.len() + 1);
        row.push(Dynamic::from_int(block as rhai::INT));
        row.extend(cells.iter().map(|cell| {
            let text = cell.trim();
            match parse_number(text) {
                Some(n) => Dynamic::from_float(n),
                None => Dynamic::from(text.to_string()),
            }
        }));

        let mut scope = Scope::new();
        scope.push_constant(ROW_VAR, row);
        self.engine.eval_ast_with_scope::<bool>(&mut scope, &self.ast)
    }
}

fn reference(position: Option<usize>, original: &str) -> String {
    match position {
        Some(position) => format!("{}[{}]", ROW_VAR, position),
        None => original.to_string(),
    }
}

/// Rewrite column references outside double-quoted strings into `row[i]`.
/// `lookup` receives the reference text, whether it was quoted, and its byte offset.
fn rewrite_references(
    script: &str,
    lookup: &mut dyn FnMut(&str, bool, usize) -> Option<usize>,
) -> String {
    let mut rewrite = |seg: &str, base: usize| {
        reference_re()
            .replace_all(seg, |caps: &Captures| {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                let offset = base + whole.start;
                let name = &caps[0];
                if let Some(q) = caps.name("quoted") {
                    return reference(lookup(q.as_str(), true, offset), name);
                }
                if caps.name("pos").is_some() {
                    return reference(lookup(name, false, offset), name);
                }

                if seg[..whole.start].ends_with('.') {
                    return name.to_string();
                }
                if !seg[whole.end..].trim_start().starts_with('(') {
                    if let Some(position) = lookup(name, false, offset) {
                        return reference(Some(position), name);
                    }
                }
                // Longest column prefix wins; the rest is a method call on it.
                for (dot, _) in name.rmatch_indices('.') {
                    if let Some(position) = lookup(&name[..dot], false, offset) {
                        return format!("{}{}", reference(Some(position), name), &name[dot..]);
                    }
                }
                name.to_string()
            })
            .to_string()
    };

    let bytes = script.as_bytes();
    let mut out = String::new();
    let mut seg_start = 0;
    let mut in_string = false;
    let mut backslashes = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if b == b'\\' {
                backslashes += 1;
                continue;
            }
            if b == b'"' && backslashes.is_multiple_of(2) {
                out.push_str(&script[seg_start..=i]);
                in_string = false;
                seg_start = i + 1;
            }
            backslashes = 0;
            continue;
        }
        if b == b'"' {
            out.push_str(&rewrite(&script[seg_start..i], seg_start));
            in_string = true;
            seg_start = i;
            backslashes = 0;
        }
    }

    if seg_start < script.len() {
        if in_string {
            out.push_str(&script[seg_start..]);
        } else {
            out.push_str(&rewrite(&script[seg_start..], seg_start));
        }
    }
    out
}

//! Formula tokenizer.

use super::error::FormulaError;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Number(f64),
    Ident(String),
    /// `'Unit Price'` or `"Unit Price"`, quotes removed.
    Quoted(String),
    /// `$3`
    Dollar(usize),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

/// A token with the byte offset where it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match ch {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '\'' | '"' => {
                chars.next();
                let mut buf = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == ch {
                        closed = true;
                        break;
                    }
                    buf.push(c);
                }
                if !closed {
                    return Err(FormulaError::new("unterminated quoted name", offset));
                }
                tokens.push(Spanned {
                    token: Token::Quoted(buf),
                    offset,
                });
                continue;
            }
            '$' => {
                chars.next();
                let mut digits = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_digit() {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                let position = digits
                    .parse::<usize>()
                    .map_err(|_| FormulaError::new("expected a column number after `$`", offset))?;
                tokens.push(Spanned {
                    token: Token::Dollar(position),
                    offset,
                });
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let text = lex_number(input, offset);
                for _ in text.chars() {
                    chars.next();
                }
                let n = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::new(format!("invalid number `{}`", text), offset))?;
                tokens.push(Spanned {
                    token: Token::Number(n),
                    offset,
                });
                continue;
            }
            c if is_ident_start(c) => {
                let mut buf = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_ident_continue(c) {
                        break;
                    }
                    buf.push(c);
                    chars.next();
                }
                tokens.push(Spanned {
                    token: Token::Ident(buf),
                    offset,
                });
                continue;
            }
            other => {
                return Err(FormulaError::new(
                    format!("unexpected character `{}`", other),
                    offset,
                ));
            }
        };

        chars.next();
        tokens.push(Spanned { token, offset });
    }

    Ok(tokens)
}

/// Longest numeric literal starting at `start`: digits, one dot, optional exponent.
fn lex_number(input: &str, start: usize) -> &str {
    let bytes = input.as_bytes();
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                exp_end += 1;
            }
            end = exp_end;
        }
    }
    &input[start..end]
}

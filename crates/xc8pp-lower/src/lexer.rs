//! A lossless C++ tokenizer.
//!
//! Concatenating the text of every token reproduces the input exactly.
//! Comments, string and character literals are single tokens, so braces
//! inside them never affect brace matching.

use xc8pp_common::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Char,
    Punct,
    Comment,
    /// A `#` directive up to the end of its (possibly continued) line.
    Preprocessor,
    Whitespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    /// Whitespace, comments and directives.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::Preprocessor
        )
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == kw
    }
}

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line_start = true;

    while pos < bytes.len() {
        let start = pos;
        let b = bytes[pos];
        let kind = match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    if bytes[pos] == b'\n' {
                        line_start = true;
                    }
                    pos += 1;
                }
                push(&mut tokens, src, TokenKind::Whitespace, start, pos);
                continue;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                pos = line_end(bytes, pos);
                TokenKind::Comment
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = match src[pos + 2..].find("*/") {
                    Some(i) => pos + 2 + i + 2,
                    None => bytes.len(),
                };
                TokenKind::Comment
            }
            b'#' if line_start => {
                loop {
                    pos = line_end(bytes, pos);
                    let continued = src[start..pos].trim_end_matches('\r').ends_with('\\');
                    if continued && pos < bytes.len() {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                TokenKind::Preprocessor
            }
            b'"' => {
                pos = quoted(bytes, pos, b'"');
                TokenKind::Str
            }
            b'\'' => {
                pos = quoted(bytes, pos, b'\'');
                TokenKind::Char
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                TokenKind::Ident
            }
            b if b.is_ascii_digit()
                || (b == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) =>
            {
                pos += 1;
                while pos < bytes.len() {
                    let c = bytes[pos];
                    let exponent_sign = matches!(c, b'+' | b'-')
                        && matches!(bytes[pos - 1], b'e' | b'E' | b'p' | b'P')
                        && !src[start..pos].starts_with("0x");
                    let separator = c == b'\''
                        && bytes.get(pos + 1).is_some_and(u8::is_ascii_alphanumeric);
                    if c.is_ascii_alphanumeric() || c == b'.' || c == b'_' || exponent_sign || separator {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                TokenKind::Number
            }
            _ => {
                let two = src.get(pos..pos + 2);
                pos += if matches!(two, Some("::") | Some("->")) {
                    2
                } else {
                    src[pos..].chars().next().map_or(1, char::len_utf8)
                };
                TokenKind::Punct
            }
        };
        line_start = false;
        push(&mut tokens, src, kind, start, pos);
    }
    tokens
}

fn push<'a>(tokens: &mut Vec<Token<'a>>, src: &'a str, kind: TokenKind, start: usize, end: usize) {
    tokens.push(Token {
        kind,
        text: &src[start..end],
        span: Span::from_range(start..end),
    });
}

/// Index of the next `\n` (not consumed), or the end of input.
fn line_end(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |i| pos + i)
}

/// End of a quoted literal. Unterminated literals stop at the end of the line.
fn quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

/// Join tokens the way the front end spells types: `const Led &`, `hw::Pin`.
pub fn join_tokens(tokens: &[&Token<'_>]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        let glued = token.is_punct("::") || (i > 0 && tokens[i - 1].is_punct("::"));
        if i > 0 && !glued {
            out.push(' ');
        }
        out.push_str(token.text);
    }
    out
}

/// Indices of non-trivia tokens.
pub fn significant(tokens: &[Token<'_>]) -> Vec<usize> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .map(|(i, _)| i)
        .collect()
}

/// Position in `sig` of the token closing the group opened at `sig[open]`.
pub fn matching_close(tokens: &[Token<'_>], sig: &[usize], open: usize) -> Option<usize> {
    let (open_text, close_text) = match tokens[sig[open]].text {
        "(" => ("(", ")"),
        "{" => ("{", "}"),
        "[" => ("[", "]"),
        _ => return None,
    };
    let mut depth = 0usize;
    for (k, &i) in sig.iter().enumerate().skip(open) {
        let token = &tokens[i];
        if token.is_punct(open_text) {
            depth += 1;
        } else if token.is_punct(close_text) {
            depth -= 1;
            if depth == 0 {
                return Some(k);
            }
        }
    }
    None
}

//! `#`-comment removal for script sources.
//!
//! A `#` only starts a comment outside string literals, so the source is
//! tokenized just far enough to tell strings, brackets and comments apart.
//! Comment tokens are dropped; every newline is kept, so surviving code stays
//! on its original line.
//!
//! Tokenizing is best effort. [`strip_hash_comments`] reports why it gave up
//! and [`remove_hash_comments`] turns any such failure into "leave the text
//! as it is".

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeError {
    #[error("unterminated string literal starting on line {line}")]
    UnterminatedString { line: usize },

    #[error("unmatched closing '{bracket}' on line {line}")]
    UnmatchedBracket { bracket: char, line: usize },

    #[error("unexpected end of input inside '{bracket}' opened on line {line}")]
    UnclosedBracket { bracket: char, line: usize },
}

/// Remove `#` comments, or return `code` unchanged if it cannot be
/// tokenized.
pub fn remove_hash_comments(code: &str) -> String {
    match strip_hash_comments(code) {
        Ok(stripped) => stripped,
        Err(e) => {
            debug!(error = %e, "tokenizer fallback, keeping comments");
            code.to_string()
        }
    }
}

/// Remove `#` comments outside string literals.
///
/// Whitespace immediately before a removed comment is dropped with it.
pub fn strip_hash_comments(code: &str) -> Result<String, TokenizeError> {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut brackets: Vec<(char, usize)> = Vec::new();
    let mut line = 1usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while out.ends_with([' ', '\t']) {
                    out.pop();
                }
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '"' | '\'' => {
                let end = scan_string(&chars, i, line)?;
                for &ch in &chars[i..end] {
                    if ch == '\n' {
                        line += 1;
                    }
                    out.push(ch);
                }
                i = end;
            }
            '(' | '[' | '{' => {
                brackets.push((c, line));
                out.push(c);
                i += 1;
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match brackets.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(TokenizeError::UnmatchedBracket {
                            bracket: c,
                            line,
                        });
                    }
                }
                out.push(c);
                i += 1;
            }
            '\\' => {
                // Line continuation or a stray backslash; copy it and the
                // escaped character verbatim.
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    if next == '\n' {
                        line += 1;
                    }
                    out.push(next);
                }
                i += 2;
            }
            '\n' => {
                line += 1;
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    if let Some((bracket, line)) = brackets.pop() {
        return Err(TokenizeError::UnclosedBracket { bracket, line });
    }
    Ok(out)
}

/// Return the index one past the closing quote of the literal at `start`.
fn scan_string(
    chars: &[char],
    start: usize,
    line: usize,
) -> Result<usize, TokenizeError> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote)
        && chars.get(start + 2) == Some(&quote);

    if triple {
        let mut i = start + 3;
        while i < chars.len() {
            match chars[i] {
                '\\' => i += 2,
                c if c == quote
                    && chars.get(i + 1) == Some(&quote)
                    && chars.get(i + 2) == Some(&quote) =>
                {
                    return Ok(i + 3);
                }
                _ => i += 1,
            }
        }
        return Err(TokenizeError::UnterminatedString { line });
    }

    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => break,
            c if c == quote => return Ok(i + 1),
            _ => i += 1,
        }
    }
    Err(TokenizeError::UnterminatedString { line })
}

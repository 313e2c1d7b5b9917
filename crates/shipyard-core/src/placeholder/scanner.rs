//! Two-pass placeholder scanner.
//!
//! Pass one finds `{{ ... }}` spans whose body contains no brace at all, so
//! surrounding braces (`{{{{x}}}}`) stay literal. Pass two splits the body on
//! `|` and tokenizes modifier arguments, both quote-aware.

use std::ops::Range;

/// One `{{ ... }}` occurrence in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// The matched text including the braces
    pub raw: String,
    /// Lookup key, e.g. `git.branch`
    pub expr: String,
    pub modifiers: Vec<ModifierCall>,
    /// Byte range of `raw` within the scanned text
    pub span: Range<usize>,
}

/// `name` or `name(arg, ...)` after a `|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierCall {
    pub name: String,
    pub args: Vec<String>,
}

/// Extracts every placeholder in `text`, left to right.
pub fn extract(text: &str) -> crate::Result<Vec<Placeholder>> {
    find_spans(text)
        .into_iter()
        .map(|span| {
            let raw = &text[span.clone()];
            let body = &raw[2..raw.len() - 2];
            parse_body(raw, body, span.clone())
        })
        .collect()
}

/// Byte ranges of `{{` + at least one non-brace byte + `}}`.
fn find_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            let body_start = i + 2;
            let mut j = body_start;
            while j < bytes.len() && bytes[j] != b'{' && bytes[j] != b'}' {
                j += 1;
            }
            if j > body_start && j + 1 < bytes.len() && bytes[j] == b'}' && bytes[j + 1] == b'}' {
                spans.push(i..j + 2);
                i = j + 2;
                continue;
            }
        }
        i += 1;
    }

    spans
}

fn parse_body(raw: &str, body: &str, span: Range<usize>) -> crate::Result<Placeholder> {
    let mut parts = split_unquoted(body, '|').into_iter();
    let expr = match parts.next() {
        Some(expr) => expr.trim().to_owned(),
        None => String::new(),
    };

    let mut modifiers = Vec::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        modifiers.push(parse_modifier(raw, part)?);
    }

    Ok(Placeholder {
        raw: raw.to_owned(),
        expr,
        modifiers,
        span,
    })
}

fn parse_modifier(raw: &str, text: &str) -> crate::Result<ModifierCall> {
    let invalid = || crate::Error::InvalidModifier {
        modifier: text.to_owned(),
        placeholder: raw.to_owned(),
    };

    let name_end = text
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map_or(text.len(), |(i, _)| i);
    if name_end == 0 {
        return Err(invalid());
    }
    let (name, rest) = text.split_at(name_end);
    let rest = rest.trim();

    let args = if rest.is_empty() {
        Vec::new()
    } else {
        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(invalid)?;
        if inner.contains(['(', ')']) {
            return Err(invalid());
        }
        split_args(inner)
    };

    Ok(ModifierCall {
        name: name.to_owned(),
        args,
    })
}

/// Comma-separated, optionally quoted arguments.
pub fn split_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    split_unquoted(inner, ',')
        .into_iter()
        .map(|arg| unquote(arg.trim()))
        .collect()
}

/// Splits on `sep` outside of `"..."`, `'...'` and `` `...` ``.
fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q == '"' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if matches!(c, '"' | '\'' | '`') {
            quote = Some(c);
        } else if c == sep {
            parts.push(&text[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Strips one pair of matching quotes. Double quotes honor backslash escapes;
/// single quotes and backticks are literal. Unquoted text is returned as-is.
pub fn unquote(text: &str) -> String {
    let mut chars = text.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return text.to_owned();
    };
    if first != last || !matches!(first, '"' | '\'' | '`') {
        return text.to_owned();
    }

    let inner = &text[1..text.len() - 1];
    if first != '"' {
        return inner.to_owned();
    }

    let mut out = String::with_capacity(inner.len());
    let mut escapes = inner.chars();
    while let Some(c) = escapes.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match escapes.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

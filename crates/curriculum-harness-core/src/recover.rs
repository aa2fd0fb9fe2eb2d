//! Staged recovery of a JSON object from text-generation output.
//!
//! Generation services wrap JSON in prose or code fences, quote keys
//! loosely, leave trailing commas and sometimes stop mid-object. Each stage
//! below is only attempted when the previous one failed:
//!
//! | Stage | Input | Repair |
//! |-------|-------|--------|
//! | [`Direct`](RecoveryStage::Direct) | trimmed text | none |
//! | [`Extracted`](RecoveryStage::Extracted) | fenced block, first `{` to last `}` | prose removed |
//! | [`Normalized`](RecoveryStage::Normalized) | extracted text | keys quoted, single quotes, trailing commas, control chars and inner quotes escaped |
//! | [`Balanced`](RecoveryStage::Balanced) | normalized text | cut at last complete value, missing closers appended |
//!
//! Only a JSON object counts as success. When every stage fails, the error
//! points at the parse failure of the extracted text, which is the location
//! a human should look at.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RecoveryError;

/// Bytes of surrounding text reported on either side of a failure.
const CONTEXT_WINDOW: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    Direct,
    Extracted,
    Normalized,
    Balanced,
}

/// A recovered JSON object and the stage that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub stage: RecoveryStage,
}

impl Recovered {
    /// Canonical serialisation; always parses on the first attempt.
    pub fn to_json_string(&self) -> String {
        self.value.to_string()
    }
}

fn parse_object(text: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(serde::de::Error::custom("top-level value is not an object"))
    }
}

/// Recover a JSON object from raw generation output.
pub fn recover_object(raw: &str) -> Result<Recovered, RecoveryError> {
    let trimmed = raw.trim();
    if let Ok(value) = parse_object(trimmed) {
        return Ok(Recovered {
            value,
            stage: RecoveryStage::Direct,
        });
    }

    let candidate = extract_candidate(trimmed).ok_or(RecoveryError::NoObject)?;
    let original = match parse_object(candidate) {
        Ok(value) => {
            return Ok(Recovered {
                value,
                stage: RecoveryStage::Extracted,
            })
        }
        Err(e) => e,
    };
    debug!(error = %original, "structured output needs repair");

    let normalized = normalize(candidate);
    if let Ok(value) = parse_object(&normalized) {
        return Ok(Recovered {
            value,
            stage: RecoveryStage::Normalized,
        });
    }

    let balanced = balance(&normalized);
    if let Ok(value) = parse_object(&balanced) {
        debug!(
            dropped = normalized.len().saturating_sub(balanced.len()),
            "recovered truncated structured output"
        );
        return Ok(Recovered {
            value,
            stage: RecoveryStage::Balanced,
        });
    }

    Err(describe_failure(candidate, &original))
}

/// Text inside the first code fence (if any), from the first `{` to the
/// last `}`, or to the end when no closing brace follows.
fn extract_candidate(text: &str) -> Option<&str> {
    let body = fenced_block(text).unwrap_or(text);
    let start = body.find('{')?;
    let end = match body.rfind('}') {
        Some(end) if end > start => end + 1,
        _ => body.len(),
    };
    Some(body[start..end].trim())
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // skip the info string ("json", "JSON", ...)
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let block = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    block.contains('{').then_some(block)
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}

fn closes_string(chars: &[char], after: usize) -> bool {
    matches!(
        next_significant(chars, after),
        None | Some(',') | Some('}') | Some(']') | Some(':')
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '-'
}

fn push_escaped_control(out: &mut String, c: char) {
    match c {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c => out.push_str(&format!("\\u{:04x}", c as u32)),
    }
}

/// Lexical clean-up of almost-JSON.
fn normalize(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut last_structural: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                last_structural = Some('"');
                continue;
            }
            ',' => {
                if !matches!(next_significant(&chars, i + 1), None | Some('}') | Some(']')) {
                    out.push(c);
                    last_structural = Some(c);
                }
            }
            c if is_ident_start(c) && matches!(last_structural, Some('{') | Some(',')) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if next_significant(&chars, i) == Some(':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                last_structural = Some('"');
                continue;
            }
            c if c.is_whitespace() => out.push(c),
            c => {
                out.push(c);
                last_structural = Some(c);
            }
        }
        i += 1;
    }
    out
}

/// Copy a string literal starting at `chars[start]` as a double-quoted JSON
/// string. Returns the index after the closing quote (or the end of input).
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('\'') => out.push('\''),
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => {}
            }
            i += 2;
            continue;
        }
        if c == quote {
            if closes_string(chars, i + 1) {
                out.push('"');
                return i + 1;
            }
            if quote == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
        } else if c == '"' {
            out.push_str("\\\"");
        } else if c.is_control() {
            push_escaped_control(out, c);
        } else {
            out.push(c);
        }
        i += 1;
    }
    i
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    closer: char,
    awaiting_key: bool,
}

#[derive(Debug, Clone)]
struct SafePoint {
    pos: usize,
    closers: Vec<char>,
}

fn safe_point(pos: usize, stack: &[Frame]) -> SafePoint {
    SafePoint {
        pos,
        closers: stack.iter().map(|f| f.closer).collect(),
    }
}

/// Cut after the last complete value and close every open container.
fn balance(text: &str) -> String {
    let mut stack: Vec<Frame> = Vec::new();
    let mut safe: Option<SafePoint> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_key = false;
    let mut scalar_start: Option<usize> = None;

    let in_value_position =
        |stack: &[Frame]| stack.last().map(|f| !f.awaiting_key).unwrap_or(false);

    for (idx, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                if !string_is_key {
                    safe = Some(safe_point(idx + 1, &stack));
                }
            }
            continue;
        }

        let ends_scalar = c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"');
        if ends_scalar {
            if let Some(start) = scalar_start.take() {
                if serde_json::from_str::<Value>(&text[start..idx]).is_ok() {
                    safe = Some(safe_point(idx, &stack));
                }
            }
        }

        match c {
            '{' | '[' => {
                stack.push(Frame {
                    closer: if c == '{' { '}' } else { ']' },
                    awaiting_key: c == '{',
                });
                safe = Some(safe_point(idx + 1, &stack));
            }
            '}' | ']' => {
                match stack.last() {
                    Some(frame) if frame.closer == c => {}
                    _ => break,
                }
                stack.pop();
                safe = Some(safe_point(idx + 1, &stack));
                if stack.is_empty() {
                    break;
                }
            }
            ':' => {
                if let Some(frame) = stack.last_mut() {
                    frame.awaiting_key = false;
                }
            }
            ',' => {
                if let Some(frame) = stack.last_mut() {
                    frame.awaiting_key = frame.closer == '}';
                }
            }
            '"' => {
                in_string = true;
                string_is_key = !in_value_position(&stack);
            }
            c if c.is_whitespace() => {}
            _ => {
                if scalar_start.is_none() && in_value_position(&stack) {
                    scalar_start = Some(idx);
                }
            }
        }
    }

    if let Some(start) = scalar_start {
        if !in_string && serde_json::from_str::<Value>(&text[start..]).is_ok() {
            safe = Some(safe_point(text.len(), &stack));
        }
    }

    let Some(point) = safe else {
        return text.to_string();
    };
    let mut out = text[..point.pos].trim_end().to_string();
    while out.ends_with(',') {
        out.pop();
        out.truncate(out.trim_end().len());
    }
    for closer in point.closers.iter().rev() {
        out.push(*closer);
    }
    out
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn describe_failure(text: &str, err: &serde_json::Error) -> RecoveryError {
    let line = err.line().max(1);
    let column = err.column();
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    // serde_json positions count bytes
    let at = floor_boundary(text, line_start + column.saturating_sub(1));
    let line_start = floor_boundary(text, line_start.min(at));
    let from = floor_boundary(text, at.saturating_sub(CONTEXT_WINDOW));
    let to = ceil_boundary(text, at + CONTEXT_WINDOW);
    let context = text[from..to].replace(['\n', '\r'], " ");

    RecoveryError::Unparseable {
        offset: text[..at].chars().count(),
        line,
        column: text[line_start..at].chars().count() + 1,
        context,
        message: err.to_string(),
    }
}

//! Detection of tool-call tokens in generated text.
//!
//! Grammar: `[TOOL:<name>|<json-object>]`, where `<name>` is one or more of
//! `A-Z a-z 0-9 _ . -` and `<json-object>` is a brace-balanced `{...}` literal.
//! Whitespace is allowed around the object. Braces inside string literals do
//! not count toward the balance.

use curator_core::tool::ToolCall;

const TOKEN_OPEN: &str = "[TOOL:";

/// What one round of generation asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTurn {
    /// No well-formed tool token; the text is the answer.
    PlainAnswer(String),
    /// The first well-formed tool token in the text.
    ToolInvocation(ToolCall),
}

impl ParsedTurn {
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, ParsedTurn::ToolInvocation(_))
    }
}

/// Classify generated text. Only the first well-formed token is honored;
/// malformed candidates are skipped.
pub fn parse_turn(text: &str) -> ParsedTurn {
    match find_tool_call(text) {
        Some(call) => ParsedTurn::ToolInvocation(call),
        None => ParsedTurn::PlainAnswer(text.to_string()),
    }
}

/// The first well-formed tool token in `text`, if any.
pub fn find_tool_call(text: &str) -> Option<ToolCall> {
    let mut from = 0;
    while let Some(offset) = text[from..].find(TOKEN_OPEN) {
        let start = from + offset;
        if let Some(call) = parse_token_at(text, start + TOKEN_OPEN.len()) {
            return Some(call);
        }
        from = start + 1;
    }
    None
}

/// Parse the remainder of a token whose `[TOOL:` prefix ends at `pos`.
fn parse_token_at(text: &str, pos: usize) -> Option<ToolCall> {
    let bytes = text.as_bytes();

    let name_end = pos
        + bytes[pos..]
            .iter()
            .take_while(|b| is_name_byte(**b))
            .count();
    if name_end == pos || bytes.get(name_end) != Some(&b'|') {
        return None;
    }

    let object_start = skip_whitespace(bytes, name_end + 1);
    if bytes.get(object_start) != Some(&b'{') {
        return None;
    }
    let object_end = balanced_object_end(bytes, object_start)?;

    let close = skip_whitespace(bytes, object_end);
    if bytes.get(close) != Some(&b']') {
        return None;
    }

    Some(ToolCall {
        name: text[pos..name_end].to_string(),
        args_json: text[object_start..object_end].to_string(),
    })
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(|b| b.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}

/// Index one past the `}` closing the object that opens at `start`.
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

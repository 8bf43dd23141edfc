//! Recovery of a JSON decision object from free-text model output.
//!
//! Used when the model answers in `message.content` instead of calling a
//! tool. Models wrap JSON in Markdown fences, prefix it with chat-template
//! control tokens (`<|channel|>final<|message|>{...}`), or leave trailing
//! commas. The cleanup here handles those cases; what it cannot recover is
//! reported as [`ClientError::MalformedOutput`] and the caller falls back.

use serde_json::Value;

use crate::error::ClientError;

/// Parse free-text model output into a JSON object.
///
/// Strategies, in order, on the text with control tokens removed:
/// 1. the whole text
/// 2. the body of the first Markdown code fence
/// 3. the span from the first `{` to the last `}`
///
/// Each candidate is tried as-is and with trailing commas removed.
///
/// # Errors
///
/// Returns [`ClientError::MalformedOutput`] if no strategy yields a JSON
/// object.
pub fn parse_decision_content(raw: &str) -> Result<Value, ClientError> {
    let cleaned = strip_control_tokens(raw);
    let cleaned = cleaned.trim();

    let candidates = [
        Some(cleaned),
        fenced_body(cleaned),
        outermost_object(cleaned),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Some(object) = parse_object(candidate) {
            return Ok(object);
        }
        if let Some(object) = parse_object(&strip_trailing_commas(candidate)) {
            return Ok(object);
        }
    }

    Err(ClientError::MalformedOutput {
        reason: "no JSON object found in content".to_owned(),
        raw: raw.to_owned(),
    })
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(Value::is_object)
}

/// Remove `<|...|>` tokens together with whatever follows them up to the
/// next `{`.
pub fn strip_control_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("<|") {
        out.push_str(rest.get(..open).unwrap_or_default());
        let inner = rest.get(open.saturating_add(2)..).unwrap_or_default();
        let Some(close) = inner.find("|>") else {
            out.push_str("<|");
            rest = inner;
            continue;
        };
        let label = inner.get(..close).unwrap_or_default();
        if label.is_empty() || label.contains('|') {
            out.push_str("<|");
            rest = inner;
            continue;
        }
        let after = inner.get(close.saturating_add(2)..).unwrap_or_default();
        rest = after.find('{').and_then(|b| after.get(b..)).unwrap_or_default();
    }

    out.push_str(rest);
    out
}

/// The body of the first Markdown code fence, language tag dropped.
fn fenced_body(text: &str) -> Option<&str> {
    let (_, after_open) = text.split_once("```")?;
    let (first_line, remainder) = after_open.split_once('\n').unwrap_or(("", after_open));
    // A fence opened as "```{...}```" has no language line.
    let body_start = if first_line.trim_start().starts_with('{') {
        after_open
    } else {
        remainder
    };
    let (body, _) = body_start.split_once("```")?;
    Some(body.trim())
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| text.get(start..=end)).flatten()
}

/// Drop commas that directly precede `}` or `]`, leaving string contents alone.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_comma: Option<String> = None;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if let Some(held) = pending_comma.as_mut() {
            if c.is_whitespace() {
                held.push(c);
                continue;
            }
            let held = pending_comma.take().unwrap_or_default();
            if c == '}' || c == ']' {
                // Keep the whitespace, lose the comma.
                out.push_str(held.get(1..).unwrap_or_default());
            } else {
                out.push_str(&held);
            }
        }

        match c {
            ',' => pending_comma = Some(String::from(',')),
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if let Some(held) = pending_comma {
        out.push_str(&held);
    }
    out
}

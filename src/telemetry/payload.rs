use serde_json::{Map, Number, Value};

use crate::error::{RelayError, Result};

pub const UNKNOWN_CLIENT_ID: &str = "unknown";

pub const DEFAULT_FAN_STATUS: &str = "OFF";

/// Fields extracted from one inbound telemetry message.
///
/// `temperature` and `humidity` stay optional here; rejecting a payload that
/// lacks either one is the listener's job.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    pub client_id: String,

    pub temperature: Option<f64>,

    pub humidity: Option<f64>,

    pub fan_status: String,

    /// Set when the body only decoded after [`repair_bare_tokens`].
    pub repaired: bool,
}

pub fn decode_payload(bytes: &[u8]) -> Result<TelemetryPayload> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RelayError::Decode(format!("payload is not valid UTF-8: {e}")))?;

    let (value, repaired) = match serde_json::from_str::<Value>(text) {
        Ok(value) => (value, false),
        Err(original) => {
            let fixed = repair_bare_tokens(text).ok_or_else(|| {
                RelayError::Decode(format!("{original} (repair not applicable)"))
            })?;
            let value = serde_json::from_str::<Value>(&fixed).map_err(|e| {
                RelayError::Decode(format!("{original} (still invalid after repair: {e})"))
            })?;
            (value, true)
        }
    };

    let Value::Object(fields) = value else {
        return Err(RelayError::Decode("payload is not a JSON object".to_owned()));
    };

    Ok(extract_fields(&fields, repaired))
}

fn extract_fields(fields: &Map<String, Value>, repaired: bool) -> TelemetryPayload {
    let client_id = match fields.get("client_id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN_CLIENT_ID.to_owned(),
    };

    let fan_status = fields
        .get("fan_status")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FAN_STATUS)
        .to_owned();

    TelemetryPayload {
        client_id,
        temperature: fields.get("temperature").and_then(Value::as_f64),
        humidity: fields.get("humidity").and_then(Value::as_f64),
        fan_status,
        repaired,
    }
}

/// Rewrites near-JSON with unquoted keys into JSON.
///
/// Outside string literals, bare identifier keys are quoted, and bare scalar
/// values that are neither JSON numbers nor `true`/`false`/`null` are quoted
/// as strings. Returns `None` for anything outside that shape.
pub fn repair_bare_tokens(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len() + 16);
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                let mut escaped = false;
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    out.push(c);
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return None;
                }
            }
            '{' | '}' | '[' | ']' | ',' | ':' => out.push(c),
            c if c.is_whitespace() => out.push(c),
            c if is_bare_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !is_bare_char(next) {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let token = &input[start..end];

                let is_key = input[end..].trim_start().starts_with(':');
                if is_key {
                    if !is_identifier(token) {
                        return None;
                    }
                    push_quoted(&mut out, token);
                } else if is_json_literal(token) {
                    out.push_str(token);
                } else {
                    push_quoted(&mut out, token);
                }
            }
            _ => return None,
        }
    }

    Some(out)
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-')
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_json_literal(token: &str) -> bool {
    matches!(token, "true" | "false" | "null") || serde_json::from_str::<Number>(token).is_ok()
}

fn push_quoted(out: &mut String, token: &str) {
    out.push('"');
    out.push_str(token);
    out.push('"');
}

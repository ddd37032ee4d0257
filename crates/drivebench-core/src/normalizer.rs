//! Response normalizer: any driver reply to a canonical [`DriveRecord`].
//!
//! Attempt order for text replies:
//!
//! 1. parse the whole reply as a JSON object
//! 2. strip code fences / surrounding prose and parse the `{...}` slice
//! 3. permissive key/value scan (single- or double-quoted, trailing commas,
//!    unbalanced braces)
//! 4. labeled sections (`Perception:`, `Plan:`, `Action:` ...)
//! 5. the whole reply becomes `planning` if nothing else filled it
//!
//! Normalization never fails. Unrecoverable fields are empty strings.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{DriveRecord, Field};
use crate::transport::DriverResponse;

/// Keys that name each field, canonical first.
const PERCEPTION_KEYS: &[&str] = &["perception", "see", "observation"];
const PREDICTION_KEYS: &[&str] = &["prediction", "expect", "anticipation"];
const PLANNING_KEYS: &[&str] = &["planning", "plan", "action", "command"];

/// Keys under which some drivers nest their real answer.
const WRAPPER_KEYS: &[&str] = &["raw_output", "output", "response", "content", "text", "message"];

fn aliases(field: Field) -> &'static [&'static str] {
    match field {
        Field::Perception => PERCEPTION_KEYS,
        Field::Prediction => PREDICTION_KEYS,
        Field::Planning => PLANNING_KEYS,
    }
}

fn field_for_label(label: &str) -> Option<Field> {
    let label = label.to_ascii_lowercase();
    Field::ALL
        .into_iter()
        .find(|f| aliases(*f).contains(&label.as_str()))
}

/// Normalize one dispatch outcome.
pub fn normalize(response: &DriverResponse) -> DriveRecord {
    match response {
        DriverResponse::Structured(value) => normalize_value(value),
        DriverResponse::Text(text) => normalize_text(text),
        DriverResponse::Failed(_) => DriveRecord::default(),
    }
}

/// Normalize an already-parsed JSON reply.
pub fn normalize_value(value: &Value) -> DriveRecord {
    match value {
        Value::Null => DriveRecord::default(),
        Value::String(text) => normalize_text(text),
        Value::Object(map) => normalize_object(map),
        other => DriveRecord {
            planning: text_of(other),
            ..DriveRecord::default()
        },
    }
}

fn normalize_object(map: &Map<String, Value>) -> DriveRecord {
    if let Some(record) = record_from_object(map) {
        return record;
    }

    for key in WRAPPER_KEYS {
        if let Some(inner) = lookup(map, key) {
            match inner {
                Value::String(_) | Value::Object(_) => return normalize_value(inner),
                _ => {}
            }
        }
    }

    if lookup(map, "error").is_some() {
        debug!("driver reply is an error object");
        return DriveRecord::default();
    }

    DriveRecord {
        planning: Value::Object(map.clone()).to_string(),
        ..DriveRecord::default()
    }
}

/// Build a record from an object that names at least one field.
fn record_from_object(map: &Map<String, Value>) -> Option<DriveRecord> {
    let mut record = DriveRecord::default();
    let mut found = false;
    for field in Field::ALL {
        if let Some(value) = aliases(field).iter().find_map(|key| lookup(map, key)) {
            *record.field_mut(field) = text_of(value);
            found = true;
        }
    }
    found.then_some(record)
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Normalize a free-form text reply.
pub fn normalize_text(raw: &str) -> DriveRecord {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DriveRecord::default();
    }

    let mut record = parse_object(trimmed)
        .or_else(|| braced_slice(trimmed).and_then(parse_object))
        .or_else(|| permissive_pairs(trimmed))
        .or_else(|| labeled_sections(trimmed))
        .unwrap_or_default();

    if record.planning.trim().is_empty() {
        record.planning = trimmed.to_string();
    }
    record
}

fn parse_object(text: &str) -> Option<DriveRecord> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Some(normalize_value(&value)),
        _ => None,
    }
}

/// Slice from the first `{` to the last `}`; drops code fences and prose.
fn braced_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?is)["']?\b(perception|see|observation|prediction|expect|anticipation|planning|plan|action|command)\b["']?\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#,
        )
        .unwrap_or_else(|e| panic!("invalid pair pattern: {e}"))
    })
}

fn permissive_pairs(text: &str) -> Option<DriveRecord> {
    let mut record = DriveRecord::default();
    let mut found = false;
    for caps in pair_pattern().captures_iter(text) {
        let Some(field) = caps.get(1).and_then(|m| field_for_label(m.as_str())) else {
            continue;
        };
        if !record.field(field).is_empty() {
            continue;
        }
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| unescape(m.as_str()))
            .unwrap_or_default();
        *record.field_mut(field) = clean(&value);
        found = true;
    }
    found.then_some(record)
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(perception|see|prediction|expect|planning|plan|action|command)\b\s*\**\s*:")
            .unwrap_or_else(|e| panic!("invalid section pattern: {e}"))
    })
}

fn labeled_sections(text: &str) -> Option<DriveRecord> {
    let headers: Vec<_> = section_pattern().captures_iter(text).collect();
    if headers.is_empty() {
        return None;
    }

    let mut record = DriveRecord::default();
    let mut found = false;
    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(field) = field_for_label(label.as_str()) else {
            continue;
        };
        if !record.field(field).is_empty() {
            continue;
        }
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        let body = clean(&text[whole.end()..end]);
        if !body.is_empty() {
            *record.field_mut(field) = body;
            found = true;
        }
    }
    found.then_some(record)
}

/// Markdown emphasis and surrounding whitespace removed.
fn clean(text: &str) -> String {
    text.replace('*', "").trim().to_string()
}

/// Flatten any JSON value into plain text.
///
/// Strings lose markdown emphasis, arrays are space-joined, objects become
/// `key: value` pairs joined with `. `, and `null` is empty.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => clean(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, text_of(v)))
            .collect::<Vec<_>>()
            .join(". "),
    }
}

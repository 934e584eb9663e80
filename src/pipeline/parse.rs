//! Response parsing: turn the model's free text into a validated [`ProblemRecord`].
//!
//! The model's reply is untrusted, schema-less text. Parsing runs in three
//! deterministic steps:
//!
//! 1. Trim, then strip code-fence markers (` ```json ` and bare ` ``` `).
//!    The strip is a blanket pattern removal, not a Markdown parse, so a fence
//!    anywhere in the text goes, including one inside a JSON string value.
//! 2. Parse as JSON → [`StageError::MalformedResponse`] on failure.
//! 3. Walk the JSON value and check every field's type explicitly →
//!    [`StageError::IncompleteRecord`] naming each missing or mistyped field.
//!
//! No cast is ever trusted: the record is assembled field by field from
//! the checked value.

use crate::error::StageError;
use crate::output::{Difficulty, Example, ProblemRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```json\n?").unwrap());
static RE_BARE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\n?").unwrap());

/// Parse and validate a raw model reply.
pub fn parse_response(raw: &str) -> Result<ProblemRecord, StageError> {
    let stripped = strip_code_fences(raw.trim());
    let cleaned = stripped.trim();

    let value: Value = serde_json::from_str(cleaned)
        .map_err(|source| StageError::MalformedResponse { source })?;

    let record = validate_record(&value)?;
    debug!(
        "Parsed record: {} constraints, {} examples",
        record.constraints.len(),
        record.examples.len()
    );
    Ok(record)
}

/// Remove every ` ```json ` and ` ``` ` marker (with one trailing newline each).
///
/// Text without fences is returned unchanged.
pub fn strip_code_fences(input: &str) -> String {
    let s = RE_JSON_FENCE.replace_all(input, "");
    RE_BARE_FENCE.replace_all(&s, "").into_owned()
}

/// Check a parsed JSON value against the record schema.
pub fn validate_record(value: &Value) -> Result<ProblemRecord, StageError> {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);
    let mut invalid: Vec<String> = Vec::new();

    let title = required_string(obj, "title", &mut invalid);
    let description = required_string(obj, "description", &mut invalid);
    let function_signature = required_string(obj, "functionSignature", &mut invalid);
    let constraints = string_array(obj, "constraints", &mut invalid);
    let examples = example_array(obj, "examples", &mut invalid);
    let difficulty = optional_string(obj, "difficulty", &mut invalid);
    let test_case_format = optional_string(obj, "testCaseFormat", &mut invalid);

    if !invalid.is_empty() {
        return Err(StageError::IncompleteRecord { fields: invalid });
    }

    Ok(ProblemRecord {
        title,
        difficulty: Difficulty::from(difficulty),
        description,
        function_signature,
        constraints,
        examples,
        test_case_format,
    })
}

// ── Field checks ─────────────────────────────────────────────────────────

/// Absent or null reads as empty; any other non-string is rejected.
fn lenient_text(v: Option<&Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => Some(String::new()),
        Some(v) => v.as_str().map(str::to_string),
    }
}

fn required_string(obj: &Map<String, Value>, key: &str, invalid: &mut Vec<String>) -> String {
    match obj.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => {
            invalid.push(key.to_string());
            String::new()
        }
    }
}

fn optional_string(obj: &Map<String, Value>, key: &str, invalid: &mut Vec<String>) -> String {
    lenient_text(obj.get(key)).unwrap_or_else(|| {
        invalid.push(key.to_string());
        String::new()
    })
}

fn string_array(obj: &Map<String, Value>, key: &str, invalid: &mut Vec<String>) -> Vec<String> {
    let parsed = obj
        .get(key)
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        });

    parsed.unwrap_or_else(|| {
        invalid.push(key.to_string());
        Vec::new()
    })
}

fn example_array(obj: &Map<String, Value>, key: &str, invalid: &mut Vec<String>) -> Vec<Example> {
    let parsed = obj.get(key).and_then(Value::as_array).and_then(|items| {
        items
            .iter()
            .map(|item| {
                let ex = item.as_object()?;
                Some(Example {
                    input: lenient_text(ex.get("input"))?,
                    output: lenient_text(ex.get("output"))?,
                    explanation: lenient_text(ex.get("explanation"))?,
                })
            })
            .collect::<Option<Vec<_>>>()
    });

    parsed.unwrap_or_else(|| {
        invalid.push(key.to_string());
        Vec::new()
    })
}

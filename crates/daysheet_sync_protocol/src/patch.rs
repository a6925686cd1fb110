//! Conversion of wire-side update maps into typed row patches.

use crate::error::{ProtocolError, ProtocolResult};
use daysheet_core::RowPatch;
use serde_json::{Map, Value};

/// Normalizes a wire-side memo value into trimmed lines.
///
/// Editors send memos as a JSON list, a newline-joined string, or null;
/// all collapse to the same stored form. Blank lines are dropped.
pub fn normalize_memo(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string().trim().to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                Vec::new()
            } else if text.contains('\n') {
                text.lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect()
            } else {
                vec![text.to_string()]
            }
        }
        other => vec![other.to_string()],
    }
}

/// Converts a wire `update` map into a typed [`RowPatch`].
///
/// Unknown fields are rejected rather than ignored so a client typo never
/// turns into a silently dropped edit.
pub fn row_patch_from_update(update: &Map<String, Value>) -> ProtocolResult<RowPatch> {
    if update.is_empty() {
        return Err(ProtocolError::EmptyUpdate);
    }

    let mut patch = RowPatch::default();
    for (name, value) in update {
        match name.as_str() {
            "manage_memo" => patch.manage_memo = Some(normalize_memo(value)),
            "status" => patch.status = Some(text_value("status", value)?),
            "request_note" => patch.request_note = Some(text_value("request_note", value)?),
            other => {
                return Err(ProtocolError::UnknownField {
                    name: other.to_string(),
                })
            }
        }
    }
    Ok(patch)
}

fn text_value(field: &str, value: &Value) -> ProtocolResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        other => Err(ProtocolError::InvalidValue {
            field: field.to_string(),
            message: format!("expected string, got {other}"),
        }),
    }
}

// src/report.rs
//
// Best-effort normalization of the provider's consultation text. Models asked
// for JSON still wrap it in markdown fences or drift into prose; parsing is
// opportunistic and never fails the request.
use serde_json::Value;

use crate::models::StructuredReport;

#[derive(Debug, Clone)]
pub enum Report {
    Structured(StructuredReport),
    Freeform(String),
}

/// Removes a surrounding markdown code fence (with or without an info string
/// like `json`). Anything that is not fence-wrapped comes back unchanged.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some((_, body)) = rest.split_once('\n') else {
        return trimmed;
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

fn looks_structured(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| {
            obj.get("products").is_some_and(Value::is_array)
                || obj.contains_key("analysis")
                || obj.contains_key("summary")
        })
        .unwrap_or(false)
}

/// Attempts the structured consultation shape, falling back to the raw text.
pub fn parse(text: &str) -> Report {
    let candidate = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        if looks_structured(&value) {
            if let Ok(report) = serde_json::from_value::<StructuredReport>(value) {
                return Report::Structured(report);
            }
        }
    }
    Report::Freeform(text.to_string())
}

/// The report string handed back to clients: fence-stripped JSON text when the
/// payload is structured (verbatim, so no key or value is lost), otherwise the
/// raw text untouched.
pub fn normalize(raw: &str) -> String {
    let candidate = strip_code_fences(raw);
    match serde_json::from_str::<Value>(candidate) {
        Ok(value) if looks_structured(&value) => candidate.to_string(),
        _ => raw.to_string(),
    }
}

//! Multi-format log parser: json / key_value / regex strategies.
//!
//! A failed parse never aborts the batch — it degrades to a bare
//! `ParsedRecord` with empty fields (see `degenerate_record`), which
//! downstream treats as unclassifiable.

use crate::model_types::{CustomConfig, FieldValue, FormatType, LogRecord, ParsedRecord};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;

const UPPERCASE_LEVELS: &[&str] = &["INFO", "WARN", "ERROR", "DEBUG", "FATAL"];

pub fn parse(log: &LogRecord) -> ParsedRecord {
    let result = match log.format_type {
        FormatType::Json => parse_json(log),
        FormatType::KeyValue => parse_key_value(log),
        FormatType::Regex => parse_regex(log),
    };
    result.unwrap_or_else(|_| degenerate_record(log))
}

fn degenerate_record(log: &LogRecord) -> ParsedRecord {
    ParsedRecord {
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: Utc::now(),
        level: None,
        fields: HashMap::new(),
        raw_log: log.raw_log.clone(),
    }
}

/// Coerce a string to numeric if it is a bare number or a number with a
/// known unit suffix (`ms`, `%`, `s`, `kb`, `mb`). `%` is kept as-is, not
/// divided by 100.
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return Some(n);
    }
    for unit in ["ms", "kb", "mb", "%", "s"] {
        if let Some(stripped) = trimmed.strip_suffix(unit) {
            if let Ok(n) = stripped.trim().parse::<f64>() {
                return Some(n);
            }
        }
    }
    None
}

fn field_from_text(text: &str) -> FieldValue {
    match coerce_numeric(text) {
        Some(n) => FieldValue::Numeric(n),
        None => FieldValue::Text(text.to_string()),
    }
}

fn flatten_json(value: &serde_json::Value, prefix: &str, out: &mut HashMap<String, FieldValue>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_json(v, &key, out);
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                out.insert(prefix.to_string(), FieldValue::Numeric(f));
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), field_from_text(s));
        }
        serde_json::Value::Bool(b) => {
            out.insert(prefix.to_string(), FieldValue::Text(b.to_string()));
        }
        _ => {}
    }
}

fn parse_json(log: &LogRecord) -> Result<ParsedRecord, ()> {
    let value: serde_json::Value = serde_json::from_str(&log.raw_log).map_err(|_| ())?;
    if !value.is_object() {
        return Err(());
    }
    let mut fields = HashMap::new();
    flatten_json(&value, "", &mut fields);
    Ok(ParsedRecord {
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: Utc::now(),
        level: None,
        fields,
        raw_log: log.raw_log.clone(),
    })
}

fn looks_like_iso8601(token: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(token).is_ok()
}

fn parse_key_value(log: &LogRecord) -> Result<ParsedRecord, ()> {
    let mut fields = HashMap::new();
    let mut level = None;
    let mut timestamp = None;
    let mut seen_kv = false;

    for token in log.raw_log.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            if !key.is_empty() {
                seen_kv = true;
                fields.insert(key.to_string(), field_from_text(value));
                continue;
            }
        }
        if !seen_kv {
            if looks_like_iso8601(token) {
                timestamp = chrono::DateTime::parse_from_rfc3339(token)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            } else if UPPERCASE_LEVELS.contains(&token) {
                level = Some(token.to_string());
            }
        }
    }

    Ok(ParsedRecord {
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: timestamp.unwrap_or_else(Utc::now),
        level,
        fields,
        raw_log: log.raw_log.clone(),
    })
}

fn parse_regex(log: &LogRecord) -> Result<ParsedRecord, ()> {
    let config: &CustomConfig = log.custom_config.as_ref().ok_or(())?;
    let pattern = config.pattern.as_ref().ok_or(())?;
    let re = Regex::new(pattern).map_err(|_| ())?;
    let caps = re.captures(&log.raw_log).ok_or(())?;

    let mut fields = HashMap::new();
    let mut timestamp = None;

    for (group_idx, field_name) in &config.field_mapping {
        let idx: usize = group_idx.parse().map_err(|_| ())?;
        if let Some(m) = caps.get(idx) {
            let text = m.as_str();
            if field_name == "timestamp" {
                timestamp = chrono::DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            } else {
                fields.insert(field_name.clone(), field_from_text(text));
            }
        }
    }

    Ok(ParsedRecord {
        service: log.service.clone(),
        source: log.source.clone(),
        timestamp: timestamp.unwrap_or_else(Utc::now),
        level: None,
        fields,
        raw_log: log.raw_log.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(raw: &str, fmt: FormatType) -> LogRecord {
        LogRecord {
            raw_log: raw.to_string(),
            service: "web_server".to_string(),
            source: "nginx".to_string(),
            format_type: fmt,
            custom_config: None,
        }
    }

    #[test]
    fn json_unit_suffix_is_stripped() {
        let rec = parse(&log(r#"{"response_time": "2500ms"}"#, FormatType::Json));
        assert_eq!(
            rec.fields.get("response_time"),
            Some(&FieldValue::Numeric(2500.0))
        );
    }

    #[test]
    fn json_nested_objects_are_dot_flattened() {
        let rec = parse(&log(r#"{"a": {"b": 5}}"#, FormatType::Json));
        assert_eq!(rec.fields.get("a.b"), Some(&FieldValue::Numeric(5.0)));
    }

    #[test]
    fn key_value_with_units_and_level() {
        let rec = parse(&log(
            "ERROR query_time=5000ms connection_count=100",
            FormatType::KeyValue,
        ));
        assert_eq!(rec.level.as_deref(), Some("ERROR"));
        assert_eq!(
            rec.fields.get("query_time"),
            Some(&FieldValue::Numeric(5000.0))
        );
        assert_eq!(
            rec.fields.get("connection_count"),
            Some(&FieldValue::Numeric(100.0))
        );
    }

    #[test]
    fn percent_suffix_is_not_divided() {
        assert_eq!(coerce_numeric("42%"), Some(42.0));
    }

    #[test]
    fn malformed_json_degrades_to_empty_record() {
        let rec = parse(&log("not json at all {", FormatType::Json));
        assert!(rec.fields.is_empty());
        assert_eq!(rec.service, "web_server");
    }

    #[test]
    fn regex_without_pattern_degrades() {
        let mut l = log("anything", FormatType::Regex);
        l.custom_config = Some(CustomConfig {
            pattern: None,
            field_mapping: HashMap::new(),
        });
        let rec = parse(&l);
        assert!(rec.fields.is_empty());
    }

    #[test]
    fn regex_captures_named_fields() {
        let mut mapping = HashMap::new();
        mapping.insert("1".to_string(), "status".to_string());
        let l = log(
            "status=503 done",
            FormatType::Regex,
        );
        let l = LogRecord {
            custom_config: Some(CustomConfig {
                pattern: Some(r"status=(\d+)".to_string()),
                field_mapping: mapping,
            }),
            ..l
        };
        let rec = parse(&l);
        assert_eq!(rec.fields.get("status"), Some(&FieldValue::Numeric(503.0)));
    }
}

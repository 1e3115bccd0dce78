use crate::model_types::{FeatureSchema, FeatureVector, ParsedRecord};

/// Project a `ParsedRecord` onto a `FeatureSchema`. Missing or non-numeric
/// fields contribute 0.0; fields outside the schema are dropped.
pub fn extract(record: &ParsedRecord, schema: &FeatureSchema) -> FeatureVector {
    schema
        .iter()
        .map(|name| {
            record
                .fields
                .get(name)
                .and_then(|v| v.as_numeric())
                .unwrap_or(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::FieldValue;
    use chrono::Utc;
    use std::collections::HashMap;

    fn record(fields: &[(&str, FieldValue)]) -> ParsedRecord {
        let mut map = HashMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v.clone());
        }
        ParsedRecord {
            service: "svc".to_string(),
            source: "src".to_string(),
            timestamp: Utc::now(),
            level: None,
            fields: map,
            raw_log: String::new(),
        }
    }

    #[test]
    fn missing_fields_become_zero() {
        let schema = vec!["a".to_string(), "b".to_string()];
        let rec = record(&[("a", FieldValue::Numeric(3.0))]);
        assert_eq!(extract(&rec, &schema), vec![3.0, 0.0]);
    }

    #[test]
    fn string_fields_are_ignored() {
        let schema = vec!["a".to_string()];
        let rec = record(&[("a", FieldValue::Text("nope".to_string()))]);
        assert_eq!(extract(&rec, &schema), vec![0.0]);
    }

    #[test]
    fn vector_length_equals_schema_length() {
        let schema: Vec<String> = (0..5).map(|i| format!("f{i}")).collect();
        let rec = record(&[]);
        assert_eq!(extract(&rec, &schema).len(), 5);
    }
}

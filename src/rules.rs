use crate::model_types::{Evidence, ParsedRecord};
use std::collections::HashMap;

/// Ordered upper-bound thresholds, per service, with a `__default__`
/// fallback. Stored as a `Vec` (not a `HashMap`) so "first violation in
/// insertion order" is well-defined rather than relying on hash iteration.
#[derive(Clone, Debug, Default)]
pub struct ThresholdRuleSet {
    by_service: HashMap<String, Vec<(String, f64)>>,
}

impl ThresholdRuleSet {
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut by_service = HashMap::new();
        if let Some(obj) = value.as_object() {
            for (service, rules) in obj {
                if let Some(rules_obj) = rules.as_object() {
                    let ordered: Vec<(String, f64)> = rules_obj
                        .iter()
                        .filter_map(|(field, threshold)| {
                            threshold.as_f64().map(|t| (field.clone(), t))
                        })
                        .collect();
                    by_service.insert(service.clone(), ordered);
                }
            }
        }
        Self { by_service }
    }

    fn active_rules(&self, service: &str) -> Option<&Vec<(String, f64)>> {
        self.by_service
            .get(service)
            .or_else(|| self.by_service.get("__default__"))
    }
}

/// `(violated, evidence)` per spec §4.3: the first field in the resolved
/// rule map (insertion order) whose numeric value exceeds its threshold
/// wins; no match means `(false, None)`.
pub fn evaluate(record: &ParsedRecord, rules: &ThresholdRuleSet) -> (bool, Option<Evidence>) {
    let Some(active) = rules.active_rules(&record.service) else {
        return (false, None);
    };

    for (field_name, threshold) in active {
        if let Some(value) = record.fields.get(field_name).and_then(|v| v.as_numeric()) {
            if value > *threshold {
                return (
                    true,
                    Some(Evidence {
                        rule_name: field_name.clone(),
                        threshold: *threshold,
                        actual_value: value,
                    }),
                );
            }
        }
    }
    (false, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::FieldValue;
    use chrono::Utc;
    use std::collections::HashMap;

    fn record(service: &str, fields: &[(&str, f64)]) -> ParsedRecord {
        let mut map = HashMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), FieldValue::Numeric(*v));
        }
        ParsedRecord {
            service: service.to_string(),
            source: "nginx".to_string(),
            timestamp: Utc::now(),
            level: None,
            fields: map,
            raw_log: String::new(),
        }
    }

    #[test]
    fn violation_on_web_server_response_time() {
        let rules = ThresholdRuleSet::from_json(
            &serde_json::json!({ "web_server": { "response_time": 2000 } }),
        );
        let rec = record("web_server", &[("response_time", 2500.0)]);
        let (violated, evidence) = evaluate(&rec, &rules);
        assert!(violated);
        let ev = evidence.unwrap();
        assert_eq!(ev.rule_name, "response_time");
        assert_eq!(ev.threshold, 2000.0);
        assert_eq!(ev.actual_value, 2500.0);
    }

    #[test]
    fn falls_back_to_default_rules() {
        let rules = ThresholdRuleSet::from_json(
            &serde_json::json!({ "__default__": { "latency": 100 } }),
        );
        let rec = record("unlisted_service", &[("latency", 150.0)]);
        assert!(evaluate(&rec, &rules).0);
    }

    #[test]
    fn no_rules_means_no_violation() {
        let rules = ThresholdRuleSet::default();
        let rec = record("web_server", &[("response_time", 999999.0)]);
        assert!(!evaluate(&rec, &rules).0);
    }
}

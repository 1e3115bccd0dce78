use crate::features;
use crate::model::ModelService;
use crate::model_types::{Cause, FeatureVector, ParsedRecord, Verdict};
use crate::rules::{self, ThresholdRuleSet};

/// Combine the rule verdict and the model score into a final per-log
/// verdict. Rule violations always win, regardless of model state.
pub fn decide(
    record: &ParsedRecord,
    rules: &ThresholdRuleSet,
    model: &ModelService,
) -> (Verdict, FeatureVector) {
    let schema = model.schema();
    let vector = features::extract(record, &schema);

    let (violated, evidence) = rules::evaluate(record, rules);
    if violated {
        return (
            Verdict {
                score: 1.0,
                is_anomaly: true,
                cause: Cause::Rule,
                evidence,
            },
            vector,
        );
    }

    if !model.is_trained() {
        return (
            Verdict {
                score: 0.0,
                is_anomaly: false,
                cause: Cause::None,
                evidence: None,
            },
            vector,
        );
    }

    let score = model.score(&vector);
    let is_anomaly = model.is_anomaly_by_model(score);
    (
        Verdict {
            score,
            is_anomaly,
            cause: if is_anomaly { Cause::Model } else { Cause::None },
            evidence: None,
        },
        vector,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::FieldValue;
    use chrono::Utc;
    use std::collections::HashMap;

    fn parsed(service: &str, response_time: f64) -> ParsedRecord {
        let mut fields = HashMap::new();
        fields.insert("response_time".to_string(), FieldValue::Numeric(response_time));
        ParsedRecord {
            service: service.to_string(),
            source: "nginx".to_string(),
            timestamp: Utc::now(),
            level: None,
            fields,
            raw_log: String::new(),
        }
    }

    #[test]
    fn rule_dominance_over_untrained_model() {
        let rules = ThresholdRuleSet::from_json(
            &serde_json::json!({ "web_server": { "response_time": 2000 } }),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.bin").to_str().unwrap().to_string();
        let model = ModelService::new(path, 0.75, 0.05);
        let record = parsed("web_server", 2500.0);
        let (verdict, _) = decide(&record, &rules, &model);
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.is_anomaly);
        assert!(matches!(verdict.cause, Cause::Rule));
    }

    #[test]
    fn untrained_neutrality_without_rule_hit() {
        let rules = ThresholdRuleSet::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.bin").to_str().unwrap().to_string();
        let model = ModelService::new(path, 0.75, 0.05);
        let record = parsed("web_server", 150.0);
        let (verdict, _) = decide(&record, &rules, &model);
        assert!(!verdict.is_anomaly);
        assert!(matches!(verdict.cause, Cause::None));
    }
}

use crate::decision;
use crate::error::AppError;
use crate::model_types::{AnomalyRecord, ApiVerdict, LogRecord};
use crate::state::AppState;

/// The per-batch pipeline: parse -> featurize -> decide for every log, in
/// order; anomalies fan out to history and the rate aggregator without
/// blocking response assembly. Response order always matches input order.
pub fn process_batch(logs: &[LogRecord], state: &AppState) -> Result<Vec<ApiVerdict>, AppError> {
    if logs.is_empty() {
        return Err(AppError::NoLogsProvided);
    }

    let mut responses = Vec::with_capacity(logs.len());

    for log in logs {
        let parsed = crate::parser::parse(log);
        let (verdict, features) = decision::decide(&parsed, &state.rules, &state.model);

        state.metrics.record_prediction(&log.service, verdict.is_anomaly);

        if verdict.is_anomaly {
            let mut metadata = serde_json::json!({});
            if let Some(evidence) = &verdict.evidence {
                metadata = serde_json::json!({
                    "violated_rule": evidence.rule_name,
                    "threshold": evidence.threshold,
                    "actual_value": evidence.actual_value,
                });
            }
            let record = AnomalyRecord {
                timestamp: parsed.timestamp,
                service: parsed.service.clone(),
                source: parsed.source.clone(),
                log_level: parsed.level.clone(),
                message: parsed.raw_log.clone(),
                anomaly_score: verdict.score,
                rule_violation: matches!(verdict.cause, crate::model_types::Cause::Rule),
                features,
                raw_log: parsed.raw_log.clone(),
                metadata,
                context: serde_json::json!({ "cause": format!("{:?}", verdict.cause) }),
            };
            state.history.append(record.clone());
            state.rate.record_anomaly(&record.service, &record);
        }

        responses.push(ApiVerdict::from(&verdict));
    }

    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::FormatType;

    fn log(raw: &str) -> LogRecord {
        LogRecord {
            raw_log: raw.to_string(),
            service: "web_server".to_string(),
            source: "nginx".to_string(),
            format_type: FormatType::Json,
            custom_config: None,
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        let state = AppState::for_test();
        assert!(matches!(
            process_batch(&[], &state),
            Err(AppError::NoLogsProvided)
        ));
    }

    #[test]
    fn order_preservation() {
        let state = AppState::for_test();
        let logs = vec![
            log(r#"{"response_time": 10}"#),
            log(r#"{"response_time": 20}"#),
            log(r#"{"response_time": 30}"#),
        ];
        let responses = process_batch(&logs, &state).unwrap();
        assert_eq!(responses.len(), 3);
    }

    #[test]
    fn rule_violation_produces_anomaly_record() {
        let state = AppState::for_test_with_rules(
            serde_json::json!({ "web_server": { "response_time": 2000 } }),
        );
        let logs = vec![log(r#"{"response_time": 2500}"#)];
        let responses = process_batch(&logs, &state).unwrap();
        assert_eq!(responses[0].is_anomaly, 1);
        assert_eq!(responses[0].score, 1.0);

        let recent = state.history.recent(10);
        assert_eq!(recent.len(), 1);
        assert!(recent[0].rule_violation);
        assert_eq!(recent[0].metadata["violated_rule"], "response_time");
        assert_eq!(recent[0].metadata["threshold"], 2000.0);
        assert_eq!(recent[0].metadata["actual_value"], 2500.0);
    }
}

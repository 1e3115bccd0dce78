use crate::config::Config;
use crate::feedback::FeedbackStore;
use crate::history::AnomalyHistory;
use crate::metrics::Metrics;
use crate::model::ModelService;
use crate::rate::RateAggregator;
use crate::rules::ThresholdRuleSet;
use crate::sinks::{AlertSink, GenericWebhookSink, PagerDutySink, SlackSink};
use std::sync::Arc;

/// Long-lived, shared context passed to every handler — the single place
/// that owns the model, history, rate windows, feedback store and metrics,
/// each with its own synchronization primitive (spec §9's "single
/// long-lived context struct" design note).
pub struct AppState {
    pub model: Arc<ModelService>,
    pub rules: ThresholdRuleSet,
    pub history: Arc<AnomalyHistory>,
    pub rate: Arc<RateAggregator>,
    pub feedback: Arc<FeedbackStore>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let model = ModelService::new(
            config.model_path.clone(),
            config.anomaly_threshold,
            config.model_contamination,
        );
        let rules = ThresholdRuleSet::from_json(&config.alert_conditions);
        let history = Arc::new(AnomalyHistory::new(config.max_recent_anomalies));
        let sinks = build_sinks(config);
        let rate = RateAggregator::new(&config.complex_alert_rules, sinks);
        let feedback = Arc::new(FeedbackStore::new(config.max_recent_anomalies));
        let metrics = Arc::new(Metrics::new());

        Self {
            model,
            rules,
            history,
            rate,
            feedback,
            metrics,
        }
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::for_test_with_rules(serde_json::json!({}))
    }

    #[cfg(test)]
    pub fn for_test_with_rules(alert_conditions: serde_json::Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.bin").to_str().unwrap().to_string();
        std::mem::forget(dir);
        Self {
            model: ModelService::new(model_path, 0.75, 0.05),
            rules: ThresholdRuleSet::from_json(&alert_conditions),
            history: Arc::new(AnomalyHistory::new(500)),
            rate: RateAggregator::new(&serde_json::json!({}), vec![]),
            feedback: Arc::new(FeedbackStore::new(500)),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

fn build_sinks(config: &Config) -> Vec<Arc<dyn AlertSink>> {
    let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();
    if let Some(url) = &config.slack_webhook_url {
        sinks.push(Arc::new(SlackSink::new(url.clone())));
    }
    if let Some(key) = &config.pagerduty_routing_key {
        sinks.push(Arc::new(PagerDutySink::new(key.clone())));
    }
    if let Some(url) = &config.generic_webhook_url {
        sinks.push(Arc::new(GenericWebhookSink::new(url.clone())));
    }
    sinks
}

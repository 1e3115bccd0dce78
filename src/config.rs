use std::env;

/// Process-wide configuration, loaded once from the environment in `main`.
///
/// Mirrors the teacher's habit of pulling everything out of `env::var` in
/// `main()` itself; this just gives that block a name and a single call site.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    pub model_path: String,
    pub model_contamination: f64,
    pub anomaly_threshold: f64,
    pub max_recent_anomalies: usize,
    pub alert_conditions: serde_json::Value,
    pub complex_alert_rules: serde_json::Value,
    pub slack_webhook_url: Option<String>,
    pub pagerduty_routing_key: Option<String>,
    pub generic_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);
        let model_path = env::var("MODEL_PATH")
            .unwrap_or_else(|_| "models/isolation_forest_model.bin".to_string());
        let model_contamination = env::var("MODEL_CONTAMINATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.05);
        let anomaly_threshold = env::var("ANOMALY_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.75);
        let max_recent_anomalies = env::var("MAX_RECENT_ANOMALIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        let alert_conditions = env::var("ALERT_CONDITIONS")
            .ok()
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_else(|| serde_json::json!({}));
        let complex_alert_rules = env::var("COMPLEX_ALERT_RULES")
            .ok()
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_else(|| serde_json::json!({}));

        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            api_host,
            api_port,
            model_path,
            model_contamination,
            anomaly_threshold,
            max_recent_anomalies,
            alert_conditions,
            complex_alert_rules,
            slack_webhook_url: non_empty("SLACK_WEBHOOK_URL"),
            pagerduty_routing_key: non_empty("PAGERDUTY_ROUTING_KEY"),
            generic_webhook_url: non_empty("GENERIC_WEBHOOK_URL"),
        }
    }
}

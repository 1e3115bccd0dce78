use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dynamic log field: either numeric or text, never an untyped value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Numeric(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    Json,
    KeyValue,
    Regex,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomConfig {
    pub pattern: Option<String>,
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,
}

/// Raw input log, as submitted by a caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogRecord {
    pub raw_log: String,
    pub service: String,
    pub source: String,
    pub format_type: FormatType,
    #[serde(default)]
    pub custom_config: Option<CustomConfig>,
}

/// A log after format-specific parsing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub service: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub level: Option<String>,
    pub fields: HashMap<String, FieldValue>,
    pub raw_log: String,
}

/// Ordered list of field names bound to the currently trained model.
pub type FeatureSchema = Vec<String>;

/// Positional numeric projection of a `ParsedRecord` under a `FeatureSchema`.
pub type FeatureVector = Vec<f64>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cause {
    Rule,
    Model,
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    pub rule_name: String,
    pub threshold: f64,
    pub actual_value: f64,
}

/// Full internal verdict, including provenance not exposed to API callers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub is_anomaly: bool,
    pub cause: Cause,
    pub evidence: Option<Evidence>,
}

/// What the `/stream/multi-source` response actually carries per log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiVerdict {
    pub score: f64,
    pub is_anomaly: u8,
}

impl From<&Verdict> for ApiVerdict {
    fn from(v: &Verdict) -> Self {
        ApiVerdict {
            score: v.score,
            is_anomaly: v.is_anomaly as u8,
        }
    }
}

/// A verdict that tipped into `is_anomaly = 1`, kept in history and fed to
/// the rate aggregator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub source: String,
    pub log_level: Option<String>,
    pub message: String,
    pub anomaly_score: f64,
    pub rule_violation: bool,
    pub features: FeatureVector,
    pub raw_log: String,
    pub metadata: serde_json::Value,
    pub context: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub log: LogRecord,
    pub is_anomaly: u8,
    pub ingest_time: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceCounters {
    pub prediction_count: u64,
    pub anomaly_count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub prediction_count: u64,
    pub anomaly_count: u64,
    pub last_trained: Option<DateTime<Utc>>,
    pub feedback_received: u64,
    pub model_accuracy: f64,
    pub per_service: HashMap<String, ServiceCounters>,
}

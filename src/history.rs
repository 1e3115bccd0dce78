use crate::model_types::AnomalyRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded ring of recent anomalies. All mutators and readers coordinate
/// under a single short-held lock — writes are O(1) so that's sufficient.
pub struct AnomalyHistory {
    capacity: usize,
    records: Mutex<VecDeque<AnomalyRecord>>,
}

impl AnomalyHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn append(&self, record: AnomalyRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AnomalyRecord> {
        let records = self.records.lock();
        records.iter().rev().take(limit).cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(msg: &str) -> AnomalyRecord {
        AnomalyRecord {
            timestamp: Utc::now(),
            service: "web_server".to_string(),
            source: "nginx".to_string(),
            log_level: None,
            message: msg.to_string(),
            anomaly_score: 1.0,
            rule_violation: true,
            features: vec![],
            raw_log: msg.to_string(),
            metadata: serde_json::json!({}),
            context: serde_json::json!({}),
        }
    }

    #[test]
    fn bounded_history_evicts_oldest() {
        let history = AnomalyHistory::new(3);
        for name in ["A", "B", "C", "D", "E"] {
            history.append(record(name));
        }
        let recent = history.recent(10);
        let messages: Vec<&str> = recent.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["E", "D", "C"]);
    }

    #[test]
    fn idempotent_clear() {
        let history = AnomalyHistory::new(3);
        history.append(record("A"));
        history.clear();
        history.clear();
        assert!(history.recent(10).is_empty());
    }
}

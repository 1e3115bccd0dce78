use crate::model_types::{ServiceCounters, ServiceMetrics};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters, safe for many concurrent writers. Per-service
/// breakdown sits behind a small mutex since it's written far less often
/// than the hot-path prediction counter.
pub struct Metrics {
    prediction_count: AtomicU64,
    anomaly_count: AtomicU64,
    feedback_received: AtomicU64,
    per_service: Mutex<HashMap<String, ServiceCounters>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            prediction_count: AtomicU64::new(0),
            anomaly_count: AtomicU64::new(0),
            feedback_received: AtomicU64::new(0),
            per_service: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_prediction(&self, service: &str, is_anomaly: bool) {
        self.prediction_count.fetch_add(1, Ordering::Relaxed);
        if is_anomaly {
            self.anomaly_count.fetch_add(1, Ordering::Relaxed);
        }
        let mut per_service = self.per_service.lock();
        let counters = per_service.entry(service.to_string()).or_default();
        counters.prediction_count += 1;
        if is_anomaly {
            counters.anomaly_count += 1;
        }
    }

    pub fn record_feedback(&self, count: u64) {
        self.feedback_received.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, last_trained: Option<chrono::DateTime<chrono::Utc>>) -> ServiceMetrics {
        let prediction_count = self.prediction_count.load(Ordering::Relaxed);
        let anomaly_count = self.anomaly_count.load(Ordering::Relaxed);
        let model_accuracy = if prediction_count == 0 {
            0.0
        } else {
            1.0 - (anomaly_count as f64 / prediction_count as f64)
        };
        ServiceMetrics {
            prediction_count,
            anomaly_count,
            last_trained,
            feedback_received: self.feedback_received.load(Ordering::Relaxed),
            model_accuracy,
            per_service: self.per_service.lock().clone(),
        }
    }
}

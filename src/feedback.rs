use crate::model_types::FeedbackEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Captures labeled examples for later retraining. Bounded; overflow drops
/// the oldest entry. Retraining is never auto-triggered by feedback intake
/// (spec's open question: feedback is stored-and-exposed, not auto-consumed).
pub struct FeedbackStore {
    cap: usize,
    entries: Mutex<VecDeque<FeedbackEntry>>,
}

impl FeedbackStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Mutex::new(VecDeque::with_capacity(cap)),
        }
    }

    pub fn ingest(&self, new_entries: Vec<FeedbackEntry>) -> usize {
        let mut entries = self.entries.lock();
        for entry in new_entries {
            if entries.len() >= self.cap {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::{FormatType, LogRecord};
    use chrono::Utc;

    fn entry() -> FeedbackEntry {
        FeedbackEntry {
            log: LogRecord {
                raw_log: "{}".to_string(),
                service: "svc".to_string(),
                source: "src".to_string(),
                format_type: FormatType::Json,
                custom_config: None,
            },
            is_anomaly: 0,
            ingest_time: Utc::now(),
        }
    }

    #[test]
    fn drops_oldest_on_overflow() {
        let store = FeedbackStore::new(2);
        let remaining = store.ingest(vec![entry(), entry(), entry()]);
        assert_eq!(remaining, 2);
    }
}

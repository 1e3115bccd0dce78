mod isolation_forest;

pub use isolation_forest::IsolationForest;

use crate::features;
use crate::model_types::{FeatureSchema, LogRecord};
use crate::parser;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// The `(FeatureSchema, Model)` pair, swapped atomically on retraining.
/// `forest` is `None` in the untrained state.
#[derive(Clone, Serialize, Deserialize)]
struct ModelState {
    schema: FeatureSchema,
    forest: Option<IsolationForest>,
}

impl ModelState {
    fn untrained() -> Self {
        Self {
            schema: Vec::new(),
            forest: None,
        }
    }
}

struct TrainingJob {
    batch: Vec<LogRecord>,
}

/// Owns the single outlier-scoring model for the process.
///
/// Readers (`score`) take `state` only long enough to clone the `Arc`, so a
/// concurrent `score` call always sees one fully-formed `(schema, model)`
/// pair, never a torn mix of old and new (spec §5's atomic-swap guarantee).
pub struct ModelService {
    state: RwLock<Arc<ModelState>>,
    model_path: String,
    anomaly_threshold: f64,
    model_contamination: f64,
    last_trained: RwLock<Option<DateTime<Utc>>>,
    training_tx: watch::Sender<Option<TrainingJob>>,
}

impl ModelService {
    pub fn new(model_path: String, anomaly_threshold: f64, model_contamination: f64) -> Arc<Self> {
        let (training_tx, training_rx) = watch::channel(None);
        let service = Arc::new(Self {
            state: RwLock::new(Arc::new(ModelState::untrained())),
            model_path,
            anomaly_threshold,
            model_contamination,
            last_trained: RwLock::new(None),
            training_tx,
        });
        service.load();
        ModelService::spawn_training_worker(service.clone(), training_rx);
        service
    }

    /// Attempt to bind `(schema, model)` from `MODEL_PATH`. Leaves the
    /// service in the untrained state on any failure.
    fn load(&self) {
        let Ok(bytes) = std::fs::read(&self.model_path) else {
            return;
        };
        match bincode::deserialize::<ModelState>(&bytes) {
            Ok(state) => {
                log::info!("loaded model from {} (schema width {})", self.model_path, state.schema.len());
                *self.state.write() = Arc::new(state);
            }
            Err(e) => {
                log::warn!("failed to deserialize model at {}: {e}", self.model_path);
            }
        }
    }

    fn persist(&self, state: &ModelState) {
        let Ok(bytes) = bincode::serialize(state) else {
            log::error!("failed to serialize model for persistence");
            return;
        };
        if let Some(parent) = std::path::Path::new(&self.model_path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let tmp_path = format!("{}.tmp", self.model_path);
        if std::fs::write(&tmp_path, bytes).is_err() {
            log::error!("failed to write temp model file {tmp_path}");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.model_path) {
            log::error!("failed to atomically rename model file: {e}");
        }
    }

    /// Synchronous, read-only, non-blocking score in `[0, 1]`.
    /// Untrained state always returns a neutral, non-anomalous score.
    pub fn score(&self, vector: &[f64]) -> f64 {
        let state = self.state.read().clone();
        match &state.forest {
            Some(forest) => forest.score(vector),
            None => 0.0,
        }
    }

    pub fn is_anomaly_by_model(&self, score: f64) -> bool {
        self.is_trained() && score > self.anomaly_threshold
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().forest.is_some()
    }

    pub fn schema(&self) -> FeatureSchema {
        self.state.read().schema.clone()
    }

    pub fn last_trained(&self) -> Option<DateTime<Utc>> {
        *self.last_trained.read()
    }

    /// Enqueue a training job over `batch`. If a job is already queued, it
    /// is replaced (coalesced) by this one; at most one job is queued and
    /// one running at any time. Returns a job id immediately.
    pub fn submit_training(&self, batch: Vec<LogRecord>) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        let _ = self.training_tx.send(Some(TrainingJob { batch }));
        job_id
    }

    /// Runs the training loop on its own single-threaded runtime, off the
    /// HTTP server's reactor, so training never competes with request
    /// handling for poll time and construction never depends on the
    /// caller already being inside a Tokio context (tests build a
    /// `ModelService` from plain `#[test]` functions).
    fn spawn_training_worker(service: Arc<ModelService>, mut rx: watch::Receiver<Option<TrainingJob>>) {
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to start training worker runtime");
            rt.block_on(async move {
                loop {
                    if rx.changed().await.is_err() {
                        return;
                    }
                    let job = { rx.borrow_and_update().as_ref().map(|j| j.batch.clone()) };
                    let Some(batch) = job else { continue };
                    service.run_training_job(batch);
                }
            });
        });
    }

    fn run_training_job(&self, batch: Vec<LogRecord>) {
        if batch.is_empty() {
            log::warn!("training job received an empty batch, skipping");
            return;
        }

        let parsed: Vec<_> = batch.iter().map(parser::parse).collect();

        let mut field_names: BTreeSet<String> = BTreeSet::new();
        for record in &parsed {
            for (name, value) in &record.fields {
                if value.as_numeric().is_some() {
                    field_names.insert(name.clone());
                }
            }
        }
        let schema: FeatureSchema = field_names.into_iter().collect();

        let vectors: Vec<Vec<f64>> = parsed
            .iter()
            .map(|record| features::extract(record, &schema))
            .collect();

        match IsolationForest::fit(&vectors, self.model_contamination) {
            Ok(forest) => {
                let new_state = ModelState {
                    schema,
                    forest: Some(forest),
                };
                self.persist(&new_state);
                *self.state.write() = Arc::new(new_state);
                *self.last_trained.write() = Some(Utc::now());
                log::info!("training succeeded, model swapped and persisted");
            }
            Err(e) => {
                log::error!("training failed, retaining prior model: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_types::FormatType;

    fn log(raw: &str, response_time: &str) -> LogRecord {
        LogRecord {
            raw_log: raw.replace("{rt}", response_time),
            service: "web_server".to_string(),
            source: "nginx".to_string(),
            format_type: FormatType::Json,
            custom_config: None,
        }
    }

    #[test]
    fn untrained_model_is_always_neutral() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin").to_str().unwrap().to_string();
        let service = ModelService::new(path, 0.75, 0.05);
        assert!(!service.is_trained());
        assert_eq!(service.score(&[1.0, 2.0]), 0.0);
        assert!(!service.is_anomaly_by_model(0.99));
    }

    #[tokio::test]
    async fn training_then_score_sees_consistent_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin").to_str().unwrap().to_string();
        let service = ModelService::new(path, 0.75, 0.05);

        let batch: Vec<LogRecord> = (0..50)
            .map(|i| log(r#"{"response_time": {rt}}"#, &(100 + i % 5).to_string()))
            .collect();
        service.submit_training(batch);

        for _ in 0..50 {
            if service.is_trained() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(service.is_trained());
        assert_eq!(service.schema(), vec!["response_time".to_string()]);
    }
}

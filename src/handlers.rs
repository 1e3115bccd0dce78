use crate::error::AppError;
use crate::model_types::{FeedbackEntry, LogRecord};
use crate::orchestrator;
use crate::state::AppState;
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

#[get("/")]
pub async fn liveness() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "message": "ok" }))
}

#[get("/metrics")]
pub async fn metrics(state: web::Data<Arc<AppState>>) -> impl Responder {
    let snapshot = state.metrics.snapshot(state.model.last_trained());
    HttpResponse::Ok().json(snapshot)
}

#[derive(Deserialize)]
pub struct StreamRequest {
    pub logs: Vec<LogRecord>,
    #[serde(default)]
    pub tags: Option<serde_json::Value>,
}

#[post("/stream/multi-source")]
pub async fn stream_multi_source(
    state: web::Data<Arc<AppState>>,
    body: web::Json<StreamRequest>,
) -> Result<HttpResponse, AppError> {
    let verdicts = orchestrator::process_batch(&body.logs, &state)?;
    Ok(HttpResponse::Ok().json(verdicts))
}

#[derive(Deserialize)]
pub struct AnomaliesQuery {
    limit: Option<usize>,
}

#[get("/anomalies")]
pub async fn list_anomalies(
    state: web::Data<Arc<AppState>>,
    query: web::Query<AnomaliesQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    HttpResponse::Ok().json(state.history.recent(limit))
}

#[delete("/anomalies")]
pub async fn clear_anomalies(state: web::Data<Arc<AppState>>) -> impl Responder {
    state.history.clear();
    HttpResponse::Ok().json(serde_json::json!({ "message": "history cleared" }))
}

#[derive(Deserialize)]
pub struct TrainRequest {
    pub logs: Vec<LogRecord>,
}

#[post("/train")]
pub async fn train(
    state: web::Data<Arc<AppState>>,
    body: web::Json<TrainRequest>,
) -> Result<HttpResponse, AppError> {
    if body.logs.is_empty() {
        return Err(AppError::NoLogsProvided);
    }
    let job_id = state.model.submit_training(body.logs.clone());
    Ok(HttpResponse::Accepted().json(serde_json::json!({ "message": "training enqueued", "job_id": job_id })))
}

#[derive(Deserialize)]
pub struct FeedbackItem {
    pub log: LogRecord,
    pub is_anomaly: u8,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Vec<FeedbackItem>,
}

#[post("/feedback")]
pub async fn feedback(
    state: web::Data<Arc<AppState>>,
    body: web::Json<FeedbackRequest>,
) -> impl Responder {
    let now = Utc::now();
    let entries: Vec<FeedbackEntry> = body
        .feedback
        .iter()
        .map(|item| FeedbackEntry {
            log: item.log.clone(),
            is_anomaly: item.is_anomaly,
            ingest_time: now,
        })
        .collect();
    let received = entries.len() as u64;
    state.feedback.ingest(entries);
    state.metrics.record_feedback(received);
    HttpResponse::Ok().json(serde_json::json!({ "message": "feedback received", "count": received }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(liveness)
            .service(metrics)
            .service(stream_multi_source)
            .service(list_anomalies)
            .service(clear_anomalies)
            .service(train)
            .service(feedback),
    );
}

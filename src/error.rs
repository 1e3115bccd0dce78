use std::fmt;

/// Service error kinds, per the propagation policy: per-log errors never
/// abort a batch, per-batch errors map to 400, everything else to 500.
///
/// The teacher never reaches for `thiserror`/`anyhow` — it propagates
/// `Box<dyn std::error::Error>` and writes the JSON mapping by hand in each
/// handler. This keeps that idiom instead of introducing a derive macro.
#[derive(Debug)]
pub enum AppError {
    MalformedInput(String),
    MissingConfig(String),
    NoLogsProvided,
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MalformedInput(msg) => write!(f, "malformed input: {msg}"),
            AppError::MissingConfig(msg) => write!(f, "missing config: {msg}"),
            AppError::NoLogsProvided => write!(f, "no logs provided"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            AppError::MalformedInput(_) | AppError::MissingConfig(_) | AppError::NoLogsProvided => {
                actix_web::http::StatusCode::BAD_REQUEST
            }
            AppError::Internal(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code())
            .json(serde_json::json!({ "detail": self.to_string() }))
    }
}

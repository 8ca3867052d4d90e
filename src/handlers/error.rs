use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::context::ErrorReport;

// Handler failure, carries the report the listener picks up
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub report: ErrorReport,
}

impl AppError {
    #[track_caller]
    pub fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            report: ErrorReport::here(kind, message),
        }
    }

    #[track_caller]
    pub fn internal(kind: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, kind, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // clients only see the message, the location stays server side
        let body = Json(serde_json::json!({
            "error": self.report.message,
        }));
        let mut response = (self.status, body).into_response();
        response.extensions_mut().insert(self.report);
        response
    }
}

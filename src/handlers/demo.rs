use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

use super::error::AppError;
use crate::context::RequestContext;

// Longest sleep /demo/slow will honour
const MAX_SLEEP_MS: u64 = 5_000;

#[derive(Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

#[derive(Deserialize)]
pub struct StatusParams {
    pub code: u16,
}

#[derive(Deserialize)]
pub struct NotifyBody {
    pub text: String,
}

// always fails, exercises error notifications
pub async fn fail_handler() -> Result<Json<Value>, AppError> {
    Err(AppError::internal("DemoFailure", "requested failure"))
}

// unwinds through the listener like any unhandled bug would
pub async fn panic_handler() -> Json<Value> {
    panic!("requested panic");
}

// bare status, no AppError attached
pub async fn status_handler(Query(params): Query<StatusParams>) -> StatusCode {
    StatusCode::from_u16(params.code).unwrap_or(StatusCode::BAD_REQUEST)
}

pub async fn slow_handler(Query(params): Query<SlowParams>) -> Json<Value> {
    let ms = params.ms.min(MAX_SLEEP_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({ "slept_ms": ms }))
}

// queue a custom message on the current request
pub async fn notify_handler(
    Extension(ctx): Extension<Arc<RequestContext>>,
    Json(body): Json<NotifyBody>,
) -> Json<Value> {
    ctx.queue().enqueue(json!({ "text": body.text }));
    Json(json!({ "queued": ctx.queue().len() }))
}

// Request listener: times the handler, reports failures and slow requests,
// then hands what the request queued to the worker. Nothing here may fail the response.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use axum::Json;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;

use crate::context::{ErrorReport, RequestContext, UserIdentity};
use crate::memory::{MemorySample, request_megabytes};
use crate::message::RequestSummary;
use crate::metrics::{
    ANALYSIS_FAILURES, HANDLER_PANICS, NOTIFICATIONS_DROPPED, REQUEST_LATENCY, REQUESTS_OBSERVED,
};
use crate::perf_log::PerformanceEntry;
use crate::state::AppState;
use crate::worker::DrainJob;

pub async fn monitor(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    REQUESTS_OBSERVED.inc();
    let memory_before = MemorySample::take();

    let ctx = RequestContext::new();
    if let Some(user) = req.extensions().get::<UserIdentity>().cloned() {
        ctx.set_user(user);
    }
    req.extensions_mut().insert(ctx.clone());

    let summary = RequestSummary {
        method: req.method().to_string(),
        url: req.uri().to_string(),
        route: req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string()),
    };

    // a panicking handler still gets a 500 and a report
    let (response, report) = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => {
            let report = failure_report(&response);
            (response, report)
        }
        Err(panic) => {
            HANDLER_PANICS.inc();
            let report = ErrorReport::panic(panic.as_ref());
            tracing::error!(route = %summary.route, message = %report.message, "Handler panicked");
            (panic_response(), Some(report))
        }
    };

    let megabytes = request_megabytes(memory_before, MemorySample::take());
    finish(&state, &ctx, &summary, report.as_ref(), megabytes);

    response
}

// Any 5xx counts, with the handler's own report when it attached one
fn failure_report(response: &Response) -> Option<ErrorReport> {
    let status = response.status();
    if !status.is_server_error() {
        return None;
    }

    Some(
        response
            .extensions()
            .get::<ErrorReport>()
            .cloned()
            .unwrap_or_else(|| ErrorReport::status(status)),
    )
}

fn panic_response() -> Response {
    let body = Json(serde_json::json!({ "error": "Internal Server Error" }));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

// Terminal step, runs once per request after the response exists
fn finish(
    state: &AppState,
    ctx: &RequestContext,
    summary: &RequestSummary,
    report: Option<&ErrorReport>,
    megabytes: f64,
) {
    let seconds = ctx.started().elapsed().as_secs_f64();
    REQUEST_LATENCY.observe(seconds);

    let performance =
        match catch_unwind(AssertUnwindSafe(|| analyze(state, ctx, summary, report, seconds, megabytes))) {
            Ok(performance) => performance,
            Err(_) => {
                ANALYSIS_FAILURES.inc();
                tracing::error!(route = %summary.route, "Request analysis panicked, its notifications are skipped");
                None
            }
        };

    hand_off(state, ctx, performance);
}

// Queue messages for this request, returns the entry to log if it crossed the threshold
fn analyze(
    state: &AppState,
    ctx: &RequestContext,
    summary: &RequestSummary,
    report: Option<&ErrorReport>,
    seconds: f64,
    megabytes: f64,
) -> Option<PerformanceEntry> {
    let settings = &state.settings;
    let user = ctx.user();

    if let Some(report) = report {
        if reports_errors_for(&settings.error_roles, user.as_ref()) {
            ctx.queue().enqueue(state.formatter.error(
                report,
                summary,
                user.as_ref(),
                settings.project_dir.as_deref(),
            ));
        }
    }

    let entry = PerformanceEntry {
        method: summary.method.clone(),
        url: summary.url.clone(),
        route: summary.route.clone(),
        seconds,
        megabytes,
    };

    if !entry.crosses(settings.performance_logging_threshold) {
        return None;
    }

    ctx.queue().enqueue(state.formatter.performance(&entry, user.as_ref()));
    Some(entry)
}

/// Errors are reported for everyone when no roles are configured, otherwise
/// only for users holding one of them.
pub fn reports_errors_for(error_roles: &[String], user: Option<&UserIdentity>) -> bool {
    if error_roles.is_empty() {
        return true;
    }
    user.is_some_and(|u| u.has_any_role(error_roles))
}

// Always sends a job, the worker also owns log writing and cleanup
fn hand_off(state: &AppState, ctx: &RequestContext, performance: Option<PerformanceEntry>) {
    let job = DrainJob {
        messages: ctx.queue().take(),
        performance,
        finished_at: Utc::now(),
    };

    match state.jobs.try_send(job) {
        Ok(()) => {}
        Err(TrySendError::Full(job)) => {
            NOTIFICATIONS_DROPPED.inc_by(job.messages.len() as f64);
            tracing::warn!(count = job.messages.len(), "Notification worker is saturated, dropping request");
        }
        Err(TrySendError::Closed(job)) => {
            NOTIFICATIONS_DROPPED.inc_by(job.messages.len() as f64);
            tracing::warn!(count = job.messages.len(), "Notification worker has stopped, dropping request");
        }
    }
}

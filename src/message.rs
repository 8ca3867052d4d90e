// Slack payloads: a `text` fallback plus header and fields sections

use std::path::Path;

use serde_json::{Value, json};

use crate::context::{ErrorReport, UserIdentity};
use crate::perf_log::PerformanceEntry;

// Request attributes shared by both messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub method: String,
    pub url: String,
    pub route: String,
}

// `file` relative to `project_dir` when it lives under it
pub fn shorten_path(file: &str, project_dir: Option<&Path>) -> String {
    let Some(root) = project_dir else {
        return file.to_string();
    };

    match Path::new(file).strip_prefix(root) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => file.to_string(),
    }
}

fn user_label(user: Option<&UserIdentity>) -> String {
    match user {
        Some(u) if u.roles.is_empty() => u.username.clone(),
        Some(u) => format!("{} ({})", u.username, u.roles.join(", ")),
        None => "anonymous".to_string(),
    }
}

fn field(label: &str, value: impl std::fmt::Display) -> Value {
    json!({
        "type": "mrkdwn",
        "text": format!("*{label}*\n{value}")
    })
}

fn payload(headline: String, fields: Vec<Value>) -> Value {
    json!({
        "text": headline,
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": headline }
            },
            {
                "type": "section",
                "fields": fields
            }
        ]
    })
}

/// Turns listener events into webhook payloads.
pub trait MessageFormatter: Send + Sync {
    fn error(
        &self,
        report: &ErrorReport,
        request: &RequestSummary,
        user: Option<&UserIdentity>,
        project_dir: Option<&Path>,
    ) -> Value;

    fn performance(&self, entry: &PerformanceEntry, user: Option<&UserIdentity>) -> Value;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SlackFormatter;

impl MessageFormatter for SlackFormatter {
    fn error(
        &self,
        report: &ErrorReport,
        request: &RequestSummary,
        user: Option<&UserIdentity>,
        project_dir: Option<&Path>,
    ) -> Value {
        error_message(report, request, user, project_dir)
    }

    fn performance(&self, entry: &PerformanceEntry, user: Option<&UserIdentity>) -> Value {
        performance_message(entry, user)
    }
}

pub fn error_message(
    report: &ErrorReport,
    request: &RequestSummary,
    user: Option<&UserIdentity>,
    project_dir: Option<&Path>,
) -> Value {
    let headline = format!(":rotating_light: *{}*: {}", report.kind, report.message);
    let location = if report.has_location() {
        format!("`{}:{}`", shorten_path(&report.file, project_dir), report.line)
    } else {
        "unknown".to_string()
    };

    payload(
        headline,
        vec![
            field("Request", format!("{} {}", request.method, request.url)),
            field("Route", &request.route),
            field("Location", location),
            field("User", user_label(user)),
        ],
    )
}

pub fn performance_message(
    entry: &PerformanceEntry,
    user: Option<&UserIdentity>,
) -> Value {
    let headline = format!(
        ":snail: *Slow request* {} {} took {:.3}s using {:.1} MB",
        entry.method, entry.route, entry.seconds, entry.megabytes
    );

    payload(
        headline,
        vec![
            field("URL", &entry.url),
            field("Seconds", format!("{:.3}", entry.seconds)),
            field("Megabytes", format!("{:.1}", entry.megabytes)),
            field("User", user_label(user)),
        ],
    )
}

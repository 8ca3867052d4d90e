use std::any::Any;
use std::panic::Location;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::http::StatusCode;

use crate::queue::RequestQueue;

// Normalized identity handed over by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub username: String,
    pub roles: Vec<String>,
}

impl UserIdentity {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

// A failure seen while serving one request, empty `file` = location unknown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
    pub file: String,
    pub line: u32,
}

impl ErrorReport {
    /// Build a report pointing at the caller's source location.
    #[track_caller]
    pub fn here(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            kind: kind.into(),
            message: message.into(),
            file: location.file().to_string(),
            line: location.line(),
        }
    }

    // A handler unwound instead of returning
    pub fn panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };

        Self {
            kind: "panic".to_string(),
            message,
            file: String::new(),
            line: 0,
        }
    }

    // A server error returned without any report attached
    pub fn status(status: StatusCode) -> Self {
        Self {
            kind: format!("HTTP {}", status.as_u16()),
            message: status.canonical_reason().unwrap_or("Server error").to_string(),
            file: String::new(),
            line: 0,
        }
    }

    pub fn has_location(&self) -> bool {
        !self.file.is_empty()
    }
}

// Lives in the request extensions behind an Arc, dies with the request
#[derive(Debug)]
pub struct RequestContext {
    started: Instant,
    user: Mutex<Option<UserIdentity>>,
    queue: RequestQueue,
}

impl RequestContext {
    pub fn new() -> Arc<Self> {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started: Instant) -> Arc<Self> {
        Arc::new(Self {
            started,
            user: Mutex::new(None),
            queue: RequestQueue::default(),
        })
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn set_user(&self, user: UserIdentity) {
        *self.user.lock().unwrap_or_else(|p| p.into_inner()) = Some(user);
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.user.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_points_at_caller() {
        let report = ErrorReport::here("NotFound", "no such invoice");
        assert!(report.file.ends_with("context.rs"));
        assert_eq!(report.line, line!() - 2);
        assert!(report.has_location());
    }

    #[test]
    fn panic_payloads_become_reports() {
        let owned: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 7));
        let borrowed: Box<dyn Any + Send> = Box::new("unhandled");
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(ErrorReport::panic(owned.as_ref()).message, "index 7 out of range");
        assert_eq!(ErrorReport::panic(borrowed.as_ref()).message, "unhandled");
        let report = ErrorReport::panic(other.as_ref());
        assert_eq!(report.kind, "panic");
        assert_eq!(report.message, "Unknown panic");
        assert!(!report.has_location());
    }

    #[test]
    fn bare_status_report() {
        let report = ErrorReport::status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.kind, "HTTP 503");
        assert_eq!(report.message, "Service Unavailable");
    }

    #[test]
    fn role_matching() {
        let user = UserIdentity::new("ada", ["editor", "admin"]);
        assert!(user.has_any_role(&["admin".to_string()]));
        assert!(!user.has_any_role(&["owner".to_string()]));
        assert!(!user.has_any_role(&[]));
    }
}

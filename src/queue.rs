// Notifications staged during a request and sent after it

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::dispatcher::Dispatcher;
use crate::error::HippoError;
use crate::gate::{AdmitResult, Clock, NotificationGate, RateLimit, SystemClock};
use crate::metrics::{
    DELIVERY_FAILURES, GATE_FAILURES, NOTIFICATIONS_ADMITTED, NOTIFICATIONS_DELIVERED,
    NOTIFICATIONS_DISABLED, NOTIFICATIONS_QUEUED, NOTIFICATIONS_RATE_LIMITED,
};

#[derive(Debug, Default)]
pub struct RequestQueue {
    messages: Mutex<Vec<Value>>,
}

impl RequestQueue {
    pub fn enqueue(&self, payload: Value) {
        NOTIFICATIONS_QUEUED.inc();
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(payload);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Empties the queue; a second call returns nothing
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub rate_limited: usize,
    pub disabled: usize,
    pub failed: usize,
}

// Gate plus dispatcher
#[derive(Debug, Clone)]
pub struct Notifier {
    gate: NotificationGate,
    dispatcher: Option<Dispatcher>,
}

impl Notifier {
    // without a dispatcher the gate is disabled, whatever the limit
    pub fn new(
        cache_dir: impl AsRef<Path>,
        dispatcher: Option<Dispatcher>,
        limit: Option<RateLimit>,
    ) -> Self {
        Self::with_clock(cache_dir, dispatcher, limit, Arc::new(SystemClock))
    }

    pub fn with_clock(
        cache_dir: impl AsRef<Path>,
        dispatcher: Option<Dispatcher>,
        limit: Option<RateLimit>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limit = if dispatcher.is_some() { limit } else { None };
        Self {
            gate: NotificationGate::with_clock(cache_dir, limit, clock),
            dispatcher,
        }
    }

    pub fn gate(&self) -> &NotificationGate {
        &self.gate
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    // The record lock blocks, so admission runs off the async workers
    pub async fn admit(&self) -> Result<AdmitResult, HippoError> {
        let gate = self.gate.clone();
        tokio::task::spawn_blocking(move || gate.try_admit())
            .await
            .map_err(|e| HippoError::Worker(format!("admission task failed: {e}")))?
    }

    /// Admit and send every message in order. Never fails: each error is
    /// logged, counted and the message dropped.
    pub async fn drain_and_dispatch(&self, messages: Vec<Value>) -> DrainReport {
        let mut report = DrainReport::default();

        for payload in messages {
            match self.admit().await {
                Ok(AdmitResult::Admitted) => {
                    NOTIFICATIONS_ADMITTED.inc();
                }
                Ok(AdmitResult::RateLimited) => {
                    NOTIFICATIONS_RATE_LIMITED.inc();
                    report.rate_limited += 1;
                    continue;
                }
                Ok(AdmitResult::Disabled) => {
                    NOTIFICATIONS_DISABLED.inc();
                    report.disabled += 1;
                    continue;
                }
                Err(e) => {
                    GATE_FAILURES.inc();
                    tracing::error!(error = %e, "Notification gate failed, dropping notification");
                    report.failed += 1;
                    continue;
                }
            }

            let Some(dispatcher) = &self.dispatcher else {
                report.disabled += 1;
                continue;
            };

            match dispatcher.send(&payload).await {
                Ok(()) => {
                    NOTIFICATIONS_DELIVERED.inc();
                    report.delivered += 1;
                }
                Err(e) => {
                    DELIVERY_FAILURES.inc();
                    tracing::warn!(error = %e, url = dispatcher.url(), "Notification delivery failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::FixedClock;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;
    use tempfile::tempdir;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn take_empties_queue_in_insertion_order() {
        let queue = RequestQueue::default();
        queue.enqueue(json!({"n": 1}));
        queue.enqueue(json!({"n": 2}));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.take(), vec![json!({"n": 1}), json!({"n": 2})]);
        assert!(queue.is_empty());
        assert!(queue.take().is_empty());
    }

    #[tokio::test]
    async fn no_webhook_means_disabled() {
        let dir = tempdir().unwrap();
        let notifier = Notifier::new(dir.path(), None, Some(RateLimit::new(10)));

        let report = notifier.drain_and_dispatch(vec![json!({"text": "a"})]).await;
        assert_eq!(report, DrainReport { disabled: 1, ..Default::default() });
        assert!(!notifier.gate().record().path().exists());
    }

    #[tokio::test]
    async fn sends_admitted_messages_in_order() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({"text": "first"})))
            .with_status(200)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({"text": "second"})))
            .with_status(200)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dispatcher = Dispatcher::for_url(server.url()).unwrap();
        let notifier = Notifier::with_clock(dir.path(), Some(dispatcher), Some(RateLimit::new(10)), clock());

        let report = notifier
            .drain_and_dispatch(vec![json!({"text": "first"}), json!({"text": "second"})])
            .await;

        assert_eq!(report.delivered, 2);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limited_messages_are_not_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dispatcher = Dispatcher::for_url(server.url()).unwrap();
        // five-minute ceiling of 1
        let notifier = Notifier::with_clock(dir.path(), Some(dispatcher), Some(RateLimit::new(2)), clock());

        let messages = (0..3).map(|n| json!({"text": n})).collect();
        let report = notifier.drain_and_dispatch(messages).await;

        assert_eq!(report, DrainReport { delivered: 1, rate_limited: 2, ..Default::default() });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_delivery_is_dropped_and_drain_continues() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({"text": "boom"})))
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({"text": "fine"})))
            .with_status(204)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let dispatcher = Dispatcher::for_url(server.url()).unwrap();
        let notifier = Notifier::with_clock(dir.path(), Some(dispatcher), Some(RateLimit::new(10)), clock());

        let report = notifier
            .drain_and_dispatch(vec![json!({"text": "boom"}), json!({"text": "fine"})])
            .await;

        assert_eq!(report, DrainReport { delivered: 1, failed: 1, ..Default::default() });
        failing.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn gate_failure_is_swallowed() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("cache");
        std::fs::write(&blocker, "").unwrap();

        let dispatcher = Dispatcher::for_url("http://127.0.0.1:1/").unwrap();
        let notifier = Notifier::new(&blocker, Some(dispatcher), Some(RateLimit::new(10)));

        let report = notifier.drain_and_dispatch(vec![json!({"text": "x"})]).await;
        assert_eq!(report, DrainReport { failed: 1, ..Default::default() });
    }
}

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::config::Settings;
use crate::dispatcher::Dispatcher;
use crate::error::HippoError;
use crate::message::{MessageFormatter, SlackFormatter};
use crate::perf_log::PerformanceLog;
use crate::queue::Notifier;
use crate::worker::{DrainJob, spawn_worker};
// app's shared state

pub struct AppState {
    pub settings: Settings,
    pub formatter: Arc<dyn MessageFormatter>,
    pub jobs: mpsc::Sender<DrainJob>, // hand-off to the drain worker
}

impl AppState {
    pub fn new(settings: Settings, formatter: Arc<dyn MessageFormatter>, jobs: mpsc::Sender<DrainJob>) -> Self {
        Self {
            settings,
            formatter,
            jobs,
        }
    }

    // Build the notifier from settings and spawn its worker (needs a runtime)
    pub fn start(settings: Settings) -> Result<(Arc<Self>, JoinHandle<()>), HippoError> {
        Self::start_with_formatter(settings, Arc::new(SlackFormatter))
    }

    pub fn start_with_formatter(
        settings: Settings,
        formatter: Arc<dyn MessageFormatter>,
    ) -> Result<(Arc<Self>, JoinHandle<()>), HippoError> {
        let dispatcher = settings
            .slack_webhook_url
            .as_deref()
            .map(Dispatcher::for_url)
            .transpose()?;
        let notifier = Notifier::new(&settings.cache_dir, dispatcher, settings.rate_limit());
        let perf_log = PerformanceLog::new(settings.logs_dir.clone());
        let (jobs, handle) = spawn_worker(notifier, perf_log, settings.queue_capacity);

        Ok((Arc::new(Self::new(settings, formatter, jobs)), handle))
    }
}

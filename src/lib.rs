// Rate-limited Slack notifications for failed and slow requests

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod monitor;
pub mod perf_log;
pub mod queue;
pub mod rate_limit;
pub mod state;
pub mod window;
pub mod worker;

pub use config::{Args, Settings};
pub use context::{ErrorReport, RequestContext, UserIdentity};
pub use dispatcher::Dispatcher;
pub use error::HippoError;
pub use gate::{AdmitResult, Clock, NotificationGate, RateLimit, SystemClock};
pub use message::{MessageFormatter, SlackFormatter};
pub use queue::{DrainReport, Notifier, RequestQueue};
pub use rate_limit::{RateLimitStore, SharedRecord};
pub use state::AppState;
pub use window::WindowCounter;

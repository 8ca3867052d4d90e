use std::path::PathBuf;

use clap::Parser;

use crate::gate::RateLimit;

// Default bound on requests waiting for the drain worker
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "hippo")]
#[command(about = "Request monitoring with rate-limited Slack notifications")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "HIPPO_PORT", default_value_t = 8080)]
    pub port: u16,

    // Directory holding the shared rate limit record
    #[arg(long, env = "HIPPO_CACHE_DIR", default_value = "var/cache")]
    pub cache_dir: PathBuf,

    // Roles whose errors are reported (comma-separated, empty = everyone)
    // Example: "admin,developer"
    #[arg(long, env = "HIPPO_ERROR_ROLES", value_delimiter = ',')]
    pub error_roles: Vec<String>,

    // Directory for performance-<date>.log files
    #[arg(long, env = "HIPPO_LOGS_DIR", default_value = "var/log")]
    pub logs_dir: PathBuf,

    // Log and notify only when megabytes * seconds reaches this value
    #[arg(long, env = "HIPPO_PERFORMANCE_LOGGING_THRESHOLD")]
    pub performance_logging_threshold: Option<f64>,

    // Root stripped from file paths in messages
    #[arg(long, env = "HIPPO_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    // Slack incoming webhook, unset disables notifications
    #[arg(long, env = "HIPPO_SLACK_WEBHOOK_URL")]
    pub slack_webhook_url: Option<String>,

    // Notifications per hour, half of it (rounded up) per five minutes
    #[arg(long, env = "HIPPO_SLACK_RATE_LIMIT")]
    pub slack_rate_limit: Option<u32>,

    // Requests whose notifications may wait for the drain worker
    #[arg(long, env = "HIPPO_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

/// Library-facing configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cache_dir: PathBuf,
    pub error_roles: Vec<String>,
    pub logs_dir: PathBuf,
    pub performance_logging_threshold: Option<f64>,
    pub project_dir: Option<PathBuf>,
    pub slack_webhook_url: Option<String>,
    pub slack_rate_limit: Option<u32>,
    pub queue_capacity: usize,
}

impl Settings {
    /// Some only when both a webhook and a limit are configured.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        match (&self.slack_webhook_url, self.slack_rate_limit) {
            (Some(_), Some(hourly)) => Some(RateLimit::new(hourly)),
            _ => None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("var/cache"),
            error_roles: Vec::new(),
            logs_dir: PathBuf::from("var/log"),
            performance_logging_threshold: None,
            project_dir: None,
            slack_webhook_url: None,
            slack_rate_limit: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Self {
            cache_dir: args.cache_dir,
            error_roles: args
                .error_roles
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            logs_dir: args.logs_dir,
            performance_logging_threshold: args.performance_logging_threshold,
            project_dir: args.project_dir,
            slack_webhook_url: args.slack_webhook_url.filter(|u| !u.trim().is_empty()),
            slack_rate_limit: args.slack_rate_limit,
            queue_capacity: args.queue_capacity.max(1),
        }
    }
}

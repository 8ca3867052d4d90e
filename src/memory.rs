// Resident memory of this process, read from /proc/self/status (Linux only)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub rss_kb: u64,
}

impl MemorySample {
    // None off Linux or when /proc is unreadable
    pub fn take() -> Option<Self> {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| Self::parse(&status))
    }

    // current RSS only, VmHWM never drops so it can't describe one request
    pub fn parse(status: &str) -> Option<Self> {
        status
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse().ok())
            .map(|rss_kb| Self { rss_kb })
    }
}

// Megabytes the process grew by between two samples, 0 if it shrank or is unknown
pub fn request_megabytes(before: Option<MemorySample>, after: Option<MemorySample>) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => after.rss_kb.saturating_sub(before.rss_kb) as f64 / 1024.0,
        _ => 0.0,
    }
}

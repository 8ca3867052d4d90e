// Daily performance-<YYYY-MM-DD>.log files, one `[timestamp] {json}` line per entry

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HippoError;

// Age, in days, of the single file removed by each cleanup
pub const RETENTION_DAYS: u64 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub method: String,
    pub url: String,
    pub route: String,
    pub seconds: f64,
    pub megabytes: f64,
}

impl PerformanceEntry {
    // memory * time, compared against the configured threshold
    pub fn weight(&self) -> f64 {
        self.megabytes * self.seconds
    }

    // `None` means every request crosses
    pub fn crosses(&self, threshold: Option<f64>) -> bool {
        match threshold {
            None => true,
            Some(threshold) => self.weight() >= threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerformanceLog {
    dir: PathBuf,
}

impl PerformanceLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("performance-{}.log", date.format("%Y-%m-%d")))
    }

    // Fails when the directory cannot be created or the file written
    pub fn append(&self, entry: &PerformanceEntry, now: DateTime<Utc>) -> Result<(), HippoError> {
        let line = format!(
            "[{}] {}\n",
            now.to_rfc3339_opts(SecondsFormat::Secs, false),
            serde_json::to_string(entry)?
        );

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(now.date_naive()))?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    // Delete the file dated exactly RETENTION_DAYS before `today`, true if one was removed
    pub fn cleanup(&self, today: NaiveDate) -> bool {
        let Some(expired) = today.checked_sub_days(Days::new(RETENTION_DAYS)) else {
            return false;
        };
        let path = self.file_for(expired);

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed expired performance log");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Could not remove expired performance log");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn entry() -> PerformanceEntry {
        PerformanceEntry {
            method: "GET".to_string(),
            url: "/reports?year=2024".to_string(),
            route: "/reports".to_string(),
            seconds: 2.5,
            megabytes: 40.0,
        }
    }

    #[test]
    fn threshold_compares_memory_times_seconds() {
        let e = entry();
        assert!(e.crosses(None));
        assert!(e.crosses(Some(100.0)));
        assert!(!e.crosses(Some(100.1)));
    }

    #[test]
    fn append_writes_timestamped_json_lines() {
        let dir = tempdir().unwrap();
        let log = PerformanceLog::new(dir.path().join("logs"));
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        log.append(&entry(), now).unwrap();
        log.append(&entry(), now).unwrap();

        let text = fs::read_to_string(dir.path().join("logs/performance-2024-03-01.log")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let (stamp, json) = lines[0].split_once(' ').unwrap();
        assert_eq!(stamp, "[2024-03-01T12:00:00+00:00]");
        let parsed: PerformanceEntry = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, entry());
    }

    #[test]
    fn append_to_unwritable_dir_fails() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "").unwrap();

        let log = PerformanceLog::new(&blocker);
        assert!(matches!(log.append(&entry(), Utc::now()), Err(HippoError::Io(_))));
    }

    #[test]
    fn cleanup_removes_only_the_eight_day_old_file() {
        let dir = tempdir().unwrap();
        let log = PerformanceLog::new(dir.path());
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        for days in [7, 8, 9] {
            let date = today.checked_sub_days(Days::new(days)).unwrap();
            fs::write(log.file_for(date), "x").unwrap();
        }

        assert!(log.cleanup(today));

        assert!(log.file_for(NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()).exists());
        assert!(!log.file_for(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()).exists());
        assert!(log.file_for(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).exists());
    }

    #[test]
    fn cleanup_ignores_missing_file_and_dir() {
        let dir = tempdir().unwrap();
        let log = PerformanceLog::new(dir.path().join("never-created"));
        assert!(!log.cleanup(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));
    }
}

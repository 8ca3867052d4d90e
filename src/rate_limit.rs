// Shared record, one line per window:
//   1 hour 2024-03-01T12:00:00Z 4
//   5 minute 2024-03-01T12:03:10Z 2

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use fs2::FileExt;
use thiserror::Error;

use crate::window::WindowCounter;

pub const RECORD_FILE_NAME: &str = "hippo-metadata.txt";

const HOUR_HEADER: (&str, &str) = ("1", "hour");
const FIVE_MINUTE_HEADER: (&str, &str) = ("5", "minute");

// Why a stored record was unusable, never surfaced
#[derive(Debug, Error)]
pub enum MalformedRecord {
    #[error("expected 2 lines, found {0}")]
    LineCount(usize),

    #[error("line {line}: expected 4 space separated tokens")]
    TokenCount { line: usize },

    #[error("line {line}: expected `{expected}`")]
    Header { line: usize, expected: String },

    #[error("line {line}: invalid timestamp: {source}")]
    Timestamp {
        line: usize,
        #[source]
        source: chrono::ParseError,
    },

    #[error("line {line}: invalid count `{raw}`")]
    Count { line: usize, raw: String },

    #[error("line {line}: count out of range: {source}")]
    CountRange {
        line: usize,
        #[source]
        source: ParseIntError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStore {
    pub hourly: WindowCounter,
    pub five_minute: WindowCounter,
}

impl RateLimitStore {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            hourly: WindowCounter::starting_at(now),
            five_minute: WindowCounter::starting_at(now),
        }
    }

    /// Parse the two-line record. Anything but the exact shape is rejected.
    pub fn parse(text: &str) -> Result<Self, MalformedRecord> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() != 2 {
            return Err(MalformedRecord::LineCount(lines.len()));
        }

        Ok(Self {
            hourly: parse_line(1, lines[0], HOUR_HEADER)?,
            five_minute: parse_line(2, lines[1], FIVE_MINUTE_HEADER)?,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n",
            render_line(HOUR_HEADER, &self.hourly),
            render_line(FIVE_MINUTE_HEADER, &self.five_minute)
        )
    }
}

fn parse_line(
    line: usize,
    text: &str,
    (size, unit): (&str, &str),
) -> Result<WindowCounter, MalformedRecord> {
    let tokens: Vec<&str> = text.split(' ').collect();
    if tokens.len() != 4 {
        return Err(MalformedRecord::TokenCount { line });
    }

    if tokens[0] != size || tokens[1] != unit {
        return Err(MalformedRecord::Header {
            line,
            expected: format!("{size} {unit}"),
        });
    }

    let anchor = DateTime::parse_from_rfc3339(tokens[2])
        .map_err(|source| MalformedRecord::Timestamp { line, source })?
        .with_timezone(&Utc);

    // u32::from_str would accept a leading '+'
    let raw = tokens[3];
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedRecord::Count {
            line,
            raw: raw.to_string(),
        });
    }
    let count = raw
        .parse::<u32>()
        .map_err(|source| MalformedRecord::CountRange { line, source })?;

    Ok(WindowCounter { anchor, count })
}

fn render_line((size, unit): (&str, &str), counter: &WindowCounter) -> String {
    format!(
        "{size} {unit} {} {}",
        counter.anchor.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        counter.count
    )
}

#[derive(Debug, Clone)]
pub struct SharedRecord {
    path: PathBuf,
}

impl SharedRecord {
    pub fn in_dir(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            path: cache_dir.as_ref().join(RECORD_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Blocks until every other holder, in any process, has dropped its lock
    pub fn lock(&self) -> io::Result<LockedRecord> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        FileExt::lock_exclusive(&file)?;

        Ok(LockedRecord {
            file,
            path: self.path.clone(),
        })
    }
}

// Open record holding the exclusive lock, unlocks on drop
#[derive(Debug)]
pub struct LockedRecord {
    file: File,
    path: PathBuf,
}

impl LockedRecord {
    /// Read the stored windows, or fresh windows anchored at `now` when the
    /// record is missing, empty, unreadable or malformed.
    pub fn load_or_default(&mut self, now: DateTime<Utc>) -> RateLimitStore {
        let mut text = String::new();
        let read = self
            .file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut text));

        if let Err(e) = read {
            tracing::warn!(path = %self.path.display(), error = %e, "Could not read rate limit record, starting fresh");
            return RateLimitStore::starting_at(now);
        }

        if text.is_empty() {
            return RateLimitStore::starting_at(now);
        }

        match RateLimitStore::parse(&text) {
            Ok(store) => store,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Malformed rate limit record, starting fresh");
                RateLimitStore::starting_at(now)
            }
        }
    }

    // Replace the whole record in place
    pub fn persist(&mut self, store: &RateLimitStore) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(store.render().as_bytes())?;
        self.file.flush()
    }
}

impl Drop for LockedRecord {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to unlock rate limit record");
        }
    }
}

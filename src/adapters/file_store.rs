//! File-backed schedule store.
//!
//! The next water time lives in `<data dir>/time.txt` as a single RFC 3339
//! line.  Writes go to a temporary file that is synced and renamed over the
//! real one, so a crash mid-write leaves either the old or the new value.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;

use crate::app::ports::{ScheduleStore, StoreError};

pub const SCHEDULE_FILE: &str = "time.txt";

pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    /// Store rooted at `data_dir`.  The directory is created on first write.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SCHEDULE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let name = format!(".{SCHEDULE_FILE}.tmp-{}", std::process::id());
        self.path
            .parent()
            .map(|p| p.join(&name))
            .unwrap_or_else(|| PathBuf::from(&name))
    }
}

fn io_error(e: io::Error) -> StoreError {
    match e.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound,
        kind => StoreError::Io(kind),
    }
}

impl ScheduleStore for FileScheduleStore {
    fn read_next_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let text = fs::read_to_string(&self.path).map_err(io_error)?;
        DateTime::parse_from_rfc3339(text.trim())
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| StoreError::Corrupt)
    }

    fn write_next_time(&self, next: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.kind()))?;
        }

        let tmp = self.tmp_path();
        let text = next.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let written = File::create(&tmp).and_then(|mut file| {
            file.write_all(text.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io(e.kind()));
        }

        debug!("FileScheduleStore: wrote {text} to {}", self.path.display());
        Ok(())
    }
}

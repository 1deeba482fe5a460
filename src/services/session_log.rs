// Session Log
// Append-only JSON-lines record of single-text predictions

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::SessionLogError;
use crate::models::{ClassLabel, SessionLogEntry};

/// One open handle per process. Appends from several processes sharing a file
/// are not coordinated.
pub struct SessionLog {
    file: Mutex<File>,
}

impl SessionLog {
    pub fn open(path: &Path) -> Result<Self, SessionLogError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!(path = %path.display(), "Session log opened");
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, entry: &SessionLogEntry) -> Result<(), SessionLogError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Stamp and append one prediction.
    pub fn record(&self, input_text: &str, predicted_label: ClassLabel) -> Result<(), SessionLogError> {
        self.append(&SessionLogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            input_text: input_text.to_string(),
            predicted_label,
        })
    }

    pub fn read_all(path: &Path) -> Result<Vec<SessionLogEntry>, SessionLogError> {
        let content = fs::read_to_string(path)?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(SessionLogError::from))
            .collect()
    }
}

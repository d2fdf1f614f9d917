//! JSONL set recorder
//!
//! Appends one JSON object per completed set, the same line-per-record
//! shape the backend importer consumes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use tapfit_core::{CompletedSet, RecorderError, SetRecorder};

pub struct JsonlSetRecorder {
    file: Mutex<File>,
}

impl JsonlSetRecorder {
    /// Open (or create) the record file in append mode
    pub fn open(path: &Path) -> Result<Self, RecorderError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| RecorderError::WriteFailed(e.to_string()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl SetRecorder for JsonlSetRecorder {
    async fn record_set(&self, set: CompletedSet) -> Result<(), RecorderError> {
        let line =
            serde_json::to_string(&set).map_err(|e| RecorderError::WriteFailed(e.to_string()))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| RecorderError::WriteFailed("recorder lock poisoned".into()))?;
        writeln!(file, "{}", line).map_err(|e| RecorderError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_one_line_per_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sets.jsonl");
        let recorder = JsonlSetRecorder::open(&path).unwrap();

        for set_index in 1..=2u8 {
            recorder
                .record_set(CompletedSet {
                    set_index,
                    reps: 10,
                    completed_at_ms: 1_000 * set_index as u64,
                })
                .await
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: CompletedSet = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.set_index, 1);
        assert_eq!(first.reps, 10);
    }
}

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{MoodError, MoodResult},
    pipeline::TrainingReport,
};

/// One completed training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// `run-<uuid>`.
    pub run_id: String,
    /// When the run finished.
    pub recorded_at: DateTime<Utc>,
    /// What the run produced.
    pub report: TrainingReport,
}

impl ManifestEntry {
    /// Entry for `report` with a fresh id.
    #[must_use]
    pub fn new(report: TrainingReport) -> Self {
        Self {
            run_id: format!("run-{}", Uuid::new_v4()),
            recorded_at: Utc::now(),
            report,
        }
    }
}

/// Append-only JSONL history of training runs.
#[derive(Debug, Clone)]
pub struct RunManifest {
    path: PathBuf,
}

impl RunManifest {
    /// Manifest stored at `path`; the file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entry` as one line.
    pub fn append(&self, entry: &ManifestEntry) -> MoodResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.error(err))?;
        }
        let mut line = serde_json::to_vec(entry).map_err(|err| self.error(err))?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&line))
            .map_err(|err| self.error(err))
    }

    /// Every entry, oldest first; an absent file reads as empty.
    pub fn entries(&self) -> MoodResult<Vec<ManifestEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path).map_err(|err| self.error(err))?;
        let mut entries = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| self.error(err))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line)
                .map_err(|err| self.error(format!("line {}: {err}", idx + 1)))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Up to `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> MoodResult<Vec<ManifestEntry>> {
        let mut entries = self.entries()?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    fn error(&self, reason: impl ToString) -> MoodError {
        MoodError::Manifest {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(epochs: usize) -> TrainingReport {
        TrainingReport {
            source: "fixture".into(),
            tracks: 10,
            sessions: 2,
            examples: 8,
            dropped_pairs: 0,
            train_examples: 6,
            validation_examples: 2,
            epochs_run: epochs,
            stopped_early: false,
            final_train_loss: 0.1,
            final_val_loss: Some(0.2),
            best_val_loss: Some(0.2),
            best_epoch: Some(epochs - 1),
            model_path: PathBuf::from("model.json"),
            duration_ms: 12,
        }
    }

    #[test]
    fn recent_lists_newest_first() {
        let dir = tempdir().unwrap();
        let manifest = RunManifest::new(dir.path().join("runs/manifest.jsonl"));
        assert!(manifest.recent(5).unwrap().is_empty());
        for epochs in 1..=3 {
            manifest.append(&ManifestEntry::new(report(epochs))).unwrap();
        }
        let recent = manifest.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].report.epochs_run, 3);
        assert_eq!(recent[1].report.epochs_run, 2);
        assert!(recent[0].run_id.starts_with("run-"));
    }

    #[test]
    fn corrupt_line_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.jsonl");
        fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            RunManifest::new(&path).entries(),
            Err(MoodError::Manifest { .. })
        ));
    }
}

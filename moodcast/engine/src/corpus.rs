use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::{
    error::{MoodError, MoodResult},
    track::Track,
};

/// Anything that can hand the pipeline its raw play history.
pub trait TrackSource {
    /// Human-readable origin used in logs and reports.
    fn describe(&self) -> String;

    /// Reads every track, in whatever order the source stores them.
    fn load_tracks(&self) -> MoodResult<Vec<Track>>;
}

/// One JSON-encoded [`Track`] per line.
#[derive(Debug, Clone)]
pub struct JsonlTrackSource {
    path: PathBuf,
}

impl JsonlTrackSource {
    /// Source reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corpus_error(&self, reason: impl Into<String>) -> MoodError {
        MoodError::Corpus {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl TrackSource for JsonlTrackSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_tracks(&self) -> MoodResult<Vec<Track>> {
        let file = File::open(&self.path).map_err(|err| self.corpus_error(err.to_string()))?;
        let mut tracks = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|err| self.corpus_error(format!("line {}: {err}", idx + 1)))?;
            if line.trim().is_empty() {
                continue;
            }
            let track = serde_json::from_str::<Track>(&line)
                .map_err(|err| self.corpus_error(format!("line {}: {err}", idx + 1)))?;
            tracks.push(track);
        }
        Ok(tracks)
    }
}

impl TrackSource for Vec<Track> {
    fn describe(&self) -> String {
        format!("{} in-memory tracks", self.len())
    }

    fn load_tracks(&self) -> MoodResult<Vec<Track>> {
        Ok(self.clone())
    }
}

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::track::{ListeningSession, Track};

/// How a flat play history is cut into sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SessionStrategy {
    /// Fixed-size contiguous chunks, ignoring timestamps.
    Chunk {
        /// Tracks per chunk.
        size: usize,
    },
    /// New session when the silence between two plays exceeds `max_gap_minutes`.
    Gap {
        /// Longest silence (minutes) still inside one session.
        max_gap_minutes: i64,
    },
}

impl Default for SessionStrategy {
    fn default() -> Self {
        Self::Gap {
            max_gap_minutes: 30,
        }
    }
}

/// Groups time-ordered tracks into listening sessions.
#[derive(Debug, Clone, Copy)]
pub struct SessionBuilder {
    strategy: SessionStrategy,
}

impl SessionBuilder {
    /// Creates a builder for the given strategy.
    #[must_use]
    pub const fn new(strategy: SessionStrategy) -> Self {
        Self { strategy }
    }

    /// Active strategy.
    #[must_use]
    pub const fn strategy(&self) -> SessionStrategy {
        self.strategy
    }

    /// Partitions `tracks` into sessions of at least `min_size` tracks.
    ///
    /// Sessions are contiguous runs of the input, emitted in input order.
    /// A play that starts before the previous one always opens a new
    /// session so every session stays ordered by play time.
    #[must_use]
    pub fn build<'a>(&self, tracks: &'a [Track], min_size: usize) -> Vec<ListeningSession<'a>> {
        let mut sessions = Vec::new();
        let mut start = 0;
        for idx in 1..=tracks.len() {
            let boundary = idx == tracks.len() || self.breaks_between(tracks, start, idx);
            if !boundary {
                continue;
            }
            let run = &tracks[start..idx];
            if run.len() >= min_size.max(1) {
                if let Some(session) = ListeningSession::new(run) {
                    sessions.push(session);
                }
            }
            start = idx;
        }
        sessions
    }

    fn breaks_between(&self, tracks: &[Track], run_start: usize, idx: usize) -> bool {
        let previous = &tracks[idx - 1];
        let current = &tracks[idx];
        if current.played_at < previous.played_at {
            return true;
        }
        match self.strategy {
            SessionStrategy::Chunk { size } => idx - run_start >= size.max(1),
            // a gap too large for chrono never splits
            SessionStrategy::Gap { max_gap_minutes } => Duration::try_minutes(max_gap_minutes)
                .is_some_and(|max_gap| current.played_at - previous.ended_at() > max_gap),
        }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new(SessionStrategy::default())
    }
}

/// Builds sessions with the default (30 minute gap) strategy.
#[must_use]
pub fn build_sessions(tracks: &[Track], min_size: usize) -> Vec<ListeningSession<'_>> {
    SessionBuilder::default().build(tracks, min_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::fixtures::track_at;

    fn ids(session: &ListeningSession<'_>) -> Vec<String> {
        session.tracks.iter().map(|track| track.id.clone()).collect()
    }

    #[test]
    fn chunking_drops_short_tail() {
        let tracks: Vec<_> = (0..7)
            .map(|i| track_at(&i.to_string(), i * 3, None))
            .collect();
        let builder = SessionBuilder::new(SessionStrategy::Chunk { size: 3 });
        let sessions = builder.build(&tracks, 2);
        assert_eq!(sessions.len(), 2);
        assert_eq!(ids(&sessions[0]), vec!["0", "1", "2"]);
        assert_eq!(ids(&sessions[1]), vec!["3", "4", "5"]);
    }

    #[test]
    fn gap_strategy_splits_on_silence() {
        // each track lasts 3 minutes; "c" starts 57 minutes after "b" ends
        let tracks = vec![
            track_at("a", 0, None),
            track_at("b", 3, None),
            track_at("c", 63, None),
            track_at("d", 66, None),
            track_at("e", 69, None),
        ];
        let sessions = build_sessions(&tracks, 2);
        assert_eq!(sessions.len(), 2);
        assert_eq!(ids(&sessions[0]), vec!["a", "b"]);
        assert_eq!(ids(&sessions[1]), vec!["c", "d", "e"]);
        assert!(sessions[0].end <= sessions[1].start);
    }

    #[test]
    fn out_of_order_play_starts_new_session() {
        let tracks = vec![
            track_at("a", 10, None),
            track_at("b", 13, None),
            track_at("c", 0, None),
            track_at("d", 3, None),
        ];
        let sessions = build_sessions(&tracks, 2);
        assert_eq!(sessions.len(), 2);
        for session in &sessions {
            assert!(session
                .tracks
                .windows(2)
                .all(|pair| pair[0].played_at <= pair[1].played_at));
        }
    }

    #[test]
    fn sessions_respect_min_size_and_input_order() {
        let minutes = [0, 3, 100, 103, 106, 300, 400, 403];
        let tracks: Vec<_> = minutes
            .iter()
            .enumerate()
            .map(|(i, m)| track_at(&i.to_string(), *m, None))
            .collect();
        for min_size in 1..=4 {
            let sessions = build_sessions(&tracks, min_size);
            assert!(sessions.iter().all(|s| s.len() >= min_size));
            let flattened: Vec<_> = sessions.iter().flat_map(ids).collect();
            let mut cursor = tracks.iter().map(|t| t.id.clone());
            assert!(flattened
                .iter()
                .all(|id| cursor.by_ref().any(|candidate| &candidate == id)));
        }
        assert_eq!(build_sessions(&tracks, 3).len(), 1);
    }

    #[test]
    fn unrepresentable_gap_keeps_one_session() {
        let tracks = vec![
            track_at("a", 0, None),
            track_at("b", 3, None),
            track_at("c", 60 * 24 * 365, None),
        ];
        let builder = SessionBuilder::new(SessionStrategy::Gap {
            max_gap_minutes: 9_000_000_000_000_000,
        });
        let sessions = builder.build(&tracks, 2);
        assert_eq!(sessions.len(), 1);
        assert_eq!(ids(&sessions[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_input_yields_no_sessions() {
        assert!(build_sessions(&[], 1).is_empty());
    }

    #[test]
    fn strategy_deserializes_from_tagged_form() {
        let gap: SessionStrategy =
            serde_json::from_str(r#"{"strategy":"gap","max_gap_minutes":45}"#).unwrap();
        assert_eq!(gap, SessionStrategy::Gap { max_gap_minutes: 45 });
        let chunk: SessionStrategy =
            serde_json::from_str(r#"{"strategy":"chunk","size":10}"#).unwrap();
        assert_eq!(chunk, SessionStrategy::Chunk { size: 10 });
    }
}

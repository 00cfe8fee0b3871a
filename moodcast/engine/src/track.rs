use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::TrackFeatures;

const MAX_PLAY_MS: u64 = 86_400_000;

/// One play of a track, as yielded by a track source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Source identifier.
    pub id: String,
    /// Track title.
    pub name: String,
    /// Performing artist.
    pub artist: String,
    /// Album title.
    #[serde(default)]
    pub album: String,
    /// Start of the play.
    pub played_at: DateTime<Utc>,
    /// Track length in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Feature payload; absent until features are extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<TrackFeatures>,
}

impl Track {
    /// End of the play (`played_at + duration_ms`).
    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        // longer than a day is treated as a day
        let millis = i64::try_from(self.duration_ms.min(MAX_PLAY_MS)).unwrap_or(0);
        self.played_at + Duration::milliseconds(millis)
    }
}

/// Contiguous run of tracks treated as one listening unit.
///
/// Borrows the tracks from whoever loaded them; never empty, ordered by
/// play time.
#[derive(Debug, Clone)]
pub struct ListeningSession<'a> {
    /// Session identifier.
    pub id: Uuid,
    /// Tracks in play order.
    pub tracks: &'a [Track],
    /// First track's start.
    pub start: DateTime<Utc>,
    /// Last track's end (exclusive).
    pub end: DateTime<Utc>,
}

impl<'a> ListeningSession<'a> {
    /// Wraps a non-empty run of tracks; `None` for an empty slice.
    #[must_use]
    pub fn new(tracks: &'a [Track]) -> Option<Self> {
        let first = tracks.first()?;
        let last = tracks.last()?;
        Some(Self {
            id: Uuid::new_v4(),
            tracks,
            start: first.played_at,
            end: last.ended_at(),
        })
    }

    /// Number of tracks.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True when the session holds no tracks (never for built sessions).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Adjacent (current, next) track pairs.
    pub fn adjacent_pairs(&self) -> impl Iterator<Item = (&'a Track, &'a Track)> + '_ {
        self.tracks.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::TimeZone;

    use super::*;
    use crate::features::Feature;

    /// Track starting `minute` minutes after a fixed epoch, lasting 3 minutes.
    pub fn track_at(id: &str, minute: i64, features: Option<TrackFeatures>) -> Track {
        Track {
            id: id.into(),
            name: format!("Track {id}"),
            artist: "Artist".into(),
            album: "Album".into(),
            played_at: Utc.with_ymd_and_hms(2024, 3, 9, 20, 0, 0).unwrap()
                + Duration::minutes(minute),
            duration_ms: 180_000,
            features,
        }
    }

    /// Features with the three target dimensions set.
    pub fn mood(valence: f64, energy: f64, danceability: f64) -> TrackFeatures {
        TrackFeatures::default()
            .with(Feature::Valence, valence)
            .with(Feature::Energy, energy)
            .with(Feature::Danceability, danceability)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{mood, track_at};
    use super::*;

    #[test]
    fn session_window_spans_first_start_to_last_end() {
        let tracks = vec![track_at("a", 0, None), track_at("b", 3, None)];
        let session = ListeningSession::new(&tracks).unwrap();
        assert_eq!(session.start, tracks[0].played_at);
        assert_eq!(session.end, tracks[1].played_at + Duration::minutes(3));
        assert_eq!(session.len(), 2);
        assert!(ListeningSession::new(&[]).is_none());
    }

    #[test]
    fn adjacent_pairs_walk_in_order() {
        let tracks = vec![
            track_at("a", 0, None),
            track_at("b", 3, None),
            track_at("c", 6, None),
        ];
        let session = ListeningSession::new(&tracks).unwrap();
        let ids: Vec<_> = session
            .adjacent_pairs()
            .map(|(cur, next)| format!("{}>{}", cur.id, next.id))
            .collect();
        assert_eq!(ids, vec!["a>b", "b>c"]);
    }

    #[test]
    fn track_round_trips_through_json() {
        let track = track_at("x", 0, Some(mood(0.5, 0.6, 0.7)));
        let json = serde_json::to_string(&track).unwrap();
        let back: Track = serde_json::from_str(&json).unwrap();
        assert_eq!(back, track);
    }
}

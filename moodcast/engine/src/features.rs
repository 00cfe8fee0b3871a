use serde::{Deserialize, Serialize};

use crate::error::{MoodError, MoodResult};

/// Number of features in the canonical vector.
pub const FEATURE_DIM: usize = 20;

/// BPM mapped to 1.0.
pub const TEMPO_SCALE: f64 = 200.0;

/// Track length (ms) mapped to 1.0.
pub const DURATION_SCALE_MS: f64 = 600_000.0;

/// Named track feature, in canonical vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// How suitable the track is for dancing.
    Danceability,
    /// Perceived intensity.
    Energy,
    /// Pitch class divided by 11.
    Key,
    /// Loudness mapped into [0, 1].
    Loudness,
    /// 1.0 for major, 0.0 for minor.
    Mode,
    /// Presence of spoken words.
    Speechiness,
    /// Confidence that the track is acoustic.
    Acousticness,
    /// Likelihood of no vocals.
    Instrumentalness,
    /// Presence of an audience.
    Liveness,
    /// Musical positiveness.
    Valence,
    /// Tempo in BPM, scaled by [`TEMPO_SCALE`].
    Tempo,
    /// Duration in milliseconds, scaled by [`DURATION_SCALE_MS`].
    DurationMs,
    /// Beats per bar divided by 7.
    TimeSignature,
    /// Hour of play divided by 24.
    HourOfDay,
    /// Day of week divided by 6 (Monday = 0).
    DayOfWeek,
    /// Month index divided by 11 (January = 0).
    Month,
    /// 1.0 when played on a weekend.
    IsWeekend,
    /// Share of plays skipped.
    SkipRate,
    /// Normalized repeat count.
    RepeatCount,
    /// Normalized position inside the playlist.
    PlaylistPosition,
}

impl Feature {
    /// Every feature in canonical order; index `i` is vector component `i`.
    pub const ALL: [Self; FEATURE_DIM] = [
        Self::Danceability,
        Self::Energy,
        Self::Key,
        Self::Loudness,
        Self::Mode,
        Self::Speechiness,
        Self::Acousticness,
        Self::Instrumentalness,
        Self::Liveness,
        Self::Valence,
        Self::Tempo,
        Self::DurationMs,
        Self::TimeSignature,
        Self::HourOfDay,
        Self::DayOfWeek,
        Self::Month,
        Self::IsWeekend,
        Self::SkipRate,
        Self::RepeatCount,
        Self::PlaylistPosition,
    ];

    /// Position in the feature vector.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Field name as it appears in payloads.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Danceability => "danceability",
            Self::Energy => "energy",
            Self::Key => "key",
            Self::Loudness => "loudness",
            Self::Mode => "mode",
            Self::Speechiness => "speechiness",
            Self::Acousticness => "acousticness",
            Self::Instrumentalness => "instrumentalness",
            Self::Liveness => "liveness",
            Self::Valence => "valence",
            Self::Tempo => "tempo",
            Self::DurationMs => "duration_ms",
            Self::TimeSignature => "time_signature",
            Self::HourOfDay => "hour_of_day",
            Self::DayOfWeek => "day_of_week",
            Self::Month => "month",
            Self::IsWeekend => "is_weekend",
            Self::SkipRate => "skip_rate",
            Self::RepeatCount => "repeat_count",
            Self::PlaylistPosition => "playlist_position",
        }
    }

    /// Divisor applied before clamping; `None` for features supplied in [0, 1].
    #[must_use]
    pub const fn scale(self) -> Option<f64> {
        match self {
            Self::Tempo => Some(TEMPO_SCALE),
            Self::DurationMs => Some(DURATION_SCALE_MS),
            _ => None,
        }
    }

    /// Maps a supplied value into [0, 1]. Non-finite input maps to 0.0.
    #[must_use]
    pub fn normalize(self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return 0.0;
        }
        let scaled = self.scale().map_or(raw, |divisor| raw / divisor);
        scaled.clamp(0.0, 1.0)
    }
}

/// Feature payload of one track. Every field is optional on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct TrackFeatures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danceability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loudness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speechiness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acousticness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumentalness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_weekend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_position: Option<f64>,
}

impl TrackFeatures {
    /// Supplied value of `feature`, if present.
    #[must_use]
    pub const fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Danceability => self.danceability,
            Feature::Energy => self.energy,
            Feature::Key => self.key,
            Feature::Loudness => self.loudness,
            Feature::Mode => self.mode,
            Feature::Speechiness => self.speechiness,
            Feature::Acousticness => self.acousticness,
            Feature::Instrumentalness => self.instrumentalness,
            Feature::Liveness => self.liveness,
            Feature::Valence => self.valence,
            Feature::Tempo => self.tempo,
            Feature::DurationMs => self.duration_ms,
            Feature::TimeSignature => self.time_signature,
            Feature::HourOfDay => self.hour_of_day,
            Feature::DayOfWeek => self.day_of_week,
            Feature::Month => self.month,
            Feature::IsWeekend => self.is_weekend,
            Feature::SkipRate => self.skip_rate,
            Feature::RepeatCount => self.repeat_count,
            Feature::PlaylistPosition => self.playlist_position,
        }
    }

    /// Sets (or clears) the value of `feature`.
    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        let slot = match feature {
            Feature::Danceability => &mut self.danceability,
            Feature::Energy => &mut self.energy,
            Feature::Key => &mut self.key,
            Feature::Loudness => &mut self.loudness,
            Feature::Mode => &mut self.mode,
            Feature::Speechiness => &mut self.speechiness,
            Feature::Acousticness => &mut self.acousticness,
            Feature::Instrumentalness => &mut self.instrumentalness,
            Feature::Liveness => &mut self.liveness,
            Feature::Valence => &mut self.valence,
            Feature::Tempo => &mut self.tempo,
            Feature::DurationMs => &mut self.duration_ms,
            Feature::TimeSignature => &mut self.time_signature,
            Feature::HourOfDay => &mut self.hour_of_day,
            Feature::DayOfWeek => &mut self.day_of_week,
            Feature::Month => &mut self.month,
            Feature::IsWeekend => &mut self.is_weekend,
            Feature::SkipRate => &mut self.skip_rate,
            Feature::RepeatCount => &mut self.repeat_count,
            Feature::PlaylistPosition => &mut self.playlist_position,
        };
        *slot = value;
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        self.set(feature, Some(value));
        self
    }

    /// Number of features present.
    #[must_use]
    pub fn present_count(&self) -> usize {
        Feature::ALL
            .iter()
            .filter(|feature| self.get(**feature).is_some())
            .count()
    }

    /// Strict check applied to analysis requests.
    ///
    /// Absent fields are accepted (the codec fills them with 0.0). Present
    /// values must be finite; features supplied normalized must lie in
    /// [0, 1] and scaled features (tempo, duration) must not be negative.
    pub fn validate(&self, track: usize) -> MoodResult<()> {
        for feature in Feature::ALL {
            let Some(value) = self.get(feature) else {
                continue;
            };
            if !value.is_finite() {
                return Err(MoodError::validation(track, feature.name(), "must be finite"));
            }
            match feature.scale() {
                Some(_) if value < 0.0 => {
                    return Err(MoodError::validation(
                        track,
                        feature.name(),
                        format!("must not be negative, got {value}"),
                    ));
                }
                None if !(0.0..=1.0).contains(&value) => {
                    return Err(MoodError::validation(
                        track,
                        feature.name(),
                        format!("must lie within [0, 1], got {value}"),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

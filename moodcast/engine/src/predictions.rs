//! Response-side value types shared by analysis and insights.

use serde::{Deserialize, Serialize};

use crate::codec::MoodTarget;

/// Aggregate mood predicted for the batch, each component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoodPrediction {
    /// Predicted valence.
    pub valence: f64,
    /// Predicted energy.
    pub energy: f64,
    /// Predicted arousal (the danceability output).
    pub arousal: f64,
}

/// Mood predicted for the track following the batch, each component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NextTrackPrediction {
    /// Predicted valence.
    pub valence: f64,
    /// Predicted energy.
    pub energy: f64,
    /// Predicted danceability.
    pub danceability: f64,
}

impl From<MoodTarget> for MoodPrediction {
    fn from(target: MoodTarget) -> Self {
        let target = target.clamped();
        Self {
            valence: target.valence,
            energy: target.energy,
            arousal: target.danceability,
        }
    }
}

impl From<MoodTarget> for NextTrackPrediction {
    fn from(target: MoodTarget) -> Self {
        let target = target.clamped();
        Self {
            valence: target.valence,
            energy: target.energy,
            danceability: target.danceability,
        }
    }
}

/// Confidence attached to each prediction, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScores {
    /// Confidence in the aggregate mood.
    pub mood: f64,
    /// Confidence in the next-track mood.
    pub next_track: f64,
}

/// How confidence scores are produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ConfidencePolicy {
    /// Constant placeholder scores; they carry no information about the batch.
    Fixed {
        /// Reported mood confidence.
        mood: f64,
        /// Reported next-track confidence.
        next_track: f64,
    },
    /// `1 - 2 * mean column std` of the per-track predictions, clamped.
    Dispersion,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::Fixed {
            mood: 0.85,
            next_track: 0.75,
        }
    }
}

/// Everything the model says about one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPredictions {
    /// Aggregate mood of the batch.
    pub mood_prediction: MoodPrediction,
    /// Mood of the likely next track.
    pub next_track_prediction: NextTrackPrediction,
    /// Leading values of the flattened raw network output.
    pub pattern_embedding: Vec<f64>,
    /// Confidence per prediction.
    pub confidence_scores: ConfidenceScores,
}

/// Coarse spread of the batch across its mood features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityLevel {
    /// Wide spread.
    Diverse,
    /// Some spread.
    Moderate,
    /// Tracks sound alike.
    Consistent,
}

impl DiversityLevel {
    /// Classifies the mean standard deviation of the mood features.
    #[must_use]
    pub fn from_spread(spread: f64) -> Self {
        if spread > 0.25 {
            Self::Diverse
        } else if spread > 0.15 {
            Self::Moderate
        } else {
            Self::Consistent
        }
    }

    /// Human-readable phrase.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Diverse => "Your listening is highly diverse across moods and styles",
            Self::Moderate => "Your listening shows moderate variety",
            Self::Consistent => "Your listening is consistent in mood and style",
        }
    }
}

/// Natural-language reading of a batch plus its predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningInsights {
    /// Overall mood of the batch and where it is heading.
    pub mood_analysis: String,
    /// Energy level and trend.
    pub energy_analysis: String,
    /// Time-of-day and weekday/weekend habits.
    pub timing_analysis: String,
    /// Spread label.
    pub diversity_level: DiversityLevel,
    /// Spread phrase.
    pub diversity_analysis: String,
    /// Behavioural patterns, in evaluation order; never empty.
    pub pattern_insights: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictions_clamp_raw_targets() {
        let mood = MoodPrediction::from(MoodTarget {
            valence: 1.4,
            energy: -0.2,
            danceability: f64::NAN,
        });
        assert_eq!((mood.valence, mood.energy, mood.arousal), (1.0, 0.0, 0.0));
    }

    #[test]
    fn diversity_thresholds() {
        assert_eq!(DiversityLevel::from_spread(0.3), DiversityLevel::Diverse);
        assert_eq!(DiversityLevel::from_spread(0.25), DiversityLevel::Moderate);
        assert_eq!(DiversityLevel::from_spread(0.15), DiversityLevel::Consistent);
    }

    #[test]
    fn confidence_policy_parses_from_config_shape() {
        let policy: ConfidencePolicy = serde_json::from_str(r#"{"mode":"dispersion"}"#).unwrap();
        assert_eq!(policy, ConfidencePolicy::Dispersion);
        assert_eq!(
            ConfidencePolicy::default(),
            ConfidencePolicy::Fixed {
                mood: 0.85,
                next_track: 0.75
            }
        );
    }
}

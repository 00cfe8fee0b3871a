//! Rule-based reading of a feature batch and the model's predictions.
//!
//! Statistics are taken over the encoded batch, so they see the same
//! normalized values the model sees. The engine is pure: identical input
//! always yields identical text, and an empty batch reads as all zeros.

use ndarray::Array2;

use crate::{
    codec,
    features::{Feature, TrackFeatures},
    predictions::{DiversityLevel, ListeningInsights, ModelPredictions},
    stats::ColumnStats,
};

const HIGH: f64 = 0.7;
const LOW: f64 = 0.3;
const STEADY_DELTA: f64 = 0.1;
const RECOMMENDATION_DELTA: f64 = 0.2;
const HIGH_ENERGY_SPREAD: f64 = 0.15;
const KEY_DOMINANCE: f64 = 0.2;
const STEADY_TEMPO_CV: f64 = 0.1;

const DIVERSITY_FEATURES: [Feature; 5] = [
    Feature::Danceability,
    Feature::Energy,
    Feature::Valence,
    Feature::Acousticness,
    Feature::Instrumentalness,
];

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Emitted when no pattern rule fires.
pub const NO_PATTERN: &str = "No strong listening patterns stand out in this batch";

/// Emitted when no recommendation rule fires.
pub const NO_RECOMMENDATION: &str =
    "Keep enjoying your current mix, it already fits where your mood is heading";

/// Stateless insight generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsightEngine;

#[allow(clippy::unused_self)]
impl InsightEngine {
    /// Reads mood, energy, timing, diversity and behavioural patterns.
    #[must_use]
    pub fn generate_insights(
        &self,
        batch: &[TrackFeatures],
        predictions: &ModelPredictions,
    ) -> ListeningInsights {
        let encoded = codec::encode_batch(batch);
        let stats = ColumnStats::new(&encoded);
        let diversity_level = diversity_level(&stats);
        ListeningInsights {
            mood_analysis: mood_analysis(&stats, predictions),
            energy_analysis: energy_analysis(&stats, predictions),
            timing_analysis: timing_analysis(&stats),
            diversity_level,
            diversity_analysis: diversity_level.describe().to_owned(),
            pattern_insights: pattern_insights(&encoded, &stats, predictions),
        }
    }

    /// Suggestions driven by predicted-vs-observed deltas and diversity.
    #[must_use]
    pub fn generate_recommendations(
        &self,
        batch: &[TrackFeatures],
        predictions: &ModelPredictions,
    ) -> Vec<String> {
        let encoded = codec::encode_batch(batch);
        let stats = ColumnStats::new(&encoded);
        let mut out = Vec::new();

        let valence_delta = predictions.mood_prediction.valence - stats.mean(Feature::Valence);
        if valence_delta > RECOMMENDATION_DELTA {
            out.push("Your mood is brightening: try an upbeat pop or funk playlist".to_owned());
        } else if valence_delta < -RECOMMENDATION_DELTA {
            out.push(
                "Your mood is turning mellow: acoustic or lo-fi tracks may suit what comes next"
                    .to_owned(),
            );
        }

        let energy_delta = predictions.mood_prediction.energy - stats.mean(Feature::Energy);
        if energy_delta > RECOMMENDATION_DELTA {
            out.push("Energy is building: queue some dance or rock tracks".to_owned());
        } else if energy_delta < -RECOMMENDATION_DELTA {
            out.push("Energy is winding down: ambient or chill playlists could fit".to_owned());
        }

        match diversity_level(&stats) {
            DiversityLevel::Consistent => {
                out.push("Explore a genre you rarely play to broaden your mix".to_owned());
            }
            DiversityLevel::Diverse => {
                out.push("Collect your favourite moods into a themed playlist".to_owned());
            }
            DiversityLevel::Moderate => {}
        }

        if out.is_empty() {
            out.push(NO_RECOMMENDATION.to_owned());
        }
        out
    }
}

fn diversity_level(stats: &ColumnStats<'_>) -> DiversityLevel {
    #[allow(clippy::cast_precision_loss)]
    let spread = DIVERSITY_FEATURES
        .iter()
        .map(|feature| stats.std(*feature))
        .sum::<f64>()
        / DIVERSITY_FEATURES.len() as f64;
    DiversityLevel::from_spread(spread)
}

fn mood_analysis(stats: &ColumnStats<'_>, predictions: &ModelPredictions) -> String {
    let mean = stats.mean(Feature::Valence);
    let class = if mean > HIGH {
        "Your recent listening is positive and uplifting"
    } else if mean < LOW {
        "Your recent listening leans melancholic"
    } else {
        "Your recent listening is emotionally balanced"
    };
    let delta = predictions.mood_prediction.valence - mean;
    let trend = if delta.abs() <= STEADY_DELTA {
        "and your mood looks consistent"
    } else if delta > 0.0 {
        "and your mood is shifting toward brighter music"
    } else {
        "and your mood is shifting toward darker music"
    };
    format!("{class}, {trend}")
}

fn energy_analysis(stats: &ColumnStats<'_>, predictions: &ModelPredictions) -> String {
    let mean = stats.mean(Feature::Energy);
    if mean > HIGH {
        if stats.std(Feature::Energy) < HIGH_ENERGY_SPREAD {
            "Your energy is consistently high".to_owned()
        } else {
            "Your energy is high but varied".to_owned()
        }
    } else if mean < LOW {
        "You are in a low-energy, relaxed listening phase".to_owned()
    } else if predictions.mood_prediction.energy > mean {
        "Your energy is moderate and increasing".to_owned()
    } else {
        "Your energy is moderate and decreasing".to_owned()
    }
}

fn timing_analysis(stats: &ColumnStats<'_>) -> String {
    let hour = stats.mean(Feature::HourOfDay) * 24.0;
    let period = if (5.0..12.0).contains(&hour) {
        "You mostly listen in the morning"
    } else if (12.0..17.0).contains(&hour) {
        "You mostly listen in the afternoon"
    } else if (17.0..22.0).contains(&hour) {
        "You mostly listen in the evening"
    } else {
        "You mostly listen at night"
    };
    let weekend = stats.share_at_least(Feature::IsWeekend, 0.5);
    let week = if weekend > 0.5 {
        "mainly on weekends"
    } else if weekend < 0.2 {
        "mainly on weekdays"
    } else {
        "spread across weekdays and weekends"
    };
    format!("{period}, {week}")
}

fn pattern_insights(
    encoded: &Array2<f64>,
    stats: &ColumnStats<'_>,
    predictions: &ModelPredictions,
) -> Vec<String> {
    let mut out = Vec::new();

    let skip_rate = stats.mean(Feature::SkipRate);
    if skip_rate > LOW {
        out.push("You skip frequently, still searching for the right track".to_owned());
    } else if skip_rate < 0.1 && stats.rows() > 0 {
        out.push("You rarely skip, settling into what plays".to_owned());
    }

    if stats.mean(Feature::RepeatCount) > LOW {
        out.push("You often replay favourite tracks".to_owned());
    }

    if let Some(pitch) = dominant_key(encoded) {
        out.push(format!("Many of your tracks are in the key of {pitch}"));
    }

    if stats
        .coefficient_of_variation(Feature::Tempo)
        .is_some_and(|cv| cv < STEADY_TEMPO_CV)
    {
        out.push("Your tracks keep a steady tempo".to_owned());
    }

    let acoustic = stats.mean(Feature::Acousticness)
        - (stats.mean(Feature::Energy) + stats.mean(Feature::Danceability)) / 2.0;
    if acoustic > 0.2 {
        out.push("You favour acoustic, organic sounds".to_owned());
    } else if acoustic < -0.3 {
        out.push("You favour electronic, produced sounds".to_owned());
    }

    if predictions.confidence_scores.mood > 0.8 {
        out.push("The mood reading for this batch is highly confident".to_owned());
    }
    if predictions.confidence_scores.next_track > HIGH {
        out.push("Your next track's mood is highly predictable".to_owned());
    }

    if out.is_empty() {
        out.push(NO_PATTERN.to_owned());
    }
    out
}

/// Pitch class holding strictly more than 20% of the batch; lowest class wins ties.
fn dominant_key(encoded: &Array2<f64>) -> Option<&'static str> {
    let rows = encoded.nrows();
    if rows == 0 {
        return None;
    }
    let mut bins = [0_usize; 12];
    for value in encoded.column(Feature::Key.index()) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bin = (value * 11.0).round().clamp(0.0, 11.0) as usize;
        bins[bin] += 1;
    }
    let (pitch, count) = bins
        .iter()
        .enumerate()
        .fold((0, 0), |best, (idx, count)| {
            if *count > best.1 {
                (idx, *count)
            } else {
                best
            }
        });
    #[allow(clippy::cast_precision_loss)]
    let share = count as f64 / rows as f64;
    (share > KEY_DOMINANCE).then_some(PITCH_CLASSES[pitch])
}

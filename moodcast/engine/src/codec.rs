//! Conversion between track feature records and the numeric vectors the
//! model consumes.
//!
//! The same encoding runs at training and inference time: tempo is divided
//! by [`TEMPO_SCALE`](crate::features::TEMPO_SCALE), duration by
//! [`DURATION_SCALE_MS`](crate::features::DURATION_SCALE_MS), every other
//! feature is taken as supplied, then each component is clamped into
//! [0, 1]. Missing or non-finite fields encode as 0.0.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::features::{Feature, TrackFeatures, FEATURE_DIM};

/// Width of the model output.
pub const TARGET_DIM: usize = 3;

/// Encoded feature vector in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    /// Encoded value of `feature`.
    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    /// Components as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// The three regression targets, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoodTarget {
    /// Output 0.
    pub valence: f64,
    /// Output 1.
    pub energy: f64,
    /// Output 2.
    pub danceability: f64,
}

impl MoodTarget {
    /// Components in output order.
    #[must_use]
    pub const fn to_array(self) -> [f64; TARGET_DIM] {
        [self.valence, self.energy, self.danceability]
    }

    /// Copy with every component clamped into [0, 1]; NaN becomes 0.0.
    #[must_use]
    pub fn clamped(self) -> Self {
        let clamp = |value: f64| {
            if value.is_nan() {
                0.0
            } else {
                value.clamp(0.0, 1.0)
            }
        };
        Self {
            valence: clamp(self.valence),
            energy: clamp(self.energy),
            danceability: clamp(self.danceability),
        }
    }
}

/// Encodes a feature record. Never fails.
#[must_use]
pub fn to_vector(features: &TrackFeatures) -> FeatureVector {
    let mut values = [0.0; FEATURE_DIM];
    for feature in Feature::ALL {
        values[feature.index()] = features
            .get(feature)
            .map_or(0.0, |raw| feature.normalize(raw));
    }
    FeatureVector(values)
}

/// Decodes one model output row into a [`MoodTarget`].
///
/// Only the three output dimensions are reconstructed; components beyond
/// the slice length decode as 0.0.
#[must_use]
pub fn from_vector(output: &[f64]) -> MoodTarget {
    let at = |idx: usize| output.get(idx).copied().unwrap_or(0.0);
    MoodTarget {
        valence: at(0),
        energy: at(1),
        danceability: at(2),
    }
}

/// Projects a record onto the output dimensions, encoded like [`to_vector`].
#[must_use]
pub fn target_of(features: &TrackFeatures) -> MoodTarget {
    let vector = to_vector(features);
    MoodTarget {
        valence: vector.get(Feature::Valence),
        energy: vector.get(Feature::Energy),
        danceability: vector.get(Feature::Danceability),
    }
}

/// Stacks encoded records into an `n x 20` matrix.
#[must_use]
pub fn encode_batch(batch: &[TrackFeatures]) -> Array2<f64> {
    let mut matrix = Array2::zeros((batch.len(), FEATURE_DIM));
    for (mut row, features) in matrix.rows_mut().into_iter().zip(batch) {
        for (slot, value) in row.iter_mut().zip(to_vector(features).0) {
            *slot = value;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TrackFeatures {
        TrackFeatures::default()
            .with(Feature::Danceability, 0.71)
            .with(Feature::Energy, 0.64)
            .with(Feature::Valence, 0.33)
            .with(Feature::Tempo, 100.0)
            .with(Feature::DurationMs, 240_000.0)
            .with(Feature::HourOfDay, 0.75)
    }

    #[test]
    fn encodes_in_canonical_order() {
        let vector = to_vector(&sample());
        assert_eq!(vector.0[0], 0.71);
        assert_eq!(vector.0[1], 0.64);
        assert_eq!(vector.0[9], 0.33);
        assert!((vector.0[10] - 0.5).abs() < 1e-12);
        assert!((vector.0[11] - 0.4).abs() < 1e-12);
        assert_eq!(vector.0[13], 0.75);
    }

    #[test]
    fn missing_fields_encode_as_zero() {
        let vector = to_vector(&TrackFeatures::default());
        assert!(vector.as_slice().iter().all(|value| *value == 0.0));
        assert_eq!(vector.as_slice().len(), FEATURE_DIM);
    }

    #[test]
    fn output_dims_survive_encode_decode() {
        let features = sample();
        let target = target_of(&features);
        let decoded = from_vector(&target.to_array());
        assert_eq!(decoded, target);
        assert_eq!(decoded.valence, features.valence.unwrap());
        assert_eq!(decoded.energy, features.energy.unwrap());
        assert_eq!(decoded.danceability, features.danceability.unwrap());
    }

    #[test]
    fn short_output_rows_decode_with_zeros() {
        let target = from_vector(&[0.4]);
        assert_eq!(target.valence, 0.4);
        assert_eq!(target.energy, 0.0);
        assert_eq!(target.danceability, 0.0);
    }

    #[test]
    fn clamps_raw_model_output() {
        let target = MoodTarget {
            valence: 1.3,
            energy: -0.2,
            danceability: f64::NAN,
        }
        .clamped();
        assert_eq!(target.to_array(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn batch_encoding_stacks_rows() {
        let matrix = encode_batch(&[sample(), TrackFeatures::default()]);
        assert_eq!(matrix.dim(), (2, FEATURE_DIM));
        assert_eq!(matrix[[0, 9]], 0.33);
        assert_eq!(matrix[[1, 9]], 0.0);
    }
}

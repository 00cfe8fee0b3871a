use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    codec::{self, FeatureVector, MoodTarget, TARGET_DIM},
    error::{MoodError, MoodResult},
    features::FEATURE_DIM,
    track::ListeningSession,
};

/// Smallest example count that still allows a train/validation split.
pub const MIN_EXAMPLES: usize = 2;

/// One supervised pair: current track's vector -> next track's mood.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Encoded features of the current track.
    pub input: FeatureVector,
    /// Encoded (valence, energy, danceability) of the next track.
    pub target: MoodTarget,
}

/// Examples extracted from a set of sessions.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Valid pairs in session order.
    pub examples: Vec<TrainingExample>,
    /// Adjacent pairs skipped because one side lacked features.
    pub dropped_pairs: usize,
}

/// Enumerates adjacent pairs inside each session.
///
/// A pair is kept only when both tracks carry a feature payload; pairs never
/// span two sessions.
#[must_use]
pub fn extract_examples(sessions: &[ListeningSession<'_>]) -> Extraction {
    let mut extraction = Extraction::default();
    for session in sessions {
        for (current, next) in session.adjacent_pairs() {
            match (&current.features, &next.features) {
                (Some(current), Some(next)) => extraction.examples.push(TrainingExample {
                    input: codec::to_vector(current),
                    target: codec::target_of(next),
                }),
                _ => extraction.dropped_pairs += 1,
            }
        }
    }
    extraction
}

/// Parallel input/target matrices.
#[derive(Debug, Clone)]
pub struct ExampleSet {
    /// `n x 20` inputs.
    pub inputs: Array2<f64>,
    /// `n x 3` targets.
    pub targets: Array2<f64>,
}

impl ExampleSet {
    /// Stacks examples preserving their order.
    #[must_use]
    pub fn stack(examples: &[TrainingExample]) -> Self {
        let mut inputs = Array2::zeros((examples.len(), FEATURE_DIM));
        let mut targets = Array2::zeros((examples.len(), TARGET_DIM));
        for (row, example) in examples.iter().enumerate() {
            for (col, value) in example.input.0.iter().enumerate() {
                inputs[[row, col]] = *value;
            }
            for (col, value) in example.target.to_array().iter().enumerate() {
                targets[[row, col]] = *value;
            }
        }
        Self { inputs, targets }
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    /// True when no examples are stacked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deterministic split: the head trains, the last `validation_fraction`
    /// validates. No shuffling happens here.
    ///
    /// Both sides receive at least one example.
    pub fn split(&self, validation_fraction: f64) -> MoodResult<(Self, Self)> {
        let total = self.len();
        if total < MIN_EXAMPLES {
            return Err(MoodError::TrainingDataInsufficient {
                found: total,
                required: MIN_EXAMPLES,
            });
        }
        let fraction = validation_fraction.clamp(0.0, 1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let validation = ((total as f64) * fraction).round() as usize;
        let validation = validation.clamp(1, total - 1);
        let cut = total - validation;
        let train = Self {
            inputs: self.inputs.slice(ndarray::s![..cut, ..]).to_owned(),
            targets: self.targets.slice(ndarray::s![..cut, ..]).to_owned(),
        };
        let val = Self {
            inputs: self.inputs.slice(ndarray::s![cut.., ..]).to_owned(),
            targets: self.targets.slice(ndarray::s![cut.., ..]).to_owned(),
        };
        Ok((train, val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::{SessionBuilder, SessionStrategy},
        track::fixtures::{mood, track_at},
    };

    #[test]
    fn pairs_need_features_on_both_sides() {
        // one session of three tracks, two without features
        let tracks = vec![
            track_at("a", 0, Some(mood(0.2, 0.3, 0.4))),
            track_at("b", 3, None),
            track_at("c", 6, None),
        ];
        let sessions = SessionBuilder::default().build(&tracks, 2);
        assert_eq!(sessions.len(), 1);
        let extraction = extract_examples(&sessions);
        assert!(extraction.examples.len() <= 1);
        assert!(extraction.examples.is_empty());
        assert_eq!(extraction.dropped_pairs, 2);
    }

    #[test]
    fn target_comes_from_next_track() {
        let tracks = vec![
            track_at("a", 0, Some(mood(0.1, 0.2, 0.3))),
            track_at("b", 3, Some(mood(0.7, 0.8, 0.9))),
            track_at("c", 6, None),
        ];
        let sessions = SessionBuilder::default().build(&tracks, 2);
        let extraction = extract_examples(&sessions);
        assert_eq!(extraction.examples.len(), 1);
        let example = extraction.examples[0];
        assert_eq!(example.input.0[9], 0.1);
        assert_eq!(example.target.to_array(), [0.7, 0.8, 0.9]);
    }

    #[test]
    fn pairs_never_cross_sessions() {
        let tracks: Vec<_> = (0..6)
            .map(|i| track_at(&i.to_string(), i * 3, Some(mood(0.5, 0.5, 0.5))))
            .collect();
        let sessions = SessionBuilder::new(SessionStrategy::Chunk { size: 3 }).build(&tracks, 2);
        let extraction = extract_examples(&sessions);
        assert_eq!(extraction.examples.len(), 4);
        assert_eq!(extraction.dropped_pairs, 0);
    }

    #[test]
    fn split_preserves_order_and_keeps_both_sides() {
        let examples: Vec<_> = (0..10)
            .map(|i| TrainingExample {
                input: FeatureVector([f64::from(i) / 10.0; FEATURE_DIM]),
                target: MoodTarget::default(),
            })
            .collect();
        let set = ExampleSet::stack(&examples);
        let (train, val) = set.split(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(val.len(), 2);
        assert_eq!(train.inputs[[0, 0]], 0.0);
        assert_eq!(val.inputs[[0, 0]], 0.8);

        let (train, val) = ExampleSet::stack(&examples[..2]).split(0.05).unwrap();
        assert_eq!((train.len(), val.len()), (1, 1));
    }

    #[test]
    fn split_rejects_tiny_sets() {
        let set = ExampleSet::stack(&[]);
        assert!(set.is_empty());
        match set.split(0.2) {
            Err(MoodError::TrainingDataInsufficient { found, required }) => {
                assert_eq!((found, required), (0, 2));
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }
}

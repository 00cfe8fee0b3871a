//! Serving core: validate a feature batch, run the shared model, and wrap
//! the output with insights.

use moodcast_telemetry::{LogLevel, Telemetry};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    codec,
    config::AnalysisSettings,
    emit,
    error::{MoodError, MoodResult},
    features::TrackFeatures,
    insights::InsightEngine,
    model_handle::ModelHandle,
    predictions::{
        ConfidencePolicy, ConfidenceScores, ListeningInsights, ModelPredictions, MoodPrediction,
        NextTrackPrediction,
    },
    stats,
};

/// Batch of tracks to analyze, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Feature records; the last one is the most recent play.
    pub tracks: Vec<TrackFeatures>,
    /// Whether to attach insights and recommendations; unset uses the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_insights: Option<bool>,
}

impl AnalysisRequest {
    /// Request for `tracks` with the configured insight default.
    #[must_use]
    pub const fn new(tracks: Vec<TrackFeatures>) -> Self {
        Self {
            tracks,
            include_insights: None,
        }
    }
}

/// Predictions plus optional natural-language output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Model output for the batch.
    pub predictions: ModelPredictions,
    /// Present when insights were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<ListeningInsights>,
    /// Present when insights were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
}

/// Answers analysis requests against whatever model the handle currently serves.
#[derive(Debug, Clone)]
pub struct Analyzer {
    handle: ModelHandle,
    settings: AnalysisSettings,
    insights: InsightEngine,
    telemetry: Telemetry,
}

impl Analyzer {
    /// Analyzer over `handle` with silent telemetry.
    #[must_use]
    pub fn new(handle: ModelHandle, settings: AnalysisSettings) -> Self {
        Self {
            handle,
            settings,
            insights: InsightEngine,
            telemetry: Telemetry::disabled("analysis"),
        }
    }

    /// Replaces the telemetry handle.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Model slot shared with this analyzer.
    #[must_use]
    pub const fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// Validates, predicts and optionally explains one batch.
    pub fn analyze(&self, request: &AnalysisRequest) -> MoodResult<AnalysisResponse> {
        match self.run(request) {
            Ok(response) => {
                emit::event(
                    &self.telemetry,
                    "analysis.completed",
                    json!({
                        "tracks": request.tracks.len(),
                        "insights": response.insights.is_some(),
                    }),
                );
                Ok(response)
            }
            Err(err) => {
                emit::log(
                    &self.telemetry,
                    if err.is_recoverable() {
                        LogLevel::Warn
                    } else {
                        LogLevel::Error
                    },
                    "analysis_failed",
                    json!({ "tracks": request.tracks.len(), "error": err.to_string() }),
                );
                Err(err)
            }
        }
    }

    fn run(&self, request: &AnalysisRequest) -> MoodResult<AnalysisResponse> {
        validate_batch(&request.tracks)?;
        let model = self.handle.snapshot()?;
        let raw = model.predict(&codec::encode_batch(&request.tracks))?;
        let predictions = self.assemble(&raw)?;

        let wants_insights = request
            .include_insights
            .unwrap_or(self.settings.include_insights);
        let (insights, recommendations) = if wants_insights {
            (
                Some(self.insights.generate_insights(&request.tracks, &predictions)),
                Some(
                    self.insights
                        .generate_recommendations(&request.tracks, &predictions),
                ),
            )
        } else {
            (None, None)
        };
        Ok(AnalysisResponse {
            predictions,
            insights,
            recommendations,
        })
    }

    fn assemble(&self, raw: &Array2<f64>) -> MoodResult<ModelPredictions> {
        let means = raw
            .mean_axis(Axis(0))
            .ok_or_else(|| MoodError::Shape("model returned no rows".to_owned()))?;
        let last = raw
            .rows()
            .into_iter()
            .last()
            .ok_or_else(|| MoodError::Shape("model returned no rows".to_owned()))?;
        let confidence_scores = match self.settings.confidence {
            ConfidencePolicy::Fixed { mood, next_track } => ConfidenceScores { mood, next_track },
            ConfidencePolicy::Dispersion => {
                let score = 2.0f64.mul_add(-stats::mean_column_std(raw), 1.0).clamp(0.0, 1.0);
                ConfidenceScores {
                    mood: score,
                    next_track: score,
                }
            }
        };
        Ok(ModelPredictions {
            mood_prediction: MoodPrediction::from(codec::from_vector(&means.to_vec())),
            next_track_prediction: NextTrackPrediction::from(codec::from_vector(&last.to_vec())),
            pattern_embedding: raw.iter().take(self.settings.embedding_len).copied().collect(),
            confidence_scores,
        })
    }
}

fn validate_batch(tracks: &[TrackFeatures]) -> MoodResult<()> {
    if tracks.is_empty() {
        return Err(MoodError::validation(
            0,
            "batch",
            "must contain at least one track",
        ));
    }
    tracks
        .iter()
        .enumerate()
        .try_for_each(|(idx, features)| features.validate(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::Feature,
        model::{ModelTopology, MoodModel},
    };
    use moodcast_telemetry::MemoryEventBus;
    use std::sync::Arc;

    fn batch(len: usize) -> Vec<TrackFeatures> {
        (0..len)
            .map(|i| {
                let t = i as f64 / len.max(1) as f64;
                TrackFeatures::default()
                    .with(Feature::Valence, 0.9 - t * 0.1)
                    .with(Feature::Energy, 0.85)
                    .with(Feature::Tempo, 118.0)
                    .with(Feature::HourOfDay, 0.5)
            })
            .collect()
    }

    fn analyzer(settings: AnalysisSettings) -> Analyzer {
        let model = MoodModel::build(ModelTopology::default(), Some(17)).unwrap();
        Analyzer::new(ModelHandle::with_model(model), settings)
    }

    #[test]
    fn predictions_are_clamped_and_shaped() {
        let response = analyzer(AnalysisSettings::default())
            .analyze(&AnalysisRequest::new(batch(20)))
            .unwrap();
        let preds = &response.predictions;
        for value in [
            preds.mood_prediction.valence,
            preds.mood_prediction.energy,
            preds.mood_prediction.arousal,
            preds.next_track_prediction.valence,
            preds.next_track_prediction.energy,
            preds.next_track_prediction.danceability,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(preds.pattern_embedding.len(), 8);
        assert_eq!(preds.confidence_scores.mood, 0.85);
        assert_eq!(preds.confidence_scores.next_track, 0.75);
        assert!(response.insights.is_some());
        assert!(!response.recommendations.unwrap().is_empty());
    }

    #[test]
    fn embedding_is_truncated_to_available_outputs() {
        let settings = AnalysisSettings {
            embedding_len: 100,
            ..AnalysisSettings::default()
        };
        let response = analyzer(settings)
            .analyze(&AnalysisRequest::new(batch(2)))
            .unwrap();
        assert_eq!(response.predictions.pattern_embedding.len(), 6);
    }

    #[test]
    fn request_can_skip_insights() {
        let request = AnalysisRequest {
            tracks: batch(3),
            include_insights: Some(false),
        };
        let response = analyzer(AnalysisSettings::default()).analyze(&request).unwrap();
        assert!(response.insights.is_none());
        assert!(response.recommendations.is_none());
    }

    #[test]
    fn invalid_batches_are_rejected_before_inference() {
        let analyzer = analyzer(AnalysisSettings::default());
        assert!(matches!(
            analyzer.analyze(&AnalysisRequest::new(Vec::new())),
            Err(MoodError::Validation { .. })
        ));
        let mut tracks = batch(3);
        tracks[2].energy = Some(f64::NAN);
        match analyzer.analyze(&AnalysisRequest::new(tracks)) {
            Err(MoodError::Validation { track, feature, .. }) => {
                assert_eq!((track, feature.as_str()), (2, "energy"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_model_is_reported() {
        let analyzer = Analyzer::new(ModelHandle::new(), AnalysisSettings::default());
        assert!(matches!(
            analyzer.analyze(&AnalysisRequest::new(batch(2))),
            Err(MoodError::ModelUnavailable)
        ));
    }

    #[test]
    fn dispersion_confidence_is_bounded() {
        let settings = AnalysisSettings {
            confidence: ConfidencePolicy::Dispersion,
            ..AnalysisSettings::default()
        };
        let scores = analyzer(settings)
            .analyze(&AnalysisRequest::new(batch(10)))
            .unwrap()
            .predictions
            .confidence_scores;
        assert!((0.0..=1.0).contains(&scores.mood));
        assert_eq!(scores.mood, scores.next_track);
    }

    #[test]
    fn completed_analysis_emits_event() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = Telemetry::builder("analysis")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        analyzer(AnalysisSettings::default())
            .with_telemetry(telemetry)
            .analyze(&AnalysisRequest::new(batch(4)))
            .unwrap();
        assert_eq!(bus.of_type("analysis.completed").len(), 1);
    }

    #[test]
    fn payloads_round_trip_through_json() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"tracks":[{"valence":0.4,"tempo":96.0}]}"#).unwrap();
        assert_eq!(request.tracks[0].valence, Some(0.4));
        assert_eq!(request.include_insights, None);

        let response = analyzer(AnalysisSettings::default()).analyze(&request).unwrap();
        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: AnalysisResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, response);
    }
}

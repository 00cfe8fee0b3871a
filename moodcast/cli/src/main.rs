use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use moodcast_engine::{
    build_sessions, AnalysisRequest, AnalysisResponse, Analyzer, JsonlTrackSource, ModelHandle, MoodModel,
    MoodcastConfig, RunManifest, SessionBuilder, TrackFeatures, TrackSource, TrainingPipeline,
    FEATURE_DIM,
};
use moodcast_telemetry::{FileEventPublisher, LogLevel, Telemetry};
use serde_json::{json, Value};

const DEFAULT_MANIFEST: &str = "runs/manifest.jsonl";

#[derive(Parser, Debug)]
#[command(name = "moodcast", version, about = "Next-track mood prediction and listening insights")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Trains a model on the configured corpus and saves it.
    Train {
        #[arg(long)]
        config: PathBuf,
    },
    /// Analyzes a JSON batch of track features with the saved model.
    Analyze {
        #[arg(long)]
        config: PathBuf,
        /// Request document, or a bare array of feature records.
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        no_insights: bool,
    },
    /// Prints the topology of a saved model.
    Inspect {
        #[arg(long)]
        model: PathBuf,
    },
    /// Lists recent training runs.
    Runs {
        /// Number of entries to display.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Reads the manifest location from this config.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Prints session statistics for the configured corpus.
    Sessions {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train { config } => handle_train(&config),
        Commands::Analyze {
            config,
            input,
            no_insights,
        } => handle_analyze(&config, &input, no_insights),
        Commands::Inspect { model } => handle_inspect(&model),
        Commands::Runs {
            limit,
            config,
            manifest,
        } => handle_runs(limit, config.as_deref(), manifest),
        Commands::Sessions { config } => handle_sessions(&config),
    }
}

fn load_config(path: &Path) -> Result<MoodcastConfig> {
    ensure!(path.exists(), "config file {} not found", path.display());
    MoodcastConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn telemetry(config: &MoodcastConfig, module: &str) -> Result<Telemetry> {
    let mut builder = Telemetry::builder(module).min_level(config.paths.log_level);
    if let Some(path) = &config.paths.log {
        builder = builder.log_path(path);
    }
    if let Some(path) = &config.paths.event_log {
        let publisher = FileEventPublisher::new(path)
            .with_context(|| format!("opening event log {}", path.display()))?;
        builder = builder.event_publisher(Arc::new(publisher));
    }
    builder.build()
}

fn handle_train(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let source = JsonlTrackSource::new(&config.paths.corpus);
    let manifest = RunManifest::new(&config.paths.manifest);
    let pipeline = TrainingPipeline::new(config.clone())
        .with_telemetry(telemetry(&config, "pipeline")?)
        .with_manifest(manifest);
    let report = pipeline
        .run(&source)
        .with_context(|| format!("training on {}", source.describe()))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn handle_analyze(config_path: &Path, input: &Path, no_insights: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let telemetry = telemetry(&config, "analysis")?;
    let mut request = read_request(input)?;
    if no_insights {
        request.include_insights = Some(false);
    }
    let response = analyze(&config, telemetry, &request)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn analyze(
    config: &MoodcastConfig,
    telemetry: Telemetry,
    request: &AnalysisRequest,
) -> Result<AnalysisResponse> {
    let handle = ModelHandle::new();
    handle
        .load_from(&config.paths.model)
        .with_context(|| format!("loading model {}", config.paths.model.display()))?;
    warn_on_failure(
        &telemetry,
        telemetry.event("model.loaded", json!({ "path": config.paths.model })),
    );
    warn_on_failure(
        &telemetry,
        telemetry.log(
            LogLevel::Info,
            "analysis_request",
            json!({ "tracks": request.tracks.len() }),
        ),
    );

    let analyzer = Analyzer::new(handle, config.analysis.clone()).with_telemetry(telemetry);
    Ok(analyzer.analyze(request)?)
}

// Telemetry sinks never abort a command.
fn warn_on_failure(telemetry: &Telemetry, result: Result<()>) {
    if let Err(err) = result {
        eprintln!("[{}] telemetry write failed: {err:#}", telemetry.module());
    }
}

fn read_request(path: &Path) -> Result<AnalysisRequest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading request {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    if value.is_array() {
        let tracks: Vec<TrackFeatures> = serde_json::from_value(value)?;
        return Ok(AnalysisRequest::new(tracks));
    }
    Ok(serde_json::from_value(value)?)
}

fn handle_inspect(path: &Path) -> Result<()> {
    let model = MoodModel::load(path, FEATURE_DIM)
        .with_context(|| format!("loading model {}", path.display()))?;
    let parameters: usize = model
        .network()
        .layers()
        .iter()
        .map(|layer| layer.weights.len() + layer.bias.len())
        .sum();
    let summary = json!({
        "path": path,
        "topology": model.topology(),
        "layers": model.network().layers().len(),
        "parameters": parameters,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn handle_runs(limit: usize, config: Option<&Path>, manifest: Option<PathBuf>) -> Result<()> {
    let path = match (manifest, config) {
        (Some(path), _) => path,
        (None, Some(config)) => load_config(config)?.paths.manifest,
        (None, None) => PathBuf::from(DEFAULT_MANIFEST),
    };
    let entries = RunManifest::new(&path).recent(limit)?;
    if entries.is_empty() {
        println!("no runs recorded in {}", path.display());
    }
    for entry in entries {
        let report = &entry.report;
        println!(
            "{} | {} | epochs={} | examples={} | val_loss={} | {}",
            entry.run_id,
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            report.epochs_run,
            report.examples,
            report
                .final_val_loss
                .map_or_else(|| "-".to_owned(), |loss| format!("{loss:.5}")),
            report.model_path.display()
        );
    }
    Ok(())
}

fn handle_sessions(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let source = JsonlTrackSource::new(&config.paths.corpus);
    let mut tracks = source.load_tracks()?;
    tracks.sort_by_key(|track| track.played_at);
    let min_size = config.training.min_session_size;
    let sessions = SessionBuilder::new(config.session.strategy()).build(&tracks, min_size);
    let lengths: Vec<usize> = sessions.iter().map(|session| session.len()).collect();
    let with_features = tracks.iter().filter(|track| track.features.is_some()).count();
    let pairs: usize = lengths.iter().map(|len| len.saturating_sub(1)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean_len = if lengths.is_empty() {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
    };
    let summary = json!({
        "corpus": source.describe(),
        "strategy": config.session.strategy(),
        "tracks": tracks.len(),
        "tracks_with_features": with_features,
        "sessions": sessions.len(),
        "default_gap_sessions": build_sessions(&tracks, min_size).len(),
        "mean_session_length": mean_len,
        "min_session_length": lengths.iter().min(),
        "max_session_length": lengths.iter().max(),
        "adjacent_pairs": pairs,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use moodcast_engine::ModelTopology;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "moodcast",
            "analyze",
            "--config",
            "moodcast.toml",
            "--input",
            "batch.json",
            "--no-insights",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Analyze {
                no_insights: true,
                ..
            }
        ));
    }

    #[test]
    fn broken_event_log_does_not_abort_analysis() {
        let dir = tempdir().unwrap();
        let mut config = MoodcastConfig::from_toml_str("").unwrap();
        config.paths.model = dir.path().join("model.json");
        // publishing into a directory fails on every event
        config.paths.event_log = Some(dir.path().to_path_buf());
        MoodModel::build(ModelTopology::default(), Some(7))
            .unwrap()
            .save(&config.paths.model)
            .unwrap();

        let telemetry = telemetry(&config, "analysis").unwrap();
        let request = AnalysisRequest::new(vec![TrackFeatures {
            valence: Some(0.6),
            energy: Some(0.4),
            ..TrackFeatures::default()
        }]);
        let response = analyze(&config, telemetry, &request).unwrap();
        assert!(response.insights.is_some());
    }

    #[test]
    fn request_accepts_bare_arrays() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batch.json");
        fs::write(&path, r#"[{"valence":0.5},{"energy":0.2}]"#).unwrap();
        let request = read_request(&path).unwrap();
        assert_eq!(request.tracks.len(), 2);
        assert_eq!(request.include_insights, None);

        fs::write(&path, r#"{"tracks":[{"valence":0.5}],"include_insights":false}"#).unwrap();
        assert_eq!(read_request(&path).unwrap().include_insights, Some(false));
    }
}

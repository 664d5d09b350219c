use clap::Parser;
use smart_recycle_lib::config::AppConfig;
use smart_recycle_lib::models::session_types::Status;
use smart_recycle_lib::services::classifier::model_manager::OnnxModelLoader;
use smart_recycle_lib::services::explanation::ExplanationClient;
use smart_recycle_lib::services::frame_source::StillImageSource;
use smart_recycle_lib::services::narration::{LogSpeechEngine, Narrator};
use smart_recycle_lib::services::preferences::JsonFilePreferenceStore;
use smart_recycle_lib::services::presenter::{build_view, LogPresenter};
use smart_recycle_lib::services::session::core::SessionState;
use smart_recycle_lib::{Collaborators, SessionController};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smart-recycle")]
#[command(about = "Classify a photo of waste into a recycling category")]
struct Cli {
    /// JSON config file; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the acceptance threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Print the final view as JSON
    #[arg(long)]
    json: bool,

    /// Image to classify
    image: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).await?,
        None => AppConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.recognition.confidence_threshold = threshold;
    }

    info!("Classifier mode: {:?}", config.model.mode);

    let collaborators = Collaborators {
        frame_source: Arc::new(StillImageSource::new(&cli.image)),
        model_loader: Arc::new(OnnxModelLoader::new(config.model.clone())),
        presenter: Arc::new(LogPresenter),
        narrator: Narrator::new(Arc::new(LogSpeechEngine), config.narration.clone()),
        preferences: Arc::new(JsonFilePreferenceStore::new(&config.preferences_path)),
        explanation: ExplanationClient::new(&config.explanation),
    };

    let controller = SessionController::new(&config, collaborators)?;

    let state = controller.start().await;
    if state.status.is_fatal() {
        anyhow::bail!(state.status.message());
    }

    let state = controller.capture().await;
    ensure_classified(&state)?;
    let view = build_view(&state, &config.recognition.low_confidence_message);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else if let Some(result) = &view.result {
        println!(
            "{} {} {}% (threshold {:.0}%)",
            result.icon,
            result.name,
            result.confidence_percent,
            controller.threshold() * 100.0
        );
        println!("{}", result.detail);
        if let Some(explanation) = &result.explanation {
            println!("{}", explanation);
        }
    } else {
        println!("{}", view.status);
    }

    Ok(())
}

/// A one-shot run has no retry, so a failed capture ends the process with its cause.
fn ensure_classified(state: &SessionState) -> anyhow::Result<()> {
    match &state.status {
        Status::CaptureFailed { message } => anyhow::bail!("Classification failed: {}", message),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_recycle_lib::models::session_types::Phase;
    use smart_recycle_lib::services::session::core::init;
    use smart_recycle_lib::AppError;

    #[test]
    fn test_capture_failure_is_an_error() {
        let (mut state, _) = init(false);
        state.phase = Phase::Live;
        state.status = Status::CaptureFailed {
            message: AppError::IndexOutOfRange {
                expected: 3,
                actual: 2,
            }
            .to_string(),
        };

        let err = ensure_classified(&state).unwrap_err();
        assert!(err.to_string().contains("2 scores"));
        assert!(err.to_string().contains("3 categories"));
    }

    #[test]
    fn test_frozen_result_is_ok() {
        let (mut state, _) = init(false);
        state.phase = Phase::Frozen;
        state.status = Status::LowConfidence;
        assert!(ensure_classified(&state).is_ok());
    }
}

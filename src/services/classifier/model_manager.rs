use crate::config::{ClassifierMode, ModelConfig};
use crate::error::AppError;
use crate::services::classifier::inference::{LoadedModel, ScoreModel};
use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Produces the model handle the inference backend runs on.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<LoadedModel, AppError>;
}

/// ONNX Runtime session behind a lock; `Session::run` needs `&mut`.
pub struct OnnxModel {
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

impl ScoreModel for OnnxModel {
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let mut session = self.session.lock();

        let input_name = session.inputs()[0].name().to_string();

        let input_tensor = Value::from_array(input)
            .map_err(|e| AppError::Inference(format!("Failed to create tensor value: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_name.as_str() => input_tensor])
            .map_err(|e| AppError::Inference(e.to_string()))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| AppError::Inference("Model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(data.to_vec())
    }
}

/// Loads an `.onnx` file and, in generic mode, its `id2label` config.
pub struct OnnxModelLoader {
    config: ModelConfig,
}

impl OnnxModelLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> Result<LoadedModel, AppError> {
        let labels = match (&self.config.mode, &self.config.labels_path) {
            (ClassifierMode::Generic, Some(path)) => load_labels(path).await?,
            (ClassifierMode::Generic, None) => {
                return Err(AppError::ModelLoad(
                    "Generic mode requires a labels file".to_string(),
                ))
            }
            (ClassifierMode::Custom, _) => Vec::new(),
        };

        let model_path = self.config.path.clone();
        let intra_threads = self.config.intra_threads;
        info!("Loading {:?} model from {}", self.config.mode, model_path.display());

        let session = tokio::task::spawn_blocking(move || -> Result<Session, AppError> {
            let _ = ort::init().with_name("smart-recycle").commit();

            let session = Session::builder()
                .map_err(|e| {
                    AppError::ModelLoad(format!("Failed to create session builder: {}", e))
                })?
                .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
                .map_err(|e| {
                    AppError::ModelLoad(format!("Failed to set optimization level: {}", e))
                })?
                .with_intra_threads(intra_threads)
                .map_err(|e| AppError::ModelLoad(format!("Failed to set intra threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| {
                    AppError::ModelLoad(format!(
                        "Failed to load ONNX model {}: {}",
                        model_path.display(),
                        e
                    ))
                })?;

            Ok(session)
        })
        .await
        .map_err(|e| AppError::ModelLoad(format!("Failed to spawn model loading task: {}", e)))??;

        debug!(
            "Model inputs: {:?}",
            session
                .inputs()
                .iter()
                .map(|i| i.name().to_string())
                .collect::<Vec<_>>()
        );

        Ok(LoadedModel {
            model: Arc::new(OnnxModel::new(session)),
            labels,
        })
    }
}

/// Reads labels ordered by index from a config file with an `id2label` object.
pub async fn load_labels(config_path: &Path) -> Result<Vec<String>, AppError> {
    let config_content = tokio::fs::read_to_string(config_path)
        .await
        .map_err(|e| {
            AppError::ModelLoad(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

    parse_labels(&config_content)
}

fn parse_labels(content: &str) -> Result<Vec<String>, AppError> {
    let config: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| AppError::ModelLoad(format!("Failed to parse config JSON: {}", e)))?;

    let id2label = config["id2label"]
        .as_object()
        .ok_or_else(|| AppError::ModelLoad("Config missing id2label field".to_string()))?;

    let mut labels = Vec::with_capacity(id2label.len());
    for (k, v) in id2label {
        let idx = k
            .parse::<usize>()
            .map_err(|_| AppError::ModelLoad(format!("Invalid label index '{}'", k)))?;
        let label = v.as_str().unwrap_or("unknown").to_string();
        labels.push((idx, label));
    }
    labels.sort_by_key(|(idx, _)| *idx);

    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

use crate::config::{ClassifierMode, ModelConfig};
use crate::error::AppError;
use crate::models::classify_types::{Prediction, RawPrediction};
use crate::services::frame_source::FrameBuffer;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use std::sync::Arc;

const CROP_PCT: f32 = 0.875;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Evaluates a preprocessed input tensor and returns the flattened first output.
pub trait ScoreModel: Send + Sync {
    fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError>;
}

/// A model handle plus the label vocabulary it was shipped with.
#[derive(Clone)]
pub struct LoadedModel {
    pub model: Arc<dyn ScoreModel>,
    pub labels: Vec<String>,
}

/// Custom-model preprocessing: nearest-neighbour resize to `size`x`size`,
/// scaled to [0, 1], NHWC. The trained model does not rescale by itself.
pub fn preprocess_custom(frame: &FrameBuffer, size: u32) -> Result<Array4<f32>, AppError> {
    let resized = image::imageops::resize(frame.pixels(), size, size, FilterType::Nearest);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    Array4::from_shape_vec((1, size as usize, size as usize, 3), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

/// Generic-model preprocessing: resize shortest edge to ceil(crop / crop_pct),
/// center crop, ImageNet mean/std, NCHW.
pub fn preprocess_generic(frame: &FrameBuffer, crop_size: u32) -> Result<Array4<f32>, AppError> {
    let img = DynamicImage::ImageRgb8(frame.pixels().clone());

    let resize_size = (crop_size as f32 / CROP_PCT).ceil() as u32;
    let (w, h) = (img.width(), img.height());
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = img.resize_exact(new_w, new_h, FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let rgb = resized.crop_imm(crop_x, crop_y, crop_size, crop_size).to_rgb8();

    // HWC -> CHW
    let hw = (crop_size * crop_size) as usize;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.into_raw().chunks_exact(3).enumerate() {
        for c in 0..3 {
            data[c * hw + i] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }

    Array4::from_shape_vec((1, 3, crop_size as usize, crop_size as usize), data)
        .map_err(|e| AppError::Inference(format!("Failed to create tensor: {}", e)))
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Highest `top_k` probabilities, best first, named from `labels`.
pub fn top_k_predictions(probabilities: &[f32], labels: &[String], top_k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_k = top_k.min(indexed.len());
    indexed[..top_k]
        .iter()
        .map(|&(idx, conf)| Prediction {
            class_name: labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", idx)),
            confidence: conf,
        })
        .collect()
}

#[derive(Clone)]
pub struct CustomClassifier {
    input_size: u32,
    model: Option<Arc<dyn ScoreModel>>,
}

#[derive(Clone)]
pub struct GenericClassifier {
    crop_size: u32,
    top_k: usize,
    model: Option<LoadedModel>,
}

/// The two interchangeable prediction strategies. Chosen once from config.
#[derive(Clone)]
pub enum InferenceBackend {
    Custom(CustomClassifier),
    Generic(GenericClassifier),
}

impl InferenceBackend {
    pub fn from_config(config: &ModelConfig) -> Self {
        match config.mode {
            ClassifierMode::Custom => InferenceBackend::Custom(CustomClassifier {
                input_size: config.input_size,
                model: None,
            }),
            ClassifierMode::Generic => InferenceBackend::Generic(GenericClassifier {
                crop_size: config.input_size,
                top_k: config.top_k,
                model: None,
            }),
        }
    }

    pub fn mode(&self) -> ClassifierMode {
        match self {
            InferenceBackend::Custom(_) => ClassifierMode::Custom,
            InferenceBackend::Generic(_) => ClassifierMode::Generic,
        }
    }

    pub fn attach(&mut self, loaded: LoadedModel) {
        match self {
            InferenceBackend::Custom(custom) => custom.model = Some(loaded.model),
            InferenceBackend::Generic(generic) => generic.model = Some(loaded),
        }
    }

    pub fn is_loaded(&self) -> bool {
        match self {
            InferenceBackend::Custom(custom) => custom.model.is_some(),
            InferenceBackend::Generic(generic) => generic.model.is_some(),
        }
    }

    /// Runs one frame through the model on a blocking thread.
    ///
    /// Evaluation errors are returned as-is; there is no default result.
    pub async fn classify(&self, frame: &FrameBuffer) -> Result<RawPrediction, AppError> {
        match self {
            InferenceBackend::Custom(custom) => {
                let model = custom.model.clone().ok_or(AppError::ModelNotLoaded)?;
                let input = preprocess_custom(frame, custom.input_size)?;
                let scores = run_blocking(model, input).await?;
                Ok(RawPrediction::Scores(scores))
            }
            InferenceBackend::Generic(generic) => {
                let loaded = generic.model.clone().ok_or(AppError::ModelNotLoaded)?;
                let input = preprocess_generic(frame, generic.crop_size)?;
                let logits = run_blocking(loaded.model, input).await?;
                let probabilities = softmax(&logits);
                Ok(RawPrediction::Labels(top_k_predictions(
                    &probabilities,
                    &loaded.labels,
                    generic.top_k,
                )))
            }
        }
    }
}

async fn run_blocking(model: Arc<dyn ScoreModel>, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
    tokio::task::spawn_blocking(move || model.run(input))
        .await
        .map_err(|e| AppError::Inference(format!("Inference task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use parking_lot::Mutex;

    struct FixedModel {
        output: Vec<f32>,
        seen_shape: Mutex<Option<Vec<usize>>>,
    }

    impl FixedModel {
        fn new(output: Vec<f32>) -> Arc<Self> {
            Arc::new(Self {
                output,
                seen_shape: Mutex::new(None),
            })
        }
    }

    impl ScoreModel for FixedModel {
        fn run(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
            *self.seen_shape.lock() = Some(input.shape().to_vec());
            Ok(self.output.clone())
        }
    }

    struct FailingModel;

    impl ScoreModel for FailingModel {
        fn run(&self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
            Err(AppError::Inference("graph exploded".to_string()))
        }
    }

    fn frame(width: u32, height: u32, value: u8) -> FrameBuffer {
        FrameBuffer::from_rgb(RgbImage::from_pixel(width, height, Rgb([value, 0, 255])))
    }

    fn custom_config() -> ModelConfig {
        ModelConfig::default()
    }

    fn generic_config() -> ModelConfig {
        ModelConfig {
            mode: ClassifierMode::Generic,
            top_k: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_preprocess_custom_scales_to_unit_range() {
        let tensor = preprocess_custom(&frame(640, 480, 51), 224).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!((tensor[[0, 0, 0, 0]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 100, 100, 1]], 0.0);
        assert_eq!(tensor[[0, 223, 223, 2]], 1.0);
    }

    #[test]
    fn test_preprocess_generic_layout() {
        let tensor = preprocess_generic(&frame(300, 200, 255), 224).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
        let expected_red = (1.0 - MEAN[0]) / STD[0];
        assert!((tensor[[0, 0, 10, 10]] - expected_red).abs() < 0.05);
        let expected_green = (0.0 - MEAN[1]) / STD[1];
        assert!((tensor[[0, 1, 10, 10]] - expected_green).abs() < 1e-4);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_top_k_predictions() {
        let labels = vec!["table".to_string(), "water bottle".to_string()];
        let preds = top_k_predictions(&[0.2, 0.7, 0.1], &labels, 2);
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].class_name, "water bottle");
        assert_eq!(preds[1].class_name, "table");

        let preds = top_k_predictions(&[0.2, 0.7, 0.1], &labels, 10);
        assert_eq!(preds[2].class_name, "class_2");
    }

    #[tokio::test]
    async fn test_classify_before_load_fails() {
        let backend = InferenceBackend::from_config(&custom_config());
        assert!(!backend.is_loaded());
        let err = backend.classify(&frame(8, 8, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::ModelNotLoaded));

        let backend = InferenceBackend::from_config(&generic_config());
        let err = backend.classify(&frame(8, 8, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::ModelNotLoaded));
    }

    #[tokio::test]
    async fn test_custom_returns_scores_verbatim() {
        let model = FixedModel::new(vec![0.1, 0.85, 0.05]);
        let mut backend = InferenceBackend::from_config(&custom_config());
        backend.attach(LoadedModel {
            model: model.clone(),
            labels: vec![],
        });

        assert_eq!(backend.mode(), ClassifierMode::Custom);
        let raw = backend.classify(&frame(32, 16, 1)).await.unwrap();
        assert_eq!(raw, RawPrediction::Scores(vec![0.1, 0.85, 0.05]));
        assert_eq!(
            model.seen_shape.lock().clone(),
            Some(vec![1, 224, 224, 3])
        );
    }

    #[tokio::test]
    async fn test_generic_ranks_labels() {
        let model = FixedModel::new(vec![0.0, 3.0, 1.0]);
        let mut backend = InferenceBackend::from_config(&generic_config());
        backend.attach(LoadedModel {
            model,
            labels: vec![
                "table".to_string(),
                "water bottle".to_string(),
                "chair".to_string(),
            ],
        });

        let raw = backend.classify(&frame(64, 64, 1)).await.unwrap();
        match raw {
            RawPrediction::Labels(preds) => {
                assert_eq!(preds.len(), 2);
                assert_eq!(preds[0].class_name, "water bottle");
                assert_eq!(preds[1].class_name, "chair");
                assert!(preds[0].confidence > preds[1].confidence);
            }
            other => panic!("Expected labels, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inference_error_propagates() {
        let mut backend = InferenceBackend::from_config(&custom_config());
        backend.attach(LoadedModel {
            model: Arc::new(FailingModel),
            labels: vec![],
        });
        let err = backend.classify(&frame(8, 8, 0)).await.unwrap_err();
        assert!(err.to_string().contains("graph exploded"));
    }
}

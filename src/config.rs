use crate::error::AppError;
use crate::models::category_types::Category;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Purpose-trained model whose outputs align with the catalog.
    Custom,
    /// Pretrained open-vocabulary model plus a label mapping.
    Generic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub mode: ClassifierMode,
    pub path: PathBuf,
    /// `id2label` config of the generic model.
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub top_k: usize,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Custom,
            path: PathBuf::from("./model/model.onnx"),
            labels_path: None,
            input_size: 224,
            top_k: 5,
            intra_threads: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub confidence_threshold: f32,
    pub low_confidence_message: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            low_confidence_message: "無法辨識，請調整角度或光線後重試".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub enabled: bool,
    pub rate: f32,
    pub lang: String,
    pub prefix: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: 1.2,
            lang: "zh-TW".to_string(),
            prefix: "發現".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub recognition: RecognitionConfig,
    /// Order must match the custom model's output order.
    pub categories: Vec<Category>,
    pub fallback_category: Option<String>,
    pub label_mapping: HashMap<String, String>,
    pub narration: NarrationConfig,
    pub explanation: ExplanationConfig,
    pub preferences_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            recognition: RecognitionConfig::default(),
            categories: default_categories(),
            fallback_category: None,
            label_mapping: default_label_mapping(),
            narration: NarrationConfig::default(),
            explanation: ExplanationConfig::default(),
            preferences_path: PathBuf::from("./preferences.json"),
        }
    }
}

impl AppConfig {
    /// Key of the default category. An explicit `fallback_category` wins; the
    /// built-in catalog falls back to `garbage`, any other catalog to its first
    /// entry (`None`).
    pub fn fallback_id(&self) -> Option<&str> {
        match &self.fallback_category {
            Some(id) => Some(id.as_str()),
            None if self.categories == default_categories() => Some(BUILT_IN_FALLBACK),
            None => None,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, AppError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.categories.is_empty() {
            return Err(AppError::Config("Category list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.id.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate category id '{}'",
                    category.id
                )));
            }
        }

        let threshold = self.recognition.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "Confidence threshold {} is outside [0, 1]",
                threshold
            )));
        }

        if self.model.input_size == 0 {
            return Err(AppError::Config("Model input size must be non-zero".to_string()));
        }

        if self.model.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }

        if let Some(fallback) = &self.fallback_category {
            if !seen.contains(fallback.as_str()) {
                return Err(AppError::Config(format!(
                    "Fallback category '{}' is not in the catalog",
                    fallback
                )));
            }
        }

        if self.model.mode == ClassifierMode::Generic && self.model.labels_path.is_none() {
            return Err(AppError::Config(
                "Generic mode requires model.labels_path".to_string(),
            ));
        }

        for (label, target) in &self.label_mapping {
            if !seen.contains(target.as_str()) {
                warn!(
                    "Label mapping '{}' -> '{}' targets an unknown category and will be ignored",
                    label, target
                );
            }
        }

        Ok(())
    }
}

const BUILT_IN_FALLBACK: &str = "garbage";

fn category(id: &str, name: &str, icon: &str, color: &str, description: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        description: description.to_string(),
    }
}

pub fn default_categories() -> Vec<Category> {
    vec![
        category("aseptic carton", "鋁箔包", "🧃", "#20c997", "利樂包、鋁箔包飲料盒，需壓扁回收"),
        category("garbage", "垃圾", "🗑️", "#6c757d", "一般垃圾，無法回收"),
        category("metal_can", "鐵鋁罐", "🥫", "#6f42c1", "鐵罐、鋁罐、金屬容器"),
        category("paper", "紙類", "📄", "#ffc107", "紙張、報紙、書籍等"),
        category("paper_container", "紙餐盒", "🥡", "#fd7e14", "紙製餐盒、紙杯等，需清洗後回收"),
        category("plastic", "塑膠類", "🧴", "#0d6efd", "塑膠瓶、塑膠容器等"),
    ]
}

pub fn default_label_mapping() -> HashMap<String, String> {
    [
        ("water_bottle", "plastic"),
        ("pop_bottle", "plastic"),
        ("plastic_bag", "plastic"),
        ("can_opener", "metal_can"),
        ("beer_bottle", "metal_can"),
        ("envelope", "paper"),
        ("notebook", "paper"),
        ("carton", "paper_container"),
        ("packet", "aseptic carton"),
    ]
    .into_iter()
    .map(|(label, target)| (label.to_string(), target.to_string()))
    .collect()
}

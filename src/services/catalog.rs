use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::category_types::Category;
use std::collections::{HashMap, HashSet};

/// Ordered category list. Index `i` is the custom model's output `i`.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
    fallback: usize,
}

impl CategoryCatalog {
    /// `fallback_id` names the default category; the first entry when `None`.
    pub fn new(categories: Vec<Category>, fallback_id: Option<&str>) -> Result<Self, AppError> {
        if categories.is_empty() {
            return Err(AppError::Config("Category list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.id.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate category id '{}'",
                    category.id
                )));
            }
        }

        let fallback = match fallback_id {
            Some(id) => categories
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| {
                    AppError::Config(format!("Fallback category '{}' is not in the catalog", id))
                })?,
            None => 0,
        };

        Ok(Self {
            categories,
            fallback,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(config.categories.clone(), config.fallback_id())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn get(&self, index: usize) -> Option<&Category> {
        self.categories.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn fallback(&self) -> &Category {
        &self.categories[self.fallback]
    }
}

/// Lower-case, spaces to underscores: `"Water bottle"` becomes `"water_bottle"`.
pub fn normalize_label(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

/// Generic-model label to category id.
#[derive(Debug, Clone, Default)]
pub struct LabelMapping {
    entries: HashMap<String, String>,
}

impl LabelMapping {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(label, target)| (normalize_label(&label), target))
            .collect();
        Self { entries }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.label_mapping.clone())
    }

    /// Looks up a raw model label after normalizing it.
    pub fn lookup(&self, label: &str) -> Option<&str> {
        self.entries.get(&normalize_label(label)).map(String::as_str)
    }
}

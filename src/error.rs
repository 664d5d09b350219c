use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a frame source could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameSourceError {
    PermissionDenied,
    DeviceNotFound,
    Other,
}

impl fmt::Display for FrameSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSourceError::PermissionDenied => write!(f, "permission denied"),
            FrameSourceError::DeviceNotFound => write!(f, "device not found"),
            FrameSourceError::Other => write!(f, "frame source failed to start"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model output has {actual} scores but the catalog has {expected} categories")]
    IndexOutOfRange { expected: usize, actual: usize },

    #[error("Frame source error: {0}")]
    FrameSource(FrameSourceError),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl From<FrameSourceError> for AppError {
    fn from(err: FrameSourceError) -> Self {
        AppError::FrameSource(err)
    }
}

impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Inference(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Message(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Message(msg.to_string())
    }
}

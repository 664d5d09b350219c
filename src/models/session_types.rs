use crate::error::FrameSourceError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Frame source or model not ready yet.
    Idle,
    /// Live view, accepting captures.
    Live,
    /// One inference in flight.
    Capturing,
    /// Result displayed on the frozen frame.
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Status {
    Starting,
    LoadingModel,
    Ready,
    Recognizing,
    Recognized { name: String },
    LowConfidence,
    CaptureFailed { message: String },
    FrameSourceFailed { reason: FrameSourceError },
    ModelLoadFailed { message: String },
}

impl Status {
    pub fn message(&self) -> String {
        match self {
            Status::Starting => "正在啟動相機...".to_string(),
            Status::LoadingModel => "正在載入模型...".to_string(),
            Status::Ready => "🚀 系統就緒".to_string(),
            Status::Recognizing => "辨識中...".to_string(),
            Status::Recognized { name } => format!("✅ 辨識完成: {}", name),
            Status::LowConfidence => "⚠️ 信心度不足".to_string(),
            Status::CaptureFailed { .. } => "⚠️ 辨識發生錯誤".to_string(),
            Status::FrameSourceFailed { reason } => match reason {
                FrameSourceError::PermissionDenied => "⚠️ 請允許相機權限".to_string(),
                FrameSourceError::DeviceNotFound => "⚠️ 找不到相機裝置".to_string(),
                FrameSourceError::Other => "⚠️ 相機啟動失敗".to_string(),
            },
            Status::ModelLoadFailed { message } => format!("⚠️ 模型載入失敗: {}", message),
        }
    }

    /// Fatal statuses persist; the session cannot classify anymore.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Status::FrameSourceFailed { .. } | Status::ModelLoadFailed { .. }
        )
    }
}

/// What the presentation layer shows for the current result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub category_id: String,
    pub icon: String,
    pub name: String,
    pub confidence_percent: u32,
    pub color: String,
    /// Category description when accepted, the low-confidence message otherwise.
    pub detail: String,
    pub accepted: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: Phase,
    pub status: String,
    pub fatal: bool,
    pub loading: bool,
    pub show_capture: bool,
    pub show_reset: bool,
    pub result: Option<ResultView>,
}

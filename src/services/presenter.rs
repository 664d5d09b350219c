use crate::models::session_types::{Phase, ResultView, SessionView};
use crate::services::confidence::Verdict;
use crate::services::session::core::SessionState;
use tracing::info;

/// Receives a view after every session transition.
pub trait Presenter: Send + Sync {
    fn render(&self, view: &SessionView);
}

pub fn build_view(state: &SessionState, low_confidence_message: &str) -> SessionView {
    let result = state.current_result.as_ref().map(|result| {
        let accepted = state.verdict == Some(Verdict::Accepted);
        ResultView {
            category_id: result.category.id.clone(),
            icon: result.category.icon.clone(),
            name: result.category.name.clone(),
            confidence_percent: (result.confidence.clamp(0.0, 1.0) * 100.0).round() as u32,
            color: result.category.color.clone(),
            detail: if accepted {
                result.category.description.clone()
            } else {
                low_confidence_message.to_string()
            },
            accepted,
            explanation: state.explanation.clone(),
        }
    });

    SessionView {
        phase: state.phase,
        status: state.status.message(),
        fatal: state.status.is_fatal(),
        loading: state.is_busy(),
        show_capture: !state.is_frozen(),
        show_reset: state.is_frozen(),
        result,
    }
}

pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn render(&self, view: &SessionView) {
        info!("[{:?}] {}", view.phase, view.status);

        if view.phase == Phase::Frozen {
            if let Some(result) = &view.result {
                info!(
                    "{} {} {}% - {}",
                    result.icon, result.name, result.confidence_percent, result.detail
                );
                if let Some(explanation) = &result.explanation {
                    info!("{}", explanation);
                }
            }
        }
    }
}

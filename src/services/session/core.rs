use crate::error::FrameSourceError;
use crate::models::classify_types::ClassificationResult;
use crate::models::session_types::{Phase, Status};
use crate::services::confidence::{verdict, Verdict};
use crate::services::frame_source::FrameBuffer;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub confidence_threshold: f32,
    pub explanation_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub model_ready: bool,
    pub frame_source_ready: bool,
    pub phase: Phase,
    pub current_result: Option<ClassificationResult>,
    pub verdict: Option<Verdict>,
    pub explanation: Option<String>,
    pub narration_enabled: bool,
    pub status: Status,
}

impl SessionState {
    pub fn is_frozen(&self) -> bool {
        matches!(self.phase, Phase::Capturing | Phase::Frozen)
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Capturing
    }

    fn ready(&self) -> bool {
        self.model_ready && self.frame_source_ready
    }
}

#[derive(Debug)]
pub enum Event {
    FrameSourceDone(Result<(), FrameSourceError>),
    ModelLoadDone(Result<(), String>),
    /// `frame` is set for uploads; camera captures read the frame source.
    CaptureRequested { frame: Option<FrameBuffer> },
    ClassifyDone(Result<ClassificationResult, String>),
    ResetRequested,
    NarrationToggled(bool),
    ExplanationDone {
        category_id: String,
        explanation: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquireFrameSource,
    LoadModel,
    Classify { frame: Option<FrameBuffer> },
    Narrate { text: String },
    SavePreferences { narration_enabled: bool },
    FetchExplanation { category_id: String },
}

pub fn init(narration_enabled: bool) -> (SessionState, Vec<Effect>) {
    (
        SessionState {
            model_ready: false,
            frame_source_ready: false,
            phase: Phase::Idle,
            current_result: None,
            verdict: None,
            explanation: None,
            narration_enabled,
            status: Status::Starting,
        },
        vec![Effect::AcquireFrameSource],
    )
}

pub fn transition(
    config: &SessionConfig,
    state: SessionState,
    event: Event,
) -> (SessionState, Vec<Effect>) {
    match (state.phase, event) {
        // Startup: frame source first, then the model.
        (Phase::Idle, Event::FrameSourceDone(Ok(()))) => (
            SessionState {
                frame_source_ready: true,
                status: Status::LoadingModel,
                ..state
            },
            vec![Effect::LoadModel],
        ),
        (Phase::Idle, Event::FrameSourceDone(Err(reason))) => (
            SessionState {
                frame_source_ready: false,
                status: Status::FrameSourceFailed { reason },
                ..state
            },
            vec![],
        ),
        (Phase::Idle, Event::ModelLoadDone(Ok(()))) => {
            let next = SessionState {
                model_ready: true,
                ..state
            };
            if next.ready() {
                (
                    SessionState {
                        phase: Phase::Live,
                        status: Status::Ready,
                        ..next
                    },
                    vec![],
                )
            } else {
                (next, vec![])
            }
        }
        (Phase::Idle, Event::ModelLoadDone(Err(message))) => (
            SessionState {
                model_ready: false,
                status: Status::ModelLoadFailed { message },
                ..state
            },
            vec![],
        ),

        // Capture is only accepted from Live.
        (Phase::Live, Event::CaptureRequested { frame }) if state.ready() => (
            SessionState {
                phase: Phase::Capturing,
                current_result: None,
                verdict: None,
                explanation: None,
                status: Status::Recognizing,
                ..state
            },
            vec![Effect::Classify { frame }],
        ),
        (Phase::Capturing, Event::ClassifyDone(Ok(result))) => {
            let verdict = verdict(&result, config.confidence_threshold);
            let mut effects = vec![];

            let status = match verdict {
                Verdict::Accepted => {
                    if state.narration_enabled {
                        effects.push(Effect::Narrate {
                            text: result.category.name.clone(),
                        });
                    }
                    if config.explanation_enabled {
                        effects.push(Effect::FetchExplanation {
                            category_id: result.category.id.clone(),
                        });
                    }
                    Status::Recognized {
                        name: result.category.name.clone(),
                    }
                }
                Verdict::Rejected => Status::LowConfidence,
            };

            (
                SessionState {
                    phase: Phase::Frozen,
                    current_result: Some(result),
                    verdict: Some(verdict),
                    status,
                    ..state
                },
                effects,
            )
        }
        (Phase::Capturing, Event::ClassifyDone(Err(message))) => (
            SessionState {
                phase: Phase::Live,
                current_result: None,
                verdict: None,
                status: Status::CaptureFailed { message },
                ..state
            },
            vec![],
        ),
        (Phase::Frozen, Event::ResetRequested) => (
            SessionState {
                phase: Phase::Live,
                current_result: None,
                verdict: None,
                explanation: None,
                status: Status::Ready,
                ..state
            },
            vec![],
        ),
        (Phase::Frozen, Event::ExplanationDone {
            category_id,
            explanation,
        }) => {
            let matches_current = state
                .current_result
                .as_ref()
                .is_some_and(|r| r.category.id == category_id);
            if matches_current {
                (
                    SessionState {
                        explanation,
                        ..state
                    },
                    vec![],
                )
            } else {
                (state, vec![])
            }
        }
        (_, Event::NarrationToggled(enabled)) => (
            SessionState {
                narration_enabled: enabled,
                ..state
            },
            vec![Effect::SavePreferences {
                narration_enabled: enabled,
            }],
        ),

        // Everything else, including captures outside Live, is dropped.
        _ => (state, vec![]),
    }
}

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::classify_types::ClassificationResult;
use crate::services::catalog::{CategoryCatalog, LabelMapping};
use crate::services::classifier::inference::InferenceBackend;
use crate::services::classifier::model_manager::ModelLoader;
use crate::services::explanation::ExplanationClient;
use crate::services::frame_source::{decode_data_url, decode_image, FrameBuffer, FrameSource};
use crate::services::narration::Narrator;
use crate::services::preferences::{PreferenceStore, Preferences};
use crate::services::presenter::{build_view, Presenter};
use crate::services::resolver::resolve;
use crate::services::session::core::{
    init, transition, Effect, Event, SessionConfig, SessionState,
};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// External collaborators a session talks to.
pub struct Collaborators {
    pub frame_source: Arc<dyn FrameSource>,
    pub model_loader: Arc<dyn ModelLoader>,
    pub presenter: Arc<dyn Presenter>,
    pub narrator: Narrator,
    pub preferences: Arc<dyn PreferenceStore>,
    pub explanation: ExplanationClient,
}

/// Owns one session's state and is the only place pipeline failures turn
/// into status and transitions.
pub struct SessionController {
    config: SessionConfig,
    default_narration: bool,
    low_confidence_message: String,
    catalog: CategoryCatalog,
    mapping: LabelMapping,
    backend: RwLock<InferenceBackend>,
    state: Mutex<SessionState>,
    collaborators: Collaborators,
    me: Weak<SessionController>,
}

impl SessionController {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Result<Arc<Self>, AppError> {
        config.validate()?;
        let catalog = CategoryCatalog::from_config(config)?;

        Ok(Arc::new_cyclic(|me| Self {
            config: SessionConfig {
                confidence_threshold: config.recognition.confidence_threshold,
                explanation_enabled: collaborators.explanation.is_enabled(),
            },
            default_narration: config.narration.enabled,
            low_confidence_message: config.recognition.low_confidence_message.clone(),
            catalog,
            mapping: LabelMapping::from_config(config),
            backend: RwLock::new(InferenceBackend::from_config(&config.model)),
            state: Mutex::new(init(config.narration.enabled).0),
            collaborators,
            me: me.clone(),
        }))
    }

    /// Reads preferences, acquires the frame source and loads the model.
    /// Startup failures end up in the returned state's status.
    pub async fn start(&self) -> SessionState {
        let narration_enabled = match self.collaborators.preferences.load().await {
            Ok(Some(preferences)) => preferences.narration_enabled,
            Ok(None) => self.default_narration,
            Err(e) => {
                warn!("Failed to read preferences, using defaults: {}", e);
                self.default_narration
            }
        };

        let (initial, effects) = init(narration_enabled);
        *self.state.lock() = initial.clone();
        self.collaborators
            .presenter
            .render(&build_view(&initial, &self.low_confidence_message));

        let mut queue = VecDeque::new();
        for effect in effects {
            if let Some(event) = self.run_effect(effect).await {
                queue.push_back(event);
            }
        }
        self.drain(queue).await
    }

    /// Captures the current camera frame and classifies it. Dropped unless the
    /// session is live.
    pub async fn capture(&self) -> SessionState {
        self.dispatch(Event::CaptureRequested { frame: None }).await
    }

    /// Classifies an uploaded image. A frame that cannot be decoded leaves the
    /// session untouched.
    pub async fn upload(&self, bytes: &[u8]) -> Result<SessionState, AppError> {
        let frame = decode_image(bytes)?;
        Ok(self.capture_frame(frame).await)
    }

    pub async fn upload_data_url(&self, url: &str) -> Result<SessionState, AppError> {
        let frame = decode_data_url(url)?;
        Ok(self.capture_frame(frame).await)
    }

    pub async fn capture_frame(&self, frame: FrameBuffer) -> SessionState {
        self.dispatch(Event::CaptureRequested { frame: Some(frame) })
            .await
    }

    /// Leaves the frozen view and clears the result.
    pub async fn reset(&self) -> SessionState {
        self.dispatch(Event::ResetRequested).await
    }

    pub async fn set_narration_enabled(&self, enabled: bool) -> SessionState {
        self.dispatch(Event::NarrationToggled(enabled)).await
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    async fn dispatch(&self, event: Event) -> SessionState {
        let mut queue = VecDeque::new();
        queue.push_back(event);
        self.drain(queue).await
    }

    async fn drain(&self, mut queue: VecDeque<Event>) -> SessionState {
        while let Some(event) = queue.pop_front() {
            let effects = self.apply(event);
            for effect in effects {
                if let Some(next) = self.run_effect(effect).await {
                    queue.push_back(next);
                }
            }
        }

        self.state()
    }

    /// Runs one transition under the state lock and renders the new state.
    fn apply(&self, event: Event) -> Vec<Effect> {
        let mut guard = self.state.lock();
        debug!("phase {:?}, event {:?}", guard.phase, event);

        let before = guard.clone();
        let (next, effects) = transition(&self.config, before.clone(), event);

        if next == before && effects.is_empty() {
            debug!("Event ignored in phase {:?}", next.phase);
            return effects;
        }

        debug!("-> phase {:?}, effects {:?}", next.phase, effects);
        let view = build_view(&next, &self.low_confidence_message);
        *guard = next;
        drop(guard);

        self.collaborators.presenter.render(&view);
        effects
    }

    async fn run_effect(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::AcquireFrameSource => {
                let result = self.collaborators.frame_source.acquire().await;
                match &result {
                    Ok(()) => info!("Frame source ready"),
                    Err(reason) => error!("Frame source failed: {}", reason),
                }
                Some(Event::FrameSourceDone(result))
            }
            Effect::LoadModel => {
                let result = self.collaborators.model_loader.load().await;
                match result {
                    Ok(loaded) => {
                        self.backend.write().attach(loaded);
                        info!("Model loaded");
                        Some(Event::ModelLoadDone(Ok(())))
                    }
                    Err(e) => {
                        error!("Model load failed: {}", e);
                        Some(Event::ModelLoadDone(Err(e.to_string())))
                    }
                }
            }
            Effect::Classify { frame } => {
                let result = self.classify(frame).await;
                if let Err(e) = &result {
                    match e {
                        AppError::IndexOutOfRange { expected, actual } => error!(
                            "Model/catalog mismatch: {} outputs for {} categories",
                            actual, expected
                        ),
                        _ => warn!("Capture failed: {}", e),
                    }
                }
                Some(Event::ClassifyDone(result.map_err(|e| e.to_string())))
            }
            Effect::Narrate { text } => {
                self.collaborators.narrator.announce(&text);
                None
            }
            Effect::SavePreferences { narration_enabled } => {
                if let Err(e) = self
                    .collaborators
                    .preferences
                    .save(Preferences { narration_enabled })
                    .await
                {
                    warn!("Failed to save preferences: {}", e);
                }
                None
            }
            // The frozen result is already shown; the explanation lands later.
            Effect::FetchExplanation { category_id } => {
                let Some(controller) = self.me.upgrade() else {
                    return None;
                };
                tokio::spawn(async move {
                    let explanation = controller.collaborators.explanation.fetch(&category_id).await;
                    controller.apply(Event::ExplanationDone {
                        category_id,
                        explanation,
                    });
                });
                None
            }
        }
    }

    async fn classify(&self, frame: Option<FrameBuffer>) -> Result<ClassificationResult, AppError> {
        let frame = match frame {
            Some(frame) => frame,
            None => self.collaborators.frame_source.current_frame()?,
        };

        let backend = self.backend.read().clone();
        let raw = backend.classify(&frame).await?;
        resolve(raw, &self.catalog, &self.mapping)
    }
}

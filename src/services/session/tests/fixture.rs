use crate::config::AppConfig;
use crate::error::{AppError, FrameSourceError};
use crate::models::category_types::Category;
use crate::models::session_types::SessionView;
use crate::services::classifier::inference::{LoadedModel, ScoreModel};
use crate::services::classifier::model_manager::ModelLoader;
use crate::services::explanation::ExplanationClient;
use crate::services::frame_source::{FrameBuffer, FrameSource};
use crate::services::narration::{Narrator, SpeechEngine, Utterance};
use crate::services::preferences::{MemoryPreferenceStore, PreferenceStore, Preferences};
use crate::services::presenter::Presenter;
use crate::services::session::controller::{Collaborators, SessionController};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use ndarray::Array4;
use parking_lot::Mutex;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

pub fn category(id: &str) -> Category {
    Category {
        id: id.to_string(),
        name: format!("{}-name", id),
        icon: String::new(),
        color: String::new(),
        description: format!("{} description", id),
    }
}

/// Catalog `[garbage, metal_can, paper]`, threshold 0.7.
pub fn small_config() -> AppConfig {
    AppConfig {
        categories: vec![category("garbage"), category("metal_can"), category("paper")],
        fallback_category: None,
        ..Default::default()
    }
}

pub fn frame() -> FrameBuffer {
    FrameBuffer::from_rgb(RgbImage::from_pixel(16, 16, Rgb([120, 120, 120])))
}

pub struct FakeFrameSource {
    pub result: Result<(), FrameSourceError>,
}

#[async_trait]
impl FrameSource for FakeFrameSource {
    async fn acquire(&self) -> Result<(), FrameSourceError> {
        self.result
    }

    fn current_frame(&self) -> Result<FrameBuffer, AppError> {
        match self.result {
            Ok(()) => Ok(frame()),
            Err(reason) => Err(reason.into()),
        }
    }
}

/// Returns queued outputs in order, repeating the last one. With a gate set,
/// each run blocks until the test sends on the gate.
pub struct ScriptedModel {
    pub outputs: Mutex<Vec<Result<Vec<f32>, String>>>,
    pub runs: Mutex<usize>,
    pub gate: Option<Mutex<Receiver<()>>>,
}

impl ScoreModel for ScriptedModel {
    fn run(&self, _input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        *self.runs.lock() += 1;
        if let Some(gate) = &self.gate {
            let _ = gate.lock().recv();
        }
        let mut outputs = self.outputs.lock();
        let next = if outputs.len() > 1 {
            outputs.remove(0)
        } else {
            outputs[0].clone()
        };
        next.map_err(AppError::Inference)
    }
}

pub struct FakeModelLoader {
    pub result: Result<Arc<ScriptedModel>, String>,
}

#[async_trait]
impl ModelLoader for FakeModelLoader {
    async fn load(&self) -> Result<LoadedModel, AppError> {
        match &self.result {
            Ok(model) => Ok(LoadedModel {
                model: model.clone(),
                labels: vec![],
            }),
            Err(message) => Err(AppError::ModelLoad(message.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechCall {
    Cancel,
    Speak(Utterance),
}

#[derive(Default)]
pub struct RecordingEngine {
    pub calls: Mutex<Vec<SpeechCall>>,
}

impl SpeechEngine for RecordingEngine {
    fn is_supported(&self) -> bool {
        true
    }

    fn cancel(&self) {
        self.calls.lock().push(SpeechCall::Cancel);
    }

    fn speak(&self, utterance: Utterance) {
        self.calls.lock().push(SpeechCall::Speak(utterance));
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub views: Mutex<Vec<SessionView>>,
}

impl Presenter for RecordingPresenter {
    fn render(&self, view: &SessionView) {
        self.views.lock().push(view.clone());
    }
}

pub struct Fixture {
    pub model: Arc<ScriptedModel>,
    pub speech: Arc<RecordingEngine>,
    pub presenter: Arc<RecordingPresenter>,
    pub preferences: Arc<MemoryPreferenceStore>,
    pub gate: Option<Sender<()>>,
    pub controller: Arc<SessionController>,
}

pub struct FixtureOptions {
    pub config: AppConfig,
    pub outputs: Vec<Result<Vec<f32>, String>>,
    pub frame_source: Result<(), FrameSourceError>,
    pub model_load: Result<(), String>,
    pub gated: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            config: small_config(),
            outputs: vec![Ok(vec![0.1, 0.85, 0.05])],
            frame_source: Ok(()),
            model_load: Ok(()),
            gated: false,
        }
    }
}

impl Fixture {
    pub fn new(options: FixtureOptions) -> Self {
        let (gate, gate_rx) = if options.gated {
            let (tx, rx) = channel();
            (Some(tx), Some(Mutex::new(rx)))
        } else {
            (None, None)
        };
        let model = Arc::new(ScriptedModel {
            outputs: Mutex::new(options.outputs),
            runs: Mutex::new(0),
            gate: gate_rx,
        });
        let speech = Arc::new(RecordingEngine::default());
        let presenter = Arc::new(RecordingPresenter::default());
        let preferences = Arc::new(MemoryPreferenceStore::new());

        let collaborators = Collaborators {
            frame_source: Arc::new(FakeFrameSource {
                result: options.frame_source,
            }),
            model_loader: Arc::new(FakeModelLoader {
                result: options.model_load.map(|_| model.clone()),
            }),
            presenter: presenter.clone(),
            narrator: Narrator::new(speech.clone(), options.config.narration.clone()),
            preferences: preferences.clone(),
            explanation: ExplanationClient::new(&options.config.explanation),
        };

        let controller = SessionController::new(&options.config, collaborators).unwrap();

        Self {
            model,
            speech,
            presenter,
            preferences,
            gate,
            controller,
        }
    }

    pub async fn started(options: FixtureOptions) -> Self {
        let fixture = Self::new(options);
        fixture.controller.start().await;
        fixture
    }

    /// Starts with narration enabled through the stored preference.
    pub async fn started_with_narration(options: FixtureOptions) -> Self {
        let fixture = Self::new(options);
        fixture
            .preferences
            .save(Preferences {
                narration_enabled: true,
            })
            .await
            .unwrap();
        fixture.controller.start().await;
        fixture
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.send(()).unwrap();
        }
    }

    pub fn model_runs(&self) -> usize {
        *self.model.runs.lock()
    }
}

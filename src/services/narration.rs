use crate::config::NarrationConfig;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
}

/// Text-to-speech backend. Implementations are fire-and-forget.
pub trait SpeechEngine: Send + Sync {
    fn is_supported(&self) -> bool;
    /// Stops any utterance still playing.
    fn cancel(&self);
    fn speak(&self, utterance: Utterance);
}

/// Announces recognized categories; at most one utterance plays at a time.
#[derive(Clone)]
pub struct Narrator {
    engine: Arc<dyn SpeechEngine>,
    config: NarrationConfig,
}

impl Narrator {
    pub fn new(engine: Arc<dyn SpeechEngine>, config: NarrationConfig) -> Self {
        Self { engine, config }
    }

    pub fn announce(&self, category_name: &str) {
        if !self.engine.is_supported() {
            return;
        }

        self.engine.cancel();
        self.engine.speak(Utterance {
            text: format!("{}{}", self.config.prefix, category_name),
            lang: self.config.lang.clone(),
            rate: self.config.rate,
        });
    }
}

/// Writes utterances to the log instead of an audio device.
pub struct LogSpeechEngine;

impl SpeechEngine for LogSpeechEngine {
    fn is_supported(&self) -> bool {
        true
    }

    fn cancel(&self) {}

    fn speak(&self, utterance: Utterance) {
        info!(
            "[speech {} x{}] {}",
            utterance.lang, utterance.rate, utterance.text
        );
    }
}

use crate::core::config::TtsConfig;
use crate::services::manifest::SpeechRequest;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

pub mod gpt_sovits;

/// The two model checkpoints the synthesis service switches between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightKind {
    Gpt,
    Sovits,
}

impl WeightKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            WeightKind::Gpt => "set_gpt_weights",
            WeightKind::Sovits => "set_sovits_weights",
        }
    }

    /// The manifest field holding this kind of weight.
    pub fn of(self, request: &SpeechRequest) -> &str {
        match self {
            WeightKind::Gpt => &request.gpt_weight,
            WeightKind::Sovits => &request.sovits_weight,
        }
    }
}

impl fmt::Display for WeightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightKind::Gpt => write!(f, "GPT"),
            WeightKind::Sovits => write!(f, "SoVITS"),
        }
    }
}

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Loads a checkpoint on the service.
    async fn set_weights(&self, kind: WeightKind, path: &str) -> Result<()>;

    /// Returns the encoded audio for one request.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}

pub fn create_tts_client(config: &TtsConfig) -> Result<Box<dyn TtsClient>> {
    Ok(Box::new(gpt_sovits::GptSovitsClient::new(config.clone())?))
}

pub mod emotion;
pub mod llm;
pub mod manifest;
pub mod retry;
pub mod setup;
pub mod translate;
pub mod tts;
pub mod vocal;
pub mod workflow;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::state::Preset;
use crate::services::llm::LlmConfig;
use crate::services::retry::RetryPolicy;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_character_map")]
    pub character_map: String,

    #[serde(default = "default_emotions")]
    pub emotions: String,

    #[serde(default = "default_preset_map")]
    pub preset_map: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub translation: TranslationConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub default_preset: Preset,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Appended to the stem of a translated scene file, `scene.json` -> `scene_ja.json`.
    #[serde(default = "default_language_suffix")]
    pub language_suffix: String,
    #[serde(default = "default_translation_system_prompt")]
    pub system_prompt: String,
    /// `{text}` is replaced with the line being translated.
    #[serde(default = "default_translation_user_prompt")]
    pub user_prompt: String,
    /// Display name -> replacement used before translation. Falls back to the character map when absent.
    pub name_map: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TtsConfig {
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_weights_timeout")]
    pub weights_timeout_secs: u64,
    #[serde(default = "default_request_interval")]
    pub request_interval_ms: u64,
    #[serde(default = "default_min_audio_bytes")]
    pub min_audio_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: default_input(),
            output_folder: default_output(),
            character_map: default_character_map(),
            emotions: default_emotions(),
            preset_map: default_preset_map(),
            llm: LlmConfig::default(),
            translation: TranslationConfig::default(),
            tts: TtsConfig::default(),
            default_preset: Preset::default(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            language_suffix: default_language_suffix(),
            system_prompt: default_translation_system_prompt(),
            user_prompt: default_translation_user_prompt(),
            name_map: None,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            request_timeout_secs: default_request_timeout(),
            weights_timeout_secs: default_weights_timeout(),
            request_interval_ms: default_request_interval(),
            min_audio_bytes: default_min_audio_bytes(),
        }
    }
}

impl TtsConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_character_map() -> String {
    "character_map.json".to_string()
}
fn default_emotions() -> String {
    "assets/emotions.json".to_string()
}
fn default_preset_map() -> String {
    "preset_map.json".to_string()
}
fn default_language_suffix() -> String {
    "ja".to_string()
}
fn default_translation_system_prompt() -> String {
    "你是一个擅长日语口语的 AI，请以日本女子高中生的语气翻译以下内容。".to_string()
}
fn default_translation_user_prompt() -> String {
    "请将下面的句子翻译成自然的日语，尽量使用假名表达外来语。不要添加任何解释或注释。\n\n{text}"
        .to_string()
}
fn default_tts_base_url() -> String {
    "http://127.0.0.1:9865".to_string()
}
fn default_request_timeout() -> u64 {
    600
}
fn default_weights_timeout() -> u64 {
    10
}
fn default_request_interval() -> u64 {
    1000
}
fn default_min_audio_bytes() -> usize {
    500
}

impl Config {
    /// Loads `config.yml` from the working directory, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.llm.retry_count,
            Duration::from_secs(self.llm.retry_delay_seconds),
        )
    }
}

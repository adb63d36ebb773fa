use crate::core::config::TranslationConfig;
use crate::core::io::file_stem;
use crate::core::state::CharacterMap;
use crate::script::dialogue::SceneDialogue;
use crate::script::parser::strip_asides;
use crate::services::llm::LlmClient;
use crate::services::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const TRANSLATION_TEMPERATURE: f32 = 0.3;

/// Marker appended to a line the service could not translate.
pub const FAILURE_MARKER: &str = "[翻译失败]";

/// Replaces every display name in `text` with its substitute.
///
/// Longer names go first so that a name containing another is replaced whole.
pub fn replace_names(text: &str, names: &CharacterMap) -> String {
    let mut pairs: Vec<_> = names.iter().filter(|(name, _)| !name.is_empty()).collect();
    pairs.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    pairs
        .into_iter()
        .fold(text.to_string(), |acc, (name, replacement)| acc.replace(name.as_str(), replacement))
}

pub struct Translator<'a> {
    llm: &'a dyn LlmClient,
    policy: RetryPolicy,
    config: &'a TranslationConfig,
    names: &'a CharacterMap,
}

impl<'a> Translator<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        policy: RetryPolicy,
        config: &'a TranslationConfig,
        names: &'a CharacterMap,
    ) -> Self {
        Self {
            llm,
            policy,
            config,
            names,
        }
    }

    /// Text as submitted to the service: names substituted, asides removed.
    pub fn prepare(&self, text: &str) -> String {
        strip_asides(&replace_names(text, self.names))
    }

    /// Translates already prepared text. Never fails; exhausted retries return the
    /// input followed by the failure marker.
    pub async fn translate_text(&self, text: &str) -> String {
        let prompt = self.config.user_prompt.replace("{text}", text);
        self.policy
            .run_or(
                "Translation",
                format!("{} {}", text, FAILURE_MARKER),
                |_| {
                    self.llm
                        .chat(&self.config.system_prompt, &prompt, Some(TRANSLATION_TEMPERATURE))
                },
            )
            .await
    }

    /// Translates every utterance, keeping speaker order and emotion labels.
    pub async fn translate_scene(&self, scene: &SceneDialogue) -> SceneDialogue {
        let mut out = SceneDialogue::new();
        for (id, lines) in scene.iter() {
            out.add_speaker(id);
            for utterance in lines {
                let prepared = self.prepare(utterance.text());
                println!("Translating: {}", prepared);
                let translated = self.translate_text(&prepared).await;
                out.push(id, utterance.with_text(translated));
            }
        }
        out
    }

    /// Translates `input` and writes `<stem>_<suffix>.json` next to it.
    pub async fn translate_file(&self, input: &Path) -> Result<PathBuf> {
        let scene = SceneDialogue::load(input)?;
        let translated = self.translate_scene(&scene).await;

        let stem = file_stem(input)?;
        let output = input.with_file_name(format!("{}_{}.json", stem, self.config.language_suffix));
        translated
            .save(&output)
            .with_context(|| format!("Failed to save translation of {}", input.display()))?;
        log::info!("Saved translation to {}", output.display());
        Ok(output)
    }
}

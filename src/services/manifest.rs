use crate::core::io::{file_stem, read_json_lines, read_lines, write_json_lines};
use crate::core::state::{Preset, PresetMap};
use crate::script::dialogue::SceneDialogue;
use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Character used when a plain text manifest names nobody.
pub const UNKNOWN_CHARACTER: &str = "unknown";

/// One synthesis request, serialized exactly as the TTS service expects it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SpeechRequest {
    #[serde(default)]
    pub character: String,
    pub text: String,
    pub text_lang: String,
    pub ref_audio_path: String,
    #[serde(default)]
    pub prompt_text: String,
    pub prompt_lang: String,
    #[serde(default = "default_split_method")]
    pub text_split_method: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_media_type")]
    pub media_type: String,
    #[serde(default)]
    pub streaming_mode: bool,
    #[serde(default)]
    pub gpt_weight: String,
    #[serde(default)]
    pub sovits_weight: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

fn default_split_method() -> String {
    "cut5".to_string()
}
fn default_batch_size() -> u32 {
    1
}
fn default_media_type() -> String {
    "wav".to_string()
}

impl SpeechRequest {
    pub fn new(character: &str, text: &str, preset: &Preset) -> Self {
        Self {
            character: character.to_string(),
            text: text.to_string(),
            text_lang: preset.text_lang.clone(),
            ref_audio_path: preset.ref_audio_path.clone(),
            prompt_text: preset.prompt_text.clone(),
            prompt_lang: preset.prompt_lang.clone(),
            text_split_method: default_split_method(),
            batch_size: default_batch_size(),
            media_type: default_media_type(),
            streaming_mode: false,
            gpt_weight: preset.gpt_weight.clone(),
            sovits_weight: preset.sovits_weight.clone(),
            sample_steps: preset.sample_steps,
            emotion: None,
        }
    }

    pub fn with_emotion(mut self, emotion: Option<&str>) -> Self {
        self.emotion = emotion.map(str::to_string);
        self
    }

    /// Requests without a usable character cannot be placed on disk.
    pub fn has_character(&self) -> bool {
        let c = self.character.trim();
        !c.is_empty() && c != UNKNOWN_CHARACTER
    }
}

/// One request per utterance, in scene order.
pub fn requests_for_scene(scene: &SceneDialogue, presets: &PresetMap, default: &Preset) -> Vec<SpeechRequest> {
    let mut requests = Vec::with_capacity(scene.utterance_count());
    for (id, lines) in scene.iter() {
        for utterance in lines {
            let preset = presets.resolve(id, utterance.emotion(), default);
            requests.push(SpeechRequest::new(id, utterance.text(), &preset).with_emotion(utterance.emotion()));
        }
    }
    requests
}

/// Builds `<output_dir>/<scene>.jsonl` from a grouped scene file and returns its path and size.
pub fn build_scene_manifest(
    scene_json: &Path,
    output_dir: &Path,
    presets: &PresetMap,
    default: &Preset,
) -> Result<(PathBuf, usize)> {
    let scene = SceneDialogue::load(scene_json)?;
    let requests = requests_for_scene(&scene, presets, default);

    let output = output_dir.join(format!("{}.jsonl", file_stem(scene_json)?));
    write_json_lines(&output, &requests)?;
    info!("Wrote {} request(s) to {}", requests.len(), output.display());
    Ok((output, requests.len()))
}

/// Builds `<stem>.jsonl` beside a text file, one request per non-empty line, all for `character`.
pub fn build_text_manifest(
    text_file: &Path,
    character: Option<&str>,
    presets: &PresetMap,
    default: &Preset,
) -> Result<(PathBuf, usize)> {
    let character = character
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CHARACTER);
    let preset = presets.resolve(character, None, default);

    let requests: Vec<SpeechRequest> = read_lines(text_file)?
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| SpeechRequest::new(character, l, &preset))
        .collect();

    let output = text_file.with_extension("jsonl");
    write_json_lines(&output, &requests)?;
    info!("Wrote {} request(s) to {}", requests.len(), output.display());
    Ok((output, requests.len()))
}

pub fn load_manifest(path: &Path) -> Result<Vec<SpeechRequest>> {
    read_json_lines(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::PresetEntry;
    use crate::script::dialogue::Utterance;
    use std::fs;

    fn presets() -> PresetMap {
        let mut map = PresetMap::default();
        map.presets.insert(
            "anon".to_string(),
            PresetEntry {
                ref_audio_path: Some("ref/anon.wav".to_string()),
                gpt_weight: Some("GPT_weights/anon.ckpt".to_string()),
                text_lang: Some("all_ja".to_string()),
                ..Default::default()
            },
        );
        map.presets.insert(
            "anon_angry".to_string(),
            PresetEntry {
                ref_audio_path: Some("ref/anon_angry.wav".to_string()),
                ..Default::default()
            },
        );
        map
    }

    #[test]
    fn test_request_json_shape() -> Result<()> {
        let request = SpeechRequest::new("anon", "你好", &Preset::default());
        let value = serde_json::to_value(&request)?;
        assert_eq!(value["text_split_method"], "cut5");
        assert_eq!(value["batch_size"], 1);
        assert_eq!(value["media_type"], "wav");
        assert_eq!(value["streaming_mode"], false);
        assert_eq!(value["ref_audio_path"], "archive_default.wav");
        assert!(value.get("emotion").is_none());
        assert!(value.get("sample_steps").is_none());
        Ok(())
    }

    #[test]
    fn test_scene_requests_use_emotion_presets() {
        let mut scene = SceneDialogue::new();
        scene.push(
            "anon",
            Utterance::Tagged {
                text: "走开".to_string(),
                emotion: "angry".to_string(),
            },
        );
        scene.push("tomori", Utterance::from("嗯"));
        scene.push(
            "anon",
            Utterance::Tagged {
                text: "好耶".to_string(),
                emotion: "happy".to_string(),
            },
        );

        let default = Preset::default();
        let requests = requests_for_scene(&scene, &presets(), &default);
        assert_eq!(requests.len(), 3);

        assert_eq!(requests[0].ref_audio_path, "ref/anon_angry.wav");
        assert_eq!(requests[0].emotion.as_deref(), Some("angry"));
        assert_eq!(requests[1].character, "anon");
        assert_eq!(requests[1].ref_audio_path, "ref/anon.wav");
        assert_eq!(requests[1].text_lang, "all_ja");
        assert_eq!(requests[2].character, "tomori");
        assert_eq!(requests[2].ref_audio_path, default.ref_audio_path);
        assert_eq!(requests[2].emotion, None);
    }

    #[test]
    fn test_build_scene_manifest_writes_ndjson() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let scene_json = temp_dir.path().join("s1.json");
        fs::write(&scene_json, r#"{ "anon": ["一", "二"], "tomori": ["三"] }"#)?;
        let out_dir = temp_dir.path().join("output");

        let (path, count) = build_scene_manifest(&scene_json, &out_dir, &presets(), &Preset::default())?;
        assert_eq!(path, out_dir.join("s1.jsonl"));
        assert_eq!(count, 3);

        let raw = fs::read_to_string(&path)?;
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.contains("\"text\":\"一\""), "non-ASCII text is written unescaped: {}", raw);

        let loaded = load_manifest(&path)?;
        assert_eq!(loaded[2].character, "tomori");
        assert_eq!(loaded[2].text, "三");
        Ok(())
    }

    #[test]
    fn test_build_text_manifest_skips_blank_lines() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let text_file = temp_dir.path().join("lines.txt");
        fs::write(&text_file, "第一句\n\n   \n第二句\n")?;

        let (path, count) = build_text_manifest(&text_file, None, &presets(), &Preset::default())?;
        assert_eq!(path, temp_dir.path().join("lines.jsonl"));
        assert_eq!(count, 2);

        let loaded = load_manifest(&path)?;
        assert!(loaded.iter().all(|r| r.character == UNKNOWN_CHARACTER));
        assert!(!loaded[0].has_character());

        let (_, count) = build_text_manifest(&text_file, Some("anon"), &presets(), &Preset::default())?;
        assert_eq!(count, 2);
        let loaded = load_manifest(&path)?;
        assert_eq!(loaded[1].gpt_weight, "GPT_weights/anon.ckpt");
        Ok(())
    }
}

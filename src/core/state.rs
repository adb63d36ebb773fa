use crate::core::io::{load_json_or_default, read_json, write_json_pretty};
use anyhow::{bail, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const FALLBACK_EMOTION: &str = "idle";

/// Display name -> internal id, persisted as a flat JSON object.
///
/// Entries keep file order; adding a new name appends it and remapping keeps its position.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct CharacterMap {
    entries: Vec<(String, String)>,
}

impl CharacterMap {
    pub fn load(path: &Path) -> Self {
        load_json_or_default(path)
    }

    /// Strict load for rewriting; a malformed file is an error instead of an empty map.
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }

    /// Inserts a mapping and persists the whole map immediately.
    ///
    /// Last write wins; the replaced id, if any, is returned so callers can report it.
    pub fn add(&mut self, path: &Path, name: &str, id: &str) -> Result<Option<String>> {
        let name = name.trim();
        let id = id.trim();
        if name.is_empty() || id.is_empty() {
            bail!("Both a display name and an id are required");
        }

        let previous = self.insert(name.to_string(), id.to_string());
        if let Some(prev) = &previous {
            if prev != id {
                log::warn!("Character '{}' remapped from '{}' to '{}'", name, prev, id);
            }
        }
        self.save(path)?;
        Ok(previous)
    }

    fn insert(&mut self, name: String, id: String) -> Option<String> {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, id)),
            None => {
                self.entries.push((name, id));
                None
            }
        }
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.entries.iter().map(|(name, id)| (name, id))
    }
}

impl FromIterator<(String, String)> for CharacterMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (name, id) in iter {
            map.insert(name, id);
        }
        map
    }
}

impl Serialize for CharacterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, id) in &self.entries {
            map.serialize_entry(name, id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CharacterMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CharacterVisitor;

        impl<'de> Visitor<'de> for CharacterVisitor {
            type Value = CharacterMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping display names to ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = CharacterMap::default();
                while let Some((name, id)) = access.next_entry::<String, String>()? {
                    map.insert(name, id);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(CharacterVisitor)
    }
}

/// Internal id -> available emotion labels. Read only.
///
/// Values are objects keyed by label (metadata is ignored); plain arrays of labels are accepted too.
/// Label order follows the file, and the first label is the speaker's default.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(transparent)]
pub struct EmotionConfig {
    entries: BTreeMap<String, Value>,
}

impl EmotionConfig {
    pub fn load(path: &Path) -> Self {
        load_json_or_default(path)
    }

    pub fn labels(&self, id: &str) -> Vec<String> {
        match self.entries.get(id) {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl FromIterator<(String, Vec<String>)> for EmotionConfig {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(id, labels)| (id, Value::from(labels)))
                .collect(),
        }
    }
}

/// A complete bundle of synthesis parameters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preset {
    #[serde(default = "default_lang")]
    pub text_lang: String,
    #[serde(default = "default_lang")]
    pub prompt_lang: String,
    #[serde(default = "default_ref_audio")]
    pub ref_audio_path: String,
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default)]
    pub gpt_weight: String,
    #[serde(default)]
    pub sovits_weight: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_steps: Option<u32>,
}

fn default_lang() -> String {
    Language::Chinese.code().to_string()
}

fn default_ref_audio() -> String {
    "archive_default.wav".to_string()
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            text_lang: default_lang(),
            prompt_lang: default_lang(),
            ref_audio_path: default_ref_audio(),
            prompt_text: String::new(),
            gpt_weight: String::new(),
            sovits_weight: String::new(),
            sample_steps: None,
        }
    }
}

/// A stored preset. Any field may be missing, in which case the default preset fills it in.
/// Unknown keys are kept so that rewriting the file never loses data.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PresetEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpt_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sovits_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_steps: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PresetEntry {
    pub fn resolve(&self, default: &Preset) -> Preset {
        Preset {
            text_lang: self.text_lang.clone().unwrap_or_else(|| default.text_lang.clone()),
            prompt_lang: self.prompt_lang.clone().unwrap_or_else(|| default.prompt_lang.clone()),
            ref_audio_path: self
                .ref_audio_path
                .clone()
                .unwrap_or_else(|| default.ref_audio_path.clone()),
            prompt_text: self.prompt_text.clone().unwrap_or_else(|| default.prompt_text.clone()),
            gpt_weight: self.gpt_weight.clone().unwrap_or_else(|| default.gpt_weight.clone()),
            sovits_weight: self
                .sovits_weight
                .clone()
                .unwrap_or_else(|| default.sovits_weight.clone()),
            sample_steps: self.sample_steps.or(default.sample_steps),
        }
    }
}

impl From<Preset> for PresetEntry {
    fn from(p: Preset) -> Self {
        Self {
            text_lang: Some(p.text_lang),
            prompt_lang: Some(p.prompt_lang),
            ref_audio_path: Some(p.ref_audio_path),
            prompt_text: Some(p.prompt_text),
            gpt_weight: Some(p.gpt_weight),
            sovits_weight: Some(p.sovits_weight),
            sample_steps: p.sample_steps,
            extra: BTreeMap::new(),
        }
    }
}

/// Preset key (`anon` or `anon_happy`) -> stored preset.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
#[serde(transparent)]
pub struct PresetMap {
    pub presets: BTreeMap<String, PresetEntry>,
}

impl PresetMap {
    pub fn load(path: &Path) -> Self {
        load_json_or_default(path)
    }

    /// Strict load for rewriting; a malformed file is an error instead of an empty map.
    pub fn read(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }

    /// Key used for an emotion-specific preset.
    pub fn emotion_key(id: &str, emotion: &str) -> String {
        format!("{}_{}", id, emotion)
    }

    /// Finds the preset for a character, preferring the emotion-specific entry.
    pub fn lookup(&self, id: &str, emotion: Option<&str>) -> Option<&PresetEntry> {
        emotion
            .and_then(|e| self.presets.get(&Self::emotion_key(id, e)))
            .or_else(|| self.presets.get(id))
    }

    pub fn resolve(&self, id: &str, emotion: Option<&str>, default: &Preset) -> Preset {
        match self.lookup(id, emotion) {
            Some(entry) => entry.resolve(default),
            None => default.clone(),
        }
    }

    /// Inserts or overwrites a preset and rewrites the file.
    pub fn save_preset(path: &Path, key: &str, preset: Preset) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            bail!("Preset key must not be empty");
        }
        let mut map = Self::read(path)?;
        if map.presets.insert(key.to_string(), preset.into()).is_some() {
            log::warn!("Preset '{}' overwritten", key);
        }
        map.save(path)
    }

    /// Rewrites `text_lang` on every stored preset. Returns the number of presets touched.
    pub fn set_text_lang_all(path: &Path, lang: Language) -> Result<usize> {
        if !path.exists() {
            bail!("{} not found", path.display());
        }
        let mut map = Self::read(path)?;
        for entry in map.presets.values_mut() {
            entry.text_lang = Some(lang.code().to_string());
        }
        map.save(path)?;
        Ok(map.presets.len())
    }
}

/// Text languages understood by the synthesis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Chinese,
    English,
    Japanese,
    Cantonese,
    Korean,
    ChineseEnglish,
    JapaneseEnglish,
    CantoneseEnglish,
    KoreanEnglish,
    Multilingual,
    MultilingualCantonese,
}

impl Language {
    pub const ALL: [Language; 11] = [
        Language::Chinese,
        Language::English,
        Language::Japanese,
        Language::Cantonese,
        Language::Korean,
        Language::ChineseEnglish,
        Language::JapaneseEnglish,
        Language::CantoneseEnglish,
        Language::KoreanEnglish,
        Language::Multilingual,
        Language::MultilingualCantonese,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Language::Chinese => "中文",
            Language::English => "English",
            Language::Japanese => "日本語",
            Language::Cantonese => "粤语",
            Language::Korean => "韩文",
            Language::ChineseEnglish => "中英混合",
            Language::JapaneseEnglish => "日英混合",
            Language::CantoneseEnglish => "粤英混合",
            Language::KoreanEnglish => "韩英混合",
            Language::Multilingual => "多语种混合",
            Language::MultilingualCantonese => "多语种混合(粤语)",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Chinese => "all_zh",
            Language::English => "en",
            Language::Japanese => "all_ja",
            Language::Cantonese => "all_yue",
            Language::Korean => "all_ko",
            Language::ChineseEnglish => "zh",
            Language::JapaneseEnglish => "ja",
            Language::CantoneseEnglish => "yue",
            Language::KoreanEnglish => "ko",
            Language::Multilingual => "auto",
            Language::MultilingualCantonese => "auto_yue",
        }
    }

    /// Accepts either a display label or a service code.
    pub fn parse(s: &str) -> Option<Language> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.label() == s || l.code() == s)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

use crate::core::io::write_json_pretty;
use crate::core::state::CharacterMap;
use crate::script::parser::{clean_utterance, parse_line, ScriptLine};
use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One stored line of dialogue. Serialized as a bare string or `{ "text", "emotion" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Utterance {
    Tagged { text: String, emotion: String },
    Plain(String),
}

impl Utterance {
    pub fn text(&self) -> &str {
        match self {
            Utterance::Plain(text) | Utterance::Tagged { text, .. } => text,
        }
    }

    pub fn emotion(&self) -> Option<&str> {
        match self {
            Utterance::Plain(_) => None,
            Utterance::Tagged { emotion, .. } => Some(emotion),
        }
    }

    /// Same variant, new text. Emotion labels are carried through.
    pub fn with_text(&self, text: String) -> Utterance {
        match self {
            Utterance::Plain(_) => Utterance::Plain(text),
            Utterance::Tagged { emotion, .. } => Utterance::Tagged {
                text,
                emotion: emotion.clone(),
            },
        }
    }
}

impl From<&str> for Utterance {
    fn from(s: &str) -> Self {
        Utterance::Plain(s.to_string())
    }
}

/// Utterances of one scene grouped by internal speaker id.
///
/// Speakers keep the order in which they first speak; this order survives a JSON round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneDialogue {
    speakers: Vec<(String, Vec<Utterance>)>,
}

impl SceneDialogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: &str, utterance: Utterance) {
        self.add_speaker(id).push(utterance);
    }

    /// Registers a speaker without lines; existing speakers are left as they are.
    pub fn add_speaker(&mut self, id: &str) -> &mut Vec<Utterance> {
        let index = match self.speakers.iter().position(|(s, _)| s == id) {
            Some(index) => index,
            None => {
                self.speakers.push((id.to_string(), Vec::new()));
                self.speakers.len() - 1
            }
        };
        &mut self.speakers[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Utterance])> {
        self.speakers.iter().map(|(id, lines)| (id.as_str(), lines.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<Utterance>)> {
        self.speakers.iter_mut().map(|(id, lines)| (id.as_str(), lines))
    }

    pub fn speaker_ids(&self) -> Vec<&str> {
        self.speakers.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn lines(&self, id: &str) -> Option<&[Utterance]> {
        self.speakers
            .iter()
            .find(|(s, _)| s == id)
            .map(|(_, lines)| lines.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    pub fn utterance_count(&self) -> usize {
        self.speakers.iter().map(|(_, lines)| lines.len()).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scene dialogue {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }

    /// Writes `<id>_<scene>.txt` per speaker, one utterance per line.
    pub fn write_speaker_files(&self, dir: &Path, scene: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (id, lines) in self.iter() {
            let path = dir.join(format!("{}_{}.txt", id, scene));
            let body = lines.iter().map(Utterance::text).collect::<Vec<_>>().join("\n");
            fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Groups the recognized dialogue of one scene by speaker.
///
/// Unrecognized speakers and non-dialogue lines are skipped. Stored text has
/// directives and parenthesized asides removed.
pub fn aggregate<S: AsRef<str>>(lines: &[S], characters: &CharacterMap) -> SceneDialogue {
    let mut scene = SceneDialogue::new();
    for line in lines {
        if let ScriptLine::Dialogue(d) = parse_line(line.as_ref(), characters) {
            scene.push(d.id, Utterance::Plain(clean_utterance(d.text)));
        }
    }
    scene
}

impl Serialize for SceneDialogue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.speakers.len()))?;
        for (id, lines) in &self.speakers {
            map.serialize_entry(id, lines)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SceneDialogue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SceneVisitor;

        impl<'de> Visitor<'de> for SceneVisitor {
            type Value = SceneDialogue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping speaker ids to arrays of utterances")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut scene = SceneDialogue::new();
                while let Some((id, lines)) = access.next_entry::<String, Vec<Utterance>>()? {
                    scene.add_speaker(&id).extend(lines);
                }
                Ok(scene)
            }
        }

        deserializer.deserialize_map(SceneVisitor)
    }
}

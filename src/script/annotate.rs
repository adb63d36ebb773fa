use crate::core::state::CharacterMap;
use crate::script::parser::{clean_utterance, parse_line, ScriptLine};
use std::collections::HashMap;

/// Format directives appended after the audio reference on every annotated line.
pub const FORMAT_DIRECTIVES: &str = "-fontSize=default -id";

/// Voice clip location for the `count`th utterance of `id` in `scene`.
pub fn clip_path(id: &str, scene: &str, count: u32) -> String {
    format!("{id}/{scene}/{id}_{scene}_{count:02}.wav")
}

/// Resolves `name` through the character map; unknown speakers have no clip.
pub fn audio_path(name: &str, scene: &str, count: u32, characters: &CharacterMap) -> Option<String> {
    characters.id_for(name).map(|id| clip_path(id, scene, count))
}

/// Per-speaker running utterance counts within one scene.
#[derive(Debug, Default, Clone)]
pub struct SpeakerCounter {
    counts: HashMap<String, u32>,
}

impl SpeakerCounter {
    /// Advances and returns the count for `id`; the first call yields 1.
    pub fn next(&mut self, id: &str) -> u32 {
        let count = self.counts.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn current(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }
}

/// Rewrites raw scene lines into the annotated script syntax.
pub struct Annotator<'a> {
    characters: &'a CharacterMap,
    scene: &'a str,
    insert_audio: bool,
    counter: SpeakerCounter,
}

impl<'a> Annotator<'a> {
    pub fn new(characters: &'a CharacterMap, scene: &'a str, insert_audio: bool) -> Self {
        Self {
            characters,
            scene,
            insert_audio,
            counter: SpeakerCounter::default(),
        }
    }

    /// Annotates one line. Lines without a recognized speaker come back untouched.
    pub fn annotate(&mut self, line: &str) -> String {
        let dialogue = match parse_line(line, self.characters) {
            ScriptLine::Dialogue(d) => d,
            ScriptLine::Other(raw) => return raw.to_string(),
        };

        let count = self.counter.next(dialogue.id);
        let text = clean_utterance(dialogue.text);

        let audio = if self.insert_audio {
            audio_path(dialogue.name, self.scene, count, self.characters)
                .map(|p| format!(" -{}", p))
                .unwrap_or_default()
        } else {
            String::new()
        };

        format!(
            "{}:{}{} {} -figureId={};",
            dialogue.name, text, audio, FORMAT_DIRECTIVES, dialogue.id
        )
    }

    pub fn counter(&self) -> &SpeakerCounter {
        &self.counter
    }
}

/// Annotates a whole scene with fresh counters.
pub fn annotate_scene<S: AsRef<str>>(
    lines: &[S],
    characters: &CharacterMap,
    scene: &str,
    insert_audio: bool,
) -> Vec<String> {
    let mut annotator = Annotator::new(characters, scene, insert_audio);
    lines.iter().map(|l| annotator.annotate(l.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characters() -> CharacterMap {
        [
            ("爱音".to_string(), "anon".to_string()),
            ("灯".to_string(), "tomori".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_clip_path_padding() {
        assert_eq!(clip_path("anon", "test", 1), "anon/test/anon_test_01.wav");
        assert_eq!(clip_path("anon", "test", 12), "anon/test/anon_test_12.wav");
        assert_eq!(clip_path("anon", "test", 123), "anon/test/anon_test_123.wav");
    }

    #[test]
    fn test_audio_path_unknown_speaker() {
        let map = characters();
        assert_eq!(audio_path("路人", "test", 1, &map), None);
        assert_eq!(
            audio_path("灯", "test", 3, &map).as_deref(),
            Some("tomori/test/tomori_test_03.wav")
        );
    }

    #[test]
    fn test_annotate_first_occurrence() {
        let map = characters();
        let mut annotator = Annotator::new(&map, "test", true);
        assert_eq!(
            annotator.annotate("爱音: 今日はいい天気ですね（笑う）"),
            "爱音:今日はいい天気ですね -anon/test/anon_test_01.wav -fontSize=default -id -figureId=anon;"
        );
    }

    #[test]
    fn test_unrecognized_speaker_echoed_verbatim() {
        let map = characters();
        let mut annotator = Annotator::new(&map, "test", true);
        assert_eq!(annotator.annotate("路人: 你好"), "路人: 你好");
        assert_eq!(annotator.annotate("旁白"), "旁白");
        assert_eq!(annotator.counter().current("anon"), 0);
    }

    #[test]
    fn test_counts_are_per_speaker() {
        let map = characters();
        let lines = [
            "爱音: 一",
            "灯: 一",
            "路人: 嗯",
            "爱音: 二",
            "爱音: 三",
            "灯: 二",
        ];
        let out = annotate_scene(&lines, &map, "s1", true);
        assert!(out[0].contains("anon_s1_01.wav"));
        assert!(out[1].contains("tomori_s1_01.wav"));
        assert_eq!(out[2], "路人: 嗯");
        assert!(out[3].contains("anon_s1_02.wav"));
        assert!(out[4].contains("anon_s1_03.wav"));
        assert!(out[5].contains("tomori_s1_02.wav"));
    }

    #[test]
    fn test_reannotation_is_stable() {
        let map = characters();
        let lines = vec![
            "爱音: 你好 -fontSize=default;".to_string(),
            "灯: (小声) 嗯".to_string(),
            "（场景切换）".to_string(),
            "爱音: 走吧 -anon/old/anon_old_09.wav -figureId=anon;".to_string(),
        ];
        let first = annotate_scene(&lines, &map, "s1", true);
        let second = annotate_scene(&first, &map, "s1", true);
        assert_eq!(first, second);

        // Feeding the output back through the same annotator only renumbers.
        let mut annotator = Annotator::new(&map, "s1", true);
        let once = annotator.annotate(&lines[0]);
        let twice = annotator.annotate(&once);
        assert_eq!(once.replace("_01.wav", "_02.wav"), twice);
    }

    #[test]
    fn test_without_audio_insertion() {
        let map = characters();
        let mut annotator = Annotator::new(&map, "test", false);
        assert_eq!(
            annotator.annotate("灯: 嗯 -tomori/test/tomori_test_01.wav"),
            "灯:嗯 -fontSize=default -id -figureId=tomori;"
        );
        assert_eq!(annotator.counter().current("tomori"), 1);
    }
}

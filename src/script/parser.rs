use crate::core::state::CharacterMap;
use regex::Regex;
use std::sync::LazyLock;

// Audio and identity directives may appear anywhere in a legacy line.
static FIGURE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-figureId=[^\s;]+;?").expect("valid regex"));
// Audio directives always carry a folder, `-anon/scene/anon_scene_01.wav`.
static WAV_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-[^\s;]+/[^\s;]+\.wav").expect("valid regex"));

// Format directives only count when they trail the utterance.
static TRAILING_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:-fontSize=[A-Za-z0-9_]+|-id|;)\s*$").expect("valid regex")
});

// Stage directions in either bracket style, e.g. `（笑う）` or `(sigh)`.
static ASIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[（(][^）)]*[）)]").expect("valid regex"));

/// One raw scene line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine<'a> {
    Dialogue(Dialogue<'a>),
    /// Narration, stage directions, blank lines and unknown speakers.
    Other(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialogue<'a> {
    /// Display name as written in the script, trimmed.
    pub name: &'a str,
    /// Internal id from the character map.
    pub id: &'a str,
    /// Everything after the first colon, trimmed. May still carry directives.
    pub text: &'a str,
}

/// Splits `Name: text` on the first ASCII colon.
pub fn split_speaker(line: &str) -> Option<(&str, &str)> {
    let (name, text) = line.split_once(':')?;
    Some((name.trim(), text.trim()))
}

pub fn parse_line<'a>(line: &'a str, characters: &'a CharacterMap) -> ScriptLine<'a> {
    let Some((name, text)) = split_speaker(line) else {
        return ScriptLine::Other(line);
    };
    match characters.id_for(name) {
        Some(id) => ScriptLine::Dialogue(Dialogue { name, id, text }),
        None => ScriptLine::Other(line),
    }
}

/// Removes audio, identity and format directives left by a previous annotation pass.
pub fn strip_directives(text: &str) -> String {
    let text = FIGURE_ID.replace_all(text, "");
    let mut text = WAV_PATH.replace_all(&text, "").trim().to_string();
    loop {
        let stripped = TRAILING_DIRECTIVE.replace(&text, "");
        if stripped.len() == text.len() {
            break;
        }
        text = stripped.into_owned();
    }
    text.trim().to_string()
}

/// Removes parenthesized asides and trims the result.
pub fn strip_asides(text: &str) -> String {
    ASIDE.replace_all(text, "").trim().to_string()
}

/// Spoken text of an utterance: no directives, no asides.
pub fn clean_utterance(text: &str) -> String {
    strip_asides(&strip_directives(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characters() -> CharacterMap {
        [("爱音".to_string(), "anon".to_string())].into_iter().collect()
    }

    #[test]
    fn test_parse_known_speaker() {
        let map = characters();
        let parsed = parse_line(" 爱音 :  今日はいい天気ですね（笑う）", &map);
        assert_eq!(
            parsed,
            ScriptLine::Dialogue(Dialogue {
                name: "爱音",
                id: "anon",
                text: "今日はいい天気ですね（笑う）",
            })
        );
    }

    #[test]
    fn test_unknown_and_non_dialogue_lines_pass_through() {
        let map = characters();
        assert_eq!(parse_line("路人: 你好", &map), ScriptLine::Other("路人: 你好"));
        assert_eq!(parse_line("（幕が上がる）", &map), ScriptLine::Other("（幕が上がる）"));
        assert_eq!(parse_line("", &map), ScriptLine::Other(""));
    }

    #[test]
    fn test_split_on_first_colon_only() {
        assert_eq!(split_speaker("爱音: 时间是 10:30"), Some(("爱音", "时间是 10:30")));
        assert_eq!(split_speaker("no colon here"), None);
    }

    #[test]
    fn test_strip_directives_from_annotated_text() {
        let annotated = "你好 -anon/test/anon_test_01.wav -fontSize=default -id -figureId=anon;";
        assert_eq!(strip_directives(annotated), "你好");
        assert_eq!(strip_directives("你好 -fontSize=default;"), "你好");
        assert_eq!(strip_directives("你好;"), "你好");
        // Hyphens inside the utterance survive.
        assert_eq!(strip_directives("well-known -identity"), "well-known -identity");
    }

    #[test]
    fn test_strip_directives_with_non_ascii_scene() {
        assert_eq!(
            strip_directives("走吧 -anon/第一幕/anon_第一幕_02.wav -fontSize=default -id -figureId=anon;"),
            "走吧"
        );
    }

    #[test]
    fn test_spoken_file_names_survive_cleanup() {
        assert_eq!(strip_directives("把文件存成 take-2.wav 吧"), "把文件存成 take-2.wav 吧");
        assert_eq!(
            strip_directives("存成 take-2.wav -anon/s/anon_s_01.wav -figureId=anon;"),
            "存成 take-2.wav"
        );
        assert_eq!(clean_utterance("文件叫 take-2.wav（小声）"), "文件叫 take-2.wav");
    }

    #[test]
    fn test_strip_asides_both_styles() {
        assert_eq!(strip_asides("今日はいい天気ですね（笑う）"), "今日はいい天気ですね");
        assert_eq!(strip_asides("(sigh) fine (whisper) then "), "fine  then");
        assert_eq!(strip_asides("（小声）真的吗(笑)？"), "真的吗？");
        assert_eq!(strip_asides("没有括号"), "没有括号");
    }

    #[test]
    fn test_clean_utterance() {
        assert_eq!(
            clean_utterance("真的吗（惊）-tomori/s1/tomori_s1_03.wav -fontSize=default -id -figureId=tomori;"),
            "真的吗"
        );
    }
}

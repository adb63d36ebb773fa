use crate::core::state::{EmotionConfig, FALLBACK_EMOTION};
use crate::script::dialogue::{SceneDialogue, Utterance};
use crate::services::llm::LlmClient;
use crate::services::retry::RetryPolicy;
use log::{debug, info};

const EMOTION_TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str =
    "你是一个情感分析专家。请分析以下文本的情感，并从给定的选项中选择最合适的情感标签。";

fn user_prompt(text: &str, labels: &[String]) -> String {
    format!(
        "请分析这句话的情感：\n\n{}\n\n可选情感：{}\n\n请只回答情感标签名称，不要添加任何解释。",
        text,
        labels.join(", ")
    )
}

fn default_label(labels: &[String]) -> String {
    labels
        .first()
        .cloned()
        .unwrap_or_else(|| FALLBACK_EMOTION.to_string())
}

/// Picks one of `labels` for `text`.
///
/// Never fails: a reply outside the label set resolves to the first label, and so do
/// exhausted retries. With no labels at all the result is `idle`.
pub async fn classify(
    llm: &dyn LlmClient,
    policy: &RetryPolicy,
    text: &str,
    labels: &[String],
) -> String {
    let prompt = user_prompt(text, labels);
    let reply = policy
        .run("Emotion analysis", |_| {
            llm.chat(SYSTEM_PROMPT, &prompt, Some(EMOTION_TEMPERATURE))
        })
        .await;

    match reply {
        Ok(label) if labels.contains(&label) => label,
        Ok(label) => {
            debug!("'{}' is not a configured emotion, using default", label);
            default_label(labels)
        }
        Err(_) => default_label(labels),
    }
}

/// Classifies every utterance of a scene in place, speaker by speaker.
///
/// Utterances that are already tagged are re-classified from their text.
pub async fn tag_scene(
    scene: &mut SceneDialogue,
    emotions: &EmotionConfig,
    llm: &dyn LlmClient,
    policy: &RetryPolicy,
) -> usize {
    let mut tagged = 0;
    for (id, lines) in scene.iter_mut() {
        let labels = emotions.labels(id);
        info!("Tagging {} line(s) for '{}' ({} label(s))", lines.len(), id, labels.len());
        for utterance in lines.iter_mut() {
            let text = utterance.text().to_string();
            let emotion = classify(llm, policy, &text, &labels).await;
            *utterance = Utterance::Tagged { text, emotion };
            tagged += 1;
        }
    }
    tagged
}

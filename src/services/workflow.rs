use crate::core::config::Config;
use crate::core::io::{file_stem, read_lines};
use crate::core::state::{CharacterMap, EmotionConfig};
use crate::script::annotate::annotate_scene;
use crate::script::dialogue::aggregate;
use crate::services::emotion::tag_scene;
use crate::services::llm::LlmClient;
use anyhow::{bail, Context, Result};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub insert_audio: bool,
    pub group_dialogue: bool,
    pub tag_emotions: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            insert_audio: true,
            group_dialogue: false,
            tag_emotions: false,
        }
    }
}

/// One scene file to convert. The scene name defaults to the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneInput {
    pub path: PathBuf,
    pub scene: Option<String>,
}

impl SceneInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scene: None,
        }
    }

    pub fn with_scene(mut self, scene: &str) -> Self {
        self.scene = Some(scene.to_string());
        self
    }

    pub fn scene_name(&self) -> Result<String> {
        match self.scene.as_deref().map(str::trim) {
            Some(scene) if !scene.is_empty() => Ok(scene.to_string()),
            _ => file_stem(&self.path),
        }
    }
}

/// Files written for one scene.
#[derive(Debug, Clone, Default)]
pub struct SceneOutputs {
    pub annotated: PathBuf,
    pub grouped: PathBuf,
    pub speaker_files: Vec<PathBuf>,
    pub utterances: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<SceneOutputs>,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }
}

pub struct WorkflowManager {
    config: Config,
    characters: CharacterMap,
    emotions: EmotionConfig,
    llm: Option<Box<dyn LlmClient>>,
}

impl WorkflowManager {
    pub fn new(config: Config, llm: Option<Box<dyn LlmClient>>) -> Self {
        let characters = CharacterMap::load(Path::new(&config.character_map));
        let emotions = EmotionConfig::load(Path::new(&config.emotions));
        Self::with_maps(config, characters, emotions, llm)
    }

    pub fn with_maps(
        config: Config,
        characters: CharacterMap,
        emotions: EmotionConfig,
        llm: Option<Box<dyn LlmClient>>,
    ) -> Self {
        Self {
            config,
            characters,
            emotions,
            llm,
        }
    }

    pub fn characters(&self) -> &CharacterMap {
        &self.characters
    }

    /// Converts every input independently. A failing file is logged and recorded,
    /// the rest still run.
    pub async fn run(&self, inputs: &[SceneInput], options: ConvertOptions) -> BatchReport {
        if self.characters.is_empty() {
            log::warn!("Character map is empty; no line will be recognized as dialogue");
        }

        let mut report = BatchReport::default();
        for (i, input) in inputs.iter().enumerate() {
            println!("[{}/{}] Converting {}", i + 1, inputs.len(), input.path.display());
            match self.convert_scene(input, options).await {
                Ok(outputs) => {
                    info!(
                        "{} -> {} ({} utterance(s))",
                        input.path.display(),
                        outputs.grouped.display(),
                        outputs.utterances
                    );
                    report.succeeded.push(outputs);
                }
                Err(e) => {
                    error!("Failed to convert {}: {:#}", input.path.display(), e);
                    report.failures.push((input.path.clone(), format!("{:#}", e)));
                }
            }
        }

        println!(
            "Converted {}/{} file(s)",
            report.success_count(),
            inputs.len()
        );
        report
    }

    /// Writes `<scene>.txt`, `<scene>.json` and, if asked, `<id>_<scene>.txt` per speaker.
    pub async fn convert_scene(&self, input: &SceneInput, options: ConvertOptions) -> Result<SceneOutputs> {
        if options.tag_emotions && self.llm.is_none() {
            bail!("Emotion tagging needs an LLM client");
        }

        let scene = input.scene_name()?;
        let lines = read_lines(&input.path)?;
        let output_dir = Path::new(&self.config.output_folder);
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let annotated = annotate_scene(&lines, &self.characters, &scene, options.insert_audio);
        let annotated_path = output_dir.join(format!("{}.txt", scene));
        let mut body = annotated.join("\n");
        body.push('\n');
        fs::write(&annotated_path, body)
            .with_context(|| format!("Failed to write {}", annotated_path.display()))?;

        let mut dialogue = aggregate(&lines, &self.characters);

        let speaker_files = if options.group_dialogue {
            dialogue.write_speaker_files(output_dir, &scene)?
        } else {
            Vec::new()
        };

        if let (true, Some(llm)) = (options.tag_emotions, self.llm.as_deref()) {
            let tagged = tag_scene(&mut dialogue, &self.emotions, llm, &self.config.retry_policy()).await;
            info!("Tagged {} utterance(s) in scene '{}'", tagged, scene);
        }

        let grouped_path = output_dir.join(format!("{}.json", scene));
        dialogue.save(&grouped_path)?;

        Ok(SceneOutputs {
            annotated: annotated_path,
            grouped: grouped_path,
            speaker_files,
            utterances: dialogue.utterance_count(),
        })
    }
}

use crate::core::io::{ensure_parent, file_stem};
use crate::services::manifest::{load_manifest, SpeechRequest};
use crate::services::tts::{TtsClient, WeightKind};
use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the clips of one manifest land: `<root>/<character>/<scene>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipLayout {
    /// Overrides the request's character for the folder only.
    pub folder_character: Option<String>,
    pub folder_scene: String,
}

impl ClipLayout {
    /// `anon_test` -> folder `anon/test`; a stem without `_` is used as the scene name
    /// and each request's own character picks the folder.
    pub fn from_stem(stem: &str) -> Self {
        match stem.split_once('_') {
            Some((character, scene)) => Self {
                folder_character: Some(character.to_string()),
                folder_scene: scene.to_string(),
            },
            None => Self {
                folder_character: None,
                folder_scene: stem.to_string(),
            },
        }
    }

    /// Path relative to the output root.
    pub fn clip_path(&self, character: &str, index: u32) -> PathBuf {
        let folder_character = self.folder_character.as_deref().unwrap_or(character);
        PathBuf::from(folder_character)
            .join(&self.folder_scene)
            .join(format!("{}_{}_{:02}.wav", character, self.folder_scene, index))
    }
}

#[derive(Debug, Default)]
pub struct VocalReport {
    /// Written clips, relative to the output root.
    pub generated: Vec<PathBuf>,
    /// Manifest position (1-based) and reason.
    pub failures: Vec<(usize, String)>,
    pub skipped: usize,
}

/// Replays a speech manifest against the synthesis service, one request at a time.
pub struct VocalGenerator<'a> {
    tts: &'a dyn TtsClient,
    output_root: PathBuf,
    interval: Duration,
    loaded: HashMap<WeightKind, String>,
}

impl<'a> VocalGenerator<'a> {
    pub fn new(tts: &'a dyn TtsClient, output_root: &Path, interval: Duration) -> Self {
        Self {
            tts,
            output_root: output_root.to_path_buf(),
            interval,
            loaded: HashMap::new(),
        }
    }

    /// Switches only the checkpoints that differ from what the service last loaded.
    async fn switch_weights(&mut self, request: &SpeechRequest) -> Result<()> {
        for kind in [WeightKind::Gpt, WeightKind::Sovits] {
            let wanted = kind.of(request);
            if wanted.is_empty() || self.loaded.get(&kind).map(String::as_str) == Some(wanted) {
                continue;
            }
            self.tts.set_weights(kind, wanted).await?;
            self.loaded.insert(kind, wanted.to_string());
        }
        Ok(())
    }

    async fn render(&mut self, request: &SpeechRequest, relative: &Path) -> Result<()> {
        self.switch_weights(request).await?;
        let audio = self.tts.synthesize(request).await?;

        let target = self.output_root.join(relative);
        ensure_parent(&target)?;
        fs::write(&target, audio).with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }

    /// Generates every clip of `requests`. Per-character numbering advances on every attempt,
    /// so a failed clip leaves a gap that `regenerate` can fill later.
    pub async fn generate(&mut self, requests: &[SpeechRequest], stem: &str) -> VocalReport {
        let layout = ClipLayout::from_stem(stem);
        let mut counters: HashMap<String, u32> = HashMap::new();
        let mut report = VocalReport::default();

        let pb = ProgressBar::new(requests.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut first = true;
        for (i, request) in requests.iter().enumerate() {
            let position = i + 1;
            pb.inc(1);

            if !request.has_character() {
                warn!("Item {}: missing character, skipped", position);
                report.skipped += 1;
                continue;
            }

            if !first && !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
            first = false;

            let index = counters
                .entry(request.character.clone())
                .and_modify(|c| *c += 1)
                .or_insert(1);
            let relative = layout.clip_path(&request.character, *index);

            match self.render(request, &relative).await {
                Ok(()) => {
                    pb.println(format!("Generated {}", relative.display()));
                    report.generated.push(relative);
                }
                Err(e) => {
                    warn!("Item {} ({}) failed: {:#}", position, relative.display(), e);
                    report.failures.push((position, format!("{:#}", e)));
                }
            }
        }

        pb.finish_with_message("Synthesis complete");
        info!(
            "Generated {} clip(s), {} failed, {} skipped",
            report.generated.len(),
            report.failures.len(),
            report.skipped
        );
        report
    }

    /// Loads `manifest` and generates its clips under the output root.
    pub async fn generate_file(&mut self, manifest: &Path) -> Result<VocalReport> {
        let requests = load_manifest(manifest)?;
        if requests.is_empty() {
            bail!("{} contains no requests", manifest.display());
        }
        let stem = file_stem(manifest)?;
        Ok(self.generate(&requests, &stem).await)
    }

    /// Re-synthesizes one clip named `<character>_<scene>_<nn>.wav`, relative to the output root.
    ///
    /// The clip is the `nn`th request of that character in the manifest.
    pub async fn regenerate(&mut self, requests: &[SpeechRequest], relative: &Path) -> Result<PathBuf> {
        let (character, index) = parse_clip_name(relative)?;
        let request = requests
            .iter()
            .filter(|r| r.character == character)
            .nth(index - 1)
            .ok_or_else(|| anyhow!("No request #{} for '{}' in the manifest", index, character))?;

        self.render(request, relative).await?;
        println!("Regenerated {}", relative.display());
        Ok(self.output_root.join(relative))
    }
}

/// Splits `anon_test_03.wav` into (`anon`, 3). Scene names may themselves contain `_`.
pub fn parse_clip_name(path: &Path) -> Result<(String, usize)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Not a clip path: {}", path.display()))?;

    let parsed = stem.rsplit_once('_').and_then(|(prefix, nn)| {
        let (character, _scene) = prefix.split_once('_')?;
        let index = nn.parse::<usize>().ok().filter(|n| *n > 0)?;
        Some((character.to_string(), index))
    });
    parsed.with_context(|| format!("Cannot parse clip name '{}'", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::Preset;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockTtsClient {
        fail_texts: Vec<String>,
        fail_weights: bool,
        weight_calls: Arc<Mutex<Vec<(WeightKind, String)>>>,
        call_count: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl TtsClient for MockTtsClient {
        async fn set_weights(&self, kind: WeightKind, path: &str) -> Result<()> {
            if self.fail_weights {
                return Err(anyhow!("connection refused"));
            }
            self.weight_calls.lock().unwrap().push((kind, path.to_string()));
            Ok(())
        }

        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
            *self.call_count.lock().unwrap() += 1;
            if self.fail_texts.contains(&request.text) {
                Err(anyhow!("Mock TTS error"))
            } else {
                Ok(request.text.as_bytes().to_vec())
            }
        }
    }

    fn request(character: &str, text: &str, gpt: &str) -> SpeechRequest {
        let preset = Preset {
            gpt_weight: gpt.to_string(),
            sovits_weight: "s.pth".to_string(),
            ..Default::default()
        };
        SpeechRequest::new(character, text, &preset)
    }

    #[test]
    fn test_layout_from_stem() {
        let split = ClipLayout::from_stem("anon_test");
        assert_eq!(split.clip_path("anon", 1), PathBuf::from("anon/test/anon_test_01.wav"));

        let plain = ClipLayout::from_stem("s1");
        assert_eq!(plain.clip_path("tomori", 12), PathBuf::from("tomori/s1/tomori_s1_12.wav"));
    }

    #[test]
    fn test_parse_clip_name() -> Result<()> {
        assert_eq!(parse_clip_name(Path::new("anon/test/anon_test_03.wav"))?, ("anon".to_string(), 3));
        assert_eq!(parse_clip_name(Path::new("anon_day_2_11.wav"))?, ("anon".to_string(), 11));
        assert!(parse_clip_name(Path::new("anon_00.wav")).is_err());
        assert!(parse_clip_name(Path::new("anon_test_xx.wav")).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_counters_advance_on_failure() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let tts = MockTtsClient {
            fail_texts: vec!["二".to_string()],
            ..Default::default()
        };
        let requests = vec![
            request("anon", "一", "a.ckpt"),
            request("anon", "二", "a.ckpt"),
            request("unknown", "旁白", ""),
            request("tomori", "三", "t.ckpt"),
            request("anon", "四", "a.ckpt"),
        ];

        let mut generator = VocalGenerator::new(&tts, temp_dir.path(), Duration::ZERO);
        let report = generator.generate(&requests, "s1").await;

        assert_eq!(
            report.generated,
            vec![
                PathBuf::from("anon/s1/anon_s1_01.wav"),
                PathBuf::from("tomori/s1/tomori_s1_01.wav"),
                PathBuf::from("anon/s1/anon_s1_03.wav"),
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 2);
        assert_eq!(report.skipped, 1);
        assert!(!temp_dir.path().join("anon/s1/anon_s1_02.wav").exists());
        assert_eq!(fs::read(temp_dir.path().join("anon/s1/anon_s1_03.wav"))?, "四".as_bytes());
        assert_eq!(*tts.call_count.lock().unwrap(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_weights_sent_only_on_change() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let tts = MockTtsClient::default();
        let requests = vec![
            request("anon", "一", "a.ckpt"),
            request("anon", "二", "a.ckpt"),
            request("tomori", "三", "t.ckpt"),
            request("anon", "四", "a.ckpt"),
        ];

        let mut generator = VocalGenerator::new(&tts, temp_dir.path(), Duration::ZERO);
        generator.generate(&requests, "anon_test").await;

        let calls = tts.weight_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (WeightKind::Gpt, "a.ckpt".to_string()),
                (WeightKind::Sovits, "s.pth".to_string()),
                (WeightKind::Gpt, "t.ckpt".to_string()),
                (WeightKind::Gpt, "a.ckpt".to_string()),
            ]
        );
        // Stem `anon_test` puts every clip in the anon folder.
        assert!(temp_dir.path().join("anon/test/tomori_test_01.wav").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_weight_switch_skips_item() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let tts = MockTtsClient {
            fail_weights: true,
            ..Default::default()
        };
        let requests = vec![request("anon", "一", "a.ckpt")];

        let mut generator = VocalGenerator::new(&tts, temp_dir.path(), Duration::ZERO);
        let report = generator.generate(&requests, "s1").await;
        assert!(report.generated.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(*tts.call_count.lock().unwrap(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_between_items() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let tts = MockTtsClient::default();
        let requests = vec![
            request("anon", "一", ""),
            request("anon", "二", ""),
            request("anon", "三", ""),
        ];

        let start = tokio::time::Instant::now();
        let mut generator = VocalGenerator::new(&tts, temp_dir.path(), Duration::from_secs(1));
        generator.generate(&requests, "s1").await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_regenerate_picks_per_character_request() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let tts = MockTtsClient::default();
        let requests = vec![
            request("anon", "一", ""),
            request("tomori", "二", ""),
            request("anon", "三", ""),
        ];

        let mut generator = VocalGenerator::new(&tts, temp_dir.path(), Duration::ZERO);
        let path = generator
            .regenerate(&requests, Path::new("anon/s1/anon_s1_02.wav"))
            .await?;
        assert_eq!(fs::read(&path)?, "三".as_bytes());

        assert!(generator
            .regenerate(&requests, Path::new("tomori/s1/tomori_s1_02.wav"))
            .await
            .is_err());
        Ok(())
    }
}

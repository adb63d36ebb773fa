use crate::core::state::{Language, Preset};
use anyhow::{Context, Result};
use inquire::{Confirm, InquireError, MultiSelect, Select, Text};
use std::fs;
use std::path::{Path, PathBuf};

/// `.txt` scene files directly inside `dir`, sorted by name.
pub fn list_scene_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

/// Lets the user pick scene files from the input folder.
pub fn ask_input_files(input_folder: &Path) -> Result<Vec<PathBuf>> {
    let files = list_scene_files(input_folder)?;
    if files.is_empty() {
        anyhow::bail!("No .txt files found in {}", input_folder.display());
    }

    let options: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    let picked = MultiSelect::new("Select scene files to convert:", options).prompt()?;
    Ok(picked.into_iter().map(PathBuf::from).collect())
}

/// Asks for a scene name. Without a terminal the default is taken as is.
pub fn ask_scene_name(default: &str) -> Result<String> {
    match Text::new("Scene name:").with_default(default).prompt() {
        Ok(scene) => Ok(scene.trim().to_string()),
        Err(InquireError::NotTTY) => Ok(default.to_string()),
        Err(e) => Err(e.into()),
    }
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Ok(Confirm::new(message).with_default(default).prompt()?)
}

pub fn ask_language(prompt: &str) -> Result<Language> {
    Ok(Select::new(prompt, Language::ALL.to_vec()).prompt()?)
}

/// Asks for every preset field, starting from `base`.
pub fn ask_preset(base: &Preset) -> Result<Preset> {
    let ref_audio_path = Text::new("Reference audio path:")
        .with_default(&base.ref_audio_path)
        .prompt()?;
    let prompt_text = Text::new("Reference audio transcript:")
        .with_default(&base.prompt_text)
        .prompt()?;
    let prompt_lang = ask_language("Reference audio language:")?;
    let text_lang = ask_language("Synthesis text language:")?;
    let gpt_weight = Text::new("GPT weights path:")
        .with_default(&base.gpt_weight)
        .prompt()?;
    let sovits_weight = Text::new("SoVITS weights path:")
        .with_default(&base.sovits_weight)
        .prompt()?;

    Ok(Preset {
        text_lang: text_lang.code().to_string(),
        prompt_lang: prompt_lang.code().to_string(),
        ref_audio_path: ref_audio_path.trim().to_string(),
        prompt_text: prompt_text.trim().to_string(),
        gpt_weight: gpt_weight.trim().to_string(),
        sovits_weight: sovits_weight.trim().to_string(),
        sample_steps: base.sample_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_scene_files_filters_and_sorts() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        fs::write(root.join("b.txt"), "")?;
        fs::write(root.join("a.txt"), "")?;
        fs::write(root.join("a.json"), "{}")?;
        fs::create_dir(root.join("nested.txt"))?;

        let files = list_scene_files(root)?;
        assert_eq!(files, vec![root.join("a.txt"), root.join("b.txt")]);
        Ok(())
    }

    #[test]
    fn test_list_scene_files_missing_dir() {
        assert!(list_scene_files(Path::new("/nonexistent/input")).is_err());
    }
}

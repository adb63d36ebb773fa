use anyhow::{bail, Context, Result};
use clap::Parser;
use scenevox::cli::{Cli, Commands, MapCommands, PresetCommands};
use scenevox::core::config::Config;
use scenevox::core::io::file_stem;
use scenevox::core::state::{CharacterMap, Language, Preset, PresetMap};
use scenevox::services::llm::create_llm;
use scenevox::services::manifest::{build_scene_manifest, build_text_manifest, load_manifest};
use scenevox::services::setup;
use scenevox::services::translate::Translator;
use scenevox::services::tts::create_tts_client;
use scenevox::services::vocal::VocalGenerator;
use scenevox::services::workflow::{ConvertOptions, SceneInput, WorkflowManager};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        return init(&cli.config);
    }

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Fix or remove '{}' to continue.", cli.config.display());
            return Err(e);
        }
    };

    match cli.command {
        // Runs before the config is loaded.
        Commands::Init => {}
        Commands::Convert {
            files,
            scene,
            no_audio,
            group,
            emotions,
        } => {
            let options = ConvertOptions {
                insert_audio: !no_audio,
                group_dialogue: group,
                tag_emotions: emotions,
            };
            convert(config, files, scene, options).await?;
        }
        Commands::Translate { input } => translate(&config, &input).await?,
        Commands::Manifest { input, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output_folder));
            let presets = PresetMap::load(Path::new(&config.preset_map));
            let (path, count) = build_scene_manifest(&input, &output, &presets, &config.default_preset)?;
            println!("Wrote {} request(s) to {}", count, path.display());
        }
        Commands::ManifestText { input, character } => {
            let presets = PresetMap::load(Path::new(&config.preset_map));
            let (path, count) =
                build_text_manifest(&input, character.as_deref(), &presets, &config.default_preset)?;
            println!("Wrote {} request(s) to {}", count, path.display());
        }
        Commands::Synthesize { manifest, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output_folder));
            let tts = create_tts_client(&config.tts)?;
            let mut generator = VocalGenerator::new(tts.as_ref(), &output, config.tts.request_interval());
            let report = generator.generate_file(&manifest).await?;

            println!(
                "Generated {} clip(s) under {}",
                report.generated.len(),
                output.display()
            );
            for (position, reason) in &report.failures {
                eprintln!(" - item {}: {}", position, reason);
            }
        }
        Commands::Regenerate {
            manifest,
            clip,
            output,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.output_folder));
            let requests = load_manifest(&manifest)?;
            let tts = create_tts_client(&config.tts)?;
            let mut generator = VocalGenerator::new(tts.as_ref(), &output, config.tts.request_interval());
            generator.regenerate(&requests, &clip).await?;
        }
        Commands::Map { command } => map(&config, command)?,
        Commands::Preset { command } => preset(&config, command)?,
    }

    Ok(())
}

fn init(path: &Path) -> Result<()> {
    if path.exists() && !setup::confirm(&format!("{} exists. Overwrite with defaults?", path.display()), false)? {
        return Ok(());
    }
    let config = Config::default();
    config.save_to(path)?;
    config.ensure_directories()?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn convert(
    config: Config,
    files: Vec<PathBuf>,
    scene: Option<String>,
    options: ConvertOptions,
) -> Result<()> {
    config.ensure_directories()?;

    let files = if files.is_empty() {
        setup::ask_input_files(Path::new(&config.input_folder))?
    } else {
        files
    };

    let inputs: Vec<SceneInput> = match (files.as_slice(), scene) {
        ([single], Some(scene)) => vec![SceneInput::new(single).with_scene(&scene)],
        ([single], None) => {
            let scene = setup::ask_scene_name(&file_stem(single)?)?;
            vec![SceneInput::new(single).with_scene(&scene)]
        }
        (_, Some(_)) => bail!("--scene only applies to a single input file"),
        (many, None) => many.iter().map(SceneInput::new).collect(),
    };

    let llm = if options.tag_emotions {
        Some(create_llm(&config.llm)?)
    } else {
        None
    };

    let manager = WorkflowManager::new(config, llm);
    let report = manager.run(&inputs, options).await;

    for (path, reason) in &report.failures {
        eprintln!(" - {}: {}", path.display(), reason);
    }
    if report.success_count() == 0 && !report.failures.is_empty() {
        bail!("No file was converted");
    }
    Ok(())
}

async fn translate(config: &Config, input: &Path) -> Result<()> {
    let names_path = config
        .translation
        .name_map
        .as_deref()
        .unwrap_or(&config.character_map);
    let names = CharacterMap::load(Path::new(names_path));

    let llm = create_llm(&config.llm)?;
    let translator = Translator::new(llm.as_ref(), config.retry_policy(), &config.translation, &names);
    let output = translator.translate_file(input).await?;
    println!("Saved translation to {}", output.display());
    Ok(())
}

fn map(config: &Config, command: MapCommands) -> Result<()> {
    let path = Path::new(&config.character_map);
    match command {
        MapCommands::Show => {
            let characters = CharacterMap::load(path);
            if characters.is_empty() {
                println!("No characters mapped in {}", path.display());
            }
            for (name, id) in characters.iter() {
                println!("{} -> {}", name, id);
            }
        }
        MapCommands::Add { name, id } => {
            let mut characters = CharacterMap::read(path)?;
            match characters.add(path, &name, &id)? {
                Some(previous) if previous != id.trim() => {
                    println!("Remapped {}: {} -> {}", name.trim(), previous, id.trim())
                }
                _ => println!("Mapped {} -> {}", name.trim(), id.trim()),
            }
        }
    }
    Ok(())
}

fn parse_language(value: &str) -> Result<Language> {
    Language::parse(value).with_context(|| format!("Unknown language '{}'", value))
}

fn preset(config: &Config, command: PresetCommands) -> Result<()> {
    let path = Path::new(&config.preset_map);
    match command {
        PresetCommands::Save {
            key,
            ref_audio,
            prompt_text,
            prompt_lang,
            text_lang,
            gpt_weight,
            sovits_weight,
            sample_steps,
        } => {
            let base = &config.default_preset;
            let nothing_given = ref_audio.is_none()
                && prompt_text.is_none()
                && prompt_lang.is_none()
                && text_lang.is_none()
                && gpt_weight.is_none()
                && sovits_weight.is_none()
                && sample_steps.is_none();

            let preset = if nothing_given {
                setup::ask_preset(base)?
            } else {
                Preset {
                    text_lang: match text_lang {
                        Some(l) => parse_language(&l)?.code().to_string(),
                        None => base.text_lang.clone(),
                    },
                    prompt_lang: match prompt_lang {
                        Some(l) => parse_language(&l)?.code().to_string(),
                        None => base.prompt_lang.clone(),
                    },
                    ref_audio_path: ref_audio.unwrap_or_else(|| base.ref_audio_path.clone()),
                    prompt_text: prompt_text.unwrap_or_else(|| base.prompt_text.clone()),
                    gpt_weight: gpt_weight.unwrap_or_else(|| base.gpt_weight.clone()),
                    sovits_weight: sovits_weight.unwrap_or_else(|| base.sovits_weight.clone()),
                    sample_steps: sample_steps.or(base.sample_steps),
                }
            };

            PresetMap::save_preset(path, &key, preset)?;
            println!("Saved preset '{}' to {}", key.trim(), path.display());
        }
        PresetCommands::SetLang { language } => {
            let language = match language {
                Some(l) => parse_language(&l)?,
                None => setup::ask_language("Text language for every preset:")?,
            };
            let count = PresetMap::set_text_lang_all(path, language)?;
            println!("Set text language of {} preset(s) to {}", count, language);
        }
    }
    Ok(())
}

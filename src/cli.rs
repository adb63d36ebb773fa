use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turns raw dialogue scripts into annotated scenes, speech manifests and voice clips.
#[derive(Parser, Debug)]
#[command(name = "scenevox")]
#[command(about = "Annotate scene scripts and drive speech synthesis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.yml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default config file and create the input and output folders
    Init,

    /// Annotate scene files and group their dialogue by speaker
    Convert {
        /// Scene files; picked interactively from the input folder when omitted
        files: Vec<PathBuf>,

        /// Scene name for a single input file (defaults to the file stem)
        #[arg(short, long)]
        scene: Option<String>,

        /// Leave the audio reference out of annotated lines
        #[arg(long)]
        no_audio: bool,

        /// Also write one text file per speaker
        #[arg(short, long)]
        group: bool,

        /// Tag every utterance with an emotion through the LLM
        #[arg(short, long)]
        emotions: bool,
    },

    /// Translate a grouped scene JSON file
    Translate {
        input: PathBuf,
    },

    /// Build a speech manifest from a grouped scene JSON file
    Manifest {
        input: PathBuf,

        /// Output folder (defaults to the configured output folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a speech manifest from a plain text file, one request per line
    ManifestText {
        input: PathBuf,

        /// Character id for every request (defaults to `unknown`)
        #[arg(long)]
        character: Option<String>,
    },

    /// Synthesize every request of a manifest
    Synthesize {
        manifest: PathBuf,

        /// Root folder for generated clips (defaults to the configured output folder)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Re-synthesize a single clip, e.g. `anon/test/anon_test_03.wav`
    Regenerate {
        manifest: PathBuf,

        /// Clip path relative to the output root
        clip: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Character map commands
    Map {
        #[command(subcommand)]
        command: MapCommands,
    },

    /// Voice preset commands
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum MapCommands {
    /// Print every display name and its id
    Show,

    /// Add or replace a mapping
    Add {
        name: String,
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PresetCommands {
    /// Save a preset under `<id>` or `<id>_<emotion>`; asks for the fields when none are given
    Save {
        key: String,

        #[arg(long)]
        ref_audio: Option<String>,

        #[arg(long)]
        prompt_text: Option<String>,

        /// Language label or code, e.g. 日本語 or all_ja
        #[arg(long)]
        prompt_lang: Option<String>,

        #[arg(long)]
        text_lang: Option<String>,

        #[arg(long)]
        gpt_weight: Option<String>,

        #[arg(long)]
        sovits_weight: Option<String>,

        #[arg(long)]
        sample_steps: Option<u32>,
    },

    /// Switch the text language of every stored preset
    SetLang {
        /// Language label or code; chosen interactively when omitted
        language: Option<String>,
    },
}

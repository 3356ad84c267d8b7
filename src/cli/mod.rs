//! CLI Module
//!
//! Command-line interface for the fxstudio effects engine.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fxstudio - interactive audio effects engine
#[derive(Parser, Debug)]
#[command(name = "fxstudio")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Effect controls shared by `render` and `play`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ControlArgs {
    /// Start from a built-in preset
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Override one control, e.g. `--set reverb=0.4` (repeatable)
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    pub sets: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a WAV file through the effects chain
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file (16-bit PCM)
        output: PathBuf,

        #[command(flatten)]
        controls: ControlArgs,
    },

    /// Monitor a WAV file through the effects chain
    #[command(name = "play")]
    Play {
        /// Input WAV file
        input: PathBuf,

        #[command(flatten)]
        controls: ControlArgs,

        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,
    },

    /// List built-in presets
    #[command(name = "presets")]
    Presets,

    /// Print format and levels of a WAV file
    #[command(name = "inspect")]
    Inspect {
        /// Input WAV file
        input: PathBuf,
    },
}

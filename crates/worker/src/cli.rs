use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::WorkerConfig;

/// Default prompt library location.
pub const DEFAULT_LIBRARY: &str = "prompt_library.json";

#[derive(Debug, Parser)]
#[command(name = "framecast-worker")]
#[command(about = "Batch image-to-video generation against the MiniMax API.")]
pub struct Cli {
    /// Prompt library file.
    #[arg(long, global = true, default_value = DEFAULT_LIBRARY)]
    pub library: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate videos for every image in a directory.
    Run(RunArgs),
    /// Inspect or extend the prompt library.
    Prompts {
        #[command(subcommand)]
        command: PromptsCommand,
    },
    /// Create or update an image-to-prompt manifest.
    Manifest {
        #[command(subcommand)]
        command: ManifestCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory of .png / .jpg / .jpeg input images.
    #[arg(long)]
    pub images: PathBuf,

    /// JSON manifest mapping image file names to prompts.
    #[arg(long)]
    pub manifest: PathBuf,

    /// Output directory (overrides FRAMECAST_OUTPUT_DIR).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Model id (overrides FRAMECAST_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Videos generated per image (overrides FRAMECAST_VIDEOS_PER_IMAGE).
    #[arg(long)]
    pub videos_per_image: Option<u32>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, config: &mut WorkerConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(n) = self.videos_per_image {
            config.videos_per_image = n;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PromptsCommand {
    /// List prompts, optionally for one category.
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a prompt (replaces an existing one with the same name).
    Add {
        category: String,
        name: String,
        text: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ManifestCommand {
    /// Assign one prompt to every image in a directory that has none yet.
    Init {
        /// Directory of input images.
        #[arg(long)]
        images: PathBuf,

        /// Manifest file to create or update.
        #[arg(long)]
        manifest: PathBuf,

        /// Literal prompt text.
        #[arg(long, conflicts_with_all = ["category", "name"], required_unless_present = "name")]
        prompt: Option<String>,

        /// Library category of the prompt to use.
        #[arg(long, requires = "name")]
        category: Option<String>,

        /// Library prompt name within `--category`.
        #[arg(long, requires = "category")]
        name: Option<String>,

        /// Replace prompts already present in the manifest.
        #[arg(long)]
        overwrite: bool,
    },
}

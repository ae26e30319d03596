use std::path::PathBuf;

use clap::{Parser, Subcommand};
use music_embed::{Device, FailurePolicy, ModelId, Split};

#[derive(Parser)]
#[command(
    name = "music-embed",
    about = "Extract embeddings from pretrained music tagging models"
)]
pub struct Cli {
    /// Disable log output on stderr.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// YAML config file; flags override its values.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Compute device: cpu, cuda, cuda:<n>, coreml or directml.
    #[arg(long, global = true)]
    pub device: Option<Device>,

    /// Directory holding `<model>/best_model.onnx` for each model.
    #[arg(long, global = true)]
    pub weights_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Embed a whole dataset and write per-category stacks and indices.
    Run {
        /// Directory containing `genres_original/` and `genres_ood/`.
        #[arg(long)]
        dataset_root: Option<PathBuf>,

        /// Where to write results. Defaults to `<dataset_root>/embeddings`.
        #[arg(long)]
        output_root: Option<PathBuf>,

        /// Model to run. Repeat for several; defaults to all.
        #[arg(short, long = "model")]
        models: Vec<ModelId>,

        /// Split to process (original, ood). Repeat for several; defaults to both.
        #[arg(long = "split")]
        splits: Vec<Split>,

        /// What to do when a file fails: abort-category or skip-file.
        #[arg(long)]
        on_error: Option<FailurePolicy>,
    },

    /// Print the embedding of one file as a JSON array.
    Embed {
        file: PathBuf,

        #[arg(short, long)]
        model: ModelId,
    },

    /// Print the most probable tags of one file.
    Tags {
        file: PathBuf,

        #[arg(short, long)]
        model: ModelId,

        /// Number of tags.
        #[arg(short, default_value = "5")]
        n: usize,
    },
}

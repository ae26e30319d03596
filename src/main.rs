mod cli;

use std::path::Path;
use std::process;

use clap::Parser;
use eyre::{Result, WrapErr};
use music_embed::{
    top_tags, Config, EmbeddingExtractor, ModelId,
};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:?}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(weights_root) = cli.weights_root {
        config.weights_root = weights_root;
    }

    match cli.command {
        Command::Run {
            dataset_root,
            output_root,
            models,
            splits,
            on_error,
        } => {
            if let Some(root) = dataset_root {
                config.dataset_root = root;
            }
            if output_root.is_some() {
                config.output_root = output_root;
            }
            if !models.is_empty() {
                config.models = models;
            }
            if !splits.is_empty() {
                config.splits = splits;
            }
            if let Some(policy) = on_error {
                config.failure_policy = policy;
            }
            cmd_run(&config)
        }
        Command::Embed { file, model } => cmd_embed(&config, &file, model),
        Command::Tags { file, model, n } => cmd_tags(&config, &file, model, n),
    }
}

fn cmd_run(config: &Config) -> Result<i32> {
    let mut extractor = EmbeddingExtractor::from_config(config, &config.models)?;

    let summary = music_embed::run(&mut extractor, config).wrap_err("batch run failed")?;

    for split in &summary.splits {
        eprintln!(
            "{}/{}: {} categories, {} embedded, {} failed",
            split.model, split.split, split.categories, split.embedded, split.failed
        );
    }
    for aborted in &summary.aborted {
        eprintln!("{}: aborted: {}", aborted.model, aborted.reason);
    }

    Ok(if summary.is_complete() { 0 } else { 2 })
}

fn cmd_embed(config: &Config, file: &Path, model: ModelId) -> Result<i32> {
    let mut extractor = EmbeddingExtractor::from_config(config, &[model])?;
    let embedding = extractor
        .compute(file, model, &config.weights_path(model))
        .wrap_err_with(|| format!("failed to embed {}", file.display()))?;

    println!("{}", serde_json::to_string(&embedding.to_vec())?);
    Ok(0)
}

fn cmd_tags(config: &Config, file: &Path, model: ModelId, n: usize) -> Result<i32> {
    let mut extractor = EmbeddingExtractor::from_config(config, &[model])?;
    let out = extractor
        .compute_windows(file, model, &config.weights_path(model))
        .wrap_err_with(|| format!("failed to tag {}", file.display()))?;

    for (tag, score) in top_tags(out.tags.view(), n) {
        println!("{tag}\t{score:.4}");
    }
    Ok(0)
}

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::audio::AudioLoader;
use crate::config::Config;
use crate::embedding::EmbeddingExtractor;
use crate::model::ModelId;
use crate::store::{self, EmbeddingIndex};
use crate::EmbedError;

/// Dataset partition, each stored under its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Original,
    Ood,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Original, Split::Ood];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Original => "original",
            Split::Ood => "ood",
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Original => "genres_original",
            Split::Ood => "genres_ood",
        }
    }

    pub fn index_file_name(self) -> String {
        format!("{}_ix_dict.json", self.as_str())
    }

    /// The original split ignores categories with an underscore in their name.
    pub fn accepts(self, category: &str) -> bool {
        match self {
            Split::Original => !category.contains('_'),
            Split::Ood => true,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Split::ALL
            .into_iter()
            .find(|split| split.as_str() == s)
            .ok_or_else(|| format!("unknown split '{s}', expected original or ood"))
    }
}

/// What the pipeline does after a file fails to embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the category at the first failing file, keeping what was collected.
    #[default]
    AbortCategory,
    /// Log the failing file and go on with the rest of the category.
    SkipFile,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort-category" => Ok(FailurePolicy::AbortCategory),
            "skip-file" => Ok(FailurePolicy::SkipFile),
            _ => Err(format!(
                "unknown failure policy '{s}', expected abort-category or skip-file"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SkipFile,
    AbortCategory,
    AbortModel,
    /// Stop the whole run and return the error.
    AbortRun,
}

impl FailurePolicy {
    pub fn action(self, err: &EmbedError) -> Action {
        match err {
            EmbedError::WeightsUnavailable { .. }
            | EmbedError::NotLoaded(_)
            | EmbedError::Unregistered(_) => Action::AbortModel,
            EmbedError::Persist { .. } => Action::AbortRun,
            EmbedError::InsufficientLength { .. }
            | EmbedError::Decode { .. }
            | EmbedError::Filesystem { .. }
            | EmbedError::Inference(_) => match self {
                FailurePolicy::AbortCategory => Action::AbortCategory,
                FailurePolicy::SkipFile => Action::SkipFile,
            },
        }
    }
}

/// Counts for one (model, split) pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub model: ModelId,
    pub split: Split,
    pub categories: usize,
    pub embedded: usize,
    pub failed: usize,
    /// Stacks that replaced one written earlier in the same run.
    pub overwritten: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedModel {
    pub model: ModelId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub splits: Vec<SplitSummary>,
    pub aborted: Vec<AbortedModel>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_empty()
    }

    pub fn embedded(&self) -> usize {
        self.splits.iter().map(|s| s.embedded).sum()
    }

    pub fn failed(&self) -> usize {
        self.splits.iter().map(|s| s.failed).sum()
    }
}

/// Embeds every file of the configured splits with every configured model.
///
/// Writes one stack per category to `<output_root>/<model>/<category>` and
/// one index per split to `<output_root>/<model>/<split>_ix_dict.json`.
/// Only errors writing those artifacts or listing the dataset are returned;
/// per-file failures are handled by [`Config::failure_policy`].
pub fn run<L: AudioLoader>(
    extractor: &mut EmbeddingExtractor<L>,
    config: &Config,
) -> Result<RunSummary, EmbedError> {
    let mut summary = RunSummary::default();

    for &id in &config.models {
        let weights = config.weights_path(id);
        if let Err(err) = extractor.prepare(id, &weights) {
            warn!(model = %id, "skipping model: {err}");
            summary.aborted.push(AbortedModel {
                model: id,
                reason: err.to_string(),
            });
            continue;
        }

        let out_dir = config.output_dir(id);
        fs::create_dir_all(&out_dir).map_err(|e| EmbedError::persist(&out_dir, e))?;
        info!(model = %id, "running");

        let mut written = BTreeSet::new();
        for &split in &config.splits {
            let (split_summary, aborted) =
                run_split(extractor, config, id, split, &weights, &out_dir, &mut written)?;
            summary.splits.push(split_summary);
            if let Some(err) = aborted {
                warn!(model = %id, "aborting model: {err}");
                summary.aborted.push(AbortedModel {
                    model: id,
                    reason: err.to_string(),
                });
                break;
            }
        }
    }

    Ok(summary)
}

fn run_split<L: AudioLoader>(
    extractor: &mut EmbeddingExtractor<L>,
    config: &Config,
    id: ModelId,
    split: Split,
    weights: &Path,
    out_dir: &Path,
    written: &mut BTreeSet<PathBuf>,
) -> Result<(SplitSummary, Option<EmbedError>), EmbedError> {
    let mut summary = SplitSummary {
        model: id,
        split,
        categories: 0,
        embedded: 0,
        failed: 0,
        overwritten: 0,
    };

    let root = config.dataset_root.join(split.dir_name());
    let categories = match list_sorted(&root, Path::is_dir) {
        Ok(categories) => categories,
        Err(EmbedError::Filesystem { ref source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            warn!(path = %root.display(), "split directory missing, skipping");
            return Ok((summary, None));
        }
        Err(err) => return Err(err),
    };

    let index_path = out_dir.join(split.index_file_name());
    let mut index = EmbeddingIndex::new();

    for category_dir in categories {
        let category = file_name(&category_dir);
        if !split.accepts(&category) {
            debug!(%split, %category, "category filtered out");
            continue;
        }

        let mut embeddings = Vec::new();
        let mut files = Vec::new();
        let mut aborted = None;

        for file in list_sorted(&category_dir, Path::is_file)? {
            match extractor.compute(&file, id, weights) {
                Ok(embedding) => {
                    embeddings.push(embedding);
                    files.push(file_name(&file));
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(file = %file.display(), "{err}");
                    match config.failure_policy.action(&err) {
                        Action::SkipFile => continue,
                        Action::AbortCategory => break,
                        Action::AbortModel => {
                            aborted = Some(err);
                            break;
                        }
                        Action::AbortRun => return Err(err),
                    }
                }
            }
        }

        let stack_path = out_dir.join(&category);
        if !written.insert(stack_path.clone()) {
            warn!(path = %stack_path.display(), %split, "overwriting stack written earlier in this run");
            summary.overwritten += 1;
        }
        store::write_stack(&stack_path, &embeddings)?;
        summary.embedded += files.len();
        summary.categories += 1;
        info!(model = %id, %split, %category, files = files.len(), "category done");

        index.insert(category, files);
        store::write_index(&index_path, &index)?;

        if aborted.is_some() {
            return Ok((summary, aborted));
        }
    }

    // Also covers a split with no accepted categories.
    store::write_index(&index_path, &index)?;
    Ok((summary, None))
}

/// Entries of `dir` matching `keep`, sorted by name.
fn list_sorted(dir: &Path, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>, EmbedError> {
    let entries = fs::read_dir(dir).map_err(|e| EmbedError::filesystem(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| EmbedError::filesystem(dir, e))?.path();
        if keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

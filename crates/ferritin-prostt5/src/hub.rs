//! Download a ProstT5 model directory from the HuggingFace hub.
use crate::candle::{CONFIG_FILE, HEAD_FILES, TOKENIZER_FILE, WEIGHT_FILES};
use anyhow::{anyhow, Context, Result};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use std::path::PathBuf;
use tracing::{debug, info};

fn get_first(repo: &ApiRepo, candidates: &[&str]) -> Result<PathBuf> {
    for name in candidates {
        match repo.get(name) {
            Ok(path) => return Ok(path),
            Err(err) => debug!(file = name, error = %err, "not available"),
        }
    }
    Err(anyhow!("none of [{}] available", candidates.join(", ")))
}

/// Fetch (or reuse from the local cache) the files of `repo_id` at
/// `revision` and return the snapshot directory holding them.
pub fn fetch_model(repo_id: &str, revision: &str) -> Result<PathBuf> {
    let api = Api::new()?;
    let repo = api.repo(Repo::with_revision(
        repo_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));
    info!(repo = repo_id, revision, "fetching model files");
    let config = repo
        .get(CONFIG_FILE)
        .with_context(|| format!("failed to fetch {CONFIG_FILE} from {repo_id}"))?;
    repo.get(TOKENIZER_FILE)
        .with_context(|| format!("failed to fetch {TOKENIZER_FILE} from {repo_id}"))?;
    get_first(&repo, WEIGHT_FILES).context("no encoder weights")?;
    get_first(&repo, HEAD_FILES).context("no 3Di head weights")?;
    // the hub cache keeps one snapshot directory per revision
    config
        .parent()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("unexpected cache path {}", config.display()))
}

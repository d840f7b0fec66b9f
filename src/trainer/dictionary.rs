use crate::normalization::Dictionary;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

const DOWNLOAD_TIMEOUT_SECONDS: u64 = 120;

/// Read a word-per-line reference dictionary.
pub fn load_dictionary(path: &Path) -> Result<Dictionary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not open dictionary: {}", path.display()))?;
    Ok(Dictionary::from_words(content.lines()))
}

/// Load the dictionary at `path`, downloading it once from `url` when the
/// file does not exist yet. Any failure disables dictionary filtering.
pub async fn ensure_dictionary(path: &Path, url: &str) -> Dictionary {
    if !path.exists() {
        log::info!("Dictionary not found. Downloading from {url} ...");
        if let Err(e) = download(url, path).await {
            log::warn!("Error downloading dictionary: {e:#}. Filtering disabled.");
            return Dictionary::empty();
        }
        log::info!("Dictionary downloaded to {}", path.display());
    }

    match load_dictionary(path) {
        Ok(dictionary) => {
            log::info!("Loaded {} dictionary words", dictionary.len());
            dictionary
        }
        Err(e) => {
            log::warn!("{e:#}. Dictionary filtering disabled.");
            Dictionary::empty()
        }
    }
}

async fn download(url: &str, path: &Path) -> Result<()> {
    let url = url::Url::parse(url).with_context(|| format!("Invalid dictionary URL: {url}"))?;
    let client = Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECONDS))
        .build()?;
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write dictionary: {}", path.display()))?;
    Ok(())
}

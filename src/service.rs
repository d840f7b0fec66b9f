//! Scorer request boundary: where message bytes come from and which
//! messages can be offered to the user.

use crate::cache::UploadCache;
use crate::features::domain_reputation::{LiveLookup, NetworkLookup};
use crate::filter::FilterEngine;
use crate::scoring::AnalysisResult;
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHED_PREFIX: &str = "memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// Freshly uploaded bytes; cached under `file_name` before analysis.
    Upload { file_name: String, bytes: Vec<u8> },
    /// A previously uploaded message.
    Cached { key: String },
    /// A file in the test fixture directory.
    Fixture { name: String },
}

impl MessageSource {
    /// `memory:<key>` names a cached upload, anything else a fixture.
    pub fn from_reference(reference: &str) -> Self {
        match reference.strip_prefix(CACHED_PREFIX) {
            Some(key) => MessageSource::Cached {
                key: key.to_string(),
            },
            None => MessageSource::Fixture {
                name: reference.to_string(),
            },
        }
    }
}

pub struct AnalysisService<L: NetworkLookup = LiveLookup> {
    engine: FilterEngine<L>,
    cache: Arc<UploadCache>,
    test_emails_dir: PathBuf,
}

impl<L: NetworkLookup> AnalysisService<L> {
    pub fn new(engine: FilterEngine<L>, cache: Arc<UploadCache>, test_emails_dir: PathBuf) -> Self {
        Self {
            engine,
            cache,
            test_emails_dir,
        }
    }

    pub fn cache(&self) -> &Arc<UploadCache> {
        &self.cache
    }

    pub async fn analyze(&self, source: MessageSource) -> Result<AnalysisResult> {
        let (name, bytes): (String, Arc<[u8]>) = match source {
            MessageSource::Upload { file_name, bytes } => {
                let bytes: Arc<[u8]> = Arc::from(bytes);
                self.cache.insert(&file_name, bytes.to_vec()).await;
                (file_name, bytes)
            }
            MessageSource::Cached { key } => {
                let bytes = self
                    .cache
                    .get(&key)
                    .await
                    .ok_or_else(|| anyhow!("Message {key} is not in the upload cache (expired?)"))?;
                (key, bytes)
            }
            MessageSource::Fixture { name } => {
                let path = fixture_path(&self.test_emails_dir, &name)?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Test email not found: {}", path.display()))?;
                (name, Arc::from(bytes))
            }
        };
        Ok(self.engine.analyze(&name, &bytes).await)
    }

    pub fn list_test_emails(&self) -> Vec<String> {
        list_test_emails(&self.test_emails_dir)
    }

    pub async fn list_uploads(&self) -> Vec<String> {
        self.cache.keys().await
    }
}

/// Resolve a fixture name inside `dir`, rejecting anything that could
/// escape it.
pub fn fixture_path(dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        bail!("Invalid test email name: {name:?}");
    }
    Ok(dir.join(name))
}

/// Sorted `*.eml` file names in `dir`; empty when the directory is missing.
pub fn list_test_emails(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("No test emails in {}: {e}", dir.display());
            return Vec::new();
        }
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".eml"))
        .collect();
    names.sort();
    names
}

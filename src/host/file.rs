// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! File-backed markdown host.
//!
//! Document ids are file paths. Every call re-reads the file, so edits
//! made by other programs are seen; a range that no longer matches a
//! block body is reported as stale instead of being overwritten.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::markdown::{DiscoveredBlock, MarkdownDocument, DEFAULT_LANGUAGE};
use super::{BlockId, DocumentHost, DocumentId, HostError, SourceRange};

/// Markdown files on the local file system
pub struct FileHost {
    /// Fence language tag for pattern blocks
    language: String,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileHost {
    /// Create a host recognizing blocks tagged with `language`
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the pattern language tag
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Load and parse a document
    pub async fn load(&self, document: &DocumentId) -> Result<MarkdownDocument, HostError> {
        let path = document.to_path();
        let source = match tokio::fs::read_to_string(&path).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HostError::DocumentNotFound(document.clone()));
            }
            Err(e) => return Err(HostError::Io(e)),
        };
        Ok(MarkdownDocument::parse(&source, self.language.as_str()))
    }
}

impl Default for FileHost {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

#[async_trait]
impl DocumentHost for FileHost {
    async fn discover_blocks(&self, document: &DocumentId) -> Result<Vec<DiscoveredBlock>, HostError> {
        Ok(self.load(document).await?.blocks().to_vec())
    }

    async fn locate(&self, document: &DocumentId, block: &BlockId) -> Option<SourceRange> {
        match self.load(document).await {
            Ok(doc) => doc.locate(block),
            Err(e) => {
                tracing::debug!(document = %document, error = %e, "locate failed");
                None
            }
        }
    }

    async fn replace_range(
        &self,
        document: &DocumentId,
        block: &BlockId,
        range: SourceRange,
        text: &str,
    ) -> Result<(), HostError> {
        let _guard = self.write_lock.lock().await;

        // Re-read under the lock; an earlier write may have moved this block
        let mut doc = self.load(document).await?;
        if !doc.replace_range(block, range, text) {
            return Err(HostError::StaleRange {
                document: document.clone(),
                range,
            });
        }

        tokio::fs::write(document.to_path(), doc.text()).await?;
        tracing::debug!(document = %document, block = %block, range = %range, "block body written");
        Ok(())
    }
}

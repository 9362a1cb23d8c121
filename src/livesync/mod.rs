// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Write-back of live-edited block text into the persisted document.
//!
//! This module provides:
//! - The write guard ([`check_guard`])
//! - The full-range replace against a host locator ([`SyncEngine`])
//!
//! Writes are last-writer-wins with no merge. A write whose locator has
//! gone stale is abandoned, never retried.

pub mod guard;

pub use guard::{check_guard, FlushBlocked, FlushMode};

use std::sync::Arc;

use tracing::trace;

use crate::host::{BlockId, DocumentHost, DocumentId, HostError};

/// Result of a flush attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The text was written and recorded as synced
    Written,
    /// The guard refused the write
    Blocked(FlushBlocked),
    /// The write was attempted and dropped
    Abandoned,
}

impl FlushOutcome {
    /// Check whether text reached the document
    pub fn is_written(&self) -> bool {
        matches!(self, FlushOutcome::Written)
    }
}

/// Write-back failures. Always logged and abandoned by the caller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The host can no longer locate the block
    #[error("block {0} can no longer be located")]
    InvalidLocator(BlockId),

    /// The host failed or refused the write
    #[error("write-back of block {block} failed: {source}")]
    Host {
        block: BlockId,
        #[source]
        source: HostError,
    },
}

/// Performs full-range replaces through a document host
#[derive(Clone)]
pub struct SyncEngine {
    host: Arc<dyn DocumentHost>,
}

impl SyncEngine {
    /// Create a sync engine over a host
    pub fn new(host: Arc<dyn DocumentHost>) -> Self {
        Self { host }
    }

    /// Get the underlying host
    pub fn host(&self) -> &Arc<dyn DocumentHost> {
        &self.host
    }

    /// Replace the block body with `text`
    pub async fn write_back(&self, document: &DocumentId, block: &BlockId, text: &str) -> Result<(), SyncError> {
        let range = self
            .host
            .locate(document, block)
            .await
            .ok_or_else(|| SyncError::InvalidLocator(block.clone()))?;

        trace!(document = %document, block = %block, range = %range, "Writing block back");

        self.host
            .replace_range(document, block, range, text)
            .await
            .map_err(|source| match source {
                // Structural edit between locate and replace
                HostError::StaleRange { .. } => SyncError::InvalidLocator(block.clone()),
                source => SyncError::Host {
                    block: block.clone(),
                    source,
                },
            })
    }
}

// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Crate-level error type for caller mistakes and host failures.
//!
//! Evaluation failures never surface here; they are recorded on the
//! block that produced them.

use crate::host::{BlockId, DocumentId, HostError};

/// Errors returned by notebook and registry operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No controller is registered under this id
    #[error("unknown block {block} in {document}")]
    UnknownBlock { document: DocumentId, block: BlockId },

    /// The notebook was destroyed
    #[error("notebook for {0} has been destroyed")]
    SessionDestroyed(DocumentId),

    /// The document host failed
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

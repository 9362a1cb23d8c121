// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Document host abstraction.
//!
//! The host owns the persisted document. It discovers pattern blocks,
//! locates a block body as a line range, replaces that range, and reports
//! lifecycle events. The core only talks to it through [`DocumentHost`],
//! so editors, file systems and test doubles can be used interchangeably.

pub mod file;
pub mod markdown;

pub use file::FileHost;
pub use markdown::{DiscoveredBlock, MarkdownDocument, DEFAULT_LANGUAGE};

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of a live document (normally its path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a document id from any string identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a document id from a file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the identifier as a file path
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Stable identity of a pattern block within one document.
///
/// Never derived from a UI element; the UI only holds this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    /// Create a block id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id used for blocks without an explicit name: the ordinal among pattern blocks
    pub fn ordinal(index: usize) -> Self {
        Self(format!("block-{}", index))
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Line range of a block body in the persisted source.
///
/// Lines are 0-indexed; `end_line` is exclusive, so an empty body has
/// `start_line == end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRange {
    /// First line of the body
    pub start_line: usize,
    /// One past the last line of the body
    pub end_line: usize,
}

impl SourceRange {
    /// Create a new range
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line: end_line.max(start_line),
        }
    }

    /// Number of lines covered
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line
    }

    /// Check whether the range covers no lines
    pub fn is_empty(&self) -> bool {
        self.start_line == self.end_line
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_line, self.end_line)
    }
}

/// Errors reported by a document host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The document does not exist or is not open
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// The range no longer matches a block body in the document
    #[error("range {range} no longer matches a block body in {document}")]
    StaleRange {
        document: DocumentId,
        range: SourceRange,
    },

    /// The host refused the write
    #[error("host rejected write: {0}")]
    Rejected(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle events emitted by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A document was opened and its blocks should be registered
    DocumentOpened(DocumentId),
    /// A document was closed; its notebook is destroyed
    DocumentClosed(DocumentId),
    /// A block disappeared from the document
    BlockRemoved { document: DocumentId, block: BlockId },
    /// Input focus entered or left a block's editing surface
    FocusChanged {
        document: DocumentId,
        block: BlockId,
        focused: bool,
    },
}

/// Trait for document host implementations.
///
/// All methods may suspend; callers never hold session state across them.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// List the pattern blocks currently present in a document
    async fn discover_blocks(&self, document: &DocumentId) -> Result<Vec<DiscoveredBlock>, HostError>;

    /// Locate the body of a block, or `None` if the block can no longer be found
    async fn locate(&self, document: &DocumentId, block: &BlockId) -> Option<SourceRange>;

    /// Replace the body of `block` with `text`.
    ///
    /// Fails with [`HostError::StaleRange`] unless `range` is still that
    /// block's body.
    async fn replace_range(
        &self,
        document: &DocumentId,
        block: &BlockId,
        range: SourceRange,
        text: &str,
    ) -> Result<(), HostError>;
}

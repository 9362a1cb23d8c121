// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-block playback state and cross-block arbitration.
//!
//! This module provides:
//! - The block controller state machine
//! - Generation tokens that invalidate stale evaluations
//! - The solo/non-solo arbitration policy

pub mod block;
pub mod coordinator;

pub use block::{BlockController, BlockSnapshot};
pub use coordinator::{arbitrate, exclusivity_holds, Arbitration};

use std::fmt;

/// Lifecycle status of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockStatus {
    /// Not playing
    #[default]
    Idle,
    /// Evaluation in flight
    Loading,
    /// Pattern is sounding
    Playing,
    /// Last evaluation failed
    Error,
}

impl BlockStatus {
    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            BlockStatus::Idle => "idle",
            BlockStatus::Loading => "loading",
            BlockStatus::Playing => "playing",
            BlockStatus::Error => "error",
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Token identifying the latest evaluate/stop request of a block.
///
/// Tokens for evaluations are handed out by the owning notebook, so a
/// controller registered again under a reused id never sees a token that
/// was issued to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl From<u64> for Generation {
    fn from(value: u64) -> Self {
        Generation(value)
    }
}

impl Generation {
    /// The following generation
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    /// Raw counter value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

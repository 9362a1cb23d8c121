// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Solo arbitration between blocks of one notebook.
//!
//! Arbitration is a pure function of the blocks' engaged and solo flags.
//! It decides which other blocks must stop before the requester starts;
//! the notebook applies the decision before awaiting the engine.

use crate::host::BlockId;

use super::BlockController;

/// Outcome of arbitrating a play request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arbitration {
    /// Requester is solo: every other engaged block stops
    Exclusive(Vec<BlockId>),
    /// Another block holds solo: every engaged block stops to clear it
    ClearSoloist(Vec<BlockId>),
    /// Nothing stops; simultaneous playback is allowed
    Shared,
}

impl Arbitration {
    /// Blocks that must stop
    pub fn targets(&self) -> &[BlockId] {
        match self {
            Arbitration::Exclusive(ids) | Arbitration::ClearSoloist(ids) => ids,
            Arbitration::Shared => &[],
        }
    }

    /// Check whether anything must stop
    pub fn preempts(&self) -> bool {
        !self.targets().is_empty()
    }
}

/// Decide which blocks stop before `requester` starts playing.
///
/// `blocks` may include the requester; it is never a target.
pub fn arbitrate<'a>(
    requester: &BlockController,
    blocks: impl IntoIterator<Item = &'a BlockController>,
) -> Arbitration {
    let others: Vec<&BlockController> = blocks
        .into_iter()
        .filter(|b| b.id() != requester.id() && b.is_engaged())
        .collect();

    let engaged = || -> Vec<BlockId> { others.iter().map(|b| b.id().clone()).collect() };

    if requester.is_solo() {
        Arbitration::Exclusive(engaged())
    } else if others.iter().any(|b| b.is_solo()) {
        Arbitration::ClearSoloist(engaged())
    } else {
        Arbitration::Shared
    }
}

/// Check that an engaged soloist never shares the stage
pub fn exclusivity_holds<'a>(blocks: impl IntoIterator<Item = &'a BlockController>) -> bool {
    let engaged: Vec<&BlockController> = blocks.into_iter().filter(|b| b.is_engaged()).collect();
    !(engaged.len() > 1 && engaged.iter().any(|b| b.is_solo()))
}

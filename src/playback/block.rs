// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Block controller state machine.
//!
//! `Idle → Loading → {Playing | Error}`, `Playing → Idle` on stop and
//! `Error → Loading` on retry. A playing block that is re-evaluated after
//! a live edit also passes through `Loading`, but keeps its current
//! pattern until the new one is ready.
//!
//! The controller only holds state. Arbitration, governor accounting and
//! engine calls are driven by the owning notebook.

use crate::engine::{EvalError, PatternHandle};
use crate::host::{BlockId, DocumentId};

use super::{BlockStatus, Generation};

/// Read-only view of a block for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSnapshot {
    pub id: BlockId,
    pub status: BlockStatus,
    pub solo: bool,
    pub playing: bool,
    pub typing: bool,
    pub focused: bool,
    /// Text differs from what was last written to the document
    pub dirty: bool,
    pub last_error: Option<EvalError>,
}

/// State of one playable block
pub struct BlockController {
    /// Stable block id
    id: BlockId,
    /// Owning document (the notebook owns the controller, not the reverse)
    document: DocumentId,
    /// Current editor text
    text: String,
    /// Text last written to (or read from) the document
    last_synced_text: String,
    /// Lifecycle status
    status: BlockStatus,
    /// Solo flag
    solo: bool,
    /// Edits are still arriving
    typing: bool,
    /// Editing surface holds input focus
    focused: bool,
    /// A write has been proposed since the last sync
    pending_write: bool,
    /// A write-back is in flight
    write_in_flight: bool,
    /// Latest evaluate/stop request
    generation: Generation,
    /// Live pattern, if sounding
    pattern: Option<Box<dyn PatternHandle>>,
    /// Most recent evaluation failure
    last_error: Option<EvalError>,
}

impl BlockController {
    /// Create a controller for a block whose text matches the document
    pub fn new(document: DocumentId, id: BlockId, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id,
            document,
            last_synced_text: text.clone(),
            text,
            status: BlockStatus::Idle,
            solo: false,
            typing: false,
            focused: false,
            pending_write: false,
            write_in_flight: false,
            generation: Generation::default(),
            pattern: None,
            last_error: None,
        }
    }

    /// Get block id
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    /// Get owning document id
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Get current text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace current text
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Get the text last synced with the document
    pub fn last_synced_text(&self) -> &str {
        &self.last_synced_text
    }

    /// Record a successful write of `written`
    pub fn mark_synced(&mut self, written: String) {
        self.last_synced_text = written;
        if self.text == self.last_synced_text {
            self.pending_write = false;
        }
    }

    /// Check whether the text has unsynced changes
    pub fn is_dirty(&self) -> bool {
        self.text != self.last_synced_text
    }

    /// Get lifecycle status
    pub fn status(&self) -> BlockStatus {
        self.status
    }

    /// Check whether a pattern is sounding
    pub fn is_playing(&self) -> bool {
        self.pattern.is_some()
    }

    /// Check whether the block is playing or about to
    pub fn is_engaged(&self) -> bool {
        self.is_playing() || self.status == BlockStatus::Loading
    }

    /// Check solo flag
    pub fn is_solo(&self) -> bool {
        self.solo
    }

    /// Set solo flag. Returns true if it changed.
    pub fn set_solo(&mut self, solo: bool) -> bool {
        let changed = self.solo != solo;
        self.solo = solo;
        changed
    }

    /// Check typing flag
    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Set typing flag
    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    /// Check focus flag
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Set focus flag
    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Check whether a write has been proposed
    pub fn has_pending_write(&self) -> bool {
        self.pending_write
    }

    /// Mark or clear a proposed write
    pub fn set_pending_write(&mut self, pending: bool) {
        self.pending_write = pending;
    }

    /// Check whether a write-back is in flight
    pub fn is_write_in_flight(&self) -> bool {
        self.write_in_flight
    }

    /// Mark or clear an in-flight write-back
    pub fn set_write_in_flight(&mut self, in_flight: bool) {
        self.write_in_flight = in_flight;
    }

    /// Get current generation
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Check whether `generation` is still the latest request
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Get the most recent evaluation error
    pub fn last_error(&self) -> Option<&EvalError> {
        self.last_error.as_ref()
    }

    /// Enter `Loading` for a new evaluation tagged with `generation`.
    ///
    /// The token must come from a source shared by every controller that
    /// can carry this block's id.
    pub fn begin_loading(&mut self, generation: Generation) -> Generation {
        self.generation = generation;
        self.status = BlockStatus::Loading;
        self.generation
    }

    /// Install a freshly evaluated pattern.
    ///
    /// Returns true when the block had no pattern before, i.e. the active
    /// pattern count grows. A replaced pattern is stopped.
    pub fn install(&mut self, pattern: Box<dyn PatternHandle>) -> bool {
        self.status = BlockStatus::Playing;
        self.last_error = None;
        match self.pattern.replace(pattern) {
            Some(mut previous) => {
                previous.stop();
                false
            }
            None => true,
        }
    }

    /// Record a failed evaluation.
    ///
    /// A block that still holds a pattern keeps playing it and stays
    /// `Playing`; otherwise it moves to `Error`.
    pub fn fail(&mut self, error: EvalError) {
        self.status = if self.pattern.is_some() {
            BlockStatus::Playing
        } else {
            BlockStatus::Error
        };
        self.last_error = Some(error);
    }

    /// Stop playback and invalidate any in-flight evaluation.
    ///
    /// Returns true if a sounding pattern was stopped. A block that is
    /// already `Idle` or `Error` is left untouched.
    pub fn stop(&mut self) -> bool {
        if !self.is_engaged() {
            return false;
        }

        self.generation = self.generation.next();
        self.status = BlockStatus::Idle;
        match self.pattern.take() {
            Some(mut pattern) => {
                pattern.stop();
                true
            }
            None => false,
        }
    }

    /// Forward a tempo change to the live pattern
    pub fn set_tempo(&mut self, cps: f64) {
        if let Some(pattern) = self.pattern.as_mut() {
            pattern.set_tempo(cps);
        }
    }

    /// Read-only view for the UI
    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            id: self.id.clone(),
            status: self.status,
            solo: self.solo,
            playing: self.is_playing(),
            typing: self.typing,
            focused: self.focused,
            dirty: self.is_dirty(),
            last_error: self.last_error.clone(),
        }
    }
}

impl std::fmt::Debug for BlockController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockController")
            .field("id", &self.id)
            .field("document", &self.document)
            .field("status", &self.status)
            .field("solo", &self.solo)
            .field("playing", &self.is_playing())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

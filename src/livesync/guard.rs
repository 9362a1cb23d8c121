// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Write guard deciding whether a block may be flushed to its document.

use std::fmt;

use crate::playback::BlockController;

/// How strictly the guard is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Normal flush after edits settle; every condition applies
    Guarded,
    /// Last-chance save on focus loss or teardown; only the text must differ
    Forced,
}

/// Reason a flush did not proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushBlocked {
    /// Edits are still arriving
    Typing,
    /// The block is audible
    Playing,
    /// The editing surface holds focus
    Focused,
    /// Nothing to write
    Unchanged,
    /// A previous write has not completed
    WriteInFlight,
}

impl fmt::Display for FlushBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FlushBlocked::Typing => "typing",
            FlushBlocked::Playing => "playing",
            FlushBlocked::Focused => "focused",
            FlushBlocked::Unchanged => "unchanged",
            FlushBlocked::WriteInFlight => "write in flight",
        };
        f.write_str(reason)
    }
}

/// Check whether `block` may be written back under `mode`
pub fn check_guard(block: &BlockController, mode: FlushMode) -> Result<(), FlushBlocked> {
    if mode == FlushMode::Guarded {
        if block.is_write_in_flight() {
            return Err(FlushBlocked::WriteInFlight);
        }
        if block.is_typing() {
            return Err(FlushBlocked::Typing);
        }
        if block.is_playing() {
            return Err(FlushBlocked::Playing);
        }
        if block.is_focused() {
            return Err(FlushBlocked::Focused);
        }
    }

    if !block.is_dirty() {
        return Err(FlushBlocked::Unchanged);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PatternHandle;
    use crate::host::{BlockId, DocumentId};
    use crate::playback::Generation;

    struct Silent;

    impl PatternHandle for Silent {
        fn stop(&mut self) {}
        fn set_tempo(&mut self, _cps: f64) {}
    }

    fn edited() -> BlockController {
        let mut block = BlockController::new(DocumentId::new("jam.md"), BlockId::new("lead"), "s(\"bd\")");
        block.set_text("s(\"bd sd\")");
        block
    }

    #[test]
    fn test_clean_edit_passes() {
        assert_eq!(check_guard(&edited(), FlushMode::Guarded), Ok(()));
    }

    #[test]
    fn test_each_condition_blocks() {
        let mut typing = edited();
        typing.set_typing(true);
        assert_eq!(check_guard(&typing, FlushMode::Guarded), Err(FlushBlocked::Typing));

        let mut playing = edited();
        playing.begin_loading(Generation::from(1));
        playing.install(Box::new(Silent));
        assert_eq!(check_guard(&playing, FlushMode::Guarded), Err(FlushBlocked::Playing));

        let mut focused = edited();
        focused.set_focused(true);
        assert_eq!(check_guard(&focused, FlushMode::Guarded), Err(FlushBlocked::Focused));

        let mut busy = edited();
        busy.set_write_in_flight(true);
        assert_eq!(check_guard(&busy, FlushMode::Guarded), Err(FlushBlocked::WriteInFlight));

        let unchanged = BlockController::new(DocumentId::new("jam.md"), BlockId::new("lead"), "x");
        assert_eq!(check_guard(&unchanged, FlushMode::Guarded), Err(FlushBlocked::Unchanged));
    }

    #[test]
    fn test_forced_bypasses_activity() {
        let mut block = edited();
        block.set_typing(true);
        block.set_focused(true);
        block.begin_loading(Generation::from(1));
        block.install(Box::new(Silent));

        assert_eq!(check_guard(&block, FlushMode::Forced), Ok(()));

        let unchanged = BlockController::new(DocumentId::new("jam.md"), BlockId::new("lead"), "x");
        assert_eq!(check_guard(&unchanged, FlushMode::Forced), Err(FlushBlocked::Unchanged));
    }
}

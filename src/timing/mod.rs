// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the timer service used for debouncing and
//! periodic work, plus tempo conversion helpers.

pub mod timer;

pub use timer::{TimerKind, TimerService};

/// Beats per pattern cycle used for BPM conversion
pub const BEATS_PER_CYCLE: f64 = 4.0;

/// Lowest accepted tempo in BPM
pub const MIN_BPM: f64 = 20.0;

/// Highest accepted tempo in BPM
pub const MAX_BPM: f64 = 300.0;

/// Convert BPM to cycles per second, clamping to the accepted range
pub fn bpm_to_cps(bpm: f64) -> f64 {
    bpm.clamp(MIN_BPM, MAX_BPM) / 60.0 / BEATS_PER_CYCLE
}

/// Convert cycles per second to BPM
pub fn cps_to_bpm(cps: f64) -> f64 {
    cps * 60.0 * BEATS_PER_CYCLE
}

// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Process-wide resource governor.
//!
//! Counts live patterns across every notebook, estimates memory with a
//! coarse heuristic and gates the periodic cleanup pass. It is advisory
//! only: nothing here ever stops a pattern.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::host::DocumentId;
use crate::lock;

/// Default time between cleanup passes
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Default advisory memory threshold in estimated bytes
pub const DEFAULT_MEMORY_THRESHOLD: usize = 50 * 1024;

/// Estimated cost of one live pattern
pub const PATTERN_COST: usize = 1024;

/// Estimated cost of one namespace binding
pub const BINDING_COST: usize = 256;

/// Governor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Minimum time between cleanup passes
    pub cleanup_interval: Duration,
    /// Estimate above which a pass logs a warning
    pub memory_threshold: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
        }
    }
}

/// What one notebook contributes to the estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFootprint {
    pub document: DocumentId,
    /// Blocks holding a live pattern
    pub playing: usize,
    /// Names in the shared namespace
    pub bindings: usize,
}

/// Result of a cleanup pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub sessions: usize,
    /// Patterns recounted from the sessions
    pub playing: usize,
    pub bindings: usize,
    pub estimated_bytes: usize,
    pub over_threshold: bool,
    /// Incremental counter value when it disagrees with the recount
    pub counter_drift: Option<usize>,
}

/// Read-only snapshot for diagnostic display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernorMetrics {
    pub active_patterns: usize,
    pub estimated_bytes: usize,
    pub memory_threshold: usize,
    pub since_last_cleanup: Duration,
    pub cleanup_passes: u64,
}

struct GovernorState {
    config: GovernorConfig,
    active_patterns: usize,
    /// Namespace size seen by the last pass
    last_bindings: usize,
    last_cleanup: Instant,
    cleanup_passes: u64,
}

/// Aggregate counters and cleanup gate
pub struct ResourceGovernor {
    state: Mutex<GovernorState>,
}

impl ResourceGovernor {
    /// Create a governor with default tuning
    pub fn new() -> Self {
        Self::with_config(GovernorConfig::default())
    }

    /// Create a governor with explicit tuning
    pub fn with_config(config: GovernorConfig) -> Self {
        Self {
            state: Mutex::new(GovernorState {
                config,
                active_patterns: 0,
                last_bindings: 0,
                last_cleanup: Instant::now(),
                cleanup_passes: 0,
            }),
        }
    }

    /// Heuristic memory estimate
    pub fn estimate_bytes(patterns: usize, bindings: usize) -> usize {
        patterns * PATTERN_COST + bindings * BINDING_COST
    }

    /// Get current tuning
    pub fn config(&self) -> GovernorConfig {
        lock(&self.state).config
    }

    /// Replace tuning; the last-cleanup time is kept
    pub fn set_config(&self, config: GovernorConfig) {
        lock(&self.state).config = config;
    }

    /// Get the cleanup interval
    pub fn cleanup_interval(&self) -> Duration {
        lock(&self.state).config.cleanup_interval
    }

    /// Record that a pattern started sounding
    pub fn pattern_started(&self) {
        let mut state = lock(&self.state);
        state.active_patterns += 1;
        debug!(active = state.active_patterns, "Pattern started");
    }

    /// Record that a pattern stopped sounding
    pub fn pattern_stopped(&self) {
        let mut state = lock(&self.state);
        if state.active_patterns == 0 {
            warn!("Pattern stopped with no active patterns recorded");
            return;
        }
        state.active_patterns -= 1;
        debug!(active = state.active_patterns, "Pattern stopped");
    }

    /// Number of live patterns across all notebooks
    pub fn active_patterns(&self) -> usize {
        lock(&self.state).active_patterns
    }

    /// Check whether the cleanup interval has elapsed
    pub fn should_cleanup(&self) -> bool {
        let state = lock(&self.state);
        state.last_cleanup.elapsed() >= state.config.cleanup_interval
    }

    /// Restart the cleanup interval
    pub fn mark_cleanup_performed(&self) {
        let mut state = lock(&self.state);
        state.last_cleanup = Instant::now();
        state.cleanup_passes += 1;
    }

    /// Recompute the estimate from live notebooks and report on it
    pub fn run_cleanup_pass(&self, footprints: &[SessionFootprint]) -> CleanupReport {
        let playing: usize = footprints.iter().map(|f| f.playing).sum();
        let bindings: usize = footprints.iter().map(|f| f.bindings).sum();
        let estimated_bytes = Self::estimate_bytes(playing, bindings);

        let mut state = lock(&self.state);
        state.last_bindings = bindings;

        let over_threshold = estimated_bytes > state.config.memory_threshold;
        let counter_drift = (state.active_patterns != playing).then_some(state.active_patterns);

        if over_threshold {
            warn!(
                estimated_bytes,
                threshold = state.config.memory_threshold,
                sessions = footprints.len(),
                "Estimated memory above advisory threshold"
            );
        }
        if let Some(counted) = counter_drift {
            warn!(counted, recounted = playing, "Pattern counter drifted from live sessions");
        }
        info!(
            sessions = footprints.len(),
            playing,
            bindings,
            estimated_bytes,
            "Cleanup pass"
        );

        CleanupReport {
            sessions: footprints.len(),
            playing,
            bindings,
            estimated_bytes,
            over_threshold,
            counter_drift,
        }
    }

    /// Snapshot for diagnostic display
    pub fn metrics(&self) -> GovernorMetrics {
        let state = lock(&self.state);
        GovernorMetrics {
            active_patterns: state.active_patterns,
            estimated_bytes: Self::estimate_bytes(state.active_patterns, state.last_bindings),
            memory_threshold: state.config.memory_threshold,
            since_last_cleanup: state.last_cleanup.elapsed(),
            cleanup_passes: state.cleanup_passes,
        }
    }
}

impl Default for ResourceGovernor {
    fn default() -> Self {
        Self::new()
    }
}

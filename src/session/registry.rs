// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Process-wide registry of notebooks.
//!
//! Holds at most one notebook per document, routes host lifecycle events
//! and drives the periodic governor pass.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use crate::config::Settings;
use crate::engine::PatternEngine;
use crate::error::Result;
use crate::governor::{CleanupReport, GovernorMetrics, ResourceGovernor, SessionFootprint};
use crate::host::{DocumentHost, DocumentId, HostEvent};
use crate::lock;
use crate::timing::{TimerKind, TimerService};

use super::Notebook;

/// Owner of every live notebook
pub struct NotebookRegistry {
    notebooks: Mutex<BTreeMap<DocumentId, Arc<Notebook>>>,
    engine: Arc<dyn PatternEngine>,
    host: Arc<dyn DocumentHost>,
    governor: Arc<ResourceGovernor>,
    settings: Mutex<Settings>,
    timers: TimerService,
    this: Weak<NotebookRegistry>,
}

impl NotebookRegistry {
    /// Create a registry with its own governor
    pub fn new(engine: Arc<dyn PatternEngine>, host: Arc<dyn DocumentHost>, settings: Settings) -> Arc<Self> {
        let governor = Arc::new(ResourceGovernor::with_config(settings.governor_config()));
        Arc::new_cyclic(|this| Self {
            notebooks: Mutex::new(BTreeMap::new()),
            engine,
            host,
            governor,
            settings: Mutex::new(settings),
            timers: TimerService::new(),
            this: this.clone(),
        })
    }

    /// Get the notebook for a document, creating it on first use
    pub fn get_or_create(&self, document: &DocumentId) -> Arc<Notebook> {
        let mut notebooks = lock(&self.notebooks);
        if let Some(notebook) = notebooks.get(document) {
            return Arc::clone(notebook);
        }

        debug!(document = %document, "Creating notebook");
        let notebook = Notebook::new(
            document.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.host),
            Arc::clone(&self.governor),
            self.settings(),
        );
        notebooks.insert(document.clone(), Arc::clone(&notebook));
        notebook
    }

    /// Get the notebook for a document if one exists
    pub fn get(&self, document: &DocumentId) -> Option<Arc<Notebook>> {
        lock(&self.notebooks).get(document).cloned()
    }

    /// Documents with a live notebook
    pub fn documents(&self) -> Vec<DocumentId> {
        lock(&self.notebooks).keys().cloned().collect()
    }

    /// Discover a document's blocks and register them.
    ///
    /// Blocks already registered keep their state.
    pub async fn open_document(&self, document: &DocumentId) -> Result<Arc<Notebook>> {
        let discovered = self.host.discover_blocks(document).await?;
        let notebook = self.get_or_create(document);
        for block in discovered {
            notebook.ensure_block(block.id, block.text)?;
        }
        info!(document = %document, blocks = notebook.blocks().len(), "Opened document");
        Ok(notebook)
    }

    /// Destroy a document's notebook. Returns false if there was none.
    pub async fn close_document(&self, document: &DocumentId) -> bool {
        let Some(notebook) = lock(&self.notebooks).remove(document) else {
            return false;
        };
        notebook.destroy().await;
        info!(document = %document, "Closed document");
        true
    }

    /// Route a host lifecycle event
    pub async fn handle_event(&self, event: HostEvent) -> Result<()> {
        match event {
            HostEvent::DocumentOpened(document) => {
                self.open_document(&document).await?;
            }
            HostEvent::DocumentClosed(document) => {
                self.close_document(&document).await;
            }
            HostEvent::BlockRemoved { document, block } => {
                if let Some(notebook) = self.get(&document) {
                    notebook.remove_block(&block).await?;
                }
            }
            HostEvent::FocusChanged {
                document,
                block,
                focused,
            } => {
                if let Some(notebook) = self.get(&document) {
                    notebook.focus_changed(&block, focused).await?;
                }
            }
        }
        Ok(())
    }

    /// Get the shared governor
    pub fn governor(&self) -> &Arc<ResourceGovernor> {
        &self.governor
    }

    /// Governor snapshot for diagnostic display
    pub fn metrics(&self) -> GovernorMetrics {
        self.governor.metrics()
    }

    /// Get a copy of the current settings
    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    /// Apply new settings to the governor and every live notebook
    pub fn apply_settings(&self, settings: Settings) {
        self.governor.set_config(settings.governor_config());
        for notebook in lock(&self.notebooks).values() {
            notebook.apply_settings(&settings);
        }
        *lock(&self.settings) = settings;
        info!("Applied settings");
    }

    /// Footprints of every live notebook
    pub fn footprints(&self) -> Vec<SessionFootprint> {
        let notebooks: Vec<Arc<Notebook>> = lock(&self.notebooks).values().cloned().collect();
        notebooks.iter().map(|n| n.footprint()).collect()
    }

    /// Run a governor pass if the interval has elapsed
    pub fn maybe_cleanup(&self) -> Option<CleanupReport> {
        if !self.governor.should_cleanup() {
            return None;
        }
        let report = self.governor.run_cleanup_pass(&self.footprints());
        self.governor.mark_cleanup_performed();
        Some(report)
    }

    /// Check the governor every cleanup interval until shutdown
    pub fn start_cleanup_timer(&self) {
        let this = self.this.clone();
        self.timers
            .schedule(TimerKind::CleanupInterval, self.governor.cleanup_interval(), async move {
                if let Some(registry) = this.upgrade() {
                    registry.maybe_cleanup();
                    registry.start_cleanup_timer();
                }
            });
    }

    /// Destroy every notebook and stop the cleanup timer
    pub async fn shutdown(&self) {
        self.timers.cancel_all();
        let notebooks: Vec<Arc<Notebook>> = std::mem::take(&mut *lock(&self.notebooks)).into_values().collect();
        for notebook in notebooks {
            notebook.destroy().await;
        }
        info!("Registry shut down");
    }
}

impl std::fmt::Debug for NotebookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookRegistry")
            .field("documents", &self.documents())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BlockId;
    use crate::playback::BlockStatus;
    use crate::testing::{MockEngine, RecordingHost};
    use std::time::Duration;

    fn setup(settings: Settings) -> (Arc<NotebookRegistry>, Arc<MockEngine>, Arc<RecordingHost>) {
        let engine = MockEngine::new();
        let host = Arc::new(RecordingHost::new());
        let registry = NotebookRegistry::new(engine.clone(), host.clone(), settings);
        (registry, engine, host)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let (registry, _, _) = setup(Settings::default());
        let doc = DocumentId::new("a.md");

        let first = registry.get_or_create(&doc);
        let second = registry.get_or_create(&doc);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.documents(), vec![doc]);
    }

    #[tokio::test]
    async fn test_open_and_close_document() {
        let (registry, _, host) = setup(Settings::default());
        let doc = DocumentId::new("a.md");
        host.add_block(&doc, "drums", "s(\"bd\")");
        host.add_block(&doc, "bass", "note(\"c2\")");

        let notebook = registry.open_document(&doc).await.unwrap();
        assert_eq!(notebook.blocks().len(), 2);

        notebook.request_play(&BlockId::new("drums")).await.unwrap();
        assert_eq!(registry.governor().active_patterns(), 1);

        assert!(registry.close_document(&doc).await);
        assert!(!registry.close_document(&doc).await);
        assert!(notebook.is_destroyed());
        assert!(registry.get(&doc).is_none());
        assert_eq!(registry.governor().active_patterns(), 0);
    }

    #[tokio::test]
    async fn test_reopen_keeps_block_state() {
        let (registry, _, host) = setup(Settings::default());
        let doc = DocumentId::new("a.md");
        host.add_block(&doc, "drums", "s(\"bd\")");

        let notebook = registry.open_document(&doc).await.unwrap();
        notebook.request_play(&BlockId::new("drums")).await.unwrap();
        registry.open_document(&doc).await.unwrap();

        assert_eq!(notebook.status(&BlockId::new("drums")).unwrap(), BlockStatus::Playing);
    }

    #[tokio::test]
    async fn test_host_events_are_routed() {
        let (registry, _, host) = setup(Settings::default());
        let doc = DocumentId::new("a.md");
        host.add_block(&doc, "lead", "x");

        registry.handle_event(HostEvent::DocumentOpened(doc.clone())).await.unwrap();
        let notebook = registry.get(&doc).unwrap();
        let lead = BlockId::new("lead");

        registry
            .handle_event(HostEvent::FocusChanged {
                document: doc.clone(),
                block: lead.clone(),
                focused: true,
            })
            .await
            .unwrap();
        assert!(notebook.snapshot(&lead).unwrap().focused);

        notebook.on_live_edit(&lead, "y").unwrap();
        registry
            .handle_event(HostEvent::BlockRemoved {
                document: doc.clone(),
                block: lead.clone(),
            })
            .await
            .unwrap();
        assert_eq!(host.writes_to("lead"), vec!["y".to_string()]);
        assert!(notebook.blocks().is_empty());

        registry.handle_event(HostEvent::DocumentClosed(doc.clone())).await.unwrap();
        assert!(registry.documents().is_empty());
    }

    #[tokio::test]
    async fn test_events_for_unknown_documents_are_ignored() {
        let (registry, _, _) = setup(Settings::default());
        let event = HostEvent::BlockRemoved {
            document: DocumentId::new("never-opened.md"),
            block: BlockId::new("x"),
        };
        assert!(registry.handle_event(event).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_timer_runs_passes() {
        let mut settings = Settings::default();
        settings.resources.cleanup_interval_secs = 10;
        let (registry, _, host) = setup(settings);
        let doc = DocumentId::new("a.md");
        host.add_block(&doc, "drums", "let root = 1");

        let notebook = registry.open_document(&doc).await.unwrap();
        notebook.request_play(&BlockId::new("drums")).await.unwrap();

        assert!(registry.maybe_cleanup().is_none());
        registry.start_cleanup_timer();

        tokio::time::sleep(Duration::from_secs(25)).await;
        let metrics = registry.metrics();
        assert_eq!(metrics.cleanup_passes, 2);
        assert_eq!(metrics.active_patterns, 1);

        let footprints = registry.footprints();
        assert_eq!(footprints[0].playing, 1);
        assert_eq!(footprints[0].bindings, 1);

        registry.shutdown().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(registry.metrics().cleanup_passes, 2);
        assert!(notebook.is_destroyed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_settings_reaches_notebooks() {
        let (registry, engine, host) = setup(Settings::default());
        let doc = DocumentId::new("a.md");
        host.add_block(&doc, "drums", "x");
        let notebook = registry.open_document(&doc).await.unwrap();

        let mut settings = Settings::default();
        settings.evaluation.auto_evaluate_enabled = false;
        settings.resources.cleanup_interval_secs = 90;
        registry.apply_settings(settings);

        assert_eq!(registry.governor().cleanup_interval(), Duration::from_secs(90));
        assert!(!registry.settings().evaluation.auto_evaluate_enabled);

        let drums = BlockId::new("drums");
        notebook.request_play(&drums).await.unwrap();
        notebook.on_live_edit(&drums, "y").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(engine.evaluations(), 1);
    }
}

//! File system watcher with debouncing.
//!
//! Uses `notify`/`notify-debouncer-mini` for platform-native filesystem
//! monitoring. Raw events are coalesced over a debounce window and the
//! survivors are mapped to `PipelineEvent`s and forwarded to the indexing
//! pipeline over an async channel.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use tokio::sync::mpsc;

use crate::config::{IndexingConfig, WatcherConfig};
use crate::error::{CodeSeekerError, CodeSeekerResult};
use crate::exclusions::ExclusionRules;
use crate::scanner;
use crate::types::PipelineEvent;

/// File system watcher that emits pipeline events.
pub struct FileWatcher {
    watcher_config: WatcherConfig,
    indexing_config: IndexingConfig,
    root: PathBuf,
}

impl FileWatcher {
    /// Create a new file watcher for the given root directory.
    #[must_use]
    pub fn new(root: &Path, watcher_config: &WatcherConfig, indexing_config: &IndexingConfig) -> Self {
        Self {
            watcher_config: watcher_config.clone(),
            indexing_config: indexing_config.clone(),
            root: root.to_path_buf(),
        }
    }

    /// Start watching for file changes. Sends `PipelineEvent` messages through
    /// `tx` until a message arrives on `shutdown`, at which point the watcher
    /// is dropped and this returns.
    pub async fn watch(&self, tx: mpsc::Sender<PipelineEvent>, mut shutdown: mpsc::Receiver<()>) -> CodeSeekerResult<()> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let debounce = Duration::from_millis(self.watcher_config.debounce_ms);

        let mut debouncer = new_debouncer(debounce, move |result| {
            let _ = raw_tx.send(result);
        })
        .map_err(|e| CodeSeekerError::Internal(format!("failed to create file watcher: {e}")))?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| CodeSeekerError::Internal(format!("failed to watch {}: {e}", self.root.display())))?;

        tracing::info!(root = %self.root.display(), debounce_ms = self.watcher_config.debounce_ms, "file watcher started");

        let exclusions = ExclusionRules::load(&self.root).unwrap_or_default();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("file watcher stopping");
                    return Ok(());
                }
                events = raw_rx.recv() => {
                    let Some(events) = events else { return Ok(()) };
                    match events {
                        Ok(events) => {
                            for event in events {
                                if self.is_excluded(&event.path, &exclusions) {
                                    continue;
                                }
                                let pipeline_event = match event.kind {
                                    DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous => {
                                        if event.path.exists() {
                                            PipelineEvent::FileChanged { path: event.path }
                                        } else {
                                            PipelineEvent::FileDeleted { path: event.path }
                                        }
                                    }
                                    _ => continue,
                                };
                                if tx.send(pipeline_event).await.is_err() {
                                    return Ok(());
                                }
                            }
                        }
                        Err(error) => {
                            tracing::warn!(%error, "file watcher error");
                        }
                    }
                }
            }
        }
    }

    /// Perform a full directory scan and emit `FileChanged` for every file
    /// the scanner's excludes, size cap, and binary sniff let through.
    pub async fn full_scan(&self, tx: &mpsc::Sender<PipelineEvent>) -> CodeSeekerResult<usize> {
        let exclusions = ExclusionRules::load(&self.root)?;
        let files = scanner::scan(&self.root, &self.indexing_config, &exclusions);
        let count = files.len();
        for file in files {
            if tx.send(PipelineEvent::FileChanged { path: file.path }).await.is_err() {
                break;
            }
        }
        Ok(count)
    }

    fn is_excluded(&self, path: &Path, exclusions: &ExclusionRules) -> bool {
        if exclusions.is_excluded(path) {
            return true;
        }
        self.indexing_config.exclude_patterns.iter().any(|pattern| {
            path.components().any(|component| component.as_os_str() == pattern.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn full_scan_emits_one_event_per_discovered_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/lib.js"), "module.exports = 1;").unwrap();

        let watcher = FileWatcher::new(dir.path(), &WatcherConfig::default(), &IndexingConfig::default());
        let (tx, mut rx) = mpsc::channel(16);
        let count = watcher.full_scan(&tx).await.unwrap();
        drop(tx);

        assert_eq!(count, 1);
        let event = rx.recv().await.unwrap();
        match event {
            PipelineEvent::FileChanged { path } => assert!(path.ends_with("main.rs")),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn excluded_path_component_is_filtered() {
        let watcher = FileWatcher::new(Path::new("/tmp/proj"), &WatcherConfig::default(), &IndexingConfig::default());
        let exclusions = ExclusionRules::default();
        assert!(watcher.is_excluded(Path::new("/tmp/proj/node_modules/lib.js"), &exclusions));
        assert!(!watcher.is_excluded(Path::new("/tmp/proj/src/main.rs"), &exclusions));
    }
}

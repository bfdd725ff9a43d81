//! Debounced batching of workspace file changes.
//!
//! Mutation runs are expensive, so individual change events are not worth
//! reacting to. Changed paths matching the configured glob are collected
//! until the stream goes quiet for the debounce interval, then emitted as
//! one deduplicated batch suitable for a `discover` call. Deleted paths
//! always make the batch: a file that no longer exists must leave the
//! mutant tree whether or not it matched the watch pattern.

use std::collections::HashSet;
use std::time::Duration;

use globset::{Glob, GlobMatcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use msp_types::{FileRange, ServerSettings};

enum Change {
    Changed(String),
    Deleted(String),
}

/// One quiet-period's worth of file events, each list in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeBatch {
    /// The changed paths as whole-file discovery targets.
    #[must_use]
    pub fn to_file_ranges(&self) -> Vec<FileRange> {
        self.changed.iter().map(FileRange::new).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Clonable producer half; hand one to each event source.
#[derive(Clone)]
pub struct ChangeSender {
    tx: mpsc::UnboundedSender<Change>,
}

impl ChangeSender {
    /// Record a created or modified path. Delivery failures mean the
    /// batcher is gone and the event is irrelevant.
    pub fn notify_changed(&self, path: impl Into<String>) {
        let _ = self.tx.send(Change::Changed(path.into()));
    }

    /// Record a deleted path. Deletions bypass the watch glob.
    pub fn notify_deleted(&self, path: impl Into<String>) {
        let _ = self.tx.send(Change::Deleted(path.into()));
    }
}

/// Consumer half: filters changed paths against the watch glob and groups
/// events into debounced batches.
pub struct ChangeBatcher {
    matcher: GlobMatcher,
    debounce: Duration,
    rx: mpsc::UnboundedReceiver<Change>,
}

impl ChangeBatcher {
    pub fn new(pattern: &str, debounce: Duration) -> Result<(ChangeSender, Self), globset::Error> {
        let matcher = Glob::new(pattern)?.compile_matcher();
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            ChangeSender { tx },
            Self {
                matcher,
                debounce,
                rx,
            },
        ))
    }

    pub fn from_settings(
        settings: &ServerSettings,
    ) -> Result<(ChangeSender, Self), globset::Error> {
        Self::new(
            settings.watch_pattern(),
            Duration::from_millis(settings.watch_debounce_ms()),
        )
    }

    /// Wait for the next batch: the first kept event opens a window that
    /// each further kept event extends by the debounce interval. Returns
    /// `None` once every [`ChangeSender`] is dropped and the channel is
    /// drained.
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        let mut batch = ChangeBatch::default();
        let mut seen: HashSet<String> = HashSet::new();

        loop {
            let change = self.rx.recv().await?;
            if self.keep(change, &mut seen, &mut batch) {
                break;
            }
        }

        let mut deadline = Instant::now() + self.debounce;
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                change = self.rx.recv() => match change {
                    Some(change) => {
                        if self.keep(change, &mut seen, &mut batch) {
                            deadline = Instant::now() + self.debounce;
                        }
                    }
                    None => break,
                },
            }
        }

        Some(batch)
    }

    fn keep(&self, change: Change, seen: &mut HashSet<String>, batch: &mut ChangeBatch) -> bool {
        match change {
            Change::Changed(path) => {
                if !self.matcher.is_match(&path) {
                    return false;
                }
                if seen.insert(path.clone()) {
                    batch.changed.push(path);
                }
                true
            }
            Change::Deleted(path) => {
                if seen.insert(path.clone()) {
                    batch.deleted.push(path);
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(1000);

    fn batcher(pattern: &str) -> (ChangeSender, ChangeBatcher) {
        ChangeBatcher::new(pattern, DEBOUNCE).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_group_into_one_batch() {
        let (sender, mut batcher) = batcher("**/*");
        sender.notify_changed("src/a.ts");
        sender.notify_changed("src/b.ts");

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts", "src/b.ts"]);
        assert!(batch.deleted.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_splits_batches() {
        let (sender, mut batcher) = batcher("**/*");
        sender.notify_changed("src/a.ts");
        let first = batcher.next_batch().await.unwrap();
        assert_eq!(first.changed, vec!["src/a.ts"]);

        sender.notify_changed("src/b.ts");
        sender.notify_changed("src/c.ts");
        let second = batcher.next_batch().await.unwrap();
        assert_eq!(second.changed, vec!["src/b.ts", "src/c.ts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_within_window_extends_it() {
        let (sender, mut batcher) = batcher("**/*");
        sender.notify_changed("src/a.ts");

        let late = sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(800)).await;
            late.notify_changed("src/b.ts");
        });

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts", "src/b.ts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_matching_changes_are_filtered() {
        let (sender, mut batcher) = batcher("**/*.ts");
        sender.notify_changed("node_modules/lib.js");
        sender.notify_changed("src/a.ts");
        sender.notify_changed("README.md");

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletions_bypass_the_glob() {
        let (sender, mut batcher) = batcher("**/*.ts");
        sender.notify_deleted("assets/logo.png");
        sender.notify_changed("src/a.ts");

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts"]);
        assert_eq!(batch.deleted, vec!["assets/logo.png"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_paths_are_deduplicated() {
        let (sender, mut batcher) = batcher("**/*");
        sender.notify_changed("src/a.ts");
        sender.notify_changed("src/a.ts");
        sender.notify_changed("src/b.ts");
        sender.notify_changed("src/a.ts");

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts", "src/b.ts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_all_senders_ends_the_stream() {
        let (sender, mut batcher) = batcher("**/*");
        drop(sender);
        assert!(batcher.next_batch().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_supply_pattern_and_debounce() {
        let settings = ServerSettings::new("mutation-server")
            .unwrap()
            .with_watch_pattern("src/**/*.ts")
            .with_watch_debounce_ms(50);
        let (sender, mut batcher) = ChangeBatcher::from_settings(&settings).unwrap();
        sender.notify_changed("src/a.ts");
        sender.notify_changed("docs/readme.md");

        let batch = batcher.next_batch().await.unwrap();
        assert_eq!(batch.changed, vec!["src/a.ts"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_converts_to_file_ranges() {
        let (sender, mut batcher) = batcher("**/*");
        sender.notify_changed("src/a.ts");
        sender.notify_deleted("src/b.ts");
        let batch = batcher.next_batch().await.unwrap();

        let ranges = batch.to_file_ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].path, "src/a.ts");
        assert!(ranges[0].range.is_none());
    }
}

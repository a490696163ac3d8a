use tokio::sync::mpsc;

use crate::cms::PageSource;
use crate::loader::{FeedLoader, LoadOutcome};

/// Drives a [`FeedLoader`] from boundary-crossing events: each received
/// trigger means the end-of-content sentinel became visible and one more
/// page should be requested.
///
/// The watcher never attaches to an already-exhausted feed, and it disarms
/// itself once the feed runs out. A failed fetch also ends the watch (state
/// is untouched, so the caller may re-arm and the loader will retry from
/// the same cursor).
pub struct ScrollWatcher<S: PageSource> {
    loader: FeedLoader<S>,
    triggers: mpsc::Receiver<()>,
}

impl<S: PageSource> ScrollWatcher<S> {
    pub fn new(loader: FeedLoader<S>, triggers: mpsc::Receiver<()>) -> Self {
        Self { loader, triggers }
    }

    pub async fn watch(mut self) {
        if self.loader.is_exhausted() {
            return;
        }
        while let Some(()) = self.triggers.recv().await {
            match self.loader.load_more().await {
                LoadOutcome::Appended { .. } | LoadOutcome::Skipped => {}
                LoadOutcome::Exhausted | LoadOutcome::Detached | LoadOutcome::Failed => break,
            }
            if self.loader.is_exhausted() {
                break;
            }
        }
    }
}

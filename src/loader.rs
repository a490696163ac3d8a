use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::cms::PageSource;

/// Result of one load attempt. Repository failures are caught and logged
/// here rather than propagated; callers only need to know what happened to
/// the feed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page arrived and was appended (possibly empty on the last page).
    Appended { count: usize },
    /// Another fetch was already in flight, or the feed was already
    /// initialized; nothing was requested.
    Skipped,
    /// Every item has been fetched; nothing was requested.
    Exhausted,
    /// The loader was detached before the fetch completed; the result was
    /// discarded without touching state.
    Detached,
    /// The fetch failed. State is unchanged, so the same call retries from
    /// the same offset.
    Failed,
}

struct FeedState<T> {
    items: Vec<T>,
    cursor: usize,
    total_count: Option<usize>,
    loading: bool,
    detached: bool,
}

impl<T> FeedState<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            total_count: None,
            loading: false,
            detached: false,
        }
    }

    fn exhausted(&self) -> bool {
        matches!(self.total_count, Some(total) if self.cursor >= total)
    }
}

/// Incremental feed loader: owns the offset cursor into an ordered remote
/// collection and guarantees at most one fetch in flight, with no item
/// fetched twice. Cloning yields another handle to the same feed.
pub struct FeedLoader<S: PageSource> {
    source: Arc<S>,
    page_size: usize,
    state: Arc<Mutex<FeedState<S::Item>>>,
}

impl<S: PageSource> Clone for FeedLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            page_size: self.page_size,
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: PageSource> FeedLoader<S> {
    pub fn new(source: S, page_size: usize) -> Self {
        Self {
            source: Arc::new(source),
            page_size,
            state: Arc::new(Mutex::new(FeedState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState<S::Item>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the first page and learns the collection's total count.
    /// A repeated call after success is a no-op; a call after failure
    /// retries from offset zero.
    pub async fn load_initial(&self) -> LoadOutcome {
        {
            let mut state = self.lock();
            if state.detached {
                return LoadOutcome::Detached;
            }
            if state.loading {
                return LoadOutcome::Skipped;
            }
            if state.total_count.is_some() {
                return LoadOutcome::Skipped;
            }
            state.loading = true;
        }

        let result = self.source.fetch_page(0, self.page_size).await;

        let mut state = self.lock();
        state.loading = false;
        if state.detached {
            return LoadOutcome::Detached;
        }
        match result {
            Ok(page) => {
                let count = page.items.len();
                state.items = page.items;
                state.cursor = count;
                state.total_count = Some(page.total_count);
                LoadOutcome::Appended { count }
            }
            Err(e) => {
                warn!(error = %e, "initial feed fetch failed");
                LoadOutcome::Failed
            }
        }
    }

    /// Fetches the next page at the current cursor. No-ops while a fetch is
    /// in flight or once the feed is exhausted; on failure the cursor is
    /// untouched so the next trigger retries the same range.
    pub async fn load_more(&self) -> LoadOutcome {
        let offset = {
            let mut state = self.lock();
            if state.detached {
                return LoadOutcome::Detached;
            }
            if state.loading {
                return LoadOutcome::Skipped;
            }
            if state.exhausted() {
                return LoadOutcome::Exhausted;
            }
            state.loading = true;
            state.cursor
        };

        let result = self.source.fetch_page(offset, self.page_size).await;

        let mut state = self.lock();
        state.loading = false;
        if state.detached {
            return LoadOutcome::Detached;
        }
        match result {
            Ok(page) => {
                let count = page.items.len();
                state.items.extend(page.items);
                state.cursor += count;
                if state.total_count.is_none() {
                    state.total_count = Some(page.total_count);
                }
                if count == 0 {
                    // An empty page before the advertised total means the
                    // collection shrank since the total was learned.
                    state.total_count = Some(state.cursor);
                }
                LoadOutcome::Appended { count }
            }
            Err(e) => {
                warn!(error = %e, offset, "feed page fetch failed");
                LoadOutcome::Failed
            }
        }
    }

    /// Marks the owning view as gone. Any fetch still in flight discards
    /// its result instead of mutating discarded state.
    pub fn detach(&self) {
        self.lock().detached = true;
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn total_count(&self) -> Option<usize> {
        self.lock().total_count
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().exhausted()
    }

    pub fn items(&self) -> Vec<S::Item>
    where
        S::Item: Clone,
    {
        self.lock().items.clone()
    }

    #[cfg(test)]
    pub(crate) fn test_source(&self) -> &S {
        &self.source
    }
}

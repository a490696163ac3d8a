use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::warn;

use crate::cms::CommentStore;
use crate::error::SubmitError;
use crate::model::{Comment, NewComment};

struct ReadModel {
    comments: Vec<Comment>,
    detached: bool,
}

/// Keeps a local comment list for one post consistent with the repository:
/// a create is always followed by a fresh read before the list is replaced,
/// so the list never shows a submission the repository did not confirm.
pub struct CommentSync<S: CommentStore> {
    store: Arc<S>,
    parent_id: String,
    state: Arc<Mutex<ReadModel>>,
}

impl<S: CommentStore> Clone for CommentSync<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            parent_id: self.parent_id.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: CommentStore> CommentSync<S> {
    pub fn new(store: S, parent_id: impl Into<String>) -> Self {
        Self {
            store: Arc::new(store),
            parent_id: parent_id.into(),
            state: Arc::new(Mutex::new(ReadModel {
                comments: Vec::new(),
                detached: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReadModel> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the read model from the repository (page mount / reload).
    pub async fn refresh(&self) -> Result<(), crate::error::RepoError> {
        let fresh = self.store.comments_for(&self.parent_id).await?;
        self.install(fresh);
        Ok(())
    }

    /// Replaces the read model wholesale, unless the view is gone.
    fn install(&self, fresh: Vec<Comment>) {
        debug_assert!(fresh.iter().all(|c| c.parent_id == self.parent_id));
        let mut state = self.lock();
        if !state.detached {
            state.comments = fresh;
        }
    }

    /// Creates the comment, then re-reads the whole list and replaces the
    /// read model. On any failure the read model is left untouched; there
    /// is never an optimistic insertion.
    pub async fn submit(&self, name: &str, content: &str) -> Result<(), SubmitError> {
        let name = name.trim();
        let content = content.trim();
        if name.is_empty() || content.is_empty() {
            return Err(SubmitError::InvalidInput);
        }

        let comment = NewComment {
            name: name.to_string(),
            content: content.to_string(),
            posted_at: Utc::now(),
            parent_id: self.parent_id.clone(),
        };
        if let Err(e) = self.store.create(comment).await {
            warn!(error = %e, parent_id = %self.parent_id, "comment create failed");
            return Err(if e.is_auth() {
                SubmitError::WriteRejected(e)
            } else {
                SubmitError::Create(e)
            });
        }

        let fresh = match self.store.comments_for(&self.parent_id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, parent_id = %self.parent_id, "comment refresh failed");
                return Err(SubmitError::Refresh(e));
            }
        };
        self.install(fresh);
        Ok(())
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.lock().comments.clone()
    }

    /// Marks the owning view as gone; late completions no longer touch the
    /// read model.
    pub fn detach(&self) {
        self.lock().detached = true;
    }

    #[cfg(test)]
    pub(crate) fn test_store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::error::RepoError;

    /// In-memory comment collection, newest first like the repository.
    struct FakeStore {
        comments: Mutex<Vec<Comment>>,
        reject_create: AtomicBool,
        fail_list: AtomicBool,
        reject_status: u16,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                comments: Mutex::new(Vec::new()),
                reject_create: AtomicBool::new(false),
                fail_list: AtomicBool::new(false),
                reject_status: 401,
            }
        }

        fn seeded() -> Self {
            let store = Self::new();
            store.comments.lock().unwrap().push(Comment {
                id: "c1".to_string(),
                name: "Bob".to_string(),
                content: "first!".to_string(),
                posted_at: ts(2024, 1, 1),
                parent_id: "p1".to_string(),
            });
            store
        }
    }

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[async_trait]
    impl CommentStore for FakeStore {
        async fn create(&self, comment: NewComment) -> Result<String, RepoError> {
            if self.reject_create.load(Ordering::SeqCst) {
                return Err(RepoError::Rejected {
                    status: self.reject_status,
                    message: "X-MICROCMS-API-KEY header is invalid.".to_string(),
                });
            }
            let mut comments = self.comments.lock().unwrap();
            let id = format!("c{}", comments.len() + 1);
            comments.insert(
                0,
                Comment {
                    id: id.clone(),
                    name: comment.name,
                    content: comment.content,
                    posted_at: comment.posted_at,
                    parent_id: comment.parent_id,
                },
            );
            Ok(id)
        }

        async fn comments_for(&self, parent_id: &str) -> Result<Vec<Comment>, RepoError> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(RepoError::Rejected {
                    status: 500,
                    message: "listing failed".to_string(),
                });
            }
            Ok(self
                .comments
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.parent_id == parent_id)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_submit_refreshes_read_model_newest_first() {
        let sync = CommentSync::new(FakeStore::seeded(), "p1");
        sync.refresh().await.unwrap();
        assert_eq!(sync.comments().len(), 1);

        sync.submit("Alice", "hello").await.unwrap();

        let comments = sync.comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].name, "Alice");
        assert_eq!(comments[0].content, "hello");
        assert_eq!(comments[0].parent_id, "p1");
        assert_eq!(comments[1].name, "Bob");
    }

    #[tokio::test]
    async fn test_submit_trims_input_before_sending() {
        let sync = CommentSync::new(FakeStore::new(), "p1");
        sync.submit("  Alice  ", "  hello  ").await.unwrap();
        let comments = sync.comments();
        assert_eq!(comments[0].name, "Alice");
        assert_eq!(comments[0].content, "hello");
    }

    #[tokio::test]
    async fn test_empty_input_fails_fast() {
        let sync = CommentSync::new(FakeStore::new(), "p1");
        assert!(matches!(
            sync.submit("", "hello").await,
            Err(SubmitError::InvalidInput)
        ));
        assert!(matches!(
            sync.submit("Alice", "   ").await,
            Err(SubmitError::InvalidInput)
        ));
        assert!(sync.comments().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_read_model_unchanged() {
        let store = FakeStore::seeded();
        store.reject_create.store(true, Ordering::SeqCst);
        let sync = CommentSync::new(store, "p1");
        sync.refresh().await.unwrap();
        let before = sync.comments();

        let err = sync.submit("Alice", "hello").await.unwrap_err();
        assert!(matches!(err, SubmitError::WriteRejected(_)));
        assert!(err.to_string().contains("write API key"));
        assert_eq!(sync.comments(), before);
    }

    #[tokio::test]
    async fn test_non_auth_create_failure_is_not_a_credential_error() {
        let store = FakeStore::new();
        store.reject_create.store(true, Ordering::SeqCst);
        let store = FakeStore {
            reject_status: 500,
            ..store
        };
        let sync = CommentSync::new(store, "p1");
        let err = sync.submit("Alice", "hello").await.unwrap_err();
        assert!(matches!(err, SubmitError::Create(_)));
    }

    #[tokio::test]
    async fn test_failed_refresh_after_create_leaves_read_model_unchanged() {
        let store = FakeStore::seeded();
        store.fail_list.store(true, Ordering::SeqCst);
        let sync = CommentSync::new(store, "p1");

        let err = sync.submit("Alice", "hello").await.unwrap_err();
        assert!(matches!(err, SubmitError::Refresh(_)));
        // The write landed, but the local list was not touched.
        assert!(sync.comments().is_empty());
        assert_eq!(sync.store.comments.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_comments_are_scoped_to_the_parent() {
        let store = FakeStore::seeded();
        store.comments.lock().unwrap().push(Comment {
            id: "x1".to_string(),
            name: "Eve".to_string(),
            content: "other post".to_string(),
            posted_at: ts(2024, 1, 2),
            parent_id: "p2".to_string(),
        });
        let sync = CommentSync::new(store, "p1");
        sync.refresh().await.unwrap();
        assert_eq!(sync.comments().len(), 1);
        assert_eq!(sync.comments()[0].parent_id, "p1");
    }

    #[tokio::test]
    async fn test_detached_sync_discards_late_refresh() {
        let sync = CommentSync::new(FakeStore::seeded(), "p1");
        sync.detach();
        sync.refresh().await.unwrap();
        assert!(sync.comments().is_empty());

        // A submit after teardown still writes, but mutates nothing locally.
        sync.submit("Alice", "hello").await.unwrap();
        assert!(sync.comments().is_empty());
    }
}

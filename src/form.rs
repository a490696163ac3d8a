use crate::cms::CommentStore;
use crate::comments::CommentSync;
use crate::error::SubmitError;

/// The submission form in front of [`CommentSync`]: holds the input
/// buffers, validates them, and blocks re-submission while a submit call is
/// outstanding. The `submitting` flag lives here, not on the synchronizer.
#[derive(Debug, Default)]
pub struct CommentForm {
    pub name: String,
    pub content: String,
    submitting: bool,
}

impl CommentForm {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            submitting: false,
        }
    }

    /// Validates and submits. The buffers are cleared only once the
    /// repository confirmed the write, so a failed submission keeps the
    /// user's input.
    pub async fn submit<S: CommentStore>(
        &mut self,
        sync: &CommentSync<S>,
    ) -> Result<(), SubmitError> {
        if self.submitting {
            return Err(SubmitError::InFlight);
        }
        if self.name.trim().is_empty() || self.content.trim().is_empty() {
            return Err(SubmitError::InvalidInput);
        }

        self.submitting = true;
        let result = sync.submit(&self.name, &self.content).await;
        self.submitting = false;

        if result.is_ok() {
            self.name.clear();
            self.content.clear();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::RepoError;
    use crate::model::{Comment, NewComment};

    struct StubStore {
        reject: AtomicBool,
        created: Mutex<Vec<NewComment>>,
    }

    impl StubStore {
        fn new() -> Self {
            Self {
                reject: AtomicBool::new(false),
                created: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommentStore for StubStore {
        async fn create(&self, comment: NewComment) -> Result<String, RepoError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(RepoError::Rejected {
                    status: 401,
                    message: "invalid key".to_string(),
                });
            }
            self.created.lock().unwrap().push(comment);
            Ok("c1".to_string())
        }

        async fn comments_for(&self, _parent_id: &str) -> Result<Vec<Comment>, RepoError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_submit_clears_buffers_on_success() {
        let sync = CommentSync::new(StubStore::new(), "p1");
        let mut form = CommentForm::new("Alice", "hello");
        form.submit(&sync).await.unwrap();
        assert!(form.name.is_empty());
        assert!(form.content.is_empty());
        assert!(!form.submitting);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_buffers() {
        let store = StubStore::new();
        store.reject.store(true, Ordering::SeqCst);
        let sync = CommentSync::new(store, "p1");
        let mut form = CommentForm::new("Alice", "hello");
        assert!(form.submit(&sync).await.is_err());
        assert_eq!(form.name, "Alice");
        assert_eq!(form.content, "hello");
        assert!(!form.submitting);
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_the_store() {
        let sync = CommentSync::new(StubStore::new(), "p1");
        let mut form = CommentForm::new("   ", "hello");
        assert!(matches!(
            form.submit(&sync).await,
            Err(SubmitError::InvalidInput)
        ));
        assert!(sync.test_store().created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_is_blocked_while_outstanding() {
        let sync = CommentSync::new(StubStore::new(), "p1");
        let mut form = CommentForm::new("Alice", "hello");
        form.submitting = true;
        assert!(matches!(
            form.submit(&sync).await,
            Err(SubmitError::InFlight)
        ));
        assert!(sync.test_store().created.lock().unwrap().is_empty());
    }
}

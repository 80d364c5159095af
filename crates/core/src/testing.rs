//! Failure-injecting collaborator used by the component tests.

use crate::api::CollaboratorApi;
use crate::error::{ApiError, ApiResult};
use crate::memory::MemoryCollaborator;
use crate::model::{
    Comment, CommentId, EmployeeId, EntityId, Emoji, MentionCandidate, NewComment, Reaction,
    ReactionSummary,
};
use crate::qa::QaWorkflowState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
struct Failures {
    list: Option<String>,
    create: Option<String>,
    edit: Option<String>,
    delete: Option<String>,
    toggle: Option<String>,
    lookup: bool,
    qa_update: Option<String>,
}

fn server_error(detail: String) -> ApiError {
    ApiError::Status {
        status: 500,
        detail,
    }
}

/// Wraps a [`MemoryCollaborator`], failing selected calls once and optionally holding toggles
/// until released.
pub(crate) struct FlakyApi {
    inner: Arc<MemoryCollaborator>,
    failures: Mutex<Failures>,
    toggle_gate: Mutex<Option<Arc<Notify>>>,
    edit_gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) list_calls: AtomicUsize,
    pub(crate) lookup_calls: AtomicUsize,
}

impl FlakyApi {
    pub(crate) fn new(inner: Arc<MemoryCollaborator>) -> Self {
        Self {
            inner,
            failures: Mutex::new(Failures::default()),
            toggle_gate: Mutex::new(None),
            edit_gate: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail_next_list(&self, detail: &str) {
        self.failures.lock().list = Some(detail.to_string());
    }

    pub(crate) fn fail_next_create(&self, detail: &str) {
        self.failures.lock().create = Some(detail.to_string());
    }

    pub(crate) fn fail_next_edit(&self, detail: &str) {
        self.failures.lock().edit = Some(detail.to_string());
    }

    pub(crate) fn fail_next_delete(&self, detail: &str) {
        self.failures.lock().delete = Some(detail.to_string());
    }

    pub(crate) fn fail_next_toggle(&self, detail: &str) {
        self.failures.lock().toggle = Some(detail.to_string());
    }

    pub(crate) fn fail_lookups(&self, fail: bool) {
        self.failures.lock().lookup = fail;
    }

    pub(crate) fn fail_next_qa_update(&self, detail: &str) {
        self.failures.lock().qa_update = Some(detail.to_string());
    }

    /// Make the next toggle wait until the returned handle is notified.
    pub(crate) fn hold_next_toggle(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.toggle_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    /// Make the next edit wait until the returned handle is notified.
    pub(crate) fn hold_next_edit(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.edit_gate.lock() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl CollaboratorApi for FlakyApi {
    async fn list_comments(&self, entity_id: EntityId) -> ApiResult<Vec<Comment>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failures.lock().list.take();
        if let Some(detail) = failure {
            return Err(server_error(detail));
        }
        self.inner.list_comments(entity_id).await
    }

    async fn create_comment(
        &self,
        entity_id: EntityId,
        comment: &NewComment,
        parent_id: Option<CommentId>,
    ) -> ApiResult<Comment> {
        let failure = self.failures.lock().create.take();
        if let Some(detail) = failure {
            return Err(ApiError::unprocessable(detail));
        }
        self.inner.create_comment(entity_id, comment, parent_id).await
    }

    async fn update_comment(&self, comment_id: CommentId, body_text: &str) -> ApiResult<Comment> {
        let gate = self.edit_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self.failures.lock().edit.take();
        if let Some(detail) = failure {
            return Err(server_error(detail));
        }
        self.inner.update_comment(comment_id, body_text).await
    }

    async fn delete_comment(&self, comment_id: CommentId) -> ApiResult<()> {
        let failure = self.failures.lock().delete.take();
        if let Some(detail) = failure {
            return Err(server_error(detail));
        }
        self.inner.delete_comment(comment_id).await
    }

    async fn reaction_summary(&self, comment_id: CommentId) -> ApiResult<ReactionSummary> {
        self.inner.reaction_summary(comment_id).await
    }

    async fn list_reactions(&self, comment_id: CommentId) -> ApiResult<Vec<Reaction>> {
        self.inner.list_reactions(comment_id).await
    }

    async fn toggle_reaction(
        &self,
        comment_id: CommentId,
        employee_id: EmployeeId,
        emoji: Emoji,
    ) -> ApiResult<()> {
        let gate = self.toggle_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self.failures.lock().toggle.take();
        if let Some(detail) = failure {
            return Err(server_error(detail));
        }
        self.inner
            .toggle_reaction(comment_id, employee_id, emoji)
            .await
    }

    async fn search_directory(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<MentionCandidate>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.failures.lock().lookup;
        if fail {
            return Err(server_error("directory unavailable".into()));
        }
        self.inner.search_directory(query, limit).await
    }

    async fn get_qa(&self, entity_id: EntityId) -> ApiResult<QaWorkflowState> {
        self.inner.get_qa(entity_id).await
    }

    async fn update_qa(
        &self,
        entity_id: EntityId,
        state: &QaWorkflowState,
    ) -> ApiResult<QaWorkflowState> {
        let failure = self.failures.lock().qa_update.take();
        if let Some(detail) = failure {
            return Err(server_error(detail));
        }
        self.inner.update_qa(entity_id, state).await
    }
}

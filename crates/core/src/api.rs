//! The collaborator API the discussion components talk to.
//!
//! Implemented over HTTP by the `api-client` crate and in memory by
//! [`crate::memory::MemoryCollaborator`]. Every method is one request/response round trip; none of
//! them retry.

use crate::error::ApiResult;
use crate::model::{
    Comment, CommentId, EmployeeId, EntityId, Emoji, MentionCandidate, NewComment, Reaction,
    ReactionSummary,
};
use crate::qa::QaWorkflowState;
use async_trait::async_trait;

#[async_trait]
pub trait CollaboratorApi: Send + Sync + 'static {
    /// `GET /entities/{id}/comments`
    async fn list_comments(&self, entity_id: EntityId) -> ApiResult<Vec<Comment>>;

    /// `POST /entities/{id}/comments`, with `parentCommentId` set for replies.
    async fn create_comment(
        &self,
        entity_id: EntityId,
        comment: &NewComment,
        parent_id: Option<CommentId>,
    ) -> ApiResult<Comment>;

    /// `PATCH /comments/{id}`
    async fn update_comment(&self, comment_id: CommentId, body_text: &str) -> ApiResult<Comment>;

    /// `DELETE /comments/{id}`
    async fn delete_comment(&self, comment_id: CommentId) -> ApiResult<()>;

    /// `GET /comments/{id}/reactions/summary`
    async fn reaction_summary(&self, comment_id: CommentId) -> ApiResult<ReactionSummary>;

    /// `GET /comments/{id}/reactions`
    async fn list_reactions(&self, comment_id: CommentId) -> ApiResult<Vec<Reaction>>;

    /// `POST /comments/{id}/reactions`. Adds the reaction if absent, removes it otherwise.
    async fn toggle_reaction(
        &self,
        comment_id: CommentId,
        employee_id: EmployeeId,
        emoji: Emoji,
    ) -> ApiResult<()>;

    /// `GET /directory/search`
    async fn search_directory(&self, query: &str, limit: usize)
        -> ApiResult<Vec<MentionCandidate>>;

    /// `GET /entities/{id}/qa`
    async fn get_qa(&self, entity_id: EntityId) -> ApiResult<QaWorkflowState>;

    /// `PATCH /entities/{id}/qa` with the full state.
    async fn update_qa(
        &self,
        entity_id: EntityId,
        state: &QaWorkflowState,
    ) -> ApiResult<QaWorkflowState>;
}

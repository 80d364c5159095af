//! In-memory collaborator.
//!
//! Backs the REST stand-in server and the component tests. It enforces the guarantees the real
//! collaborator gives (replies reference an existing comment on the same entity, non-empty
//! bodies, one reaction per comment/employee/emoji) and nothing more. Deleting a comment leaves
//! its replies in place.

use crate::api::CollaboratorApi;
use crate::error::{ApiError, ApiResult};
use crate::model::{
    Comment, CommentId, EmployeeId, EntityId, Emoji, MentionCandidate, NewComment, Reaction,
    ReactionSummary,
};
use crate::qa::QaWorkflowState;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct StoredComment {
    entity_id: EntityId,
    comment: Comment,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_comment_id: CommentId,
    comments: Vec<StoredComment>,
    reactions: Vec<Reaction>,
    directory: Vec<MentionCandidate>,
    qa: HashMap<EntityId, QaWorkflowState>,
}

impl MemoryState {
    fn position(&self, comment_id: CommentId) -> ApiResult<usize> {
        self.comments
            .iter()
            .position(|s| s.comment.id == comment_id)
            .ok_or_else(|| ApiError::not_found(format!("comment {} not found", comment_id)))
    }

    fn summary_for(&self, comment_id: CommentId) -> BTreeMap<String, u32> {
        let mut summary = BTreeMap::new();
        for reaction in self.reactions.iter().filter(|r| r.comment_id == comment_id) {
            *summary.entry(reaction.emoji.as_str().to_string()).or_insert(0) += 1;
        }
        summary
    }

    fn snapshot(&self, index: usize) -> Comment {
        let mut comment = self.comments[index].comment.clone();
        comment.reaction_summary = self.summary_for(comment.id);
        comment
    }

    fn author_name(&self, author_id: EmployeeId) -> String {
        self.directory
            .iter()
            .find(|c| c.employee_id == author_id)
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| format!("Employee {}", author_id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryCollaborator {
    state: Mutex<MemoryState>,
}

impl MemoryCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collaborator whose mention directory holds `directory`.
    pub fn with_directory(directory: Vec<MentionCandidate>) -> Self {
        let collaborator = Self::new();
        collaborator.state.lock().directory = directory;
        collaborator
    }

    /// Insert a comment exactly as given, keeping its id and parent.
    ///
    /// Later comments are numbered after the highest seeded id. No parent validation is done, so
    /// fixtures can contain orphans.
    pub fn seed_comment(&self, entity_id: EntityId, comment: Comment) {
        let mut state = self.state.lock();
        state.last_comment_id = state.last_comment_id.max(comment.id);
        state.comments.push(StoredComment { entity_id, comment });
    }

    pub fn comment_count(&self, entity_id: EntityId) -> usize {
        self.state
            .lock()
            .comments
            .iter()
            .filter(|s| s.entity_id == entity_id)
            .count()
    }
}

#[async_trait]
impl CollaboratorApi for MemoryCollaborator {
    async fn list_comments(&self, entity_id: EntityId) -> ApiResult<Vec<Comment>> {
        let state = self.state.lock();
        Ok((0..state.comments.len())
            .filter(|&i| state.comments[i].entity_id == entity_id)
            .map(|i| state.snapshot(i))
            .collect())
    }

    async fn create_comment(
        &self,
        entity_id: EntityId,
        comment: &NewComment,
        parent_id: Option<CommentId>,
    ) -> ApiResult<Comment> {
        let body_text = comment.body_text.trim();
        if body_text.is_empty() {
            return Err(ApiError::unprocessable("bodyText cannot be empty"));
        }

        let mut state = self.state.lock();
        if let Some(parent_id) = parent_id {
            let parent_on_entity = state
                .comments
                .iter()
                .any(|s| s.comment.id == parent_id && s.entity_id == entity_id);
            if !parent_on_entity {
                return Err(ApiError::unprocessable(format!(
                    "parent comment {} not found on entity {}",
                    parent_id, entity_id
                )));
            }
        }

        state.last_comment_id += 1;
        let created = Comment {
            id: state.last_comment_id,
            parent_id,
            author_id: comment.author_id,
            author_name: state.author_name(comment.author_id),
            body_text: body_text.to_string(),
            kind: comment.kind,
            created_at: Utc::now(),
            edited_flag: false,
            reaction_summary: BTreeMap::new(),
        };
        state.comments.push(StoredComment {
            entity_id,
            comment: created.clone(),
        });
        Ok(created)
    }

    async fn update_comment(&self, comment_id: CommentId, body_text: &str) -> ApiResult<Comment> {
        let body_text = body_text.trim();
        if body_text.is_empty() {
            return Err(ApiError::unprocessable("bodyText cannot be empty"));
        }
        let mut state = self.state.lock();
        let index = state.position(comment_id)?;
        let stored = &mut state.comments[index].comment;
        stored.body_text = body_text.to_string();
        stored.edited_flag = true;
        Ok(state.snapshot(index))
    }

    async fn delete_comment(&self, comment_id: CommentId) -> ApiResult<()> {
        let mut state = self.state.lock();
        let index = state.position(comment_id)?;
        state.comments.remove(index);
        state.reactions.retain(|r| r.comment_id != comment_id);
        Ok(())
    }

    async fn reaction_summary(&self, comment_id: CommentId) -> ApiResult<ReactionSummary> {
        let state = self.state.lock();
        state.position(comment_id)?;
        Ok(ReactionSummary {
            reactions: state.summary_for(comment_id),
        })
    }

    async fn list_reactions(&self, comment_id: CommentId) -> ApiResult<Vec<Reaction>> {
        let state = self.state.lock();
        state.position(comment_id)?;
        Ok(state
            .reactions
            .iter()
            .filter(|r| r.comment_id == comment_id)
            .cloned()
            .collect())
    }

    async fn toggle_reaction(
        &self,
        comment_id: CommentId,
        employee_id: EmployeeId,
        emoji: Emoji,
    ) -> ApiResult<()> {
        let mut state = self.state.lock();
        state.position(comment_id)?;
        let reaction = Reaction {
            comment_id,
            employee_id,
            emoji,
        };
        match state.reactions.iter().position(|r| *r == reaction) {
            Some(existing) => {
                state.reactions.remove(existing);
            }
            None => state.reactions.push(reaction),
        }
        Ok(())
    }

    async fn search_directory(
        &self,
        query: &str,
        limit: usize,
    ) -> ApiResult<Vec<MentionCandidate>> {
        let needle = query.trim().to_lowercase();
        let state = self.state.lock();
        Ok(state
            .directory
            .iter()
            .filter(|c| c.display_name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_qa(&self, entity_id: EntityId) -> ApiResult<QaWorkflowState> {
        Ok(self
            .state
            .lock()
            .qa
            .get(&entity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_qa(
        &self,
        entity_id: EntityId,
        state: &QaWorkflowState,
    ) -> ApiResult<QaWorkflowState> {
        self.state.lock().qa.insert(entity_id, state.clone());
        Ok(state.clone())
    }
}

//! Draft state of a new comment or reply box.

use crate::api::CollaboratorApi;
use crate::config::SessionUser;
use crate::error::DiscussionResult;
use crate::model::{Comment, CommentId, CommentKind};
use crate::store::CommentStore;

/// A comment being written.
///
/// The draft survives a failed submit so nothing the user typed is lost; the failure message is
/// kept alongside it until the next attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    draft: String,
    kind: CommentKind,
    reply_to: Option<CommentId>,
    error: Option<String>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A composer for a reply to `parent_id`.
    pub fn reply_to(parent_id: CommentId) -> Self {
        Self {
            reply_to: Some(parent_id),
            ..Self::default()
        }
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    pub fn set_kind(&mut self, kind: CommentKind) {
        self.kind = kind;
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn kind(&self) -> CommentKind {
        self.kind
    }

    pub fn parent_id(&self) -> Option<CommentId> {
        self.reply_to
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether submitting would be rejected as empty.
    pub fn is_blank(&self) -> bool {
        self.draft.trim().is_empty()
    }

    /// Post the draft through `store`. Clears the draft on success.
    pub async fn submit<A: CollaboratorApi>(
        &mut self,
        store: &CommentStore<A>,
        author: &SessionUser,
    ) -> DiscussionResult<Comment> {
        match store
            .create(author, &self.draft, self.kind, self.reply_to)
            .await
        {
            Ok(created) => {
                self.draft.clear();
                self.kind = CommentKind::default();
                self.error = None;
                Ok(created)
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }
}

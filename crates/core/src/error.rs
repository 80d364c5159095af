use crate::model::CommentId;

/// Failure reported by a collaborator API call.
///
/// The HTTP client maps transport failures, non-2xx responses and undecodable bodies onto these
/// variants; the in-memory collaborator only ever produces `Status`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::Status {
            status: 404,
            detail: detail.into(),
        }
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::Status {
            status: 422,
            detail: detail.into(),
        }
    }

    /// The human-readable part of the failure, suitable for showing inline.
    pub fn detail(&self) -> &str {
        match self {
            ApiError::Transport(msg) | ApiError::Decode(msg) => msg,
            ApiError::Status { detail, .. } => detail,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum DiscussionError {
    #[error("failed to load comments: {0}")]
    Load(#[source] ApiError),
    #[error("comment body cannot be empty")]
    EmptyBody,
    #[error("failed to post comment: {0}")]
    Create(#[source] ApiError),
    #[error("failed to edit comment: {0}")]
    Edit(#[source] ApiError),
    #[error("failed to delete comment: {0}")]
    Delete(#[source] ApiError),
    #[error("comment {0} is not in the loaded thread")]
    UnknownComment(CommentId),
    #[error("failed to save change: {0}")]
    Mutation(#[source] ApiError),
    #[error("directory lookup failed: {0}")]
    Lookup(#[source] ApiError),
    #[error("failed to update reactions: {0}")]
    Reaction(#[source] ApiError),
    #[error("unsupported reaction: {0}")]
    UnknownEmoji(String),
    #[error("reply to comment {comment_id} nests deeper than {limit} levels")]
    ThreadTooDeep { comment_id: CommentId, limit: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DiscussionError {
    /// Message to surface next to the widget that failed.
    ///
    /// Remote failures surface the collaborator's `detail` string rather than the wrapped
    /// error chain.
    pub fn user_message(&self) -> String {
        match self {
            DiscussionError::Load(e)
            | DiscussionError::Create(e)
            | DiscussionError::Edit(e)
            | DiscussionError::Delete(e)
            | DiscussionError::Mutation(e)
            | DiscussionError::Lookup(e)
            | DiscussionError::Reaction(e) => e.detail().to_string(),
            other => other.to_string(),
        }
    }
}

pub type DiscussionResult<T> = std::result::Result<T, DiscussionError>;

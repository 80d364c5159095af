//! # Amend Core
//!
//! Client-side logic for the QA discussion attached to each amendment.
//!
//! This crate holds the domain types and the components a detail view drives:
//! - [`store::CommentStore`]: the flat comment list, with optimistic edits and periodic refresh
//! - [`tree::build_forest`]: nests the flat list into reply threads
//! - [`mention::MentionResolver`]: `@mention` detection and directory suggestions
//! - [`reactions::ReactionAggregator`]: emoji toggles with a per-comment in-flight guard
//! - [`optimistic::Optimistic`]: optimistic update with rollback, used by [`qa::QaPanel`]
//!
//! **No HTTP concerns**: the collaborator is reached through [`api::CollaboratorApi`]; the HTTP
//! client lives in `api-client` and the REST server in `api-rest`.

pub mod api;
pub mod composer;
pub mod config;
pub mod constants;
pub mod discussion;
pub mod error;
pub mod memory;
pub mod mention;
pub mod model;
pub mod optimistic;
pub mod qa;
pub mod reactions;
pub mod refresh;
pub mod store;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use api::CollaboratorApi;
pub use composer::Composer;
pub use config::{ClientConfig, SessionUser};
pub use discussion::Discussion;
pub use error::{ApiError, ApiResult, DiscussionError, DiscussionResult};
pub use memory::MemoryCollaborator;
pub use model::{
    Comment, CommentBody, CommentId, CommentKind, CommentsPage, EmployeeId, EntityId, Emoji,
    MentionCandidate, NewComment, Reaction, ReactionSummary,
};
pub use qa::{QaCheck, QaOverallResult, QaPanel, QaStatus, QaWorkflowState};
pub use reactions::{CommentReactions, ReactionAggregator, ToggleOutcome};
pub use tree::{build_forest, flatten, CommentNode, ThreadRow};

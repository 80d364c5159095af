//! Per-comment reaction state for the viewing employee.
//!
//! Counts are never incremented locally. A toggle is sent to the collaborator and the comment's
//! summary and reaction list are then fetched again, so what is shown is always what the server
//! holds. While a toggle on a comment is in flight further toggles on that comment are ignored.
//!
//! A detached aggregator keeps answering callers but no longer caches anything, including the
//! results of fetches that were started before it was detached.

use crate::api::CollaboratorApi;
use crate::error::{DiscussionError, DiscussionResult};
use crate::model::{CommentId, EmployeeId, Emoji, Reaction, ReactionSummary};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Reaction counts on one comment and which of them the viewer has set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentReactions {
    pub counts: BTreeMap<Emoji, u32>,
    pub mine: BTreeSet<Emoji>,
}

impl CommentReactions {
    fn from_remote(summary: ReactionSummary, reactions: Vec<Reaction>, viewer: EmployeeId) -> Self {
        let mut counts = BTreeMap::new();
        for (glyph, count) in summary.reactions {
            match Emoji::parse(&glyph) {
                Ok(emoji) if count > 0 => {
                    *counts.entry(emoji).or_insert(0) += count;
                }
                Ok(_) => {}
                Err(_) => tracing::debug!(%glyph, "skipping unsupported reaction in summary"),
            }
        }
        let mine = reactions
            .into_iter()
            .filter(|r| r.employee_id == viewer)
            .map(|r| r.emoji)
            .collect();
        Self { counts, mine }
    }

    pub fn count(&self, emoji: Emoji) -> u32 {
        self.counts.get(&emoji).copied().unwrap_or(0)
    }

    pub fn is_mine(&self, emoji: Emoji) -> bool {
        self.mine.contains(&emoji)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The toggle went through; carries the refreshed state.
    Applied(CommentReactions),
    /// Another toggle on the same comment was still in flight.
    Ignored,
}

#[derive(Debug, Default)]
struct ReactionState {
    by_comment: HashMap<CommentId, CommentReactions>,
    in_flight: HashSet<CommentId>,
    detached: bool,
    // bumped on every detach so fetches started earlier never reach the cache
    epoch: u64,
}

/// Marks a comment as having a toggle in flight until dropped.
struct InFlightGuard {
    state: Arc<Mutex<ReactionState>>,
    comment_id: CommentId,
}

impl InFlightGuard {
    fn acquire(state: &Arc<Mutex<ReactionState>>, comment_id: CommentId) -> Option<Self> {
        if !state.lock().in_flight.insert(comment_id) {
            return None;
        }
        Some(Self {
            state: Arc::clone(state),
            comment_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(&self.comment_id);
    }
}

pub struct ReactionAggregator<A> {
    api: Arc<A>,
    viewer: EmployeeId,
    state: Arc<Mutex<ReactionState>>,
}

impl<A> Clone for ReactionAggregator<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            viewer: self.viewer,
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: CollaboratorApi> ReactionAggregator<A> {
    pub fn new(api: Arc<A>, viewer: EmployeeId) -> Self {
        Self {
            api,
            viewer,
            state: Arc::new(Mutex::new(ReactionState::default())),
        }
    }

    /// Toggle the viewer's `emoji` on a comment and return the comment's refreshed reactions.
    ///
    /// # Errors
    ///
    /// Returns [`DiscussionError::Reaction`] if the toggle or the follow-up fetch fails. The in-flight
    /// mark is cleared either way.
    pub async fn toggle(
        &self,
        comment_id: CommentId,
        emoji: Emoji,
    ) -> DiscussionResult<ToggleOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.state, comment_id) else {
            tracing::debug!(comment_id, %emoji, "toggle already in flight, ignoring");
            return Ok(ToggleOutcome::Ignored);
        };

        self.api
            .toggle_reaction(comment_id, self.viewer, emoji)
            .await
            .map_err(DiscussionError::Reaction)?;

        self.refresh(comment_id).await.map(ToggleOutcome::Applied)
    }

    /// Fetch a comment's summary and reaction list and cache the result.
    ///
    /// Nothing is cached if the aggregator was detached while the fetch was running.
    pub async fn refresh(&self, comment_id: CommentId) -> DiscussionResult<CommentReactions> {
        let epoch = self.state.lock().epoch;
        let (summary, reactions) = tokio::join!(
            self.api.reaction_summary(comment_id),
            self.api.list_reactions(comment_id)
        );
        let summary = summary.map_err(DiscussionError::Reaction)?;
        let reactions = reactions.map_err(DiscussionError::Reaction)?;

        let fresh = CommentReactions::from_remote(summary, reactions, self.viewer);
        let mut state = self.state.lock();
        if state.detached || state.epoch != epoch {
            tracing::debug!(comment_id, "aggregator detached, not caching reactions");
        } else {
            state.by_comment.insert(comment_id, fresh.clone());
        }
        Ok(fresh)
    }

    /// Cached reactions for a comment, if fetched since the last invalidation.
    pub fn get(&self, comment_id: CommentId) -> Option<CommentReactions> {
        self.state.lock().by_comment.get(&comment_id).cloned()
    }

    pub fn is_in_flight(&self, comment_id: CommentId) -> bool {
        self.state.lock().in_flight.contains(&comment_id)
    }

    /// Drop every cached entry. In-flight marks are left alone.
    pub fn invalidate_all(&self) {
        self.state.lock().by_comment.clear();
    }

    /// Clear the cache and ignore every fetch still running.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        state.detached = true;
        state.epoch += 1;
        state.by_comment.clear();
    }

    /// Resume caching after [`Self::detach`].
    pub fn attach(&self) {
        self.state.lock().detached = false;
    }

    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }
}

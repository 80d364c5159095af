//! `@mention` detection and directory suggestions.
//!
//! A mention is active while the text between the last `@` before the caret and the caret is a
//! non-empty run without whitespace. Each input on an active mention looks the query up in the
//! employee directory; choosing a suggestion splices `@<display name> ` into the text.
//!
//! Caret positions are byte offsets into the text.

use crate::api::CollaboratorApi;
use crate::constants::MENTION_TRIGGER;
use crate::model::{CommentId, MentionCandidate};
use parking_lot::Mutex;
use std::sync::Arc;

/// Which text field the user is typing into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MentionField {
    /// The new comment box at the bottom of the thread.
    Composer,
    /// The reply box under a comment.
    Reply(CommentId),
    /// The inline editor of an existing comment.
    Edit(CommentId),
}

/// The `@` token under the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionToken {
    /// Byte offset of the `@`.
    pub start: usize,
    /// Text typed after the `@`.
    pub query: String,
}

/// Find the mention being typed at `caret`, if any.
///
/// Returns `None` for a bare `@`, for a query containing whitespace, and for a caret that is past
/// the end of `text` or inside a multi-byte character.
pub fn detect_mention(text: &str, caret: usize) -> Option<MentionToken> {
    let before = text.get(..caret)?;
    let start = before.rfind(MENTION_TRIGGER)?;
    let query = &before[start + MENTION_TRIGGER.len_utf8()..];
    if query.is_empty() || query.chars().any(char::is_whitespace) {
        return None;
    }
    Some(MentionToken {
        start,
        query: query.to_string(),
    })
}

/// Text and caret after a suggestion has been chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSelection {
    pub text: String,
    pub caret: usize,
}

#[derive(Debug, Default)]
struct MentionState {
    field: Option<MentionField>,
    query: Option<String>,
    suggestions: Vec<MentionCandidate>,
    // Bumped on every input so a slow lookup cannot overwrite a newer one.
    generation: u64,
}

pub struct MentionResolver<A> {
    api: Arc<A>,
    limit: usize,
    state: Mutex<MentionState>,
}

impl<A: CollaboratorApi> MentionResolver<A> {
    pub fn new(api: Arc<A>, limit: usize) -> Self {
        Self {
            api,
            limit,
            state: Mutex::new(MentionState::default()),
        }
    }

    /// Handle a keystroke or caret move in `field`.
    ///
    /// Input on a different field moves the active mention to that field. Returns the
    /// suggestions now on offer, which is empty when no mention is active or the lookup failed.
    pub async fn on_input(
        &self,
        field: MentionField,
        text: &str,
        caret: usize,
    ) -> Vec<MentionCandidate> {
        let token = detect_mention(text, caret);
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.field = Some(field);
            state.query = token.as_ref().map(|t| t.query.clone());
            state.suggestions.clear();
            state.generation
        };

        let Some(token) = token else {
            return Vec::new();
        };

        let found = match self.api.search_directory(&token.query, self.limit).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(query = %token.query, error = %e, "mention lookup failed");
                Vec::new()
            }
        };

        let needle = token.query.to_lowercase();
        let suggestions: Vec<MentionCandidate> = found
            .into_iter()
            .filter(|c| c.display_name.to_lowercase().contains(&needle))
            .take(self.limit)
            .collect();

        let mut state = self.state.lock();
        if state.generation != generation {
            return state.suggestions.clone();
        }
        state.suggestions = suggestions.clone();
        suggestions
    }

    /// Replace the active mention in `text` with `candidate` and close the suggestion list.
    ///
    /// Returns `None` if `field` has no active mention at `caret`.
    pub fn select(
        &self,
        field: MentionField,
        text: &str,
        caret: usize,
        candidate: &MentionCandidate,
    ) -> Option<MentionSelection> {
        if self.active_field() != Some(field) {
            return None;
        }
        let token = detect_mention(text, caret)?;

        let insert = format!("{}{} ", MENTION_TRIGGER, candidate.display_name);
        let mut next = String::with_capacity(text.len() + insert.len());
        next.push_str(&text[..token.start]);
        next.push_str(&insert);
        let new_caret = next.len();
        next.push_str(&text[caret..]);

        self.close();
        Some(MentionSelection {
            text: next,
            caret: new_caret,
        })
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.query = None;
        state.suggestions.clear();
    }

    /// The field holding an active mention, if any.
    pub fn active_field(&self) -> Option<MentionField> {
        let state = self.state.lock();
        state.query.as_ref().and(state.field)
    }

    pub fn query(&self) -> Option<String> {
        self.state.lock().query.clone()
    }

    pub fn suggestions(&self) -> Vec<MentionCandidate> {
        self.state.lock().suggestions.clone()
    }
}

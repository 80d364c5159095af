//! Wire and domain types for the discussion thread.
//!
//! These types are shared verbatim by the HTTP client, the REST stand-in and the in-memory
//! collaborator, so their serde shape is the collaborator API's JSON shape (camelCase).

use crate::error::{DiscussionError, DiscussionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type CommentId = i64;
pub type EmployeeId = i64;
pub type EntityId = i64;

/// Classification of a comment within a QA discussion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum CommentKind {
    #[default]
    General,
    Issue,
    Resolution,
    Question,
}

impl CommentKind {
    pub const ALL: [CommentKind; 4] = [
        CommentKind::General,
        CommentKind::Issue,
        CommentKind::Resolution,
        CommentKind::Question,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommentKind::General => "General",
            CommentKind::Issue => "Issue",
            CommentKind::Resolution => "Resolution",
            CommentKind::Question => "Question",
        }
    }
}

impl fmt::Display for CommentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown comment kind: {}", s))
    }
}

/// A single comment as stored by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    pub author_id: EmployeeId,
    pub author_name: String,
    pub body_text: String,
    #[serde(default)]
    pub kind: CommentKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_flag: bool,
    /// Emoji glyph to count. Keys outside [`Emoji::ALL`] are kept as sent.
    #[serde(default)]
    pub reaction_summary: BTreeMap<String, u32>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Body of `GET /entities/{id}/comments`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommentsPage {
    pub items: Vec<Comment>,
}

/// Body of `POST /entities/{id}/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub author_id: EmployeeId,
    pub body_text: String,
    #[serde(default)]
    pub kind: CommentKind,
}

/// Body of `PATCH /comments/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentEdit {
    pub body_text: String,
}

/// Comment text that is known to contain something other than whitespace.
///
/// Leading and trailing whitespace is trimmed on construction; the trimmed text is what gets sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentBody(String);

impl CommentBody {
    pub fn new(input: impl AsRef<str>) -> DiscussionResult<Self> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DiscussionError::EmptyBody);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for CommentBody {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The fixed set of reactions a user may toggle on a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Emoji {
    ThumbsUp,
    Heart,
    Smile,
    Tada,
    Confused,
    Eyes,
}

impl Emoji {
    pub const ALL: [Emoji; 6] = [
        Emoji::ThumbsUp,
        Emoji::Heart,
        Emoji::Smile,
        Emoji::Tada,
        Emoji::Confused,
        Emoji::Eyes,
    ];

    /// The glyph sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "\u{1F44D}",
            Emoji::Heart => "\u{2764}\u{FE0F}",
            Emoji::Smile => "\u{1F604}",
            Emoji::Tada => "\u{1F389}",
            Emoji::Confused => "\u{1F615}",
            Emoji::Eyes => "\u{1F440}",
        }
    }

    /// Short name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "thumbs_up",
            Emoji::Heart => "heart",
            Emoji::Smile => "smile",
            Emoji::Tada => "tada",
            Emoji::Confused => "confused",
            Emoji::Eyes => "eyes",
        }
    }

    /// Parses a glyph or a short name.
    ///
    /// A heart without the emoji presentation selector is accepted, since keyboards differ on
    /// whether they emit it.
    pub fn parse(input: &str) -> DiscussionResult<Self> {
        let s = input.trim();
        if s == "\u{2764}" {
            return Ok(Emoji::Heart);
        }
        if s == "+1" {
            return Ok(Emoji::ThumbsUp);
        }
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s || e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DiscussionError::UnknownEmoji(input.to_string()))
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emoji {
    type Err = DiscussionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emoji::parse(s)
    }
}

impl Serialize for Emoji {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Emoji {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Emoji::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// One user's reaction on one comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub comment_id: CommentId,
    pub employee_id: EmployeeId,
    #[schema(value_type = String)]
    pub emoji: Emoji,
}

/// Body of `GET /comments/{id}/reactions/summary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReactionSummary {
    pub reactions: BTreeMap<String, u32>,
}

/// A directory entry offered while an `@mention` is being typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MentionCandidate {
    pub employee_id: EmployeeId,
    pub display_name: String,
}

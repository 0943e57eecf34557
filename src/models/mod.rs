use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Post,
    Comment,
    Reply,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Comment => "comment",
            ContentKind::Reply => "reply",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseContentIdError {
    #[error("content id `{0}` has no kind prefix")]
    MissingPrefix(String),
    #[error("unknown content kind `{0}`")]
    UnknownKind(String),
    #[error("content id `{0}` has a non-numeric suffix")]
    BadNumber(String),
}

/// Typed content identifier. Rendered as `post_42` / `comment_17` / `reply_3`
/// in index metadata; chunk storage keys append `_chunk_{i}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId {
    pub kind: ContentKind,
    pub id: i64,
}

impl ContentId {
    pub fn new(kind: ContentKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub fn post(id: i64) -> Self {
        Self::new(ContentKind::Post, id)
    }

    pub fn comment(id: i64) -> Self {
        Self::new(ContentKind::Comment, id)
    }

    pub fn reply(id: i64) -> Self {
        Self::new(ContentKind::Reply, id)
    }

    pub fn chunk_key(&self, index: usize) -> String {
        format!("{}_chunk_{}", self, index)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for ContentId {
    type Err = ParseContentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .rsplit_once('_')
            .ok_or_else(|| ParseContentIdError::MissingPrefix(s.to_string()))?;
        let kind = match kind {
            "post" => ContentKind::Post,
            "comment" => ContentKind::Comment,
            "reply" => ContentKind::Reply,
            other => return Err(ParseContentIdError::UnknownKind(other.to_string())),
        };
        let id = id
            .parse()
            .map_err(|_| ParseContentIdError::BadNumber(s.to_string()))?;
        Ok(Self { kind, id })
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown interaction kind `{0}`")]
pub struct ParseInteractionKindError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    CreatedContent,
    CommentedOrReplied,
    LikedContent,
}

impl InteractionKind {
    /// EWMA weight for this interaction. Higher puts more weight on the new event.
    pub fn alpha(&self) -> f32 {
        match self {
            InteractionKind::CreatedContent => 0.25,
            InteractionKind::CommentedOrReplied => 0.15,
            InteractionKind::LikedContent => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::CreatedContent => "created_content",
            InteractionKind::CommentedOrReplied => "commented_or_replied",
            InteractionKind::LikedContent => "liked_content",
        }
    }
}

impl FromStr for InteractionKind {
    type Err = ParseInteractionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_content" => Ok(InteractionKind::CreatedContent),
            "commented_or_replied" => Ok(InteractionKind::CommentedOrReplied),
            "liked_content" => Ok(InteractionKind::LikedContent),
            other => Err(ParseInteractionKindError(other.to_string())),
        }
    }
}

/// One behavioral signal, consumed exactly once by the interest service.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub embedding: Vec<f32>,
    pub kind: InteractionKind,
}

impl InteractionEvent {
    pub fn new(embedding: Vec<f32>, kind: InteractionKind) -> Self {
        Self { embedding, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

impl UserRef {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// Content lifecycle events as an explicit message type. The embedding is
/// produced by the content subsystem before dispatch; this core never embeds
/// content bodies itself.
#[derive(Debug, Clone)]
pub enum ContentEvent {
    Created { embedding: Vec<f32>, author: UserRef },
    Liked { embedding: Vec<f32>, liker: UserRef },
    CommentedOrReplied { embedding: Vec<f32>, author: UserRef },
}

impl ContentEvent {
    pub fn actor(&self) -> &UserRef {
        match self {
            ContentEvent::Created { author, .. } => author,
            ContentEvent::Liked { liker, .. } => liker,
            ContentEvent::CommentedOrReplied { author, .. } => author,
        }
    }

    pub fn into_interaction(self) -> (UserRef, InteractionEvent) {
        match self {
            ContentEvent::Created { embedding, author } => (
                author,
                InteractionEvent::new(embedding, InteractionKind::CreatedContent),
            ),
            ContentEvent::Liked { embedding, liker } => (
                liker,
                InteractionEvent::new(embedding, InteractionKind::LikedContent),
            ),
            ContentEvent::CommentedOrReplied { embedding, author } => (
                author,
                InteractionEvent::new(embedding, InteractionKind::CommentedOrReplied),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub original_doc_id: ContentId,
    pub chunk_index: usize,
    pub source_type: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_post_id: Option<i64>,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
}

impl ChunkMetadata {
    /// The post this chunk counts toward in a feed: posts map to themselves,
    /// comments and replies map to the post they belong to.
    pub fn parent_post(&self) -> Option<i64> {
        match self.original_doc_id.kind {
            ContentKind::Post => Some(self.original_doc_id.id),
            ContentKind::Comment | ContentKind::Reply => self.parent_post_id,
        }
    }
}

/// Metadata carried by a user's zero-content marker document in the user
/// collection. The vector itself is an explicit embedding payload, not
/// derived from document text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserVectorMetadata {
    pub user_id: i64,
    pub username: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: i64,
    pub title: String,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
}

use crate::model::{Id, post::PostMarker, text::CommentContent, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    /// `None` for top-level comments.
    pub parent_comment_id: Option<Id<CommentMarker>>,
    pub content: String,
    pub author_id: Id<UserMarker>,
    pub author_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A comment or reply as submitted by a signed-in user.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct NewComment {
    pub content: CommentContent,
    #[serde(default)]
    pub parent_comment_id: Option<Id<CommentMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post_id: Id<PostMarker>,
    pub parent_comment_id: Option<Id<CommentMarker>>,
    pub content: CommentContent,
    pub author_id: Id<UserMarker>,
    pub author_name: String,
}

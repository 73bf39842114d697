use crate::model::{
    Id,
    community::CommunityMarker,
    text::{PostBody, PostTitle},
    user::UserMarker,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub content: PostBody,
    pub image_url: String,
    /// Avatar of the author at the time of posting.
    pub avatar_url: Option<String>,
    pub community_id: Option<Id<CommunityMarker>>,
    pub author_id: Id<UserMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Feed entry: a post with its aggregate counts.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct FeedPost {
    #[serde(flatten)]
    pub post: Post,
    pub like_count: u64,
    pub comment_count: u64,
}

/// The text part of a post submission.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostDraft {
    pub title: PostTitle,
    pub content: PostBody,
    pub community_id: Option<Id<CommunityMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub draft: PostDraft,
    pub image_url: String,
    pub avatar_url: Option<String>,
    pub author_id: Id<UserMarker>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidImageError {
    #[error("An image is required")]
    Missing,
    #[error("The uploaded file is not an image: {0}")]
    NotAnImage(String),
}

/// An uploaded image that has not been stored yet.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PostImage {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl PostImage {
    pub fn new(
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, InvalidImageError> {
        if bytes.is_empty() || file_name.trim().is_empty() {
            return Err(InvalidImageError::Missing);
        }
        if let Some(content_type) = &content_type
            && !content_type.starts_with("image/")
        {
            return Err(InvalidImageError::NotAnImage(content_type.clone()));
        }

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for PostImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

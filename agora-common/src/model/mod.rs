pub mod auth;
pub mod comment;
pub mod community;
pub mod post;
pub mod text;
pub mod user;
pub mod vote;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError,
        comment::CommentMarker,
        post::{InvalidImageError, PostMarker},
        text::InvalidTextError,
        user::{InvalidUserHandleError, UnknownAuthProviderError},
        vote::InvalidVoteValueError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error(transparent)]
    Text(#[from] InvalidTextError),
    #[error(transparent)]
    VoteValue(#[from] InvalidVoteValueError),
    #[error(transparent)]
    Image(#[from] InvalidImageError),
    #[error(transparent)]
    AuthProvider(#[from] UnknownAuthProviderError),
    #[error("Comment {parent} does not belong to post {post}")]
    ParentCommentNotInPost {
        parent: Id<CommentMarker>,
        post: Id<PostMarker>,
    },
}

/// Database-assigned integer id, tagged with the kind of record it points to.
#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Id<Marker>(u64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Reinterprets the id for a signed `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        Self::new(value.cast_unsigned())
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

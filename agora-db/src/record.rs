use agora_common::model::{
    Id, ModelValidationError,
    auth::Authentication,
    comment::Comment,
    community::Community,
    post::{FeedPost, Post},
    text::{CommunityName, PostBody, PostTitle},
    user::{User, UserHandle},
    vote::{Vote, VoteValue},
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommunityRecord {
    pub community_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: i64,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub avatar_url: Option<String>,
    pub community_id: Option<i64>,
    pub author_id: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FeedPostRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct VoteRecord {
    pub vote_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub value: i16,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_id),
            handle: UserHandle::new(value.handle)?,
            avatar_url: value.avatar_url,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: Id::from_db(value.user_id),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

impl TryFrom<CommunityRecord> for Community {
    type Error = ModelValidationError;

    fn try_from(value: CommunityRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.community_id),
            name: CommunityName::new(value.name)?,
            description: value.description,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.post_id),
            title: PostTitle::new(value.title)?,
            content: PostBody::new(value.content)?,
            image_url: value.image_url,
            avatar_url: value.avatar_url,
            community_id: value.community_id.map(Id::from_db),
            author_id: Id::from_db(value.author_id),
            created_at: value.created_at,
        })
    }
}

impl TryFrom<FeedPostRecord> for FeedPost {
    type Error = ModelValidationError;

    fn try_from(value: FeedPostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            post: value.post.try_into()?,
            like_count: value.like_count.cast_unsigned(),
            comment_count: value.comment_count.cast_unsigned(),
        })
    }
}

impl From<CommentRecord> for Comment {
    fn from(value: CommentRecord) -> Self {
        Self {
            id: Id::from_db(value.comment_id),
            post_id: Id::from_db(value.post_id),
            parent_comment_id: value.parent_comment_id.map(Id::from_db),
            content: value.content,
            author_id: Id::from_db(value.author_id),
            author_name: value.author_name,
            created_at: value.created_at,
        }
    }
}

impl TryFrom<VoteRecord> for Vote {
    type Error = ModelValidationError;

    fn try_from(value: VoteRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.vote_id),
            post_id: Id::from_db(value.post_id),
            user_id: Id::from_db(value.user_id),
            value: VoteValue::try_from(value.value)?,
        })
    }
}

/// Converts every record, failing on the first invalid one.
pub(crate) fn convert_all<R, T>(records: Vec<R>) -> Result<Vec<T>, ModelValidationError>
where
    T: TryFrom<R, Error = ModelValidationError>,
{
    records.into_iter().map(T::try_from).collect()
}

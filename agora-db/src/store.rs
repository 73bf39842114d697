use agora_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CommentMarker, CreateComment},
        community::{Community, CommunityMarker, CreateCommunity},
        post::{CreatePost, FeedPost, Post, PostMarker},
        user::{ProviderIdentity, User, UserMarker},
        vote::Vote,
    },
    tally::VoteAction,
};
use async_trait::async_trait;
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Referenced {kind} {id} does not exist")]
    MissingReference { kind: &'static str, id: u64 },
    #[error("User {user} already voted on post {post}")]
    DuplicateVote {
        post: Id<PostMarker>,
        user: Id<UserMarker>,
    },
}

/// Persistence for every record the application knows about.
///
/// Listings come back in display order: comments oldest first, posts and
/// communities newest first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    /// Creates the user on first sign-in, refreshes handle and avatar afterwards.
    async fn upsert_user(&self, identity: &ProviderIdentity) -> Result<User>;

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>>;

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<()>;

    async fn fetch_communities(&self) -> Result<Vec<Community>>;

    async fn fetch_community(&self, community_id: Id<CommunityMarker>)
    -> Result<Option<Community>>;

    async fn create_community(&self, community: &CreateCommunity) -> Result<Community>;

    async fn fetch_feed(&self) -> Result<Vec<FeedPost>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn fetch_community_posts(&self, community_id: Id<CommunityMarker>) -> Result<Vec<Post>>;

    async fn create_post(&self, post: &CreatePost) -> Result<Post>;

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;

    async fn fetch_votes(&self, post_id: Id<PostMarker>) -> Result<Vec<Vote>>;

    async fn fetch_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Vote>>;

    async fn apply_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<()>;
}

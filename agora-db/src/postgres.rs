use crate::{
    record::{
        AuthenticationRecord, CommentRecord, CommunityRecord, FeedPostRecord, PostRecord,
        UserRecord, VoteRecord, convert_all,
    },
    store::{RecordStore, Result},
};
use agora_common::{
    model::{
        Id,
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
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as};
use tracing::info;

const POST_COLUMNS: &str = "
    posts.post_id,
    posts.title,
    posts.content,
    posts.image_url,
    posts.avatar_url,
    posts.community_id,
    posts.author_id,
    posts.created_at
";

const COMMENT_COLUMNS: &str = "
    comments.comment_id,
    comments.post_id,
    comments.parent_comment_id,
    comments.content,
    comments.author_id,
    comments.author_name,
    comments.created_at
";

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.avatar_url
            FROM
                users.users
            WHERE
                users.user_id = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn upsert_user(&self, identity: &ProviderIdentity) -> Result<User> {
        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (provider, provider_user_id, handle, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (provider, provider_user_id) DO UPDATE
                SET handle = EXCLUDED.handle, avatar_url = EXCLUDED.avatar_url
            RETURNING
                users.user_id,
                users.handle,
                users.avatar_url
            ",
        )
        .bind(identity.provider.as_str())
        .bind(&identity.provider_user_id)
        .bind(identity.handle.get())
        .bind(identity.avatar_url.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(authentication.user.to_db())
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_id,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<()> {
        query("DELETE FROM users.authentications WHERE authentications.token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fetch_communities(&self) -> Result<Vec<Community>> {
        let records = query_as::<_, CommunityRecord>(
            "
            SELECT
                communities.community_id,
                communities.name,
                communities.description,
                communities.created_at
            FROM
                communities.communities
            ORDER BY
                communities.created_at DESC,
                communities.community_id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_all(records)?)
    }

    async fn fetch_community(
        &self,
        community_id: Id<CommunityMarker>,
    ) -> Result<Option<Community>> {
        let record = query_as::<_, CommunityRecord>(
            "
            SELECT
                communities.community_id,
                communities.name,
                communities.description,
                communities.created_at
            FROM
                communities.communities
            WHERE
                communities.community_id = $1
            ",
        )
        .bind(community_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let community = record.map(Community::try_from).transpose()?;
        Ok(community)
    }

    async fn create_community(&self, community: &CreateCommunity) -> Result<Community> {
        let record = query_as::<_, CommunityRecord>(
            "
            INSERT INTO communities.communities (name, description)
            VALUES ($1, $2)
            RETURNING
                communities.community_id,
                communities.name,
                communities.description,
                communities.created_at
            ",
        )
        .bind(community.name.get())
        .bind(&community.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_feed(&self) -> Result<Vec<FeedPost>> {
        let sql = format!(
            "
            SELECT
                {POST_COLUMNS},
                (
                    SELECT COUNT(*) FROM posts.votes
                    WHERE votes.post_id = posts.post_id AND votes.value = 1
                ) AS like_count,
                (
                    SELECT COUNT(*) FROM posts.comments
                    WHERE comments.post_id = posts.post_id
                ) AS comment_count
            FROM
                posts.posts
            ORDER BY
                posts.created_at DESC,
                posts.post_id DESC
            "
        );
        let records = query_as::<_, FeedPostRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(convert_all(records)?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts.posts WHERE posts.post_id = $1");
        let record = query_as::<_, PostRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_community_posts(&self, community_id: Id<CommunityMarker>) -> Result<Vec<Post>> {
        let sql = format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE posts.community_id = $1
            ORDER BY posts.created_at DESC, posts.post_id DESC
            "
        );
        let records = query_as::<_, PostRecord>(&sql)
            .bind(community_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        Ok(convert_all(records)?)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let sql = format!(
            "
            INSERT INTO posts.posts (title, content, image_url, avatar_url, community_id, author_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "
        );
        let record = query_as::<_, PostRecord>(&sql)
            .bind(post.draft.title.get())
            .bind(post.draft.content.get())
            .bind(&post.image_url)
            .bind(post.avatar_url.as_deref())
            .bind(post.draft.community_id.map(Id::to_db))
            .bind(post.author_id.to_db())
            .fetch_one(&self.pool)
            .await?;

        Ok(record.try_into()?)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "
            SELECT {COMMENT_COLUMNS}
            FROM posts.comments
            WHERE comments.post_id = $1
            ORDER BY comments.created_at ASC, comments.comment_id ASC
            "
        );
        let records = query_as::<_, CommentRecord>(&sql)
            .bind(post_id.to_db())
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Comment::from).collect())
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let sql =
            format!("SELECT {COMMENT_COLUMNS} FROM posts.comments WHERE comments.comment_id = $1");
        let record = query_as::<_, CommentRecord>(&sql)
            .bind(comment_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Comment::from))
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let sql = format!(
            "
            INSERT INTO posts.comments (post_id, parent_comment_id, content, author_id, author_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COMMENT_COLUMNS}
            "
        );
        let record = query_as::<_, CommentRecord>(&sql)
            .bind(comment.post_id.to_db())
            .bind(comment.parent_comment_id.map(Id::to_db))
            .bind(comment.content.get())
            .bind(comment.author_id.to_db())
            .bind(&comment.author_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(record.into())
    }

    async fn fetch_votes(&self, post_id: Id<PostMarker>) -> Result<Vec<Vote>> {
        let records = query_as::<_, VoteRecord>(
            "
            SELECT
                votes.vote_id,
                votes.post_id,
                votes.user_id,
                votes.value
            FROM
                posts.votes
            WHERE
                votes.post_id = $1
            ORDER BY
                votes.vote_id
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_all(records)?)
    }

    async fn fetch_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Vote>> {
        let record = query_as::<_, VoteRecord>(
            "
            SELECT
                votes.vote_id,
                votes.post_id,
                votes.user_id,
                votes.value
            FROM
                posts.votes
            WHERE
                votes.post_id = $1 AND votes.user_id = $2
            ",
        )
        .bind(post_id.to_db())
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let vote = record.map(Vote::try_from).transpose()?;
        Ok(vote)
    }

    async fn apply_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<()> {
        let statement = match action {
            VoteAction::Insert(value) => query(
                "
                INSERT INTO posts.votes (post_id, user_id, value)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(post_id.to_db())
            .bind(user_id.to_db())
            .bind(value.get()),
            VoteAction::Update { vote, value } => {
                query("UPDATE posts.votes SET value = $2 WHERE votes.vote_id = $1")
                    .bind(vote.to_db())
                    .bind(value.get())
            }
            VoteAction::Delete { vote } => {
                query("DELETE FROM posts.votes WHERE votes.vote_id = $1").bind(vote.to_db())
            }
        };

        statement.execute(&self.pool).await?;
        Ok(())
    }
}

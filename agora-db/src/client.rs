use crate::{
    storage::{ObjectStore, StorageError, object_name},
    store::{RecordStore, StoreError},
};
use agora_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthEvent, AuthToken, AuthTokenHashError, Authentication},
        comment::{Comment, CreateComment, NewComment},
        community::{Community, CommunityMarker, CommunityPage, CreateCommunity},
        post::{CreatePost, FeedPost, Post, PostDraft, PostImage, PostMarker},
        user::{ProviderIdentity, User},
        vote::{Vote, VoteValue},
    },
    tally::{VoteAction, VoteReceipt, VoteSummary, summarize_votes},
    util::PositiveDuration,
};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

const AUTH_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("You must be signed in to do this")]
    Unauthorized,
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Community with id {0} was not found")]
    CommunityNotFound(Id<CommunityMarker>),
}

/// Every backend call the application makes.
///
/// Operations that act on behalf of someone take the session user explicitly;
/// `None` means nobody is signed in and such calls fail with
/// [`ClientError::Unauthorized`] before touching the store.
#[derive(Clone)]
pub struct BackendClient {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    auth_events: broadcast::Sender<AuthEvent>,
    session_lifetime: Option<PositiveDuration>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("session_lifetime", &self.session_lifetime)
            .finish_non_exhaustive()
    }
}

fn require_session(session: Option<&User>) -> Result<&User> {
    session.ok_or(ClientError::Unauthorized)
}

impl BackendClient {
    #[must_use]
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        session_lifetime: Option<PositiveDuration>,
    ) -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Self {
            records,
            objects,
            auth_events,
            session_lifetime,
        }
    }

    pub async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        Ok(self.records.fetch_comments(post_id).await?)
    }

    pub async fn create_comment(
        &self,
        session: Option<&User>,
        post_id: Id<PostMarker>,
        comment: NewComment,
    ) -> Result<Comment> {
        let user = require_session(session)?;
        self.get_post(post_id).await?;

        if let Some(parent) = comment.parent_comment_id {
            let parent_post = self
                .records
                .fetch_comment(parent)
                .await?
                .map(|parent| parent.post_id);
            if parent_post != Some(post_id) {
                return Err(ModelValidationError::ParentCommentNotInPost {
                    parent,
                    post: post_id,
                }
                .into());
            }
        }

        let comment = self
            .records
            .create_comment(&CreateComment {
                post_id,
                parent_comment_id: comment.parent_comment_id,
                content: comment.content,
                author_id: user.id,
                author_name: user.author_name().to_owned(),
            })
            .await?;

        debug!(comment = %comment.id, post = %post_id, "Created comment");
        Ok(comment)
    }

    pub async fn list_votes(&self, post_id: Id<PostMarker>) -> Result<Vec<Vote>> {
        Ok(self.records.fetch_votes(post_id).await?)
    }

    /// Like and dislike counts of a post, plus the viewer's own vote.
    pub async fn vote_summary(
        &self,
        post_id: Id<PostMarker>,
        viewer: Option<&User>,
    ) -> Result<VoteSummary> {
        let votes = self.list_votes(post_id).await?;
        Ok(summarize_votes(&votes, viewer.map(|user| user.id)))
    }

    /// Casts a vote with toggle semantics: the same polarity twice withdraws it.
    ///
    /// The existing vote is read before writing, so two concurrent casts by the
    /// same user can race. The unique `(post, user)` constraint keeps the store
    /// consistent; the losing cast fails.
    pub async fn cast_vote(
        &self,
        session: Option<&User>,
        post_id: Id<PostMarker>,
        value: VoteValue,
    ) -> Result<VoteReceipt> {
        let user = require_session(session)?;
        self.get_post(post_id).await?;

        let existing = self.records.fetch_vote(post_id, user.id).await?;
        let action = VoteAction::resolve(existing.as_ref(), value);
        self.records.apply_vote(post_id, user.id, action).await?;

        debug!(post = %post_id, user = %user.id, ?action, "Applied vote");
        Ok(action.into())
    }

    pub async fn list_posts(&self) -> Result<Vec<FeedPost>> {
        Ok(self.records.fetch_feed().await?)
    }

    pub async fn get_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        self.records
            .fetch_post(post_id)
            .await?
            .ok_or(ClientError::PostNotFound(post_id))
    }

    /// Uploads the image, then records the post pointing at its public URL.
    ///
    /// The upload is not rolled back if recording the post fails.
    pub async fn create_post(
        &self,
        session: Option<&User>,
        draft: PostDraft,
        image: PostImage,
    ) -> Result<Post> {
        let user = require_session(session)?;
        if let Some(community_id) = draft.community_id {
            self.get_community(community_id).await?;
        }

        let name = object_name(
            draft.title.get(),
            OffsetDateTime::now_utc(),
            image.file_name(),
        );
        let image_url = self.objects.upload(&name, &image).await?;

        let post = self
            .records
            .create_post(&CreatePost {
                draft,
                image_url: image_url.clone(),
                avatar_url: user.avatar_url.clone(),
                author_id: user.id,
            })
            .await
            .inspect_err(|err| {
                warn!(%image_url, %err, "Recording post failed, uploaded image is orphaned");
            })?;

        info!(post = %post.id, author = %user.id, "Created post");
        Ok(post)
    }

    pub async fn list_communities(&self) -> Result<Vec<Community>> {
        Ok(self.records.fetch_communities().await?)
    }

    async fn get_community(&self, community_id: Id<CommunityMarker>) -> Result<Community> {
        self.records
            .fetch_community(community_id)
            .await?
            .ok_or(ClientError::CommunityNotFound(community_id))
    }

    pub async fn get_community_page(
        &self,
        community_id: Id<CommunityMarker>,
    ) -> Result<CommunityPage> {
        let community = self.get_community(community_id).await?;
        let posts = self.records.fetch_community_posts(community_id).await?;

        Ok(CommunityPage { community, posts })
    }

    pub async fn create_community(
        &self,
        session: Option<&User>,
        community: &CreateCommunity,
    ) -> Result<Community> {
        let user = require_session(session)?;
        let community = self.records.create_community(community).await?;

        info!(community = %community.id, creator = %user.id, "Created community");
        Ok(community)
    }

    /// The user a token belongs to, or `None` for unknown and expired tokens.
    pub async fn get_session(&self, token: &AuthToken) -> Result<Option<User>> {
        let token_hash = token.hash()?;
        let Some(authentication) = self.records.fetch_authentication(&token_hash).await? else {
            return Ok(None);
        };

        if authentication.user != token.user_id {
            return Ok(None);
        }
        if authentication.is_expired_at(OffsetDateTime::now_utc()) {
            debug!(user = %authentication.user, "Dropping expired session");
            self.records.delete_authentication(&token_hash).await?;
            return Ok(None);
        }

        Ok(self.records.fetch_user(authentication.user).await?)
    }

    /// A receiver of every sign-in and sign-out from now on.
    #[must_use]
    pub fn on_auth_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    pub async fn sign_in(&self, identity: &ProviderIdentity) -> Result<(User, AuthToken)> {
        let user = self.records.upsert_user(identity).await?;

        let token = AuthToken::generate_random(user.id);
        let authentication = Authentication {
            user: user.id,
            token_hash: token.hash()?,
            created_at: OffsetDateTime::now_utc(),
            expires_after: self.session_lifetime,
        };
        self.records.create_authentication(&authentication).await?;

        info!(user = %user.id, provider = %identity.provider, "Signed in");
        self.publish(AuthEvent::SignedIn(user.clone()));
        Ok((user, token))
    }

    /// Ends the session of `token`. Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &AuthToken) -> Result<()> {
        let token_hash = token.hash()?;
        let Some(authentication) = self.records.fetch_authentication(&token_hash).await? else {
            return Ok(());
        };

        self.records.delete_authentication(&token_hash).await?;

        info!(user = %authentication.user, "Signed out");
        self.publish(AuthEvent::SignedOut(authentication.user));
        Ok(())
    }

    fn publish(&self, event: AuthEvent) {
        // Only fails when nobody is listening.
        let _ = self.auth_events.send(event);
    }
}

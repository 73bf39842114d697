//! A [`RecordStore`] that keeps everything in process memory.
//!
//! Used when no database is configured, and by tests.

use crate::store::{RecordStore, Result, StoreError};
use agora_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CommentMarker, CreateComment},
        community::{Community, CommunityMarker, CreateCommunity},
        post::{CreatePost, FeedPost, Post, PostMarker},
        user::{AuthProvider, ProviderIdentity, User, UserMarker},
        vote::{Vote, VoteMarker, VoteValue},
    },
    tally::VoteAction,
};
use async_trait::async_trait;
use std::cmp::Reverse;
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    last_id: u64,
    users: Vec<StoredUser>,
    authentications: Vec<Authentication>,
    communities: Vec<Community>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    votes: Vec<Vote>,
}

#[derive(Debug)]
struct StoredUser {
    provider: AuthProvider,
    provider_user_id: String,
    user: User,
}

impl State {
    /// Ids are shared across tables, like one big sequence.
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        self.last_id.into()
    }

    fn post(&self, post_id: Id<PostMarker>) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == post_id)
    }
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| Reverse((post.created_at, post.id)));
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let state = self.state.lock().await;
        let user = state
            .users
            .iter()
            .find(|stored| stored.user.id == user_id)
            .map(|stored| stored.user.clone());

        Ok(user)
    }

    async fn upsert_user(&self, identity: &ProviderIdentity) -> Result<User> {
        let mut state = self.state.lock().await;

        if let Some(stored) = state.users.iter_mut().find(|stored| {
            stored.provider == identity.provider
                && stored.provider_user_id == identity.provider_user_id
        }) {
            stored.user.handle = identity.handle.clone();
            stored.user.avatar_url.clone_from(&identity.avatar_url);
            return Ok(stored.user.clone());
        }

        let user = User {
            id: state.next_id(),
            handle: identity.handle.clone(),
            avatar_url: identity.avatar_url.clone(),
        };
        state.users.push(StoredUser {
            provider: identity.provider,
            provider_user_id: identity.provider_user_id.clone(),
            user: user.clone(),
        });

        Ok(user)
    }

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state
            .users
            .iter()
            .any(|stored| stored.user.id == authentication.user)
        {
            return Err(StoreError::MissingReference {
                kind: "user",
                id: authentication.user.get(),
            });
        }

        state.authentications.push(authentication.clone());
        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let state = self.state.lock().await;
        let authentication = state
            .authentications
            .iter()
            .find(|authentication| &authentication.token_hash == token_hash)
            .cloned();

        Ok(authentication)
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .authentications
            .retain(|authentication| &authentication.token_hash != token_hash);

        Ok(())
    }

    async fn fetch_communities(&self) -> Result<Vec<Community>> {
        let state = self.state.lock().await;
        let mut communities = state.communities.clone();
        communities.sort_by_key(|community| Reverse((community.created_at, community.id)));

        Ok(communities)
    }

    async fn fetch_community(
        &self,
        community_id: Id<CommunityMarker>,
    ) -> Result<Option<Community>> {
        let state = self.state.lock().await;
        let community = state
            .communities
            .iter()
            .find(|community| community.id == community_id)
            .cloned();

        Ok(community)
    }

    async fn create_community(&self, community: &CreateCommunity) -> Result<Community> {
        let mut state = self.state.lock().await;
        let community = Community {
            id: state.next_id(),
            name: community.name.clone(),
            description: community.description.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.communities.push(community.clone());

        Ok(community)
    }

    async fn fetch_feed(&self) -> Result<Vec<FeedPost>> {
        let state = self.state.lock().await;
        let mut posts = state.posts.clone();
        newest_first(&mut posts);

        let feed = posts
            .into_iter()
            .map(|post| {
                let like_count = state
                    .votes
                    .iter()
                    .filter(|vote| vote.post_id == post.id && vote.value == VoteValue::Up)
                    .count() as u64;
                let comment_count = state
                    .comments
                    .iter()
                    .filter(|comment| comment.post_id == post.id)
                    .count() as u64;

                FeedPost {
                    post,
                    like_count,
                    comment_count,
                }
            })
            .collect();

        Ok(feed)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state.lock().await;
        Ok(state.post(post_id).cloned())
    }

    async fn fetch_community_posts(&self, community_id: Id<CommunityMarker>) -> Result<Vec<Post>> {
        let state = self.state.lock().await;
        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| post.community_id == Some(community_id))
            .cloned()
            .collect();
        newest_first(&mut posts);

        Ok(posts)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let mut state = self.state.lock().await;
        if let Some(community_id) = post.draft.community_id
            && !state
                .communities
                .iter()
                .any(|community| community.id == community_id)
        {
            return Err(StoreError::MissingReference {
                kind: "community",
                id: community_id.get(),
            });
        }

        let post = Post {
            id: state.next_id(),
            title: post.draft.title.clone(),
            content: post.draft.content.clone(),
            image_url: post.image_url.clone(),
            avatar_url: post.avatar_url.clone(),
            community_id: post.draft.community_id,
            author_id: post.author_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.posts.push(post.clone());

        Ok(post)
    }

    async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|comment| (comment.created_at, comment.id));

        Ok(comments)
    }

    async fn fetch_comment(&self, comment_id: Id<CommentMarker>) -> Result<Option<Comment>> {
        let state = self.state.lock().await;
        let comment = state
            .comments
            .iter()
            .find(|comment| comment.id == comment_id)
            .cloned();

        Ok(comment)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut state = self.state.lock().await;
        if state.post(comment.post_id).is_none() {
            return Err(StoreError::MissingReference {
                kind: "post",
                id: comment.post_id.get(),
            });
        }
        if let Some(parent) = comment.parent_comment_id
            && !state.comments.iter().any(|existing| existing.id == parent)
        {
            return Err(StoreError::MissingReference {
                kind: "comment",
                id: parent.get(),
            });
        }

        let comment = Comment {
            id: state.next_id(),
            post_id: comment.post_id,
            parent_comment_id: comment.parent_comment_id,
            content: comment.content.get().to_owned(),
            author_id: comment.author_id,
            author_name: comment.author_name.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.comments.push(comment.clone());

        Ok(comment)
    }

    async fn fetch_votes(&self, post_id: Id<PostMarker>) -> Result<Vec<Vote>> {
        let state = self.state.lock().await;
        let votes = state
            .votes
            .iter()
            .filter(|vote| vote.post_id == post_id)
            .cloned()
            .collect();

        Ok(votes)
    }

    async fn fetch_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<Option<Vote>> {
        let state = self.state.lock().await;
        let vote = state
            .votes
            .iter()
            .find(|vote| vote.post_id == post_id && vote.user_id == user_id)
            .cloned();

        Ok(vote)
    }

    async fn apply_vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let missing_vote = |vote: Id<VoteMarker>| StoreError::MissingReference {
            kind: "vote",
            id: vote.get(),
        };

        match action {
            VoteAction::Insert(value) => {
                if state.post(post_id).is_none() {
                    return Err(StoreError::MissingReference {
                        kind: "post",
                        id: post_id.get(),
                    });
                }
                if state
                    .votes
                    .iter()
                    .any(|vote| vote.post_id == post_id && vote.user_id == user_id)
                {
                    return Err(StoreError::DuplicateVote {
                        post: post_id,
                        user: user_id,
                    });
                }

                let vote = Vote {
                    id: state.next_id(),
                    post_id,
                    user_id,
                    value,
                };
                state.votes.push(vote);
            }
            VoteAction::Update { vote, value } => {
                let stored = state
                    .votes
                    .iter_mut()
                    .find(|stored| stored.id == vote)
                    .ok_or_else(|| missing_vote(vote))?;
                stored.value = value;
            }
            VoteAction::Delete { vote } => {
                let position = state
                    .votes
                    .iter()
                    .position(|stored| stored.id == vote)
                    .ok_or_else(|| missing_vote(vote))?;
                state.votes.remove(position);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryRecordStore;
    use crate::store::{RecordStore, StoreError};
    use agora_common::{
        model::{
            comment::CreateComment,
            post::{CreatePost, PostDraft},
            text::{CommentContent, PostBody, PostTitle},
            user::{AuthProvider, ProviderIdentity, UserHandle},
            vote::VoteValue,
        },
        tally::VoteAction,
    };
    use claims::{assert_matches, assert_none, assert_ok};

    fn identity(provider_user_id: &str, handle: &str) -> ProviderIdentity {
        ProviderIdentity {
            provider: AuthProvider::Github,
            provider_user_id: provider_user_id.into(),
            handle: UserHandle::new(handle.into()).unwrap(),
            avatar_url: None,
        }
    }

    fn draft(title: &str) -> CreatePost {
        CreatePost {
            draft: PostDraft {
                title: PostTitle::new(title).unwrap(),
                content: PostBody::new("Body").unwrap(),
                community_id: None,
            },
            image_url: "/uploads/image.png".into(),
            avatar_url: None,
            author_id: 1.into(),
        }
    }

    #[tokio::test]
    async fn repeated_sign_ins_reuse_the_user() {
        let store = MemoryRecordStore::new();

        let first = store.upsert_user(&identity("1", "old")).await.unwrap();
        let second = store.upsert_user(&identity("1", "new")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.handle.get(), "new");
        assert_eq!(
            store.fetch_user(first.id).await.unwrap().unwrap().handle,
            second.handle
        );
    }

    #[tokio::test]
    async fn feed_is_newest_first_with_counts() {
        let store = MemoryRecordStore::new();
        let older = store.create_post(&draft("Older")).await.unwrap();
        let newer = store.create_post(&draft("Newer")).await.unwrap();

        store
            .apply_vote(older.id, 1.into(), VoteAction::Insert(VoteValue::Up))
            .await
            .unwrap();
        store
            .apply_vote(older.id, 2.into(), VoteAction::Insert(VoteValue::Down))
            .await
            .unwrap();
        store
            .create_comment(&CreateComment {
                post_id: older.id,
                parent_comment_id: None,
                content: CommentContent::new("First").unwrap(),
                author_id: 1.into(),
                author_name: "ferris".into(),
            })
            .await
            .unwrap();

        let feed = store.fetch_feed().await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].post.id, newer.id);
        assert_eq!(feed[1].post.id, older.id);
        assert_eq!(feed[1].like_count, 1);
        assert_eq!(feed[1].comment_count, 1);
    }

    #[tokio::test]
    async fn one_vote_per_user_and_post() {
        let store = MemoryRecordStore::new();
        let post = store.create_post(&draft("Post")).await.unwrap();

        assert_ok!(
            store
                .apply_vote(post.id, 1.into(), VoteAction::Insert(VoteValue::Up))
                .await
        );
        assert_matches!(
            store
                .apply_vote(post.id, 1.into(), VoteAction::Insert(VoteValue::Down))
                .await,
            Err(StoreError::DuplicateVote { .. })
        );

        let vote = store.fetch_vote(post.id, 1.into()).await.unwrap().unwrap();
        store
            .apply_vote(post.id, 1.into(), VoteAction::Delete { vote: vote.id })
            .await
            .unwrap();
        assert_none!(store.fetch_vote(post.id, 1.into()).await.unwrap());
    }

    #[tokio::test]
    async fn replies_need_an_existing_parent() {
        let store = MemoryRecordStore::new();
        let post = store.create_post(&draft("Post")).await.unwrap();

        let result = store
            .create_comment(&CreateComment {
                post_id: post.id,
                parent_comment_id: Some(999.into()),
                content: CommentContent::new("Reply").unwrap(),
                author_id: 1.into(),
                author_name: "ferris".into(),
            })
            .await;

        assert_matches!(
            result,
            Err(StoreError::MissingReference { kind: "comment", id: 999 })
        );
    }
}

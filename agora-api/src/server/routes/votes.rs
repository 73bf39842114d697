use crate::server::{
    Result, ServerError, ServerRouter,
    auth::Viewer,
    json::Json,
    sync::{QueryCache, QueryKey},
};
use agora_common::{
    model::{Id, post::PostMarker, user::User, vote::CastVote},
    tally::{VoteReceipt, VoteSummary, summarize_votes},
};
use agora_db::client::BackendClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_votes)
        .typed_post(cast_vote)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}/votes", rejection(ServerError))]
struct VotesPath {
    id: Id<PostMarker>,
}

/// Vote counts of a post as seen by `viewer`, fetched through the cache.
pub(super) async fn vote_summary(
    client: &BackendClient,
    cache: &QueryCache,
    post_id: Id<PostMarker>,
    viewer: Option<&User>,
) -> Result<VoteSummary> {
    let votes = cache
        .get_or_fetch(QueryKey::Votes(post_id), || client.list_votes(post_id))
        .await?;

    Ok(summarize_votes(&votes, viewer.map(|user| user.id)))
}

async fn get_votes(
    VotesPath { id }: VotesPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
) -> Result<Json<VoteSummary>> {
    let summary = vote_summary(&client, &cache, id, viewer.user()).await?;

    Ok(Json(summary))
}

async fn cast_vote(
    VotesPath { id }: VotesPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
    Json(CastVote { value }): Json<CastVote>,
) -> Result<Json<VoteReceipt>> {
    let receipt = client.cast_vote(viewer.user(), id, value).await?;
    cache
        .invalidate(&[QueryKey::Votes(id), QueryKey::Posts])
        .await;

    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::{VotesPath, cast_vote, get_votes};
    use crate::server::{ServerState, auth::Viewer, json::Json, test_support};
    use agora_common::{
        model::{
            Id,
            post::{PostDraft, PostImage, PostMarker},
            text::{PostBody, PostTitle},
            user::User,
            vote::{CastVote, VoteValue},
        },
        tally::{VoteOutcome, VoteSummary},
    };
    use axum::{extract::State, http::StatusCode};

    async fn post(state: &ServerState, author: &User) -> Id<PostMarker> {
        let draft = PostDraft {
            title: PostTitle::new("Vote on me").unwrap(),
            content: PostBody::new("Please").unwrap(),
            community_id: None,
        };
        let image = PostImage::new("a.png".into(), None, vec![1]).unwrap();

        state
            .client
            .create_post(Some(author), draft, image)
            .await
            .unwrap()
            .id
    }

    async fn cast(
        state: &ServerState,
        viewer: Option<&User>,
        id: Id<PostMarker>,
        value: VoteValue,
    ) -> VoteOutcome {
        let Json(receipt) = cast_vote(
            VotesPath { id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(viewer.cloned()),
            Json(CastVote { value }),
        )
        .await
        .unwrap();

        receipt.outcome
    }

    async fn summary(
        state: &ServerState,
        viewer: Option<&User>,
        id: Id<PostMarker>,
    ) -> VoteSummary {
        let Json(summary) = get_votes(
            VotesPath { id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(viewer.cloned()),
        )
        .await
        .unwrap();

        summary
    }

    #[tokio::test]
    async fn summaries_follow_casts() {
        let state = test_support::state();
        let (alice, _) = test_support::sign_in(&state, "alice").await;
        let (bob, _) = test_support::sign_in(&state, "bob").await;
        let id = post(&state, &alice).await;

        assert_eq!(summary(&state, Some(&alice), id).await, VoteSummary::default());

        let first = cast(&state, Some(&alice), id, VoteValue::Up).await;
        let second = cast(&state, Some(&bob), id, VoteValue::Down).await;
        assert_eq!((first, second), (VoteOutcome::Inserted, VoteOutcome::Inserted));

        let seen_by_alice = summary(&state, Some(&alice), id).await;
        assert_eq!((seen_by_alice.likes, seen_by_alice.dislikes), (1, 1));
        assert_eq!(seen_by_alice.viewer_vote, Some(VoteValue::Up));
        assert_eq!(summary(&state, None, id).await.viewer_vote, None);

        let withdrawn = cast(&state, Some(&alice), id, VoteValue::Up).await;
        assert_eq!(withdrawn, VoteOutcome::Deleted);
        let after_toggle = summary(&state, Some(&alice), id).await;
        assert_eq!((after_toggle.likes, after_toggle.dislikes), (0, 1));
        assert_eq!(after_toggle.viewer_vote, None);
    }

    #[tokio::test]
    async fn anonymous_votes_are_unauthorized() {
        let state = test_support::state();
        let (alice, _) = test_support::sign_in(&state, "alice").await;
        let id = post(&state, &alice).await;

        let error = cast_vote(
            VotesPath { id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(None),
            Json(CastVote {
                value: VoteValue::Up,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(summary(&state, None, id).await, VoteSummary::default());
    }
}

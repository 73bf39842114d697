use crate::server::{
    Result, ServerError, ServerRouter,
    auth::Viewer,
    json::{Created, Json},
    sync::{QueryCache, QueryKey},
};
use agora_common::{
    model::{
        Id,
        comment::{Comment, NewComment},
        post::PostMarker,
    },
    thread::{CommentNode, build_comment_forest},
};
use agora_db::client::BackendClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_comments)
        .typed_post(create_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

/// The reply threads of a post, fetched through the cache.
pub(super) async fn comment_forest(
    client: &BackendClient,
    cache: &QueryCache,
    post_id: Id<PostMarker>,
) -> Result<Vec<CommentNode>> {
    let comments = cache
        .get_or_fetch(QueryKey::Comments(post_id), || client.list_comments(post_id))
        .await?;

    Ok(build_comment_forest(comments))
}

async fn get_comments(
    CommentsPath { id }: CommentsPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
) -> Result<Json<Vec<CommentNode>>> {
    let forest = comment_forest(&client, &cache, id).await?;

    Ok(Json(forest))
}

async fn create_comment(
    CommentsPath { id }: CommentsPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
    Json(comment): Json<NewComment>,
) -> Result<Created<Comment>> {
    let comment = client.create_comment(viewer.user(), id, comment).await?;
    cache
        .invalidate(&[QueryKey::Comments(id), QueryKey::Posts])
        .await;

    Ok(Created(comment))
}

#[cfg(test)]
mod tests {
    use super::{CommentsPath, create_comment, get_comments};
    use crate::server::{
        ServerState,
        auth::Viewer,
        json::{Created, Json},
        test_support,
    };
    use agora_common::{
        model::{
            comment::NewComment,
            post::{Post, PostDraft, PostImage},
            text::{CommentContent, PostBody, PostTitle},
            user::User,
        },
        thread::MAX_DEPTH,
    };
    use axum::{extract::State, http::StatusCode};

    async fn thread_post(state: &ServerState, user: &User) -> Post {
        state
            .client
            .create_post(
                Some(user),
                PostDraft {
                    title: PostTitle::new("Thread").unwrap(),
                    content: PostBody::new("Discuss").unwrap(),
                    community_id: None,
                },
                PostImage::new("a.png".into(), None, vec![1]).unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_replies_show_up_in_the_thread() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;
        let post = thread_post(&state, &user).await;

        let Json(empty) = get_comments(
            CommentsPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert!(empty.is_empty());

        let Created(root) = create_comment(
            CommentsPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(Some(user.clone())),
            Json(NewComment {
                content: CommentContent::new("Root").unwrap(),
                parent_comment_id: None,
            }),
        )
        .await
        .unwrap();

        create_comment(
            CommentsPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(Some(user)),
            Json(NewComment {
                content: CommentContent::new("Reply").unwrap(),
                parent_comment_id: Some(root.id),
            }),
        )
        .await
        .unwrap();

        let Json(forest) = get_comments(
            CommentsPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].comment.id, root.id);
        assert_eq!(forest[0].children[0].comment.content, "Reply");
        assert_eq!(forest[0].children[0].depth, 1);
    }

    #[tokio::test]
    async fn anonymous_comments_are_unauthorized() {
        let state = test_support::state();

        let error = create_comment(
            CommentsPath { id: 1.into() },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(None),
            Json(NewComment {
                content: CommentContent::new("Hello?").unwrap(),
                parent_comment_id: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reply_chains_stop_nesting_at_the_depth_cap() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;
        let post = thread_post(&state, &user).await;

        let mut parent = None;
        for reply in 0..MAX_DEPTH + 10 {
            let comment = state
                .client
                .create_comment(
                    Some(&user),
                    post.id,
                    NewComment {
                        content: CommentContent::new(format!("Reply {reply}")).unwrap(),
                        parent_comment_id: parent,
                    },
                )
                .await
                .unwrap();
            parent = Some(comment.id);
        }

        let Json(forest) = get_comments(
            CommentsPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();

        let mut deepest = &forest[0];
        while let Some(child) = deepest.children.first() {
            deepest = child;
        }
        assert_eq!(deepest.depth, MAX_DEPTH);
        assert_eq!(deepest.comment.content, format!("Reply {MAX_DEPTH}"));
    }
}

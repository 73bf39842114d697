use crate::server::{
    Result, ServerError, ServerRouter,
    auth::Viewer,
    json::{Created, Json},
    routes::{comments::comment_forest, votes::vote_summary},
    sync::{QueryCache, QueryKey},
};
use agora_common::{
    model::{
        Id, ModelValidationError,
        post::{FeedPost, Post, PostDraft, PostImage, PostMarker},
        text::{PostBody, PostTitle},
    },
    tally::VoteSummary,
    thread::CommentNode,
};
use agora_db::client::BackendClient;
use axum::extract::{Multipart, State};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_feed)
        .typed_post(create_post)
        .typed_get(get_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
) -> Result<Json<Vec<FeedPost>>> {
    let feed = cache
        .get_or_fetch(QueryKey::Posts, || client.list_posts())
        .await?;

    Ok(Json(feed))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostDetail {
    #[serde(flatten)]
    post: Post,
    comments: Vec<CommentNode>,
    votes: VoteSummary,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
) -> Result<Json<PostDetail>> {
    let post = cache
        .get_or_fetch(QueryKey::Post(id), || client.get_post(id))
        .await?;
    let comments = comment_forest(&client, &cache, id).await?;
    let votes = vote_summary(&client, &cache, id, viewer.user()).await?;

    Ok(Json(PostDetail {
        post,
        comments,
        votes,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create", rejection(ServerError))]
struct CreatePostPath();

/// Reads the `title`, `content`, optional `community_id` and `image` fields
/// of a post submission. Unknown fields are skipped.
async fn read_post_form(mut multipart: Multipart) -> Result<(PostDraft, PostImage)> {
    let mut title = None;
    let mut content = None;
    let mut community_id = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_owned();

        match field_name.as_str() {
            "title" => title = Some(field.text().await?),
            "content" => content = Some(field.text().await?),
            "community_id" => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = text.parse::<u64>().map_err(|_| ServerError::InvalidField {
                        field: "community_id",
                        value: text.to_owned(),
                    })?;
                    community_id = Some(Id::new(id));
                }
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().map(ToOwned::to_owned);
                let bytes = field.bytes().await?.to_vec();
                image = Some(PostImage::new(file_name, content_type, bytes));
            }
            _ => {}
        }
    }

    let title = title.ok_or(ServerError::MissingField("title"))?;
    let content = content.ok_or(ServerError::MissingField("content"))?;
    let draft = PostDraft {
        title: PostTitle::new(title).map_err(ModelValidationError::from)?,
        content: PostBody::new(content).map_err(ModelValidationError::from)?,
        community_id,
    };
    let image = image
        .ok_or(ServerError::MissingField("image"))?
        .map_err(ModelValidationError::from)?;

    Ok((draft, image))
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
    multipart: Multipart,
) -> Result<Created<Post>> {
    let (draft, image) = read_post_form(multipart).await?;
    let post = client.create_post(viewer.user(), draft, image).await?;

    let mut invalidated = vec![QueryKey::Posts];
    if let Some(community_id) = post.community_id {
        invalidated.push(QueryKey::CommunityPage(community_id));
    }
    cache.invalidate(&invalidated).await;

    Ok(Created(post))
}

#[cfg(test)]
mod tests {
    use super::{CreatePostPath, FeedPath, PostPath, create_post, get_feed, get_post};
    use crate::server::{
        ServerError, ServerState,
        auth::Viewer,
        json::{Created, Json},
        test_support,
    };
    use agora_common::model::{
        ModelValidationError,
        comment::NewComment,
        post::{InvalidImageError, Post},
        text::CommentContent,
        user::User,
    };
    use axum::{
        body::Body,
        extract::{FromRequest, Multipart, State},
        http::{Request, StatusCode, header::CONTENT_TYPE},
    };
    use claims::assert_matches;

    const BOUNDARY: &str = "agora-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File {
            name: &'a str,
            file_name: &'a str,
            content_type: &'a str,
            bytes: &'a str,
        },
    }

    async fn multipart(parts: &[Part<'_>]) -> Multipart {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match part {
                Part::Text(name, value) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    ));
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n{bytes}\r\n"
                    ));
                }
            }
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let request = Request::builder()
            .method("POST")
            .uri("/create")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    fn cat_picture() -> Part<'static> {
        Part::File {
            name: "image",
            file_name: "cat.png",
            content_type: "image/png",
            bytes: "not really a png",
        }
    }

    async fn submit(
        state: &ServerState,
        viewer: Option<&User>,
        parts: &[Part<'_>],
    ) -> Result<Created<Post>, ServerError> {
        create_post(
            CreatePostPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(viewer.cloned()),
            multipart(parts).await,
        )
        .await
    }

    #[tokio::test]
    async fn created_posts_lead_the_feed() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;

        let Json(before) = get_feed(
            FeedPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert!(before.is_empty());

        let Created(post) = submit(
            &state,
            Some(&user),
            &[
                Part::Text("title", "  My cat  "),
                Part::Text("content", "She is great"),
                Part::Text("community_id", ""),
                cat_picture(),
            ],
        )
        .await
        .unwrap();
        assert_eq!(post.title.get(), "My cat");
        assert_eq!(post.community_id, None);
        assert_eq!(post.author_id, user.id);

        let Json(after) = get_feed(
            FeedPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].post, post);
        assert_eq!((after[0].like_count, after[0].comment_count), (0, 0));
    }

    #[tokio::test]
    async fn submissions_are_validated() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;

        let missing_image = submit(
            &state,
            Some(&user),
            &[Part::Text("title", "Cat"), Part::Text("content", "Body")],
        )
        .await
        .unwrap_err();
        assert_matches!(missing_image, ServerError::MissingField("image"));

        let blank_title = submit(
            &state,
            Some(&user),
            &[
                Part::Text("title", "   "),
                Part::Text("content", "Body"),
                cat_picture(),
            ],
        )
        .await
        .unwrap_err();
        assert_eq!(blank_title.status(), StatusCode::BAD_REQUEST);

        let not_an_image = submit(
            &state,
            Some(&user),
            &[
                Part::Text("title", "Cat"),
                Part::Text("content", "Body"),
                Part::File {
                    name: "image",
                    file_name: "cat.txt",
                    content_type: "text/plain",
                    bytes: "meow",
                },
            ],
        )
        .await
        .unwrap_err();
        assert_matches!(
            not_an_image,
            ServerError::Validation(ModelValidationError::Image(InvalidImageError::NotAnImage(_)))
        );

        let bad_community = submit(
            &state,
            Some(&user),
            &[
                Part::Text("title", "Cat"),
                Part::Text("content", "Body"),
                Part::Text("community_id", "cats"),
                cat_picture(),
            ],
        )
        .await
        .unwrap_err();
        assert_matches!(bad_community, ServerError::InvalidField { .. });
    }

    #[tokio::test]
    async fn anonymous_posts_are_unauthorized() {
        let state = test_support::state();

        let error = submit(
            &state,
            None,
            &[
                Part::Text("title", "Cat"),
                Part::Text("content", "Body"),
                cat_picture(),
            ],
        )
        .await
        .unwrap_err();

        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn post_detail_bundles_thread_and_votes() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;
        let Created(post) = submit(
            &state,
            Some(&user),
            &[
                Part::Text("title", "Cat"),
                Part::Text("content", "Body"),
                cat_picture(),
            ],
        )
        .await
        .unwrap();
        state
            .client
            .create_comment(
                Some(&user),
                post.id,
                NewComment {
                    content: CommentContent::new("Cute").unwrap(),
                    parent_comment_id: None,
                },
            )
            .await
            .unwrap();

        let Json(detail) = get_post(
            PostPath { id: post.id },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(Some(user)),
        )
        .await
        .unwrap();

        assert_eq!(detail.post, post);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.votes.likes, 0);

        let missing = get_post(
            PostPath { id: 999.into() },
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(None),
        )
        .await
        .unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}

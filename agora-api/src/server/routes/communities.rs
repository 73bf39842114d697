use crate::server::{
    Result, ServerError, ServerRouter,
    auth::Viewer,
    json::{Created, Json},
    sync::{QueryCache, QueryKey},
};
use agora_common::model::{
    Id,
    community::{Community, CommunityMarker, CommunityPage, CreateCommunity},
};
use agora_db::client::BackendClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_communities)
        .typed_get(get_community)
        .typed_post(create_community)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/communities", rejection(ServerError))]
struct CommunitiesPath();

async fn get_communities(
    CommunitiesPath(): CommunitiesPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
) -> Result<Json<Vec<Community>>> {
    let communities = cache
        .get_or_fetch(QueryKey::Communities, || client.list_communities())
        .await?;

    Ok(Json(communities))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/community/{id}", rejection(ServerError))]
struct CommunityPath {
    id: Id<CommunityMarker>,
}

async fn get_community(
    CommunityPath { id }: CommunityPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
) -> Result<Json<CommunityPage>> {
    let page = cache
        .get_or_fetch(QueryKey::CommunityPage(id), || client.get_community_page(id))
        .await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/community/create", rejection(ServerError))]
struct CreateCommunityPath();

async fn create_community(
    CreateCommunityPath(): CreateCommunityPath,
    State(client): State<BackendClient>,
    State(cache): State<Arc<QueryCache>>,
    viewer: Viewer,
    Json(community): Json<CreateCommunity>,
) -> Result<Created<Community>> {
    let community = client.create_community(viewer.user(), &community).await?;
    cache.invalidate(&[QueryKey::Communities]).await;

    Ok(Created(community))
}

#[cfg(test)]
mod tests {
    use super::{
        CommunitiesPath, CommunityPath, CreateCommunityPath, create_community, get_communities,
        get_community,
    };
    use crate::server::{
        auth::Viewer,
        json::{Created, Json},
        test_support,
    };
    use agora_common::model::{community::CreateCommunity, text::CommunityName};
    use axum::{extract::State, http::StatusCode};

    fn rustaceans() -> Json<CreateCommunity> {
        Json(CreateCommunity {
            name: CommunityName::new("Rustaceans").unwrap(),
            description: "Crabs welcome".into(),
        })
    }

    #[tokio::test]
    async fn created_communities_are_listed_and_browsable() {
        let state = test_support::state();
        let (user, _) = test_support::sign_in(&state, "ferris").await;

        let Json(before) = get_communities(
            CommunitiesPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert!(before.is_empty());

        let Created(community) = create_community(
            CreateCommunityPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(Some(user)),
            rustaceans(),
        )
        .await
        .unwrap();

        let Json(after) = get_communities(
            CommunitiesPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert_eq!(after, [community.clone()]);

        let Json(page) = get_community(
            CommunityPath { id: community.id },
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap();
        assert_eq!(page.community, community);
        assert!(page.posts.is_empty());
    }

    #[tokio::test]
    async fn unknown_communities_are_not_found() {
        let state = test_support::state();

        let error = get_community(
            CommunityPath { id: 77.into() },
            State(state.client.clone()),
            State(state.cache.clone()),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_users_cannot_create_communities() {
        let state = test_support::state();

        let error = create_community(
            CreateCommunityPath(),
            State(state.client.clone()),
            State(state.cache.clone()),
            Viewer(None),
            rustaceans(),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
    }
}

use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{BearerToken, Viewer},
    json::Json,
};
use agora_common::model::user::{ProviderIdentity, User};
use agora_db::client::BackendClient;
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_session)
        .typed_post(sign_in)
        .typed_post(sign_out)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/session", rejection(ServerError))]
struct SessionPath();

/// The signed-in user, or `null`.
async fn get_session(SessionPath(): SessionPath, viewer: Viewer) -> Json<Option<User>> {
    Json(viewer.0)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/sign-in", rejection(ServerError))]
struct SignInPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
struct SignedIn {
    user: User,
    /// Goes into `Authorization: Bearer` on later requests.
    token: String,
}

/// Trusts the identity as given; talking to the provider happens before this.
async fn sign_in(
    SignInPath(): SignInPath,
    State(client): State<BackendClient>,
    Json(identity): Json<ProviderIdentity>,
) -> Result<Json<SignedIn>> {
    let (user, token) = client.sign_in(&identity).await?;

    Ok(Json(SignedIn {
        user,
        token: token.as_token_str(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/sign-out", rejection(ServerError))]
struct SignOutPath();

async fn sign_out(
    SignOutPath(): SignOutPath,
    State(client): State<BackendClient>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode> {
    client.sign_out(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}

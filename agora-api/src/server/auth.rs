use crate::server::ServerError;
use agora_common::model::{auth::AuthToken, user::User};
use agora_db::client::BackendClient;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The token from the `Authorization: Bearer` header. Required.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct BearerToken(pub AuthToken);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        Ok(Self(token))
    }
}

/// The signed-in user making the request, if any.
///
/// A missing header or an unknown or expired token means nobody is signed in.
/// A header that is present but malformed is rejected.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    BackendClient: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header =
            <AuthorizationHeader as OptionalFromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;
        let Some(TypedHeader(Authorization(bearer))) = header else {
            return Ok(Self(None));
        };

        let token: AuthToken = bearer.token().parse()?;
        let user = BackendClient::from_ref(state).get_session(&token).await?;

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::{BearerToken, Viewer};
    use crate::server::{ServerError, test_support};
    use agora_common::model::auth::AuthToken;
    use axum::{
        extract::FromRequestParts,
        http::{Request, StatusCode, header::AUTHORIZATION},
    };
    use claims::assert_matches;

    fn parts(authorization: Option<&str>) -> axum::http::request::Parts {
        let mut request = Request::builder().uri("/");
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        request.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn viewer_is_anonymous_without_a_header() {
        let state = test_support::state();

        let viewer = Viewer::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap();

        assert_eq!(viewer, Viewer(None));
    }

    #[tokio::test]
    async fn bearer_tokens_resolve_to_their_user() {
        let state = test_support::state();
        let (user, token) = test_support::sign_in(&state, "ferris").await;
        let header = format!("Bearer {}", token.as_token_str());

        let viewer = Viewer::from_request_parts(&mut parts(Some(&header)), &state)
            .await
            .unwrap();
        let BearerToken(parsed) = BearerToken::from_request_parts(&mut parts(Some(&header)), &state)
            .await
            .unwrap();

        assert_eq!(viewer.user(), Some(&user));
        assert_eq!(parsed, token);
    }

    #[tokio::test]
    async fn unknown_tokens_are_not_sessions() {
        let state = test_support::state();
        let header = format!("Bearer {}", AuthToken::generate_random(5.into()).as_token_str());

        let viewer = Viewer::from_request_parts(&mut parts(Some(&header)), &state)
            .await
            .unwrap();

        assert_eq!(viewer, Viewer(None));
    }

    #[tokio::test]
    async fn malformed_tokens_are_rejected() {
        let state = test_support::state();

        let result = Viewer::from_request_parts(&mut parts(Some("Bearer nonsense")), &state).await;
        assert_matches!(result, Err(ServerError::InvalidAuthToken(_)));

        let result =
            BearerToken::from_request_parts(&mut parts(Some("Bearer nonsense")), &state).await;
        assert_matches!(result, Err(ServerError::InvalidAuthToken(_)));
    }

    #[tokio::test]
    async fn bearer_tokens_are_required() {
        let state = test_support::state();

        let missing = BearerToken::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap_err();

        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }
}

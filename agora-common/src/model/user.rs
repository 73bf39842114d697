use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

pub const USER_HANDLE_MAX_LEN: usize = 50;
pub const ANONYMOUS_AUTHOR_NAME: &str = "Anonymous";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub handle: UserHandle,
    pub avatar_url: Option<String>,
}

impl User {
    /// Name stamped onto comments written by this user.
    #[must_use]
    pub fn author_name(&self) -> &str {
        let handle = self.handle.get().trim();
        if handle.is_empty() {
            ANONYMOUS_AUTHOR_NAME
        } else {
            handle
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Github,
    Google,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Unknown auth provider: {0}")]
pub struct UnknownAuthProviderError(String);

impl AuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuthProvider::Github => "github",
            AuthProvider::Google => "google",
        }
    }
}

impl Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = UnknownAuthProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(AuthProvider::Github),
            "google" => Ok(AuthProvider::Google),
            other => Err(UnknownAuthProviderError(other.to_owned())),
        }
    }
}

/// What an auth provider tells us about the person signing in.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct ProviderIdentity {
    pub provider: AuthProvider,
    pub provider_user_id: String,
    pub handle: UserHandle,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserHandle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user handle is invalid: {0}")]
pub struct InvalidUserHandleError(String);

impl UserHandle {
    pub fn new(handle: String) -> Result<Self, InvalidUserHandleError> {
        if handle.chars().count() <= USER_HANDLE_MAX_LEN {
            Ok(UserHandle(handle))
        } else {
            Err(InvalidUserHandleError(handle))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for UserHandle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserHandle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserHandle"))
    }
}

#[cfg(test)]
mod tests {
    use super::{ANONYMOUS_AUTHOR_NAME, AuthProvider, User, UserHandle};
    use claims::assert_err;

    #[test]
    fn blank_handles_author_as_anonymous() {
        let mut user = User {
            id: 7.into(),
            handle: UserHandle::new("  ".into()).unwrap(),
            avatar_url: None,
        };
        assert_eq!(user.author_name(), ANONYMOUS_AUTHOR_NAME);

        user.handle = UserHandle::new("ferris".into()).unwrap();
        assert_eq!(user.author_name(), "ferris");
    }

    #[test]
    fn handles_have_a_length_limit() {
        assert_err!(UserHandle::new("x".repeat(51)));
    }

    #[test]
    fn providers_parse_by_name() {
        assert_eq!("github".parse(), Ok(AuthProvider::Github));
        assert_eq!("google".parse(), Ok(AuthProvider::Google));
        assert_err!("myspace".parse::<AuthProvider>());
    }
}

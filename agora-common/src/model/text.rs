//! Trimmed, non-empty text fields submitted by users.

use serde::{Deserialize, Deserializer, Serialize, de::Error};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const POST_TITLE_MAX_LEN: usize = 300;
pub const POST_BODY_MAX_LEN: usize = 40_000;
pub const COMMENT_CONTENT_MAX_LEN: usize = 5_000;
pub const COMMUNITY_NAME_MAX_LEN: usize = 100;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidTextError {
    #[error("{field} is required")]
    Empty { field: &'static str },
    #[error("{field} is too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },
}

macro_rules! required_text {
    ($(#[$meta:meta])* $name:ident: $field:literal, max_len = $max_len:ident) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(text: impl AsRef<str>) -> Result<Self, InvalidTextError> {
                let trimmed = text.as_ref().trim();

                if trimmed.is_empty() {
                    return Err(InvalidTextError::Empty { field: $field });
                }
                if trimmed.chars().count() > $max_len {
                    return Err(InvalidTextError::TooLong {
                        field: $field,
                        max: $max_len,
                    });
                }

                Ok(Self(trimmed.to_owned()))
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

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let inner = String::deserialize(deserializer)?;
                $name::new(inner).map_err(Error::custom)
            }
        }
    };
}

required_text!(PostTitle: "title", max_len = POST_TITLE_MAX_LEN);
required_text!(PostBody: "content", max_len = POST_BODY_MAX_LEN);
required_text!(
    /// Body of a comment or a reply.
    CommentContent: "comment", max_len = COMMENT_CONTENT_MAX_LEN
);
required_text!(CommunityName: "community name", max_len = COMMUNITY_NAME_MAX_LEN);

use crate::model::{Id, post::Post, text::CommunityName};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommunityMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Community {
    pub id: Id<CommunityMarker>,
    pub name: CommunityName,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateCommunity {
    pub name: CommunityName,
    #[serde(default)]
    pub description: String,
}

/// A community together with its posts, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CommunityPage {
    pub community: Community,
    pub posts: Vec<Post>,
}

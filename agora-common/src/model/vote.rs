use crate::model::{Id, post::PostMarker, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{Error, Unexpected},
};
use thiserror::Error;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct VoteMarker;

/// Polarity of a vote, `+1` or `-1` on the wire and in the database.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum VoteValue {
    Up,
    Down,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Vote value must be 1 or -1, got {0}")]
pub struct InvalidVoteValueError(i64);

impl VoteValue {
    #[must_use]
    pub fn get(self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(InvalidVoteValueError(other)),
        }
    }
}

impl TryFrom<i16> for VoteValue {
    type Error = InvalidVoteValueError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        i64::from(value).try_into()
    }
}

impl Serialize for VoteValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i16(self.get())
    }
}

impl<'de> Deserialize<'de> for VoteValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = i64::deserialize(deserializer)?;
        VoteValue::try_from(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Signed(inner), &"1 or -1"))
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Vote {
    pub id: Id<VoteMarker>,
    pub post_id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
    pub value: VoteValue,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CastVote {
    pub value: VoteValue,
}

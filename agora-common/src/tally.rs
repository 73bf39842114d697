//! Vote counting and the toggle rules for casting a vote.

use crate::model::{
    Id,
    user::UserMarker,
    vote::{Vote, VoteMarker, VoteValue},
};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct VoteSummary {
    pub likes: u64,
    pub dislikes: u64,
    pub viewer_vote: Option<VoteValue>,
}

/// Counts the votes of a post and picks out the viewer's own vote, if any.
#[must_use]
pub fn summarize_votes(votes: &[Vote], viewer: Option<Id<UserMarker>>) -> VoteSummary {
    votes
        .iter()
        .fold(VoteSummary::default(), |mut summary, vote| {
            match vote.value {
                VoteValue::Up => summary.likes += 1,
                VoteValue::Down => summary.dislikes += 1,
            }
            if viewer == Some(vote.user_id) {
                summary.viewer_vote = Some(vote.value);
            }
            summary
        })
}

/// The write needed to apply a cast on top of the stored vote.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum VoteAction {
    Insert(VoteValue),
    Update {
        vote: Id<VoteMarker>,
        value: VoteValue,
    },
    /// Casting the stored polarity again withdraws the vote.
    Delete { vote: Id<VoteMarker> },
}

impl VoteAction {
    #[must_use]
    pub fn resolve(existing: Option<&Vote>, cast: VoteValue) -> Self {
        match existing {
            None => VoteAction::Insert(cast),
            Some(vote) if vote.value == cast => VoteAction::Delete { vote: vote.id },
            Some(vote) => VoteAction::Update {
                vote: vote.id,
                value: cast,
            },
        }
    }

    /// The user's vote once this action is applied.
    #[must_use]
    pub fn resulting_vote(self) -> Option<VoteValue> {
        match self {
            VoteAction::Insert(value) | VoteAction::Update { value, .. } => Some(value),
            VoteAction::Delete { .. } => None,
        }
    }
}

/// What a cast did, as reported back to the voter.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Inserted,
    Updated,
    Deleted,
}

/// Reply to a cast: what happened and where the voter now stands.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    pub viewer_vote: Option<VoteValue>,
}

impl From<VoteAction> for VoteReceipt {
    fn from(action: VoteAction) -> Self {
        Self {
            outcome: action.into(),
            viewer_vote: action.resulting_vote(),
        }
    }
}

impl From<VoteAction> for VoteOutcome {
    fn from(action: VoteAction) -> Self {
        match action {
            VoteAction::Insert(_) => VoteOutcome::Inserted,
            VoteAction::Update { .. } => VoteOutcome::Updated,
            VoteAction::Delete { .. } => VoteOutcome::Deleted,
        }
    }
}

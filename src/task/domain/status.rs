//! Task lifecycle statuses and the table of legal edges between them.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Registered with no outstanding prerequisites; work not yet scheduled.
    Todo,
    /// Waiting on at least one dependency that has not reached `Done`.
    Blocked,
    /// Prerequisites satisfied; may be picked up.
    Ready,
    /// The single task being actively worked.
    InProgress,
    /// Submitted for review.
    Review,
    /// Approved. Terminal.
    Done,
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Todo,
        Self::Blocked,
        Self::Ready,
        Self::InProgress,
        Self::Review,
        Self::Done,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }

    /// Returns `true` for `Done`, which has no outgoing edge.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns `true` for statuses that require every dependency to be
    /// `Done`.
    #[must_use]
    pub const fn requires_satisfied_dependencies(self) -> bool {
        matches!(
            self,
            Self::Ready | Self::InProgress | Self::Review | Self::Done
        )
    }

    /// Looks up the lifecycle edge from `self` to `target`.
    ///
    /// Returns `None` when the pair is not in the transition table.
    #[must_use]
    pub const fn edge_to(self, target: Self) -> Option<TransitionEdge> {
        match (self, target) {
            (Self::Todo | Self::Blocked, Self::Ready) => Some(TransitionEdge::Unblock),
            (Self::Ready, Self::InProgress) => Some(TransitionEdge::Start),
            (Self::InProgress, Self::Review) => Some(TransitionEdge::Submit),
            (Self::Review, Self::Done) => Some(TransitionEdge::Approve),
            (Self::Review, Self::InProgress) => Some(TransitionEdge::Rework),
            (Self::Todo | Self::Ready | Self::InProgress | Self::Review, Self::Blocked) => {
                Some(TransitionEdge::Block)
            }
            _ => None,
        }
    }

    /// Returns `true` when `target` is reachable in one step.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        self.edge_to(target).is_some()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // Case and separators are ignored: `InProgress` matches `in_progress`.
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| !matches!(ch, '_' | '-' | ' '))
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "todo" => Ok(Self::Todo),
            "blocked" => Ok(Self::Blocked),
            "ready" => Ok(Self::Ready),
            "inprogress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

/// A legal lifecycle edge, named by what it does.
///
/// Each edge carries its own guard; see [`super::plan_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEdge {
    /// `Todo`/`Blocked` to `Ready`; guarded by the dependency resolver.
    Unblock,
    /// `Ready` to `InProgress`; guarded by the activity guard.
    Start,
    /// `InProgress` to `Review`.
    Submit,
    /// `Review` to `Done`; triggers the unblock cascade.
    Approve,
    /// `Review` back to `InProgress`; the same task re-occupies the slot.
    Rework,
    /// Any non-`Done` status to `Blocked`; only while dependencies are unmet.
    Block,
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use devbrief_core::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CollaboratorError;

/// One problem the evaluator found in a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub area: String,
    pub description: String,
}

/// Evaluator verdict on a single draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Quality score on a 0–10 scale.
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl Evaluation {
    /// Reject scores that are not finite or fall outside `0..=10`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidScore`] for an out-of-range score.
    pub fn validated(self) -> Result<Self, CollaboratorError> {
        if self.score.is_finite() && (0.0..=10.0).contains(&self.score) {
            Ok(self)
        } else {
            Err(CollaboratorError::InvalidScore(self.score))
        }
    }
}

/// Critique of a rejected attempt, handed to the next attempt of the same run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub run_id: Uuid,
    /// The attempt that was rejected.
    pub attempt: u32,
    pub score: f64,
    pub issues: Vec<Issue>,
}

/// A completed draft/evaluate cycle. Never modified after it is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub draft: String,
    pub score: f64,
    pub issues: Vec<Issue>,
    /// Attempt whose feedback the generator saw, if any.
    pub feedback_from: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefingStatus {
    InProgress,
    Approved,
    /// Attempt budget spent without an approved draft; the last draft is
    /// still the run's output.
    Exhausted,
    /// A collaborator call failed and the run stopped early.
    Aborted,
}

impl BriefingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BriefingStatus::InProgress => "in_progress",
            BriefingStatus::Approved => "approved",
            BriefingStatus::Exhausted => "exhausted",
            BriefingStatus::Aborted => "aborted",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, BriefingStatus::InProgress)
    }
}

impl fmt::Display for BriefingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BriefingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(BriefingStatus::InProgress),
            "approved" => Ok(BriefingStatus::Approved),
            "exhausted" => Ok(BriefingStatus::Exhausted),
            "aborted" => Ok(BriefingStatus::Aborted),
            other => Err(format!("unknown briefing status '{other}'")),
        }
    }
}

/// One briefing run: its attempt log and outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Briefing {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: BriefingStatus,
    /// Entities the briefing context put forward.
    pub featured: Vec<EntityId>,
    attempts: Vec<AttemptRecord>,
}

impl Briefing {
    #[must_use]
    pub fn start(run_id: Uuid, started_at: DateTime<Utc>, featured: Vec<EntityId>) -> Self {
        Self {
            run_id,
            started_at,
            status: BriefingStatus::InProgress,
            featured,
            attempts: Vec::new(),
        }
    }

    /// Completed attempts, oldest first.
    #[must_use]
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    #[must_use]
    pub fn latest(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }

    /// The draft the run delivers: the latest attempt's, approved or not.
    #[must_use]
    pub fn final_draft(&self) -> Option<&str> {
        self.latest().map(|a| a.draft.as_str())
    }

    #[must_use]
    pub fn final_score(&self) -> Option<f64> {
        self.latest().map(|a| a.score)
    }

    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == BriefingStatus::Approved
    }

    pub(crate) fn record(&mut self, attempt: AttemptRecord) {
        self.attempts.push(attempt);
    }
}

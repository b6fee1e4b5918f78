//! Bounded draft → evaluate → revise loop.
//!
//! A run moves through [`LoopState`]s:
//!
//! ```text
//! Drafting ──► Evaluating ──► Approved
//!    ▲             │
//!    │             ├──► Revising ──► Drafting (attempt + 1)
//!    │             │
//!    └─────────────┴──► Exhausted
//! ```
//!
//! The branch taken after each evaluation is chosen by [`decide`], a pure
//! function of the score, the attempt number and the [`LoopPolicy`]. The
//! attempt number strictly increases and is capped by the policy, so every
//! run ends after at most `max_attempts` cycles.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::collaborator::{Evaluator, GenerationRequest, Generator};
use crate::context::BriefingContext;
use crate::error::{CollaboratorError, PolicyError, RunAborted, Stage};
use crate::types::{AttemptRecord, Briefing, BriefingStatus, Feedback};

/// Approval threshold, attempt budget and per-call time limit for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPolicy {
    approval_threshold: f64,
    max_attempts: u32,
    call_timeout: Option<Duration>,
}

impl LoopPolicy {
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the threshold is not within `0..=10` or
    /// `max_attempts` is zero.
    pub fn new(approval_threshold: f64, max_attempts: u32) -> Result<Self, PolicyError> {
        if !approval_threshold.is_finite() || !(0.0..=10.0).contains(&approval_threshold) {
            return Err(PolicyError::ThresholdOutOfRange(approval_threshold));
        }
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            approval_threshold,
            max_attempts,
            call_timeout: None,
        })
    }

    /// Limit each generation and evaluation call to `timeout`.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn approval_threshold(&self) -> f64 {
        self.approval_threshold
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            approval_threshold: 7.5,
            max_attempts: 3,
            call_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Drafting,
    Evaluating,
    Revising,
    Approved,
    Exhausted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Drafting => "drafting",
            LoopState::Evaluating => "evaluating",
            LoopState::Revising => "revising",
            LoopState::Approved => "approved",
            LoopState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

/// What to do once an attempt has been scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Revise,
    Exhaust,
}

impl Decision {
    /// State entered after this decision.
    #[must_use]
    pub fn next_state(self) -> LoopState {
        match self {
            Decision::Approve => LoopState::Approved,
            Decision::Revise => LoopState::Revising,
            Decision::Exhaust => LoopState::Exhausted,
        }
    }
}

/// Transition out of `Evaluating` for attempt number `attempt` (1-based).
#[must_use]
pub fn decide(score: f64, attempt: u32, policy: &LoopPolicy) -> Decision {
    if score >= policy.approval_threshold {
        Decision::Approve
    } else if attempt < policy.max_attempts {
        Decision::Revise
    } else {
        Decision::Exhaust
    }
}

/// Drives one briefing run against a generator and an evaluator.
pub struct FeedbackLoop<G, E> {
    generator: G,
    evaluator: E,
    policy: LoopPolicy,
}

impl<G, E> FeedbackLoop<G, E>
where
    G: Generator,
    E: Evaluator,
{
    pub fn new(generator: G, evaluator: E, policy: LoopPolicy) -> Self {
        Self {
            generator,
            evaluator,
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &LoopPolicy {
        &self.policy
    }

    /// Run the loop under a fresh run id.
    ///
    /// # Errors
    ///
    /// See [`FeedbackLoop::run_with_id`].
    pub async fn run(
        &self,
        context: &BriefingContext,
        cancel: &CancellationToken,
    ) -> Result<Briefing, Box<RunAborted>> {
        self.run_with_id(Uuid::new_v4(), context, cancel).await
    }

    /// Run the loop until a draft is approved or the attempt budget is spent.
    ///
    /// Returns the briefing in [`BriefingStatus::Approved`] or
    /// [`BriefingStatus::Exhausted`]. Exhaustion is not an error: the last
    /// draft is the run's output, marked unapproved.
    ///
    /// # Errors
    ///
    /// Returns [`RunAborted`] when a collaborator call fails, times out, is
    /// cancelled, or the evaluator returns an invalid score. Attempts that
    /// completed before the failure are kept in the returned briefing.
    pub async fn run_with_id(
        &self,
        run_id: Uuid,
        context: &BriefingContext,
        cancel: &CancellationToken,
    ) -> Result<Briefing, Box<RunAborted>> {
        let mut briefing = Briefing::start(run_id, Utc::now(), context.featured.clone());
        let mut attempt: u32 = 1;
        let mut feedback: Option<Feedback> = None;
        let mut state = LoopState::Drafting;

        tracing::info!(
            %run_id,
            threshold = self.policy.approval_threshold,
            max_attempts = self.policy.max_attempts,
            "briefing run started"
        );

        loop {
            debug_assert_eq!(state, LoopState::Drafting);
            let request = GenerationRequest {
                run_id,
                attempt,
                context,
                feedback: feedback.as_ref(),
            };
            let draft = match self
                .guarded(Stage::Generation, cancel, self.generator.generate(request))
                .await
            {
                Ok(draft) => draft,
                Err(error) => return Err(abort(briefing, None, error)),
            };

            state = self.transition(run_id, attempt, state, LoopState::Evaluating);
            let evaluation = match self
                .guarded(Stage::Evaluation, cancel, self.evaluator.evaluate(&draft))
                .await
                .and_then(crate::types::Evaluation::validated)
            {
                Ok(evaluation) => evaluation,
                Err(error) => return Err(abort(briefing, Some(draft), error)),
            };

            let score = evaluation.score;
            briefing.record(AttemptRecord {
                attempt,
                draft,
                score,
                issues: evaluation.issues.clone(),
                feedback_from: feedback.as_ref().map(|f| f.attempt),
                completed_at: Utc::now(),
            });

            let decision = decide(score, attempt, &self.policy);
            tracing::info!(%run_id, attempt, score, ?decision, "attempt scored");
            state = self.transition(run_id, attempt, state, decision.next_state());

            match decision {
                Decision::Approve => {
                    briefing.status = BriefingStatus::Approved;
                    return Ok(briefing);
                }
                Decision::Exhaust => {
                    tracing::warn!(
                        %run_id,
                        attempts = attempt,
                        final_score = score,
                        "attempt budget spent without approval; delivering last draft"
                    );
                    briefing.status = BriefingStatus::Exhausted;
                    return Ok(briefing);
                }
                Decision::Revise => {
                    feedback = Some(Feedback {
                        run_id,
                        attempt,
                        score,
                        issues: evaluation.issues,
                    });
                    attempt += 1;
                    state = self.transition(run_id, attempt, state, LoopState::Drafting);
                }
            }
        }
    }

    fn transition(&self, run_id: Uuid, attempt: u32, from: LoopState, to: LoopState) -> LoopState {
        tracing::debug!(%run_id, attempt, max_attempts = self.policy.max_attempts, %from, %to, "state transition");
        to
    }

    /// Apply the per-call timeout and cancellation to a collaborator call.
    async fn guarded<T, F>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let limited = async {
            match self.policy.call_timeout {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(result) => result,
                    Err(_) => Err(CollaboratorError::Timeout { stage, after }),
                },
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CollaboratorError::Cancelled { stage }),
            result = limited => result,
        }
    }
}

fn abort(mut briefing: Briefing, pending_draft: Option<String>, error: CollaboratorError) -> Box<RunAborted> {
    tracing::error!(
        run_id = %briefing.run_id,
        completed_attempts = briefing.attempts().len(),
        error = %error,
        "briefing run aborted"
    );
    briefing.status = BriefingStatus::Aborted;
    Box::new(RunAborted {
        briefing,
        pending_draft,
        error,
    })
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

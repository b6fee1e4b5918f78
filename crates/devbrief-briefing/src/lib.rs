//! Briefing generation: the draft → evaluate → revise loop and the LLM
//! collaborators it drives.
//!
//! [`FeedbackLoop`] owns one run end to end. It asks a [`Generator`] for a
//! draft, hands it to an [`Evaluator`], and either accepts it, feeds the
//! critique into the next attempt, or stops once the attempt budget is spent.
//! [`GeminiClient`] implements both collaborator traits over the Gemini REST
//! API; tests substitute scripted implementations.

pub mod collaborator;
pub mod context;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod types;

pub use collaborator::{Evaluator, GenerationRequest, Generator};
pub use context::{BriefingContext, DiscussedEntity, StorySummary};
pub use controller::{decide, Decision, FeedbackLoop, LoopPolicy, LoopState};
pub use error::{CollaboratorError, PolicyError, RunAborted, Stage};
pub use gemini::GeminiClient;
pub use types::{AttemptRecord, Briefing, BriefingStatus, Evaluation, Feedback, Issue};

use std::future::Future;

use uuid::Uuid;

use crate::context::BriefingContext;
use crate::error::CollaboratorError;
use crate::types::{Evaluation, Feedback};

/// Input for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub run_id: Uuid,
    pub attempt: u32,
    pub context: &'a BriefingContext,
    /// Critique of the previous attempt. `None` on the first attempt.
    pub feedback: Option<&'a Feedback>,
}

/// Produces briefing drafts.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send;
}

/// Scores briefing drafts.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        draft: &str,
    ) -> impl Future<Output = Result<Evaluation, CollaboratorError>> + Send;
}

impl<T: Generator> Generator for &T {
    fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send {
        (**self).generate(request)
    }
}

impl<T: Evaluator> Evaluator for &T {
    fn evaluate(
        &self,
        draft: &str,
    ) -> impl Future<Output = Result<Evaluation, CollaboratorError>> + Send {
        (**self).evaluate(draft)
    }
}

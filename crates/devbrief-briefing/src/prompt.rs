use std::fmt::Write as _;

use crate::collaborator::GenerationRequest;
use crate::error::CollaboratorError;
use crate::types::Feedback;

const GENERATION_RULES: &str = "\
Rules:
1. Do not speculate. Ground every claim in the README excerpts, metrics and posts provided.
2. Use the social signals: quote points, upvotes and comment counts where relevant.
3. Use the trend data: lead with rising repositories, mention cooling ones briefly.
4. Repositories listed under previously_featured get a one-line update at most.
5. Keep it short: one or two sentences per project.
6. Friendly, dry and a little witty. No corporate tone.
7. Emoji are fine, sparingly.";

const GENERATION_FORMAT: &str = "\
Format (Markdown):
# Today's Developer Briefing

## Project of the Day: <name>
<what it is, why it matters, how fast it is growing, where it is being discussed>

## This Week's Trends
- **Breaking out:** <fastest rising project>
- **Most discussed:** <most mentioned project, and where>
- **New find:** <newcomer worth a look>

## On Hacker News
<3-5 notable stories with points and comment counts>

## On Reddit
<notable posts by subreddit with upvotes>

## Worth a Look on GitHub
- **<project>** (<language>): <one sentence>

## Takeaway
<one or two sentences>";

const EVALUATION_RUBRIC: &str = "\
Score the briefing below from 0 to 10 on these criteria:
1. Brevity: long-winded sections lose points.
2. Tone: friendly and direct; formal or corporate language loses points.
3. Wit: dry and dull writing loses points.
4. Substance: it must carry concrete technical content and figures from the data.

Respond with JSON only, in this shape:
{\"score\": <number 0-10>, \"issues\": [{\"area\": \"<criterion>\", \"description\": \"<what to fix>\"}]}
List issues only for problems worth fixing; use an empty list for none.";

/// Prompt for one generation attempt, including the previous attempt's
/// critique when there is one.
///
/// # Errors
///
/// Returns [`CollaboratorError::Deserialize`] if the context cannot be
/// serialised to JSON.
pub fn generation_prompt(request: &GenerationRequest<'_>) -> Result<String, CollaboratorError> {
    let context_json = request
        .context
        .to_json()
        .map_err(|e| CollaboratorError::Deserialize {
            context: "briefing context".to_string(),
            source: e,
        })?;

    let mut prompt = String::new();
    prompt.push_str(
        "You write a daily briefing for software developers about what is trending on \
         GitHub, Hacker News and Reddit.\n\n",
    );
    let _ = writeln!(
        prompt,
        "Data for {} (JSON):\n```json\n{context_json}\n```\n",
        request.context.generated_on
    );

    if let Some(feedback) = request.feedback {
        prompt.push_str(&revision_section(feedback));
    }

    prompt.push_str(GENERATION_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(GENERATION_FORMAT);
    prompt.push('\n');
    Ok(prompt)
}

fn revision_section(feedback: &Feedback) -> String {
    let mut section = format!(
        "Your previous draft (attempt {}) scored {:.1}/10 and was sent back. Fix these issues:\n",
        feedback.attempt, feedback.score
    );
    if feedback.issues.is_empty() {
        section.push_str("- No specific issues were listed; tighten and liven up the whole draft.\n");
    }
    for issue in &feedback.issues {
        let _ = writeln!(section, "- [{}] {}", issue.area, issue.description);
    }
    section.push('\n');
    section
}

#[must_use]
pub fn evaluation_prompt(draft: &str) -> String {
    format!("{EVALUATION_RUBRIC}\n\nBRIEFING:\n{draft}\n")
}

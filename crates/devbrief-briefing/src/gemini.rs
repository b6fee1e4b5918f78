//! Generator and evaluator backed by the Gemini `generateContent` REST API.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::collaborator::{Evaluator, GenerationRequest, Generator};
use crate::error::CollaboratorError;
use crate::prompt::{evaluation_prompt, generation_prompt};
use crate::types::Evaluation;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for the Gemini REST API.
///
/// One client serves as both [`Generator`] and [`Evaluator`]. Use
/// [`GeminiClient::new`] for production or [`GeminiClient::with_base_url`] to
/// point at a mock server in tests.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiClient {
    /// Creates a client pointed at the production Gemini API.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, CollaboratorError> {
        Self::with_base_url(api_key, model, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`CollaboratorError::InvalidBaseUrl`] if `base_url` does not
    /// parse.
    pub fn with_base_url(
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("devbrief/0.1 (daily-briefing)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| CollaboratorError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Result<Url, CollaboratorError> {
        self.base_url
            .join(&format!("v1beta/models/{}:generateContent", self.model))
            .map_err(|e| CollaboratorError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sends one prompt and returns the concatenated text of the first
    /// candidate.
    async fn generate_content(&self, prompt: &str, json_output: bool) -> Result<String, CollaboratorError> {
        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: json_output.then_some(GenerationConfig {
                response_mime_type: "application/json",
            }),
        };

        let response = self
            .client
            .post(self.endpoint()?)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or_else(|_| text.chars().take(200).collect(), |e| e.error.message);
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| CollaboratorError::Deserialize {
                context: format!("generateContent(model={})", self.model),
                source: e,
            })?;

        let output: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if output.trim().is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(output)
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, CollaboratorError> {
        let prompt = generation_prompt(&request)?;
        tracing::debug!(
            run_id = %request.run_id,
            attempt = request.attempt,
            revision = request.feedback.is_some(),
            prompt_chars = prompt.len(),
            "requesting draft"
        );
        self.generate_content(&prompt, false).await
    }
}

impl Evaluator for GeminiClient {
    async fn evaluate(&self, draft: &str) -> Result<Evaluation, CollaboratorError> {
        let raw = self.generate_content(&evaluation_prompt(draft), true).await?;
        parse_evaluation(&raw)
    }
}

/// Parse the evaluator's JSON reply, tolerating a Markdown code fence around it.
///
/// # Errors
///
/// Returns [`CollaboratorError::Deserialize`] when the reply is not the
/// expected `{score, issues}` object.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, CollaboratorError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(|e| CollaboratorError::Deserialize {
        context: "evaluation reply".to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_model() {
        let client =
            GeminiClient::with_base_url("k", "gemini-2.0-flash", 30, "https://example.test/").unwrap();
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = GeminiClient::with_base_url("k", "m", 30, "not a url");
        assert!(matches!(result, Err(CollaboratorError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn parse_evaluation_plain_and_fenced() {
        let plain = parse_evaluation(r#"{"score": 7.5, "issues": []}"#).unwrap();
        assert!((plain.score - 7.5).abs() < f64::EPSILON);

        let fenced = parse_evaluation(
            "```json\n{\"score\": 4, \"issues\": [{\"area\": \"tone\", \"description\": \"stiff\"}]}\n```",
        )
        .unwrap();
        assert_eq!(fenced.issues.len(), 1);
        assert_eq!(fenced.issues[0].area, "tone");
    }

    #[test]
    fn parse_evaluation_rejects_prose() {
        let err = parse_evaluation("Looks great, 9/10!").unwrap_err();
        assert!(matches!(err, CollaboratorError::Deserialize { .. }));
    }
}

//! `brief` command: run the feedback loop over today's context and store
//! the outcome.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use devbrief_briefing::{
    prompt::generation_prompt, AttemptRecord, Briefing, BriefingContext, BriefingStatus,
    FeedbackLoop, GeminiClient, GenerationRequest, LoopPolicy,
};
use devbrief_core::AppConfig;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::fail_run_best_effort;

/// Stories captured within this many hours feed the briefing.
const CONTENT_LOOKBACK_HOURS: i64 = 36;

#[derive(Debug, Clone)]
pub(crate) struct BriefOptions {
    pub dry_run: bool,
    /// Overrides `DEVBRIEF_REPORT_PATH`.
    pub output: Option<PathBuf>,
    pub trigger: &'static str,
}

/// Assemble the briefing context for `today` from stored data.
async fn load_context(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    today: NaiveDate,
) -> anyhow::Result<BriefingContext> {
    let report = crate::trends::load_trend_report(pool, config, today).await?;
    let since = Utc::now() - Duration::hours(CONTENT_LOOKBACK_HOURS);
    let items = devbrief_db::list_content_items_since(pool, since).await?;
    let mentions = devbrief_db::list_mentions_since(pool, since).await?;
    tracing::info!(
        tracked = report.rows.len(),
        items = items.len(),
        mentions = mentions.len(),
        "briefing context loaded"
    );
    Ok(BriefingContext::assemble(today, report, &items, &mentions))
}

/// Generate, review and persist today's briefing.
///
/// An exhausted run still writes its last draft; it is logged as unapproved.
///
/// # Errors
///
/// Returns an error if there is nothing to brief, `GEMINI_API_KEY` is unset,
/// the loop policy is invalid, a collaborator call aborts the run, or a
/// database or file write fails.
pub(crate) async fn run_brief(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    options: &BriefOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let context = load_context(pool, config, today).await?;
    if context.report.rows.is_empty() && context.hacker_news.is_empty() && context.reddit.is_empty()
    {
        anyhow::bail!("no stored data for today's briefing; run `collect` first");
    }

    if options.dry_run {
        let prompt = generation_prompt(&GenerationRequest {
            run_id: Uuid::new_v4(),
            attempt: 1,
            context: &context,
            feedback: None,
        })?;
        println!("{prompt}");
        return Ok(());
    }

    let api_key = config
        .gemini_api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set; it is required by `brief`"))?;
    let client = GeminiClient::with_base_url(
        api_key,
        &config.llm_model,
        config.llm_timeout_secs,
        &config.llm_base_url,
    )?;
    let policy = loop_policy(config)?;
    let feedback_loop = FeedbackLoop::new(&client, &client, policy);

    let run = devbrief_db::create_collection_run(pool, "brief", options.trigger).await?;
    if let Err(e) = devbrief_db::start_collection_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, "brief", format!("{e:#}")).await;
        return Err(e.into());
    }

    let run_id = Uuid::new_v4();
    let stored = devbrief_db::create_briefing(
        pool,
        run_id,
        policy.approval_threshold(),
        i32::try_from(policy.max_attempts())?,
        Utc::now(),
    )
    .await?;

    match feedback_loop.run_with_id(run_id, &context, cancel).await {
        Ok(briefing) => {
            let result = deliver(pool, config, options, stored.id, &briefing, today).await;
            match result {
                Ok(path) => {
                    let attempts = i32::try_from(briefing.attempts().len()).unwrap_or(i32::MAX);
                    devbrief_db::complete_collection_run(pool, run.id, attempts).await?;
                    print_status(&briefing, &path);
                    Ok(())
                }
                Err(e) => {
                    fail_run_best_effort(pool, run.id, "brief", format!("{e:#}")).await;
                    Err(e)
                }
            }
        }
        Err(aborted) => {
            let message = aborted.error.to_string();
            if let Err(e) = store_attempts(pool, stored.id, aborted.briefing.attempts()).await {
                tracing::error!(%run_id, error = %e, "failed to store attempts of aborted run");
            }
            let finish = devbrief_db::FinishBriefing {
                status: BriefingStatus::Aborted.as_str(),
                final_draft: aborted.briefing.final_draft(),
                final_score: aborted.briefing.final_score(),
                error_message: Some(&message),
            };
            if let Err(e) = devbrief_db::finish_briefing(pool, stored.id, &finish).await {
                tracing::error!(%run_id, error = %e, "failed to mark briefing aborted");
            }
            fail_run_best_effort(pool, run.id, "brief", message).await;
            Err(anyhow::Error::from(aborted).context("briefing run aborted"))
        }
    }
}

/// Threshold and budget from config; every LLM call is bounded by
/// `DEVBRIEF_LLM_TIMEOUT_SECS`.
fn loop_policy(config: &AppConfig) -> anyhow::Result<LoopPolicy> {
    let policy = LoopPolicy::new(config.approval_threshold, config.max_attempts)?
        .with_call_timeout(std::time::Duration::from_secs(config.llm_timeout_secs));
    Ok(policy)
}

/// Persist a terminal briefing and write its final draft to disk.
async fn deliver(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    options: &BriefOptions,
    briefing_id: i64,
    briefing: &Briefing,
    today: NaiveDate,
) -> anyhow::Result<PathBuf> {
    let draft = briefing
        .final_draft()
        .ok_or_else(|| anyhow::anyhow!("briefing {} finished without a draft", briefing.run_id))?;

    store_attempts(pool, briefing_id, briefing.attempts()).await?;
    devbrief_db::finish_briefing(
        pool,
        briefing_id,
        &devbrief_db::FinishBriefing {
            status: briefing.status.as_str(),
            final_draft: Some(draft),
            final_score: briefing.final_score(),
            error_message: None,
        },
    )
    .await?;

    let keys: Vec<String> = briefing
        .featured
        .iter()
        .map(|id| id.as_str().to_string())
        .collect();
    let linked = devbrief_db::mark_featured(pool, briefing_id, &keys, today).await?;
    tracing::debug!(featured = linked, "featured entities recorded");

    let path = options
        .output
        .clone()
        .unwrap_or_else(|| config.report_path.clone());
    write_report(&path, draft).await?;
    Ok(path)
}

async fn store_attempts(
    pool: &sqlx::PgPool,
    briefing_id: i64,
    attempts: &[AttemptRecord],
) -> anyhow::Result<()> {
    for record in attempts {
        let issues = serde_json::to_value(&record.issues)?;
        let feedback_from = record.feedback_from.map(i32::try_from).transpose()?;
        devbrief_db::record_briefing_attempt(
            pool,
            briefing_id,
            &devbrief_db::NewBriefingAttempt {
                attempt: i32::try_from(record.attempt)?,
                draft: &record.draft,
                score: record.score,
                issues: &issues,
                feedback_from,
                completed_at: record.completed_at,
            },
        )
        .await?;
    }
    Ok(())
}

async fn write_report(path: &Path, draft: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, draft)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn status_line(status: BriefingStatus, attempts: usize, score: Option<f64>) -> String {
    let score = score.map_or_else(|| "-".to_string(), |s| format!("{s:.1}"));
    format!("status: {status} after {attempts} attempt(s), score {score}")
}

fn print_status(briefing: &Briefing, path: &Path) {
    if !briefing.is_approved() {
        tracing::warn!(
            run_id = %briefing.run_id,
            score = ?briefing.final_score(),
            "briefing was not approved; delivering the last draft"
        );
    }
    println!(
        "{}",
        status_line(
            briefing.status,
            briefing.attempts().len(),
            briefing.final_score()
        )
    );
    println!("report written to {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_reports_outcome() {
        assert_eq!(
            status_line(BriefingStatus::Approved, 2, Some(8.5)),
            "status: approved after 2 attempt(s), score 8.5"
        );
        assert_eq!(
            status_line(BriefingStatus::Exhausted, 3, Some(6.0)),
            "status: exhausted after 3 attempt(s), score 6.0"
        );
    }

    #[test]
    fn status_line_without_attempts() {
        assert_eq!(
            status_line(BriefingStatus::Aborted, 0, None),
            "status: aborted after 0 attempt(s), score -"
        );
    }

    #[test]
    fn loop_policy_carries_llm_timeout() {
        let mut config = crate::tests::test_config();
        config.llm_timeout_secs = 45;
        let policy = loop_policy(&config).expect("valid policy");

        assert_eq!(policy.call_timeout(), Some(std::time::Duration::from_secs(45)));
        assert!((policy.approval_threshold() - 7.5).abs() < f64::EPSILON);
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn loop_policy_rejects_zero_attempts() {
        let mut config = crate::tests::test_config();
        config.max_attempts = 0;
        assert!(loop_policy(&config).is_err());
    }

    #[tokio::test]
    async fn write_report_creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("devbrief-{}", Uuid::new_v4()));
        let path = dir.join("nested").join("final_report.md");

        write_report(&path, "# Daily brief\n")
            .await
            .expect("write should succeed");

        let written = tokio::fs::read_to_string(&path).await.expect("readable");
        assert_eq!(written, "# Daily brief\n");
        tokio::fs::remove_dir_all(&dir).await.expect("cleanup");
    }
}

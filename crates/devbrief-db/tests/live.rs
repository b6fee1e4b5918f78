//! Live integration tests for devbrief-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/devbrief-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use devbrief_core::{ContentItem, ContentSource, Entity, EntityId, ItemKey, MatchBasis, Mention, Snapshot};
use devbrief_db::{
    append_snapshot, complete_collection_run, create_briefing, create_collection_run,
    feature_counts, fail_collection_run, finish_briefing, get_collection_run,
    get_entity_by_key, get_latest_briefing, insert_mention, list_briefing_attempts,
    list_content_items_since, list_entity_snapshots, list_mentions_since,
    list_previously_featured_since, mark_featured, mention_counts_since,
    record_briefing_attempt, start_collection_run, upsert_content_item, upsert_entity, DbError,
    FinishBriefing, NewBriefingAttempt,
};
use devbrief_trends::AppendOutcome;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, d).expect("valid date")
}

fn make_entity(full_name: &str, stars: i64) -> Entity {
    Entity {
        id: EntityId::new(full_name),
        full_name: full_name.to_string(),
        description: Some("test repo".to_string()),
        url: format!("https://github.com/{full_name}"),
        language: Some("Rust".to_string()),
        topics: vec!["cli".to_string()],
        stars,
        forks: 10,
        open_issues: Some(4),
        readme_excerpt: None,
        first_seen_on: None,
    }
}

fn make_item(external_id: &str, score: i64) -> ContentItem {
    ContentItem {
        source: ContentSource::HackerNews,
        external_id: external_id.to_string(),
        title: "Show HN: ripgrep".to_string(),
        body: String::new(),
        url: Some("https://github.com/BurntSushi/ripgrep".to_string()),
        permalink: Some(format!("https://news.ycombinator.com/item?id={external_id}")),
        author: Some("burntsushi".to_string()),
        channel: None,
        score,
        comment_count: 12,
        captured_at: Utc.with_ymd_and_hms(2025, 4, 2, 7, 0, 0).single().expect("valid time"),
    }
}

// ---------------------------------------------------------------------------
// Section 1: Collection Run Lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "collect", "cli")
        .await
        .expect("create_collection_run failed");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    start_collection_run(&pool, run.id)
        .await
        .expect("start_collection_run failed");
    complete_collection_run(&pool, run.id, 5)
        .await
        .expect("complete_collection_run failed");

    let fetched = get_collection_run(&pool, run.id)
        .await
        .expect("get_collection_run failed");
    assert_eq!(fetched.status, "succeeded");
    assert!(fetched.started_at.is_some(), "started_at should be set");
    assert!(fetched.completed_at.is_some(), "completed_at should be set");
    assert_eq!(fetched.records_processed, 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "brief", "scheduler")
        .await
        .expect("create_collection_run failed");
    start_collection_run(&pool, run.id)
        .await
        .expect("start_collection_run failed");
    fail_collection_run(&pool, run.id, "network error")
        .await
        .expect("fail_collection_run failed");

    let fetched = get_collection_run(&pool, run.id)
        .await
        .expect("get_collection_run failed");
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("network error"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_complete_requires_running(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "collect", "cli")
        .await
        .expect("create_collection_run failed");

    let err = complete_collection_run(&pool, run.id, 1)
        .await
        .expect_err("completing a queued run should fail");

    assert!(matches!(
        err,
        DbError::InvalidCollectionRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Section 2: Entities and Snapshots
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_entity_keeps_first_seen_and_readme(pool: sqlx::PgPool) {
    let mut entity = make_entity("BurntSushi/ripgrep", 100);
    entity.readme_excerpt = Some("ripgrep recursively searches".to_string());
    let first = upsert_entity(&pool, &entity, day(1))
        .await
        .expect("first upsert failed");
    assert_eq!(first.entity_key, "burntsushi/ripgrep");

    let mut refreshed = make_entity("BurntSushi/ripgrep", 140);
    refreshed.readme_excerpt = None;
    let second = upsert_entity(&pool, &refreshed, day(3))
        .await
        .expect("second upsert failed");

    assert_eq!(second.id, first.id);
    assert_eq!(second.stars, 140);
    assert_eq!(second.first_seen_on, day(1));
    assert_eq!(second.last_seen_on, day(3));
    assert_eq!(
        second.readme_excerpt.as_deref(),
        Some("ripgrep recursively searches")
    );

    let fetched = get_entity_by_key(&pool, &EntityId::new("burntsushi/ripgrep"))
        .await
        .expect("get_entity_by_key failed")
        .expect("entity should exist");
    assert_eq!(fetched.id, first.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_snapshot_on_same_day_is_ignored(pool: sqlx::PgPool) {
    let entity = make_entity("tokio-rs/axum", 500);
    let row = upsert_entity(&pool, &entity, day(1))
        .await
        .expect("upsert failed");

    let morning = Snapshot {
        entity: entity.id.clone(),
        captured_on: day(1),
        stars: 500,
        forks: 40,
        open_issues: Some(3),
    };
    let evening = Snapshot {
        stars: 520,
        ..morning.clone()
    };
    let next_day = Snapshot {
        captured_on: day(2),
        stars: 530,
        ..morning.clone()
    };

    let first = append_snapshot(&pool, row.id, &morning, None)
        .await
        .expect("append failed");
    let duplicate = append_snapshot(&pool, row.id, &evening, None)
        .await
        .expect("duplicate append failed");
    append_snapshot(&pool, row.id, &next_day, None)
        .await
        .expect("next-day append failed");

    assert_eq!(first, AppendOutcome::Inserted);
    assert_eq!(duplicate, AppendOutcome::Duplicate);

    let series = list_entity_snapshots(&pool, &entity.id, day(1))
        .await
        .expect("list failed");
    let stars: Vec<i64> = series.iter().map(|s| s.stars).collect();
    assert_eq!(stars, vec![500, 530]);
}

// ---------------------------------------------------------------------------
// Section 3: Content Items and Mentions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_content_item_refreshes_engagement(pool: sqlx::PgPool) {
    let first_id = upsert_content_item(&pool, &make_item("41000001", 50))
        .await
        .expect("insert failed");
    let second_id = upsert_content_item(&pool, &make_item("41000001", 180))
        .await
        .expect("update failed");
    assert_eq!(first_id, second_id);

    let since = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().expect("valid time");
    let items = list_content_items_since(&pool, since)
        .await
        .expect("list failed");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].score, 180);
}

#[sqlx::test(migrations = "../../migrations")]
async fn mentions_are_deduplicated_and_counted(pool: sqlx::PgPool) {
    let entity = make_entity("BurntSushi/ripgrep", 100);
    upsert_entity(&pool, &entity, day(2))
        .await
        .expect("upsert entity failed");
    upsert_content_item(&pool, &make_item("41000001", 50))
        .await
        .expect("upsert item failed");
    upsert_content_item(&pool, &make_item("41000002", 20))
        .await
        .expect("upsert item failed");

    let mention = |id: &str, basis| Mention {
        entity: entity.id.clone(),
        item: ItemKey {
            source: ContentSource::HackerNews,
            external_id: id.to_string(),
        },
        basis,
    };

    assert!(insert_mention(&pool, &mention("41000001", MatchBasis::Url))
        .await
        .expect("insert failed"));
    assert!(!insert_mention(&pool, &mention("41000001", MatchBasis::Name))
        .await
        .expect("repeat insert failed"));
    assert!(insert_mention(&pool, &mention("41000002", MatchBasis::Name))
        .await
        .expect("insert failed"));
    assert!(!insert_mention(&pool, &mention("missing", MatchBasis::Url))
        .await
        .expect("unknown item insert failed"));

    let since = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().expect("valid time");
    let counts = mention_counts_since(&pool, since)
        .await
        .expect("counts failed");
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].entity_key, "burntsushi/ripgrep");
    assert_eq!(counts[0].source, "hacker_news");
    assert_eq!(counts[0].mentions, 2);

    let mentions = list_mentions_since(&pool, since)
        .await
        .expect("list failed");
    assert_eq!(mentions.len(), 2);
    assert_eq!(mentions[0].basis, MatchBasis::Url);

    let later = since + Duration::days(30);
    assert!(mention_counts_since(&pool, later)
        .await
        .expect("counts failed")
        .is_empty());
}

// ---------------------------------------------------------------------------
// Section 4: Briefings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn briefing_records_attempts_and_finishes_once(pool: sqlx::PgPool) {
    let briefing = create_briefing(&pool, Uuid::new_v4(), 8.0, 3, Utc::now())
        .await
        .expect("create_briefing failed");
    assert_eq!(briefing.status, "in_progress");
    assert_eq!(briefing.approval_threshold.to_string(), "8.00");

    let issues = serde_json::json!([{"area": "accuracy", "description": "wrong star count"}]);
    record_briefing_attempt(
        &pool,
        briefing.id,
        &NewBriefingAttempt {
            attempt: 1,
            draft: "first draft",
            score: 6.5,
            issues: &issues,
            feedback_from: None,
            completed_at: Utc::now(),
        },
    )
    .await
    .expect("record attempt 1 failed");
    let none = serde_json::json!([]);
    record_briefing_attempt(
        &pool,
        briefing.id,
        &NewBriefingAttempt {
            attempt: 2,
            draft: "second draft",
            score: 8.5,
            issues: &none,
            feedback_from: Some(1),
            completed_at: Utc::now(),
        },
    )
    .await
    .expect("record attempt 2 failed");

    let finish = FinishBriefing {
        status: "approved",
        final_draft: Some("second draft"),
        final_score: Some(8.5),
        error_message: None,
    };
    finish_briefing(&pool, briefing.id, &finish)
        .await
        .expect("finish_briefing failed");

    let err = finish_briefing(&pool, briefing.id, &finish)
        .await
        .expect_err("finishing twice should fail");
    assert!(
        matches!(err, DbError::BriefingAlreadyFinished { id } if id == briefing.id),
        "expected BriefingAlreadyFinished, got {err:?}"
    );

    let latest = get_latest_briefing(&pool)
        .await
        .expect("get_latest_briefing failed")
        .expect("briefing should exist");
    assert_eq!(latest.status, "approved");
    assert_eq!(latest.final_draft.as_deref(), Some("second draft"));

    let attempts = list_briefing_attempts(&pool, briefing.id)
        .await
        .expect("list attempts failed");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].issues, issues);
    assert_eq!(attempts[1].feedback_from, Some(1));
    assert_eq!(attempts[1].score.to_string(), "8.50");
}

#[sqlx::test(migrations = "../../migrations")]
async fn featured_entities_only_count_delivered_briefings(pool: sqlx::PgPool) {
    for name in ["acme/one", "acme/two"] {
        upsert_entity(&pool, &make_entity(name, 10), day(1))
            .await
            .expect("upsert failed");
    }

    let delivered = create_briefing(&pool, Uuid::new_v4(), 8.0, 3, Utc::now())
        .await
        .expect("create failed");
    let stored = mark_featured(
        &pool,
        delivered.id,
        &["acme/one".to_string(), "acme/unknown".to_string()],
        day(2),
    )
    .await
    .expect("mark_featured failed");
    assert_eq!(stored, 1);
    finish_briefing(
        &pool,
        delivered.id,
        &FinishBriefing {
            status: "exhausted",
            final_draft: Some("best effort"),
            final_score: Some(7.0),
            error_message: None,
        },
    )
    .await
    .expect("finish failed");

    let aborted = create_briefing(&pool, Uuid::new_v4(), 8.0, 3, Utc::now())
        .await
        .expect("create failed");
    mark_featured(&pool, aborted.id, &["acme/two".to_string()], day(3))
        .await
        .expect("mark_featured failed");
    finish_briefing(
        &pool,
        aborted.id,
        &FinishBriefing {
            status: "aborted",
            final_draft: None,
            final_score: None,
            error_message: Some("llm unavailable"),
        },
    )
    .await
    .expect("finish failed");

    let recent = list_previously_featured_since(&pool, day(1))
        .await
        .expect("list failed");
    assert_eq!(recent, vec!["acme/one".to_string()]);
    assert!(list_previously_featured_since(&pool, day(5))
        .await
        .expect("list failed")
        .is_empty());

    let counts = feature_counts(&pool).await.expect("counts failed");
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].entity_key, "acme/one");
    assert_eq!(counts[0].times_featured, 1);
}

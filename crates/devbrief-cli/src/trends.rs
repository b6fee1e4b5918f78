//! Trend report assembly from stored history, and the `trends` command.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use devbrief_core::{AppConfig, ContentSource, EntityId, Snapshot};
use devbrief_db::{EntityRow, FeatureCountRow, MentionCountRow};
use devbrief_trends::{
    build_trend_report, ClassifierPolicy, EntityProfile, MentionCounts, ReportRow, TrendReport,
};

/// First day of the history window ending on `today`.
pub(crate) fn window_start(config: &AppConfig, today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(config.trending_window_days)))
        .unwrap_or(today)
}

/// Midnight UTC at the start of `day`.
pub(crate) fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub(crate) fn classifier_policy(config: &AppConfig) -> ClassifierPolicy {
    ClassifierPolicy {
        steady_tolerance: config.steady_tolerance,
        decline_ratio: config.decline_ratio,
    }
}

/// Build the trend report for the window ending on `today` from the database.
///
/// # Errors
///
/// Returns an error if any of the underlying queries fail.
pub(crate) async fn load_trend_report(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    today: NaiveDate,
) -> anyhow::Result<TrendReport> {
    let since = window_start(config, today);

    let entities = devbrief_db::list_entities_seen_since(pool, since).await?;
    let snapshots = devbrief_db::list_snapshots_since(pool, since).await?;
    let mention_rows = devbrief_db::mention_counts_since(pool, start_of_day(since)).await?;
    let feature_rows = devbrief_db::feature_counts(pool).await?;
    let recent = devbrief_db::list_previously_featured_since(pool, since).await?;

    let profiles = build_profiles(entities, snapshots, &mention_rows, &feature_rows, &recent);
    tracing::debug!(profiles = profiles.len(), %since, "building trend report");
    Ok(build_trend_report(&profiles, &classifier_policy(config)))
}

/// Join stored entities with their snapshot series, mention counts and
/// feature history.
pub(crate) fn build_profiles(
    entities: Vec<EntityRow>,
    snapshots: Vec<Snapshot>,
    mention_rows: &[MentionCountRow],
    feature_rows: &[FeatureCountRow],
    recently_featured: &[String],
) -> Vec<EntityProfile> {
    let mut series: HashMap<EntityId, Vec<Snapshot>> = HashMap::new();
    for snapshot in snapshots {
        series.entry(snapshot.entity.clone()).or_default().push(snapshot);
    }

    let mut mentions: HashMap<EntityId, MentionCounts> = HashMap::new();
    for row in mention_rows {
        let count = u32::try_from(row.mentions).unwrap_or(u32::MAX);
        let counts = mentions.entry(EntityId::new(&row.entity_key)).or_default();
        match row.source.parse::<ContentSource>() {
            Ok(ContentSource::HackerNews) => counts.hacker_news = counts.hacker_news.saturating_add(count),
            Ok(ContentSource::Reddit) => counts.reddit = counts.reddit.saturating_add(count),
            Err(e) => tracing::warn!(entity = %row.entity_key, error = %e, "ignoring mention count"),
        }
    }

    let featured: HashMap<EntityId, u32> = feature_rows
        .iter()
        .map(|row| {
            (
                EntityId::new(&row.entity_key),
                u32::try_from(row.times_featured).unwrap_or(u32::MAX),
            )
        })
        .collect();
    let recent: HashSet<EntityId> = recently_featured.iter().map(|k| EntityId::new(k)).collect();

    entities
        .into_iter()
        .map(|row| {
            let entity = row.into_entity();
            let id = entity.id.clone();
            EntityProfile {
                series: series.remove(&id).unwrap_or_default(),
                mentions: mentions.remove(&id).unwrap_or_default(),
                times_featured: featured.get(&id).copied().unwrap_or(0),
                featured_recently: recent.contains(&id),
                entity,
            }
        })
        .collect()
}

/// Print the trend report, or a single entity's row, as a table.
///
/// # Errors
///
/// Returns an error if the report cannot be loaded or `entity` is unknown.
pub(crate) async fn run_trends(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    entity: Option<&str>,
) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let report = load_trend_report(pool, config, today).await?;

    if report.rows.is_empty() {
        println!("no tracked repositories in the last {} days; run `collect` first", config.trending_window_days);
        return Ok(());
    }

    if let Some(key) = entity {
        let id = EntityId::new(key);
        let row = report
            .row(&id)
            .ok_or_else(|| anyhow::anyhow!("repository '{id}' is not in the current report"))?;
        print_header();
        print_row(row);
        println!();
        println!("{}", row.trend_summary);
        return Ok(());
    }

    let sections: [(&str, &[ReportRow]); 6] = [
        ("Rising", &report.rising),
        ("Steady", &report.steady),
        ("Cooling down", &report.cooling_down),
        ("New", &report.newcomers),
        ("Most discussed", &report.most_discussed),
        ("Repeat performers", &report.repeat_performers),
    ];
    for (title, rows) in sections {
        if rows.is_empty() {
            continue;
        }
        println!("== {title} ==");
        print_header();
        for row in rows {
            print_row(row);
        }
        println!();
    }

    if !report.languages.is_empty() {
        println!("== Languages ==");
        for lang in &report.languages {
            println!(
                "{:<20}{:>4} repo(s){:>+9} stars{:>9.1} avg",
                lang.language, lang.count, lang.total_growth, lang.avg_growth
            );
        }
        println!();
    }
    if !report.hot_topics.is_empty() {
        let topics: Vec<String> = report
            .hot_topics
            .iter()
            .map(|t| format!("{} ({})", t.topic, t.count))
            .collect();
        println!("hot topics: {}", topics.join(", "));
    }

    let summary = &report.summary;
    println!(
        "tracked: {}  new: {}  avg growth: {:.1}  mentions: {}  top language: {}",
        summary.total_tracked,
        summary.new_entities,
        summary.avg_growth,
        summary.total_mentions,
        summary.top_language.as_deref().unwrap_or("-")
    );
    for skipped in &report.skipped {
        eprintln!("warning: skipped {}: {}", skipped.entity, skipped.reason);
    }

    Ok(())
}

fn print_header() {
    println!(
        "{:<40}{:<11}{:>9}{:>9}{:>9}{:>6}{:>6}",
        "REPOSITORY", "VERDICT", "STARS", "GROWTH", "RATE", "HN", "RDT"
    );
}

fn print_row(row: &ReportRow) {
    let name = if row.name.chars().count() > 38 {
        format!("{}...", row.name.chars().take(35).collect::<String>())
    } else {
        row.name.clone()
    };
    println!(
        "{:<40}{:<11}{:>9}{:>+9}{:>9.1}{:>6}{:>6}",
        name,
        row.verdict.as_str(),
        row.current_stars,
        row.latest_growth,
        row.growth_rate,
        row.hn_mentions,
        row.reddit_mentions
    );
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entity_row(key: &str, stars: i64) -> EntityRow {
        let day = NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date");
        EntityRow {
            id: 1,
            entity_key: key.to_string(),
            full_name: key.to_string(),
            description: None,
            url: format!("https://github.com/{key}"),
            language: None,
            topics: Vec::new(),
            stars,
            forks: 0,
            open_issues: None,
            readme_excerpt: None,
            first_seen_on: day,
            last_seen_on: day,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot(key: &str, day: u32, stars: i64) -> Snapshot {
        Snapshot {
            entity: EntityId::new(key),
            captured_on: NaiveDate::from_ymd_opt(2025, 4, day).expect("valid date"),
            stars,
            forks: 0,
            open_issues: None,
        }
    }

    #[test]
    fn profiles_join_series_mentions_and_features() {
        let profiles = build_profiles(
            vec![entity_row("acme/rocket", 180), entity_row("acme/quiet", 10)],
            vec![
                snapshot("acme/rocket", 1, 100),
                snapshot("acme/rocket", 2, 130),
                snapshot("acme/rocket", 3, 180),
            ],
            &[
                MentionCountRow {
                    entity_key: "acme/rocket".to_string(),
                    source: "hacker_news".to_string(),
                    mentions: 2,
                },
                MentionCountRow {
                    entity_key: "acme/rocket".to_string(),
                    source: "reddit".to_string(),
                    mentions: 1,
                },
            ],
            &[FeatureCountRow {
                entity_key: "acme/rocket".to_string(),
                times_featured: 3,
            }],
            &["acme/rocket".to_string()],
        );

        assert_eq!(profiles.len(), 2);
        let rocket = &profiles[0];
        assert_eq!(rocket.series.len(), 3);
        assert_eq!(rocket.mentions.hacker_news, 2);
        assert_eq!(rocket.mentions.reddit, 1);
        assert_eq!(rocket.times_featured, 3);
        assert!(rocket.featured_recently);

        let quiet = &profiles[1];
        assert!(quiet.series.is_empty());
        assert_eq!(quiet.mentions.total(), 0);
        assert!(!quiet.featured_recently);
    }

    #[test]
    fn unknown_mention_source_is_ignored() {
        let profiles = build_profiles(
            vec![entity_row("acme/rocket", 1)],
            Vec::new(),
            &[MentionCountRow {
                entity_key: "acme/rocket".to_string(),
                source: "lobsters".to_string(),
                mentions: 4,
            }],
            &[],
            &[],
        );
        assert_eq!(profiles[0].mentions.total(), 0);
    }

    #[test]
    fn window_start_counts_back_whole_days() {
        let today = NaiveDate::from_ymd_opt(2025, 4, 8).expect("valid date");
        let mut config = crate::tests::test_config();
        config.trending_window_days = 7;
        assert_eq!(
            window_start(&config, today),
            NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date")
        );
        assert_eq!(start_of_day(today).to_rfc3339(), "2025-04-08T00:00:00+00:00");
    }
}

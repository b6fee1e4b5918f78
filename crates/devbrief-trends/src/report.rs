use std::cmp::Ordering;
use std::collections::BTreeMap;

use devbrief_core::{Entity, EntityId, Snapshot};
use rayon::prelude::*;
use serde::Serialize;

use crate::classifier::{classify, ClassifierPolicy, TrendMetrics, Verdict};
use crate::linker::MentionCounts;

const RISING_LIMIT: usize = 5;
const STEADY_LIMIT: usize = 5;
const COOLING_LIMIT: usize = 3;
const NEWCOMER_LIMIT: usize = 5;
const DISCUSSED_LIMIT: usize = 5;
const REPEAT_LIMIT: usize = 3;
const LANGUAGE_LIMIT: usize = 5;
const TOPIC_LIMIT: usize = 10;
/// Bucket for entities without a detected primary language.
const OTHER_LANGUAGE: &str = "Other";

/// Everything known about one entity going into the report.
#[derive(Debug, Clone)]
pub struct EntityProfile {
    pub entity: Entity,
    /// Snapshot history within the report window, oldest first.
    pub series: Vec<Snapshot>,
    pub mentions: MentionCounts,
    /// Number of earlier briefings that featured this entity.
    pub times_featured: u32,
    /// Featured by a briefing within the report window.
    pub featured_recently: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub entity: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub url: String,
    pub verdict: Verdict,
    pub current_stars: i64,
    pub latest_growth: i64,
    pub latest_growth_pct: f64,
    pub growth_rate: f64,
    pub acceleration: f64,
    pub hn_mentions: u32,
    pub reddit_mentions: u32,
    pub total_mentions: u32,
    pub times_featured: u32,
    pub trend_summary: String,
}

impl ReportRow {
    fn new(profile: &EntityProfile, metrics: &TrendMetrics) -> Self {
        let entity = &profile.entity;
        Self {
            entity: entity.id.clone(),
            name: entity.full_name.clone(),
            description: entity.description.clone(),
            language: entity.language.clone(),
            url: entity.url.clone(),
            verdict: metrics.verdict,
            current_stars: metrics.current_stars,
            latest_growth: metrics.latest_growth,
            latest_growth_pct: metrics.latest_growth_pct,
            growth_rate: metrics.growth_rate,
            acceleration: metrics.acceleration,
            hn_mentions: profile.mentions.hacker_news,
            reddit_mentions: profile.mentions.reddit,
            total_mentions: profile.mentions.total(),
            times_featured: profile.times_featured,
            trend_summary: trend_summary(metrics, &profile.mentions, profile.times_featured),
        }
    }

    /// Rising or new, and talked about on at least one forum.
    #[must_use]
    pub fn is_trending_and_discussed(&self) -> bool {
        matches!(self.verdict, Verdict::Rising | Verdict::New) && self.total_mentions > 0
    }
}

/// An entity left out of the report because its history is malformed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntity {
    pub entity: EntityId,
    pub reason: String,
}

/// Star growth of all tracked entities sharing a primary language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageTrend {
    pub language: String,
    pub count: usize,
    /// Sum of window growth across the language's entities.
    pub total_growth: i64,
    pub avg_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryStats {
    pub total_tracked: usize,
    pub new_entities: usize,
    /// Mean star change across the window, over all classified entities.
    pub avg_growth: f64,
    pub total_mentions: u32,
    /// Language with the largest total growth.
    pub top_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrendReport {
    /// Every classified entity, in input order.
    pub rows: Vec<ReportRow>,
    pub rising: Vec<ReportRow>,
    pub steady: Vec<ReportRow>,
    pub cooling_down: Vec<ReportRow>,
    pub newcomers: Vec<ReportRow>,
    pub most_discussed: Vec<ReportRow>,
    pub repeat_performers: Vec<ReportRow>,
    pub trending_and_discussed: Vec<ReportRow>,
    /// By total growth, descending.
    pub languages: Vec<LanguageTrend>,
    /// Most common topic tags among tracked entities.
    pub hot_topics: Vec<TopicCount>,
    pub previously_featured: Vec<String>,
    pub summary: SummaryStats,
    pub skipped: Vec<SkippedEntity>,
}

impl TrendReport {
    #[must_use]
    pub fn row(&self, entity: &EntityId) -> Option<&ReportRow> {
        self.rows.iter().find(|r| &r.entity == entity)
    }
}

/// Classify every profile and group the results into report sections.
///
/// Entities whose history fails validation are listed in
/// [`TrendReport::skipped`] instead of aborting the whole report.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn build_trend_report(profiles: &[EntityProfile], policy: &ClassifierPolicy) -> TrendReport {
    let classified: Vec<_> = profiles
        .par_iter()
        .map(|profile| (profile, classify(&profile.entity.id, &profile.series, policy)))
        .collect();

    let mut report = TrendReport::default();
    let mut total_growth: i64 = 0;
    let mut languages: BTreeMap<&str, (usize, i64)> = BTreeMap::new();
    let mut topics: BTreeMap<String, usize> = BTreeMap::new();

    for (profile, outcome) in classified {
        let metrics = match outcome {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!(entity = %profile.entity.id, error = %e, "skipping entity with malformed history");
                report.skipped.push(SkippedEntity {
                    entity: profile.entity.id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        total_growth += metrics.window_growth;
        let language = profile.entity.language.as_deref().unwrap_or(OTHER_LANGUAGE);
        let bucket = languages.entry(language).or_default();
        bucket.0 += 1;
        bucket.1 += metrics.window_growth;
        for topic in &profile.entity.topics {
            *topics.entry(topic.to_lowercase()).or_default() += 1;
        }
        if profile.featured_recently {
            report.previously_featured.push(profile.entity.full_name.clone());
        }
        report.rows.push(ReportRow::new(profile, &metrics));
    }

    for row in &report.rows {
        let section = match row.verdict {
            Verdict::Rising => &mut report.rising,
            Verdict::Steady => &mut report.steady,
            Verdict::Declining => &mut report.cooling_down,
            Verdict::New => &mut report.newcomers,
        };
        section.push(row.clone());
    }

    report.most_discussed = report
        .rows
        .iter()
        .filter(|r| r.total_mentions > 0)
        .cloned()
        .collect();
    report.repeat_performers = report
        .rows
        .iter()
        .filter(|r| r.times_featured > 1)
        .cloned()
        .collect();
    report.trending_and_discussed = report
        .rows
        .iter()
        .filter(|r| r.is_trending_and_discussed())
        .cloned()
        .collect();

    rank(&mut report.rising, RISING_LIMIT, |a, b| b.latest_growth.cmp(&a.latest_growth));
    rank(&mut report.steady, STEADY_LIMIT, |a, b| b.current_stars.cmp(&a.current_stars));
    rank(&mut report.cooling_down, COOLING_LIMIT, |a, b| a.latest_growth.cmp(&b.latest_growth));
    rank(&mut report.newcomers, NEWCOMER_LIMIT, |a, b| b.current_stars.cmp(&a.current_stars));
    rank(&mut report.most_discussed, DISCUSSED_LIMIT, |a, b| {
        b.total_mentions.cmp(&a.total_mentions)
    });
    rank(&mut report.repeat_performers, REPEAT_LIMIT, |a, b| {
        b.times_featured.cmp(&a.times_featured)
    });
    report
        .trending_and_discussed
        .sort_by(|a, b| b.total_mentions.cmp(&a.total_mentions).then_with(|| a.entity.cmp(&b.entity)));

    report.languages = language_trends(languages);
    report.hot_topics = hot_topics(topics);

    let tracked = report.rows.len();
    report.summary = SummaryStats {
        total_tracked: tracked,
        new_entities: report.rows.iter().filter(|r| r.verdict == Verdict::New).count(),
        avg_growth: if tracked == 0 {
            0.0
        } else {
            total_growth as f64 / tracked as f64
        },
        total_mentions: report.rows.iter().map(|r| r.total_mentions).sum(),
        top_language: report.languages.first().map(|l| l.language.clone()),
    };

    report
}

/// Sort by `order`, breaking ties by entity id, and keep the first `limit`.
fn rank<F>(rows: &mut Vec<ReportRow>, limit: usize, order: F)
where
    F: Fn(&ReportRow, &ReportRow) -> Ordering,
{
    rows.sort_by(|a, b| order(a, b).then_with(|| a.entity.cmp(&b.entity)));
    rows.truncate(limit);
}

#[allow(clippy::cast_precision_loss)]
fn language_trends(buckets: BTreeMap<&str, (usize, i64)>) -> Vec<LanguageTrend> {
    let mut trends: Vec<LanguageTrend> = buckets
        .into_iter()
        .map(|(language, (count, total_growth))| LanguageTrend {
            language: language.to_string(),
            count,
            total_growth,
            avg_growth: total_growth as f64 / count as f64,
        })
        .collect();
    // BTreeMap order makes the stable sort break ties by language name.
    trends.sort_by(|a, b| b.total_growth.cmp(&a.total_growth));
    trends.truncate(LANGUAGE_LIMIT);
    trends
}

fn hot_topics(counts: BTreeMap<String, usize>) -> Vec<TopicCount> {
    let mut topics: Vec<TopicCount> = counts
        .into_iter()
        .map(|(topic, count)| TopicCount { topic, count })
        .collect();
    topics.sort_by(|a, b| b.count.cmp(&a.count));
    topics.truncate(TOPIC_LIMIT);
    topics
}

fn trend_summary(metrics: &TrendMetrics, mentions: &MentionCounts, times_featured: u32) -> String {
    let mut parts = Vec::new();

    if metrics.verdict == Verdict::New {
        parts.push(format!("new this week ({} stars)", metrics.current_stars));
    } else if metrics.latest_growth > 0 {
        parts.push(format!(
            "+{} stars last period ({:.1}% growth)",
            metrics.latest_growth, metrics.latest_growth_pct
        ));
    } else if metrics.latest_growth < 0 {
        parts.push(format!("lost {} stars last period", -metrics.latest_growth));
    }

    match metrics.verdict {
        Verdict::Rising if metrics.acceleration > 0.0 => parts.push("gaining momentum".to_string()),
        Verdict::Declining if metrics.growth_rate > 0.0 => parts.push("slowing down".to_string()),
        _ => {}
    }

    if mentions.total() > 0 {
        let mut sources = Vec::new();
        if mentions.hacker_news > 0 {
            sources.push(format!("HN {}x", mentions.hacker_news));
        }
        if mentions.reddit > 0 {
            sources.push(format!("Reddit {}x", mentions.reddit));
        }
        parts.push(format!("discussed on {}", sources.join(", ")));
    }

    if times_featured > 0 {
        parts.push(format!("featured {times_featured} time(s) before"));
    }

    if parts.is_empty() {
        return "Not enough data yet.".to_string();
    }
    let mut summary = parts.join(". ");
    if let Some(first) = summary.get(..1).map(str::to_uppercase) {
        summary.replace_range(..1, &first);
    }
    summary.push('.');
    summary
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;

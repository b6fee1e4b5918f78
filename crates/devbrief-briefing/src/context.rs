//! Everything the generator gets to see for one run.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use devbrief_core::{ContentItem, ContentSource, EntityId, ItemKey, Mention};
use devbrief_trends::{ReportRow, TrendReport};
use serde::Serialize;

const STORIES_PER_SOURCE: usize = 10;
const SAMPLE_TITLES: usize = 3;
const FEATURED_LIMIT: usize = 10;

/// A forum story or post as presented to the generator.
#[derive(Debug, Clone, Serialize)]
pub struct StorySummary {
    pub source: ContentSource,
    pub title: String,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub channel: Option<String>,
    pub score: i64,
    pub comment_count: i64,
    /// Entities this item was linked to.
    pub mentions: Vec<EntityId>,
}

/// A rising or newly seen entity that forums are also talking about.
#[derive(Debug, Clone, Serialize)]
pub struct DiscussedEntity {
    pub row: ReportRow,
    /// Titles of up to three linked items, highest score first.
    pub sample_titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BriefingContext {
    pub generated_on: NaiveDate,
    pub report: TrendReport,
    pub hacker_news: Vec<StorySummary>,
    pub reddit: Vec<StorySummary>,
    pub trending_and_discussed: Vec<DiscussedEntity>,
    /// Entities the briefing puts forward: rising, then newcomers, then most
    /// discussed, without repeats.
    pub featured: Vec<EntityId>,
}

impl BriefingContext {
    /// Combine the trend report with the day's content and mentions.
    #[must_use]
    pub fn assemble(
        generated_on: NaiveDate,
        report: TrendReport,
        items: &[ContentItem],
        mentions: &[Mention],
    ) -> Self {
        let mut linked: HashMap<&ItemKey, Vec<EntityId>> = HashMap::new();
        for mention in mentions {
            linked
                .entry(&mention.item)
                .or_default()
                .push(mention.entity.clone());
        }

        let mut seen = HashSet::new();
        let mut ranked: Vec<&ContentItem> = items
            .iter()
            .filter(|item| seen.insert(item.key()))
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.external_id.cmp(&b.external_id)));

        let summarize = |source: ContentSource| -> Vec<StorySummary> {
            ranked
                .iter()
                .filter(|item| item.source == source)
                .take(STORIES_PER_SOURCE)
                .map(|item| StorySummary {
                    source: item.source,
                    title: item.title.clone(),
                    url: item.url.clone(),
                    permalink: item.permalink.clone(),
                    channel: item.channel.clone(),
                    score: item.score,
                    comment_count: item.comment_count,
                    mentions: linked.get(&item.key()).cloned().unwrap_or_default(),
                })
                .collect()
        };
        let hacker_news = summarize(ContentSource::HackerNews);
        let reddit = summarize(ContentSource::Reddit);

        let trending_and_discussed = report
            .trending_and_discussed
            .iter()
            .map(|row| DiscussedEntity {
                row: row.clone(),
                sample_titles: ranked
                    .iter()
                    .filter(|item| {
                        linked
                            .get(&item.key())
                            .is_some_and(|ids| ids.contains(&row.entity))
                    })
                    .take(SAMPLE_TITLES)
                    .map(|item| item.title.clone())
                    .collect(),
            })
            .collect();

        let mut featured: Vec<EntityId> = Vec::new();
        for row in report
            .rising
            .iter()
            .chain(&report.newcomers)
            .chain(&report.most_discussed)
        {
            if featured.len() == FEATURED_LIMIT {
                break;
            }
            if !featured.contains(&row.entity) {
                featured.push(row.entity.clone());
            }
        }

        Self {
            generated_on,
            report,
            hacker_news,
            reddit,
            trending_and_discussed,
            featured,
        }
    }

    /// Pretty-printed JSON embedded in the generation prompt.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if serialisation fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use devbrief_core::{Entity, MatchBasis, Snapshot};
    use devbrief_trends::{build_trend_report, ClassifierPolicy, EntityProfile, MentionCounts};

    use super::*;

    fn item(source: ContentSource, id: &str, title: &str, score: i64) -> ContentItem {
        ContentItem {
            source,
            external_id: id.to_string(),
            title: title.to_string(),
            body: String::new(),
            url: None,
            permalink: None,
            author: None,
            channel: None,
            score,
            comment_count: 0,
            captured_at: Utc::now(),
        }
    }

    fn profile(name: &str, stars: &[i64], mentions: MentionCounts) -> EntityProfile {
        let start = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        EntityProfile {
            entity: Entity {
                id: EntityId::new(name),
                full_name: name.to_string(),
                description: None,
                url: format!("https://github.com/{name}"),
                language: None,
                topics: vec![],
                stars: stars.last().copied().unwrap_or_default(),
                forks: 0,
                open_issues: None,
                readme_excerpt: None,
                first_seen_on: Some(start),
            },
            series: stars
                .iter()
                .zip(0u64..)
                .map(|(&s, i)| Snapshot {
                    entity: EntityId::new(name),
                    captured_on: start + chrono::Days::new(i),
                    stars: s,
                    forks: 0,
                    open_issues: None,
                })
                .collect(),
            mentions,
            times_featured: 0,
            featured_recently: false,
        }
    }

    fn mention(entity: &str, source: ContentSource, id: &str) -> Mention {
        Mention {
            entity: EntityId::new(entity),
            item: ItemKey {
                source,
                external_id: id.to_string(),
            },
            basis: MatchBasis::Name,
        }
    }

    #[test]
    fn assemble_ranks_stories_and_attaches_mentions() {
        let items = vec![
            item(ContentSource::HackerNews, "1", "low", 5),
            item(ContentSource::HackerNews, "2", "high", 500),
            item(ContentSource::Reddit, "r1", "reddit post", 40),
            item(ContentSource::HackerNews, "2", "high (dup)", 500),
        ];
        let mentions = vec![mention("o/hot", ContentSource::HackerNews, "2")];
        let report = build_trend_report(
            &[profile(
                "o/hot",
                &[10, 20, 40],
                MentionCounts {
                    hacker_news: 1,
                    reddit: 0,
                },
            )],
            &ClassifierPolicy::default(),
        );

        let ctx = BriefingContext::assemble(
            NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(),
            report,
            &items,
            &mentions,
        );

        let hn_titles: Vec<&str> = ctx.hacker_news.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(hn_titles, vec!["high", "low"]);
        assert_eq!(ctx.hacker_news[0].mentions, vec![EntityId::new("o/hot")]);
        assert_eq!(ctx.reddit.len(), 1);
        assert_eq!(ctx.trending_and_discussed.len(), 1);
        assert_eq!(ctx.trending_and_discussed[0].sample_titles, vec!["high"]);
        assert_eq!(ctx.featured, vec![EntityId::new("o/hot")]);
    }

    #[test]
    fn featured_is_deduplicated_across_sections() {
        let busy = MentionCounts {
            hacker_news: 0,
            reddit: 4,
        };
        let report = build_trend_report(
            &[
                profile("o/a", &[1, 5, 20], busy),
                profile("o/b", &[3], MentionCounts::default()),
            ],
            &ClassifierPolicy::default(),
        );
        let ctx = BriefingContext::assemble(NaiveDate::from_ymd_opt(2025, 5, 3).unwrap(), report, &[], &[]);
        assert_eq!(ctx.featured, vec![EntityId::new("o/a"), EntityId::new("o/b")]);
        assert!(ctx.to_json().unwrap().contains("\"generated_on\": \"2025-05-03\""));
    }
}

use chrono::{TimeZone, Utc};

use super::*;

fn item(source: ContentSource, id: &str, title: &str, body: &str, url: Option<&str>) -> ContentItem {
    ContentItem {
        source,
        external_id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        url: url.map(ToString::to_string),
        permalink: None,
        author: None,
        channel: None,
        score: 1,
        comment_count: 0,
        captured_at: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
    }
}

fn hn(id: &str, title: &str) -> ContentItem {
    item(ContentSource::HackerNews, id, title, "", None)
}

fn catalog(ids: &[&str]) -> EntityCatalog {
    let mut catalog = EntityCatalog::new();
    for id in ids {
        catalog.insert(CatalogEntry::new(EntityId::new(id)));
    }
    catalog
}

#[test]
fn catalog_entry_names_full_and_bare() {
    let entry = CatalogEntry::new(EntityId::new("Tokio-RS/Tokio")).with_aliases(["Tokio", " rt "]);
    assert_eq!(entry.names, vec!["tokio-rs/tokio", "tokio", "rt"]);
}

#[test]
fn go_does_not_match_inside_going() {
    let items = vec![hn("1", "Where is this all going?")];
    assert!(link(&items, &catalog(&["golang/go"])).is_empty());
}

#[test]
fn go_matches_as_a_whole_word() {
    let items = vec![hn("1", "Why I moved from Go to Rust")];
    let mentions = link(&items, &catalog(&["golang/go"]));
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].entity, EntityId::new("golang/go"));
    assert_eq!(mentions[0].basis, MatchBasis::Name);
}

#[test]
fn underscore_and_digits_are_word_characters() {
    let items = vec![hn("1", "my_tokio wrapper"), hn("2", "tokio2 fork")];
    assert!(link(&items, &catalog(&["tokio-rs/tokio"])).is_empty());
}

#[test]
fn punctuation_counts_as_a_boundary() {
    let items = vec![hn("1", "Benchmarks (tokio, smol, glommio).")];
    assert_eq!(link(&items, &catalog(&["tokio-rs/tokio"])).len(), 1);
}

#[test]
fn matching_is_case_insensitive_and_covers_body() {
    let items = vec![item(
        ContentSource::Reddit,
        "abc",
        "Weekly thread",
        "Has anyone tried ASTRAL-SH/UV yet?",
        None,
    )];
    let mentions = link(&items, &catalog(&["astral-sh/uv"]));
    assert_eq!(mentions.len(), 1);
}

#[test]
fn aliases_are_matched() {
    let mut cat = EntityCatalog::new();
    cat.insert(CatalogEntry::new(EntityId::new("ggml-org/llama.cpp")).with_aliases(["llama cpp"]));
    let items = vec![hn("1", "Running Llama CPP on a phone")];
    assert_eq!(link(&items, &cat).len(), 1);
}

#[test]
fn github_url_links_with_url_basis() {
    let items = vec![item(
        ContentSource::HackerNews,
        "9",
        "Show HN: A new runtime",
        "",
        Some("https://github.com/Oven-sh/bun.git"),
    )];
    let mentions = link(&items, &catalog(&["oven-sh/bun"]));
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].basis, MatchBasis::Url);
}

#[test]
fn url_basis_takes_precedence_over_name() {
    let items = vec![item(
        ContentSource::Reddit,
        "p1",
        "bun is fast",
        "source: https://github.com/oven-sh/bun/blob/main/README.md",
        None,
    )];
    let mentions = link(&items, &catalog(&["oven-sh/bun"]));
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].basis, MatchBasis::Url);
}

#[test]
fn uncataloged_github_links_are_ignored() {
    let items = vec![item(
        ContentSource::HackerNews,
        "1",
        "Look",
        "",
        Some("https://github.com/someone/else"),
    )];
    assert!(link(&items, &catalog(&["oven-sh/bun"])).is_empty());
}

#[test]
fn repeated_names_in_one_item_collapse() {
    let items = vec![hn("1", "tokio vs tokio-rs/tokio vs Tokio")];
    assert_eq!(link(&items, &catalog(&["tokio-rs/tokio"])).len(), 1);
}

#[test]
fn duplicate_items_in_batch_collapse_and_upgrade_basis() {
    let plain = hn("1", "bun 2.0 released");
    let mut linked = plain.clone();
    linked.url = Some("https://github.com/oven-sh/bun".to_string());
    let mentions = link(&[plain, linked], &catalog(&["oven-sh/bun"]));
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].basis, MatchBasis::Url);
}

#[test]
fn one_item_can_mention_many_entities_in_catalog_order() {
    let items = vec![hn("1", "deno, bun and node compared")];
    let mentions = link(&items, &catalog(&["oven-sh/bun", "denoland/deno", "nodejs/node"]));
    let ids: Vec<&str> = mentions.iter().map(|m| m.entity.as_str()).collect();
    assert_eq!(ids, vec!["oven-sh/bun", "denoland/deno", "nodejs/node"]);
}

#[test]
fn output_follows_item_order() {
    let items: Vec<ContentItem> = (0..50)
        .map(|i| hn(&i.to_string(), "tokio release notes"))
        .collect();
    let mentions = link(&items, &catalog(&["tokio-rs/tokio"]));
    let ids: Vec<String> = mentions.iter().map(|m| m.item.external_id.clone()).collect();
    let expected: Vec<String> = (0..50).map(|i: i32| i.to_string()).collect();
    assert_eq!(ids, expected);
}

#[test]
fn link_is_pure() {
    let items = vec![
        hn("1", "zed editor 1.0"),
        item(ContentSource::Reddit, "2", "uv + ruff", "", None),
    ];
    let cat = catalog(&["zed-industries/zed", "astral-sh/uv", "astral-sh/ruff"]);
    assert_eq!(link(&items, &cat), link(&items, &cat));
}

#[test]
fn extract_github_repo_strips_suffixes() {
    let cases = [
        ("https://github.com/owner/repo", Some("owner/repo")),
        ("https://github.com/owner/repo.git", Some("owner/repo")),
        ("http://www.github.com/Owner/Repo/issues/12", Some("owner/repo")),
        ("https://github.com/owner/notes.md", Some("owner/notes")),
        ("https://github.com/owner", None),
        ("https://gitlab.com/owner/repo", None),
    ];
    for (url, expected) in cases {
        assert_eq!(
            extract_github_repo(url).as_ref().map(EntityId::as_str),
            expected,
            "url {url}"
        );
    }
}

#[test]
fn mention_counts_split_by_source() {
    let items = vec![
        hn("1", "tokio"),
        hn("2", "tokio"),
        item(ContentSource::Reddit, "3", "tokio", "", None),
    ];
    let counts = mention_counts(&link(&items, &catalog(&["tokio-rs/tokio", "oven-sh/bun"])));
    let tokio = counts[&EntityId::new("tokio-rs/tokio")];
    assert_eq!(tokio.hacker_news, 2);
    assert_eq!(tokio.reddit, 1);
    assert_eq!(tokio.total(), 3);
    assert!(!counts.contains_key(&EntityId::new("oven-sh/bun")));
}

#[test]
fn from_entities_attaches_watchlist_aliases() {
    let watchlist = devbrief_core::parse_watchlist(
        "repos:\n  - name: oven-sh/bun\n    aliases: [bunjs]\n",
    )
    .unwrap();
    let entity = Entity {
        id: EntityId::new("oven-sh/bun"),
        full_name: "oven-sh/bun".to_string(),
        description: None,
        url: "https://github.com/oven-sh/bun".to_string(),
        language: None,
        topics: vec![],
        stars: 1,
        forks: 0,
        open_issues: None,
        readme_excerpt: None,
        first_seen_on: None,
    };
    let cat = EntityCatalog::from_entities(&[entity], &watchlist);
    assert_eq!(cat.len(), 1);
    assert!(cat.entries()[0].names.contains(&"bunjs".to_string()));
}

//! Integration tests for `HackerNewsClient` using wiremock HTTP mocks.

use devbrief_core::ContentSource;
use devbrief_sources::{HackerNewsClient, HttpSettings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> HackerNewsClient {
    let settings = HttpSettings {
        max_retries: 0,
        backoff_base_ms: 0,
        max_concurrency: 2,
        ..HttpSettings::default()
    };
    HackerNewsClient::with_base_url(&settings, &format!("{base_url}/v0"))
        .expect("client construction should not fail")
}

async fn mount_item(server: &MockServer, id: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v0/item/{id}.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn top_stories_are_filtered_and_sorted_by_score() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/topstories.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2, 3, 4, 5, 6])))
        .mount(&server)
        .await;

    mount_item(
        &server,
        1,
        serde_json::json!({"id": 1, "type": "story", "title": "Low", "score": 10, "descendants": 1}),
    )
    .await;
    mount_item(
        &server,
        2,
        serde_json::json!({"id": 2, "type": "story", "title": "High", "url": "https://github.com/astral-sh/uv", "score": 500, "descendants": 120}),
    )
    .await;
    mount_item(&server, 3, serde_json::json!({"id": 3, "type": "job", "title": "Hiring", "score": 900})).await;
    mount_item(&server, 4, serde_json::json!({"id": 4, "type": "story", "title": "Flagged", "dead": true, "score": 50})).await;
    mount_item(&server, 5, serde_json::Value::Null).await;
    Mock::given(method("GET"))
        .and(path("/v0/item/6.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let stories = client.fetch_top_stories(50).await.expect("listing should load");

    let titles: Vec<&str> = stories.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["High", "Low"]);
    assert_eq!(stories[0].source, ContentSource::HackerNews);
    assert_eq!(stories[0].comment_count, 120);
    assert_eq!(stories[0].url.as_deref(), Some("https://github.com/astral-sh/uv"));
}

#[tokio::test]
async fn limit_caps_items_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/topstories.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([7, 8, 9])))
        .mount(&server)
        .await;
    mount_item(&server, 7, serde_json::json!({"id": 7, "type": "story", "title": "Seven", "score": 1})).await;
    Mock::given(method("GET"))
        .and(path("/v0/item/8.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 8, "type": "story", "title": "Eight"})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let stories = client.fetch_top_stories(1).await.unwrap();

    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].external_id, "7");
}

#[tokio::test]
async fn failed_listing_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/topstories.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    assert!(client.fetch_top_stories(10).await.is_err());
}

//! Fetch adapters for the sources devbrief watches.
//!
//! [`GithubClient`] supplies tracked repositories and their current metrics;
//! [`HackerNewsClient`] and [`RedditClient`] supply the discussion items that
//! mentions are linked from. Transient HTTP failures are retried with
//! back-off; a source that still fails is logged and skipped by
//! [`collect_all`] so one outage never empties a whole run.

pub mod collect;
pub mod error;
pub mod github;
pub mod hacker_news;
pub mod http;
pub mod reddit;

mod retry;

pub use collect::{
    collect_all, collect_content, dedup_items, CollectionPlan, Collected, SourceClients,
};
pub use error::SourceError;
pub use github::GithubClient;
pub use hacker_news::HackerNewsClient;
pub use http::HttpSettings;
pub use reddit::{RedditClient, RedditCredentials};

//! Stub review site and fixtures shared by the pipeline tests

use ajum_index::cache::Cache;
use ajum_index::config::{ClientConfig, Config};
use ajum_index::crawler::{
    AjumParser, PageFetcher, Pipeline, RateLimiter, RawResponse, RetryPolicy, Shutdown, Transport,
};
use ajum_index::FetchError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

/// Page served by the stub: an HTML body or an error status
#[derive(Debug, Clone)]
pub enum Page {
    Html(String),
    Status(u16),
}

/// In-process stand-in for the review site
///
/// Review pages are looked up by `id`, results pages by `start`. Anything
/// unknown is answered with 404.
#[derive(Default)]
pub struct StubSite {
    reviews: HashMap<String, Page>,
    results: HashMap<usize, Page>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl StubSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn review(mut self, id: &str, page: Page) -> Self {
        self.reviews.insert(id.to_string(), page);
        self
    }

    /// Results page `index` (0-based)
    pub fn results(mut self, index: usize, page: Page) -> Self {
        self.results.insert(index * 50, page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `id=<x>` or `start=<n>` of every request, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubSite {
    async fn get(&self, url: &Url, _headers: &HeaderMap) -> Result<RawResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        let (label, page) = match query.get("id") {
            Some(id) => (format!("id={}", id), self.reviews.get(id)),
            None => {
                let start: usize = query.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
                (format!("start={}", start), self.results.get(&start))
            }
        };
        self.requested.lock().unwrap().push(label);

        Ok(match page {
            Some(Page::Html(body)) => RawResponse {
                status: 200,
                body: body.clone(),
            },
            Some(Page::Status(status)) => RawResponse {
                status: *status,
                body: String::new(),
            },
            None => RawResponse {
                status: 404,
                body: String::new(),
            },
        })
    }
}

/// Review page with the labelled table the parser expects
pub fn review_html(title: &str, isbn: &str) -> String {
    format!(
        r#"<html><body><table><tr><td class="td_body">
        <form action="index.php"></form>
        <table>
          <tr><td>Autor:</td><td>Muster, Erika</td></tr>
          <tr><td>Titel:</td><td>{}</td></tr>
          <tr><td>ISBN:</td><td>{}</td></tr>
          <tr><td>Beurteilungstext:</td><td>Lesenswert.</td></tr>
        </table>
        <p>Die presserechtliche Verantwortung liegt bei der AJuM.</p>
        </td></tr></table></body></html>"#,
        title, isbn
    )
}

/// Results page listing `(review ID, ISBN)` hits
pub fn results_html(total: Option<usize>, hits: &[(&str, Option<&str>)]) -> String {
    let announced = total
        .map(|n| format!("<p>Es wurden {} Rezensionen gefunden.</p>", n))
        .unwrap_or_default();
    let rows: String = hits
        .iter()
        .map(|(id, isbn)| {
            format!(
                r#"<tr><td><a href="index.php?s=datenbank&id={}">Titel</a></td><td>{}</td></tr>"#,
                id,
                isbn.map(|i| format!("ISBN: {}", i)).unwrap_or_default()
            )
        })
        .collect();
    format!(
        r#"<html><body><table><tr><td class="td_body">{}<table>{}</table></td></tr></table></body></html>"#,
        announced, rows
    )
}

/// Pipeline over `site` with a zero timer and no retry delay
pub fn pipeline(dir: &TempDir, site: Arc<StubSite>) -> Pipeline {
    let fetcher = PageFetcher::new(
        site,
        Arc::new(RateLimiter::new(Duration::ZERO)),
        &ClientConfig::default(),
    )
    .unwrap();
    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
    };

    Pipeline::new(
        Arc::new(fetcher),
        Arc::new(Cache::open(dir.path().join("cache")).unwrap()),
        Arc::new(AjumParser::new()),
        retry,
        Shutdown::new(),
    )
}

/// Configuration with every file inside `dir`
pub fn test_config(dir: &TempDir, jobs: usize) -> Config {
    let mut config = Config::default();
    config.client.timer = 0.0;
    config.client.max_retries = 1;
    config.paths.cache_dir = dir.path().join("cache");
    config.paths.index_file = dir.path().join("index.json");
    config.paths.db_file = dir.path().join("database.json");
    config.paths.backup_dir = dir.path().join("backups");
    config.workers.jobs = jobs;
    config
}

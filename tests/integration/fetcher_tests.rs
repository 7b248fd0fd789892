//! HTTP transport and page fetcher against a wiremock server

use ajum_index::config::ClientConfig;
use ajum_index::crawler::{review_params, HttpTransport, PageFetcher, RateLimiter, RetryPolicy};
use ajum_index::{FetchError, ReviewId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer, timer: Duration) -> PageFetcher {
    let config = ClientConfig {
        base_url: format!("{}/index.php", server.uri()),
        from: "test@example.com".to_string(),
        user_agent: "ajum-index-tests".to_string(),
        ..Default::default()
    };
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    PageFetcher::new(Arc::new(transport), Arc::new(RateLimiter::new(timer)), &config).unwrap()
}

/// Test successful fetch with the identifying headers
#[tokio::test]
async fn test_fetch_sends_identification() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("s", "datenbank"))
        .and(query_param("id", "4711"))
        .and(header("From", "test@example.com"))
        .and(header("User-Agent", "ajum-index-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Rezension</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server, Duration::ZERO);
    let body = fetcher
        .fetch(&review_params(&ReviewId::new("4711")))
        .await
        .unwrap();

    assert!(body.contains("Rezension"));
}

/// Test that client errors are reported with their status
#[tokio::test]
async fn test_404_is_http_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server, Duration::ZERO);
    let err = fetcher.fetch(&review_params(&ReviewId::new("1"))).await.unwrap_err();

    assert_eq!(err, FetchError::Http { status: 404 });
    assert!(!err.is_retryable());
}

/// Test that server errors are retried by the policy
#[tokio::test]
async fn test_server_error_retry() {
    let mock_server = MockServer::start().await;

    // Return 500 twice, then succeed
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server, Duration::ZERO);
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    };
    let params = review_params(&ReviewId::new("1"));
    let body = policy.run("review 1", || fetcher.fetch(&params)).await;

    assert_eq!(body.as_deref(), Ok("OK"));
}

/// Test that the policy gives up on client errors right away
#[tokio::test]
async fn test_404_no_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1) // Should only be called once (no retry)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server, Duration::ZERO);
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    };
    let params = review_params(&ReviewId::new("1"));
    let result = policy.run("review 1", || fetcher.fetch(&params)).await;

    assert_eq!(result, Err(FetchError::Http { status: 404 }));
}

/// Test that an unreachable server is a transport error
#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let mock_server = MockServer::start().await;
    let fetcher = fetcher(&mock_server, Duration::ZERO);
    drop(mock_server);

    let err = fetcher.fetch(&review_params(&ReviewId::new("1"))).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
    assert!(err.is_retryable());
}

/// Test that consecutive requests are spaced by the timer
#[tokio::test]
async fn test_requests_are_spaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&mock_server, Duration::from_millis(100));
    let params = review_params(&ReviewId::new("1"));

    let start = Instant::now();
    for _ in 0..3 {
        fetcher.fetch(&params).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(200));
}

//! Index and database runs against the stub site

use crate::support::{pipeline, results_html, review_html, test_config, Page, StubSite};
use ajum_index::crawler::{Coordinator, DatabaseBuilder, Indexer, SearchQuery, Shutdown};
use ajum_index::state::{Failure, FailureKind};
use ajum_index::storage::{Database, Index, ReviewId};
use std::sync::Arc;
use tempfile::TempDir;

fn scenario_index() -> Index {
    let mut index = Index::new();
    index.insert("12345", ReviewId::new("r1"));
    index.insert("67890", ReviewId::new("r2"));
    index.insert("67890", ReviewId::new("r3"));
    index
}

fn scenario_site() -> StubSite {
    StubSite::new()
        .review("r1", Page::Html(review_html("Eins", "12345")))
        .review("r2", Page::Html(review_html("Zwei", "67890")))
        .review("r3", Page::Html(review_html("Drei", "67890")))
}

fn ids(database: &Database, isbn: &str) -> Vec<String> {
    database
        .get(isbn)
        .unwrap_or_default()
        .iter()
        .map(|r| r.review_id.to_string())
        .collect()
}

#[tokio::test]
async fn test_build_with_two_workers() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site());
    let builder = DatabaseBuilder::new(pipeline(&dir, site.clone()));

    let report = builder.build(&scenario_index(), 2).await.unwrap();

    assert!(report.failures.is_empty());
    assert_eq!(report.database.isbn_count(), 2);
    assert_eq!(ids(&report.database, "12345"), vec!["r1"]);
    assert_eq!(ids(&report.database, "67890"), vec!["r2", "r3"]);

    let titles: Vec<_> = report.database.get("67890").unwrap().iter().map(|r| r.title.clone()).collect();
    assert_eq!(titles, vec![Some("Zwei".to_string()), Some("Drei".to_string())]);
    assert_eq!(site.calls(), 3);
}

#[tokio::test]
async fn test_build_records_missing_review() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site().review("r3", Page::Status(404)));
    let builder = DatabaseBuilder::new(pipeline(&dir, site));

    let report = builder.build(&scenario_index(), 2).await.unwrap();

    assert_eq!(ids(&report.database, "12345"), vec!["r1"]);
    assert_eq!(ids(&report.database, "67890"), vec!["r2"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures.get(&ReviewId::new("r3")),
        Some(&Failure {
            isbns: vec!["67890".to_string()],
            kind: FailureKind::Http { status: 404 },
        })
    );
}

#[tokio::test]
async fn test_failure_keeps_every_isbn_of_a_review() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(StubSite::new().review("r9", Page::Status(404)));
    let mut index = Index::new();
    index.insert("12345", ReviewId::new("r9"));
    index.insert("67890", ReviewId::new("r9"));

    let report = DatabaseBuilder::new(pipeline(&dir, site.clone()))
        .build(&index, 2)
        .await
        .unwrap();

    assert_eq!(
        report.failures.get(&ReviewId::new("r9")),
        Some(&Failure {
            isbns: vec!["12345".to_string(), "67890".to_string()],
            kind: FailureKind::Http { status: 404 },
        })
    );
    // The second sighting is answered by the negative cache entry
    assert_eq!(site.calls(), 1);
}

#[tokio::test]
async fn test_second_build_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site());
    let builder = DatabaseBuilder::new(pipeline(&dir, site.clone()));

    let first = builder.build(&scenario_index(), 2).await.unwrap();
    let fetched = site.calls();
    let second = builder.build(&scenario_index(), 2).await.unwrap();

    assert_eq!(site.calls(), fetched);
    assert_eq!(first.database, second.database);
}

#[tokio::test]
async fn test_clear_forces_refetch() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site());
    let pipeline = pipeline(&dir, site.clone());
    let builder = DatabaseBuilder::new(pipeline.clone());

    builder.build(&scenario_index(), 1).await.unwrap();
    assert_eq!(site.calls(), 3);

    let removed = pipeline.cache().clear().unwrap();
    assert_eq!(removed, 3);
    let cache_dir = dir.path().join("cache");
    assert!(cache_dir.is_dir());
    assert_eq!(std::fs::read_dir(&cache_dir).unwrap().count(), 0);

    pipeline.review(&ReviewId::new("r1")).await.unwrap();
    assert_eq!(site.calls(), 4);
}

#[tokio::test]
async fn test_single_worker_is_sequential() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site());
    let builder = DatabaseBuilder::new(pipeline(&dir, site.clone()));

    builder.build(&scenario_index(), 1).await.unwrap();

    assert_eq!(site.requested(), vec!["id=r1", "id=r2", "id=r3"]);
}

#[tokio::test]
async fn test_update_fetches_only_new_reviews() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site().review("r4", Page::Html(review_html("Vier", "12345"))));
    let builder = DatabaseBuilder::new(pipeline(&dir, site.clone()));

    let mut index = Index::new();
    index.insert("12345", ReviewId::new("r1"));
    let first = builder.build(&index, 1).await.unwrap();

    let mut extended = scenario_index();
    extended.insert("12345", ReviewId::new("r4"));
    let report = builder.update(first.database, &extended, 1).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.merged, 3);
    assert_eq!(ids(&report.database, "12345"), vec!["r1", "r4"]);
    assert_eq!(site.requested(), vec!["id=r1", "id=r2", "id=r3", "id=r4"]);
}

#[tokio::test]
async fn test_index_survives_failed_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(
                0,
                Page::Html(results_html(
                    Some(120),
                    &[("1", Some("978-3-16-148410-0")), ("2", Some("3-16-148410-X"))],
                )),
            )
            .results(1, Page::Status(404))
            .results(2, Page::Html(results_html(None, &[("5", Some("0306406152"))]))),
    );
    let indexer = Indexer::new(pipeline(&dir, site.clone()));

    let report = indexer.build_index(&SearchQuery::all(), false, 2).await.unwrap();

    assert_eq!(report.failed_pages, vec![2]);
    assert_eq!(report.isbn_total, 3);
    assert_eq!(report.review_total, 3);
    assert!(report.index.contains("9783161484100", &ReviewId::new("1")));
    assert!(report.index.contains("316148410X", &ReviewId::new("2")));
    assert!(report.index.contains("0306406152", &ReviewId::new("5")));
}

#[tokio::test]
async fn test_strict_index_drops_bad_checksums() {
    let hits = [
        ("1", Some("978-3-16-148410-0")),
        ("2", Some("978-3-16-148410-1")),
        ("3", Some("0306406152")),
    ];
    let site = || {
        Arc::new(StubSite::new().results(0, Page::Html(results_html(Some(3), &hits))))
    };

    let dir = TempDir::new().unwrap();
    let strict = Indexer::new(pipeline(&dir, site()))
        .build_index(&SearchQuery::all(), true, 1)
        .await
        .unwrap();
    assert_eq!(strict.skipped_invalid, 1);
    assert_eq!(strict.isbn_total, 2);
    assert!(strict.index.get("9783161484101").is_none());

    let dir = TempDir::new().unwrap();
    let lenient = Indexer::new(pipeline(&dir, site()))
        .build_index(&SearchQuery::all(), false, 1)
        .await
        .unwrap();
    assert_eq!(lenient.skipped_invalid, 0);
    assert_eq!(lenient.isbn_total, 3);

    // Strict mode keeps exactly the valid subset
    for (isbn, ids) in strict.index.iter() {
        assert_eq!(lenient.index.get(isbn), Some(ids));
    }
}

#[tokio::test]
async fn test_index_without_total_walks_until_nothing_new() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(0, Page::Html(results_html(None, &[("1", Some("0306406152"))])))
            .results(1, Page::Html(results_html(None, &[("2", Some("080442957X"))])))
            // The site repeats its last page past the end
            .results(2, Page::Html(results_html(None, &[("2", Some("080442957X"))]))),
    );
    let indexer = Indexer::new(pipeline(&dir, site.clone()));

    let report = indexer.build_index(&SearchQuery::all(), true, 1).await.unwrap();

    assert_eq!(report.review_total, 2);
    assert_eq!(site.requested(), vec!["start=0", "start=50", "start=100"]);
}

#[tokio::test]
async fn test_sequential_walk_gives_up_after_failed_pages() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(0, Page::Html(results_html(None, &[("1", Some("0306406152"))])))
            .results(1, Page::Status(503))
            .results(2, Page::Status(503))
            .results(3, Page::Status(503))
            .results(4, Page::Html(results_html(None, &[("9", Some("080442957X"))]))),
    );
    let indexer = Indexer::new(pipeline(&dir, site.clone()));

    let report = indexer.build_index(&SearchQuery::all(), false, 1).await.unwrap();

    assert_eq!(report.failed_pages, vec![2, 3, 4]);
    assert_eq!(report.review_total, 1);
    assert!(!site.requested().contains(&"start=200".to_string()));
}

#[tokio::test]
async fn test_sequential_walk_continues_past_a_failed_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(0, Page::Html(results_html(None, &[("1", Some("0306406152"))])))
            .results(1, Page::Status(503))
            .results(2, Page::Html(results_html(None, &[("2", Some("080442957X"))])))
            .results(3, Page::Html(results_html(None, &[("2", Some("080442957X"))]))),
    );
    let indexer = Indexer::new(pipeline(&dir, site.clone()));

    let report = indexer.build_index(&SearchQuery::all(), false, 1).await.unwrap();

    assert_eq!(report.failed_pages, vec![2]);
    assert_eq!(report.review_total, 2);
    assert!(report.index.contains("080442957X", &ReviewId::new("2")));
}

#[tokio::test]
async fn test_index_resolves_isbn_from_review_page() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(0, Page::Html(results_html(Some(1), &[("7", None)])))
            .review("7", Page::Html(review_html("Sieben", "978 3 16 148410 0"))),
    );
    let pipeline = pipeline(&dir, site.clone());

    let report = Indexer::new(pipeline.clone())
        .build_index(&SearchQuery::all(), true, 1)
        .await
        .unwrap();
    assert!(report.index.contains("9783161484100", &ReviewId::new("7")));
    assert_eq!(site.calls(), 2);

    // The review page fetched for the ISBN is reused by the build
    let built = DatabaseBuilder::new(pipeline)
        .build(&report.index, 1)
        .await
        .unwrap();
    assert_eq!(built.database.review_count(), 1);
    assert_eq!(site.calls(), 2);
}

#[tokio::test]
async fn test_shutdown_cancels_remaining_reviews() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(scenario_site());
    let pipeline = pipeline(&dir, site.clone());
    pipeline.shutdown().trigger();

    let report = DatabaseBuilder::new(pipeline)
        .build(&scenario_index(), 2)
        .await
        .unwrap();

    assert!(report.database.is_empty());
    assert_eq!(report.cancelled(), 3);
    assert_eq!(site.calls(), 0);
}

#[tokio::test]
async fn test_coordinator_index_then_build() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(
                0,
                Page::Html(results_html(
                    Some(2),
                    &[("1", Some("978-3-16-148410-0")), ("2", Some("0306406152"))],
                )),
            )
            .review("1", Page::Html(review_html("Eins", "978-3-16-148410-0")))
            .review("2", Page::Html(review_html("Zwei", "0306406152"))),
    );
    let config = test_config(&dir, 2);
    let coordinator = Coordinator::with_transport(config, site.clone(), Shutdown::new()).unwrap();

    let summary = coordinator.index(true, None).await.unwrap();
    assert_eq!(summary.added, 2);
    let on_disk = Index::load(&dir.path().join("index.json")).unwrap();
    assert_eq!(on_disk, summary.report.index);

    let report = coordinator.build(None, None).await.unwrap();
    assert!(report.failures.is_empty());
    let database = Database::load(&dir.path().join("database.json")).unwrap();
    assert_eq!(database, report.database);
    assert_eq!(database.review_count(), 2);

    let stats = coordinator.stats().unwrap();
    assert_eq!(stats.database.map(|d| d.reviews), Some(2));
    assert_eq!(stats.cache.positive, 3);

    // Nothing new to fetch
    let calls = site.calls();
    let update = coordinator.update().await.unwrap();
    assert_eq!(update.skipped, 2);
    assert_eq!(site.calls(), calls);
}

#[tokio::test]
async fn test_coordinator_backup_and_query() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(
        StubSite::new()
            .results(0, Page::Html(results_html(Some(2), &[("1", None), ("2", None)])))
            .review("1", Page::Html(review_html("Eins", "0306406152")))
            .review("2", Page::Status(404)),
    );
    let coordinator =
        Coordinator::with_transport(test_config(&dir, 1), site.clone(), Shutdown::new()).unwrap();

    let backup = coordinator.backup(false).await.unwrap();
    assert_eq!(backup.records, 1);
    assert_eq!(backup.failures.len(), 1);
    let path = backup.path.unwrap();
    assert!(path.starts_with(dir.path().join("backups")));
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("backup-") && name.ends_with(".json"));

    let counted = coordinator.query(&SearchQuery::all(), true).await.unwrap();
    assert_eq!(counted.hits, 2);
    assert!(counted.records.is_empty());

    let result = coordinator.query(&SearchQuery::all(), false).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].title.as_deref(), Some("Eins"));
}

#[tokio::test]
async fn test_reindex_picks_up_new_reviews() {
    let dir = TempDir::new().unwrap();
    let before = Arc::new(
        StubSite::new().results(0, Page::Html(results_html(Some(1), &[("1", Some("0306406152"))]))),
    );
    let after = Arc::new(StubSite::new().results(
        0,
        Page::Html(results_html(
            Some(2),
            &[("1", Some("0306406152")), ("2", Some("080442957X"))],
        )),
    ));

    let first = Coordinator::with_transport(test_config(&dir, 1), before, Shutdown::new()).unwrap();
    assert_eq!(first.index(false, None).await.unwrap().added, 1);

    // Same cache directory, the site has grown in the meantime
    let second =
        Coordinator::with_transport(test_config(&dir, 1), after.clone(), Shutdown::new()).unwrap();
    let summary = second.index(false, None).await.unwrap();

    assert_eq!(after.requested(), vec!["start=0"]);
    assert_eq!(summary.added, 1);
    let on_disk = Index::load(&dir.path().join("index.json")).unwrap();
    assert!(on_disk.contains("0306406152", &ReviewId::new("1")));
    assert!(on_disk.contains("080442957X", &ReviewId::new("2")));
}

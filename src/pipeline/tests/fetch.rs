use super::*;
use crate::types::{ContentKind, FetchErrorEntry, HistoryEntry, HistoryMap, HistoryStatus};

#[tokio::test]
async fn test_known_urls_never_reach_resolver() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = StateStore::new(config.paths.clone());

    let mut media = MediaMap::new();
    media.insert("https://a.test/p/media/".to_string(), MediaRecord::default());
    store.save_media(&media).await.unwrap();

    let mut history = HistoryMap::new();
    history.insert(
        "https://a.test/p/history/".to_string(),
        HistoryEntry::fetched("https://a.test/p/history/"),
    );
    store.save_history(&history).await.unwrap();

    store
        .save_fetch_errors(
            &[],
            &[FetchErrorEntry {
                url: "https://a.test/p/error/".to_string(),
                reason: "invalid link".to_string(),
            }],
        )
        .await
        .unwrap();

    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(config, resolver.clone());

    let (media, summary) = harvester
        .fetch(&urls(&[
            "https://a.test/p/media/",
            "https://a.test/p/history/",
            "https://a.test/p/error/",
            "https://a.test/p/new/",
        ]))
        .await;

    assert_eq!(resolver.calls(), urls(&["https://a.test/p/new/"]));
    assert_eq!(summary.scheduled, 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(media.len(), 2);
}

#[tokio::test]
async fn test_unauthorized_stops_new_fetches_and_keeps_in_flight_results() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.fetch.concurrency = 2;

    let slow = "https://a.test/reel/slow/";
    let denied = "https://a.test/reel/denied/";
    let resolver = Arc::new(
        ScriptedResolver::new()
            .reply_after(
                slow,
                Reply::Record(video_record("https://cdn.test/slow.mp4")),
                Duration::from_millis(200),
            )
            .reply(denied, Reply::Unauthorized),
    );
    let harvester = harvester(config, resolver.clone());

    let (_, summary) = harvester
        .fetch(&urls(&[
            slow,
            denied,
            "https://a.test/reel/c/",
            "https://a.test/reel/d/",
            "https://a.test/reel/e/",
        ]))
        .await;

    let mut calls = resolver.calls();
    calls.sort();
    assert_eq!(calls, urls(&[denied, slow]), "no call may start after the 401");
    assert!(summary.aborted);
    assert_eq!(summary.fetched, 1);

    let persisted = harvester.store().load_media().await;
    assert!(persisted.contains_key(slow), "in-flight result must be persisted");
    assert!(!persisted.contains_key(denied));

    let history = harvester.store().load_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[slow].kind, Some(ContentKind::Reel));
}

#[tokio::test]
async fn test_permanent_errors_are_memorized_once() {
    let dir = TempDir::new().unwrap();
    let bad = "https://a.test/stories/1/";
    let gone = "https://a.test/p/gone/";
    let flaky = "https://a.test/p/flaky/";

    let resolver = Arc::new(
        ScriptedResolver::new()
            .reply(bad, Reply::Unsupported)
            .reply(gone, Reply::InvalidLink)
            .reply(flaky, Reply::Transient),
    );
    let harvester = harvester(test_config(&dir), resolver.clone());
    let list = urls(&[bad, gone, flaky]);

    let (_, first) = harvester.fetch(&list).await;
    assert_eq!(first.permanent_failures, 2);
    assert_eq!(first.transient_failures, 1);

    let (_, second) = harvester.fetch(&list).await;
    assert_eq!(second.scheduled, 1, "only the transient failure is retried next run");

    let errors = harvester.store().load_fetch_errors().await;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.url != flaky));

    // first try plus two retries, twice
    let flaky_calls = resolver.calls().iter().filter(|u| *u == flaky).count();
    assert_eq!(flaky_calls, 6);
    assert_eq!(resolver.calls().iter().filter(|u| *u == bad).count(), 1);
}

#[tokio::test]
async fn test_success_cap_stops_new_fetches() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.fetch.concurrency = 1;
    config.fetch.max_batch_size = 2;

    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(config, resolver.clone());

    let (media, summary) = harvester
        .fetch(&urls(&[
            "https://a.test/p/1/",
            "https://a.test/p/2/",
            "https://a.test/p/3/",
            "https://a.test/p/4/",
        ]))
        .await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.attempts, 2);
    assert_eq!(resolver.calls().len(), 2);
    assert_eq!(media.len(), 2);
}

#[tokio::test]
async fn test_attempt_cap_limits_scheduled_urls() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.fetch.max_total_attempts = 3;

    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(config, resolver.clone());

    let list: Vec<String> = (0..6).map(|i| format!("https://a.test/p/{i}/")).collect();
    let (_, summary) = harvester.fetch(&list).await;

    assert_eq!(summary.scheduled, 3);
    assert_eq!(resolver.calls().len(), 3);
}

#[tokio::test]
async fn test_existing_history_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let store = StateStore::new(config.paths.clone());

    let old = "https://a.test/p/old/";
    let mut history = HistoryMap::new();
    let mut entry = HistoryEntry::fetched(old);
    entry.status = HistoryStatus::Downloaded;
    entry.item_count = Some(4);
    history.insert(old.to_string(), entry.clone());
    store.save_history(&history).await.unwrap();

    let harvester = harvester(config, Arc::new(ScriptedResolver::new()));
    harvester.fetch(&urls(&["https://a.test/p/new/"])).await;

    let history = harvester.store().load_history().await;
    assert_eq!(history[old], entry);
    assert_eq!(history["https://a.test/p/new/"].status, HistoryStatus::Fetched);
}

#[tokio::test]
async fn test_shutdown_before_fetch_starts_nothing_but_still_persists() {
    let dir = TempDir::new().unwrap();
    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(test_config(&dir), resolver.clone());

    harvester.shutdown_token().cancel();
    let (_, summary) = harvester.fetch(&urls(&["https://a.test/p/1/"])).await;

    assert!(resolver.calls().is_empty());
    assert!(summary.aborted);
    assert!(harvester.store().paths().data_file.exists());
    assert!(harvester.store().paths().history_file.exists());
}

#[tokio::test]
async fn test_mixed_validity_media_file_survives_a_fetch() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(
        &config.paths.data_file,
        r#"{
            "https://a.test/p/good/": {
                "media_details": [{"type": "video", "url": "https://cdn.test/g.mp4"}],
                "localPaths": ["media/videos/g.mp4"]
            },
            "https://a.test/p/odd/": {"media_details": null},
            "https://a.test/p/untyped/": {"media_details": [{"url": "https://cdn.test/u.jpg", "width": -1}]},
            "https://a.test/p/junk/": "oops"
        }"#,
    )
    .unwrap();

    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(config, resolver.clone());

    let (media, summary) = harvester
        .fetch(&urls(&[
            "https://a.test/p/good/",
            "https://a.test/p/odd/",
            "https://a.test/p/junk/",
            "https://a.test/p/new/",
        ]))
        .await;

    assert_eq!(resolver.calls(), urls(&["https://a.test/p/new/"]));
    assert_eq!(summary.scheduled, 1);
    assert_eq!(media.len(), 5);

    let saved = harvester.store().load_media().await;
    assert_eq!(saved.len(), 5);
    assert_eq!(
        saved["https://a.test/p/good/"].local_paths,
        vec![std::path::PathBuf::from("media/videos/g.mp4")]
    );
    assert!(saved["https://a.test/p/junk/"].is_unreadable());
    assert!(saved.contains_key("https://a.test/p/odd/"));
    assert!(saved.contains_key("https://a.test/p/untyped/"));
}

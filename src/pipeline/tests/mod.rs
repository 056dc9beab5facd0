use super::*;
use crate::config::{PathsConfig, RetryConfig};
use crate::error::ResolveError;
use crate::types::{MediaItem, MediaKind, MediaRecord};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

mod fetch;

/// What the scripted resolver answers for a URL
#[derive(Clone)]
enum Reply {
    Record(MediaRecord),
    Unauthorized,
    Unsupported,
    InvalidLink,
    Transient,
}

/// In-process [`Resolver`] that answers from a script and records every call
struct ScriptedResolver {
    replies: HashMap<String, (Reply, Duration)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn reply(self, url: &str, reply: Reply) -> Self {
        self.reply_after(url, reply, Duration::ZERO)
    }

    fn reply_after(mut self, url: &str, reply: Reply, delay: Duration) -> Self {
        self.replies.insert(url.to_string(), (reply, delay));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, url: &str) -> std::result::Result<MediaRecord, ResolveError> {
        self.calls.lock().unwrap().push(url.to_string());

        let (reply, delay) = self
            .replies
            .get(url)
            .cloned()
            .unwrap_or_else(|| (Reply::Record(video_record("https://cdn.test/v.mp4")), Duration::ZERO));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Record(record) => Ok(record),
            Reply::Unauthorized => Err(ResolveError::from_message("401 Unauthorized")),
            Reply::Unsupported => Err(ResolveError::from_message("Only posts/reels supported")),
            Reply::InvalidLink => Err(ResolveError::from_message(
                "Media not found, please check if your link is valid",
            )),
            Reply::Transient => Err(ResolveError::Status {
                status: 503,
                body: "busy".to_string(),
            }),
        }
    }
}

fn video_record(url: &str) -> MediaRecord {
    MediaRecord::with_items(vec![MediaItem::new(MediaKind::Video, url, "video/mp4")])
}

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Config rooted in a scratch directory with near-instant retries
fn test_config(dir: &TempDir) -> Config {
    let mut config = Config {
        paths: PathsConfig::rooted_at(dir.path()),
        ..Default::default()
    };
    config.fetch.retry = fast_retry(2);
    config.download.retry = fast_retry(2);
    config
}

fn harvester(config: Config, resolver: Arc<ScriptedResolver>) -> Harvester {
    Harvester::with_resolver(config, resolver).unwrap()
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_run_without_input_file_fails() {
    let dir = TempDir::new().unwrap();
    let resolver = Arc::new(ScriptedResolver::new());
    let harvester = harvester(test_config(&dir), resolver.clone());

    let result = harvester
        .run(&dir.path().join("missing.txt"), ProcessingOrder::Descending)
        .await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(resolver.calls().is_empty());
}

#[tokio::test]
async fn test_run_with_nothing_to_download_skips_download_stage() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reels.txt");
    std::fs::write(&input, "https://www.instagram.com/stories/x/\n").unwrap();

    let resolver = Arc::new(
        ScriptedResolver::new().reply("https://www.instagram.com/stories/x/", Reply::Unsupported),
    );
    let harvester = harvester(test_config(&dir), resolver);

    let report = harvester.run(&input, ProcessingOrder::Descending).await.unwrap();

    assert_eq!(report.fetch.permanent_failures, 1);
    assert!(report.download.is_none());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.fetch.concurrency = 0;

    let result = Harvester::with_resolver(config, Arc::new(ScriptedResolver::new()));
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_descending_order_reaches_resolver_newest_first() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reels.txt");
    std::fs::write(&input, "https://a.test/p/1/\nhttps://a.test/p/2/\nhttps://a.test/p/3/\n")
        .unwrap();

    let mut config = test_config(&dir);
    config.fetch.concurrency = 1;
    config.fetch.max_batch_size = 1;
    let resolver = Arc::new(ScriptedResolver::new().reply(
        "https://a.test/p/3/",
        Reply::Record(MediaRecord::default()),
    ));
    let harvester = harvester(config, resolver.clone());

    harvester.run(&input, ProcessingOrder::Descending).await.unwrap();

    assert_eq!(resolver.calls(), urls(&["https://a.test/p/3/"]));
}

use super::*;
use crate::types::{
    BrokenLinkEntry, FetchErrorEntry, HistoryEntry, HistoryStatus, MediaItem, MediaKind,
    MediaRecord,
};
use std::path::PathBuf;
use tempfile::TempDir;


fn test_store() -> (StateStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(PathsConfig::rooted_at(temp_dir.path()));
    (store, temp_dir)
}

fn error_entry(url: &str, reason: &str) -> FetchErrorEntry {
    FetchErrorEntry {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn test_load_missing_file_yields_empty_value() {
    let temp_dir = TempDir::new().unwrap();

    let map: crate::types::MediaMap = load_json(&temp_dir.path().join("absent.json")).await;
    let list: Vec<FetchErrorEntry> = load_json(&temp_dir.path().join("absent.json")).await;

    assert!(map.is_empty());
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_load_corrupt_file_yields_empty_value() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    std::fs::write(&path, "{\"truncated\": ").unwrap();

    let map: crate::types::HistoryMap = load_json(&path).await;
    assert!(map.is_empty(), "parse errors must never be fatal");

    // wrong shape is treated the same way
    std::fs::write(&path, "[1, 2, 3]").unwrap();
    let map: crate::types::HistoryMap = load_json(&path).await;
    assert!(map.is_empty());
}

#[tokio::test]
async fn test_corrupt_file_is_moved_aside_before_save() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.json");
    std::fs::write(&path, "{\"truncated\": ").unwrap();

    let _: crate::types::HistoryMap = load_json(&path).await;
    assert!(!path.exists());
    let aside = temp_dir.path().join("history.json.corrupt");
    assert_eq!(std::fs::read_to_string(&aside).unwrap(), "{\"truncated\": ");

    save_json(&path, &crate::types::HistoryMap::new()).await.unwrap();
    assert!(aside.exists(), "saving must not touch the quarantined copy");

    // a second corrupt file does not replace the first copy
    std::fs::write(&path, "not json").unwrap();
    let _: crate::types::HistoryMap = load_json(&path).await;
    assert_eq!(std::fs::read_to_string(&aside).unwrap(), "{\"truncated\": ");
    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("history.json.corrupt.1")).unwrap(),
        "not json"
    );
}

#[tokio::test]
async fn test_one_bad_record_keeps_the_rest_of_the_media_file() {
    let (store, temp_dir) = test_store();
    std::fs::write(
        &store.paths().data_file,
        r#"{
            "https://a.test/p/good/": {"media_details": [], "localPaths": ["media/videos/g.mp4"]},
            "https://a.test/p/odd/": {"media_details": null},
            "https://a.test/p/junk/": 42
        }"#,
    )
    .unwrap();

    let media = store.load_media().await;
    assert_eq!(media.len(), 3);
    assert!(media["https://a.test/p/good/"].is_downloaded());
    assert!(!temp_dir.path().join("mediaData.json.corrupt").exists());

    store.save_media(&media).await.unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&store.paths().data_file).unwrap()).unwrap();
    assert_eq!(raw["https://a.test/p/junk/"], 42);
    assert_eq!(raw["https://a.test/p/good/"]["localPaths"][0], "media/videos/g.mp4");
}

#[tokio::test]
async fn test_save_is_pretty_and_leaves_no_temp_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("out.json");

    save_json(&path, &vec![error_entry("https://a", "bad")])
        .await
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\n  "), "output should be pretty-printed");
    assert!(!temp_path(&path).exists());

    let reloaded: Vec<FetchErrorEntry> = load_json(&path).await;
    assert_eq!(reloaded, vec![error_entry("https://a", "bad")]);
}

#[tokio::test]
async fn test_save_overwrites_previous_content() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("links.json");

    save_json(&path, &vec![1, 2, 3]).await.unwrap();
    save_json(&path, &vec![4]).await.unwrap();

    let reloaded: Vec<i32> = load_json(&path).await;
    assert_eq!(reloaded, vec![4]);
}

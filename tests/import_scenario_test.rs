// tests/import_scenario_test.rs

mod common;

use common::{Behavior, FakeClient, document, text_message};
use serde_json::{Value, json};
use std::{fs, path::Path};
use tempfile::{TempDir, tempdir};
use tg_media_dl::{
    config::{AppConfig, store::ConfigStore},
    downloader::ImportJob,
    error::AppError,
};

fn write_config(dir: &TempDir, state: Value) -> std::path::PathBuf {
    let mut config = json!({
        "api_id": 12345,
        "api_hash": "0123456789abcdef",
        "chat_id": 42,
        "media_types": ["document", "photo"],
        "file_formats": { "document": ["all"] },
        "comment": "user notes survive rewrites"
    });
    for (key, value) in state.as_object().unwrap() {
        config[key] = value.clone();
    }
    let path = dir.path().join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

fn read_config(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn app_config(dir: &TempDir, pagination_limit: usize) -> AppConfig {
    AppConfig {
        download_dir: dir.path().join("downloads"),
        pagination_limit,
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn test_backlog_fills_first_page_and_progress_is_saved_per_page() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        &dir,
        json!({ "last_read_message_id": 100, "ids_to_retry": [95], "ids_to_skip": [90] }),
    );
    let client = FakeClient::new()
        .with_server_message(document(95))
        .with_history(vec![document(101), document(102), document(103)])
        .watching_config(&config_path);
    let config = app_config(&dir, 2);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert_eq!(client.download_ids(), vec![95, 101, 102, 103]);
    // 第一页 [95, 101] 处理期间水位线仍为 100，第二页开始前已写回 101
    assert_eq!(
        *client.observed_watermarks.lock().unwrap(),
        vec![(95, 100), (101, 100), (102, 101), (103, 101)]
    );
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.last_read_message_id, 103);
    assert!(summary.all_succeeded());

    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 103);
    assert_eq!(saved["ids_to_retry"], json!([]));
    assert_eq!(saved["ids_to_skip"], json!([90, 95, 101, 102, 103]));
    assert_eq!(saved["comment"], "user notes survive rewrites");
    // 跳过列表中的 90 不在历史范围内，从未被访问
    assert!(!client.download_ids().contains(&90));
}

#[tokio::test]
async fn test_failed_message_is_retried_on_next_run() {
    let dir = tempdir().unwrap();
    let config_path = write_config(&dir, json!({ "last_read_message_id": 100 }));
    let config = app_config(&dir, 3);

    // 第一次运行：102 失败
    let client = FakeClient::new()
        .with_history(vec![document(101), document(102), document(103)])
        .with_script(102, vec![Behavior::Fail]);
    let mut store = ConfigStore::load(&config_path).unwrap();
    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert!(!summary.all_succeeded());
    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 103);
    assert_eq!(saved["ids_to_retry"], json!([102]));
    assert_eq!(saved["ids_to_skip"], json!([101, 103]));

    // 第二次运行：只重试 102
    let client = FakeClient::new().with_history(vec![document(101), document(102), document(103)]);
    let mut store = ConfigStore::load(&config_path).unwrap();
    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert_eq!(client.download_ids(), vec![102]);
    assert!(summary.all_succeeded());
    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 103);
    assert_eq!(saved["ids_to_retry"], json!([]));
    assert_eq!(saved["ids_to_skip"], json!([101, 102, 103]));
}

#[tokio::test]
async fn test_vanished_and_mediafree_messages_leave_the_backlog() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        &dir,
        json!({ "last_read_message_id": 50, "ids_to_retry": [40, 41] }),
    );
    // 40 已被删除，41 变成了纯文本
    let client = FakeClient::new().with_server_message(text_message(41));
    let config = app_config(&dir, 5);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert!(client.download_ids().is_empty());
    assert_eq!(summary.last_read_message_id, 50);
    let saved = read_config(&config_path);
    assert_eq!(saved["ids_to_retry"], json!([]));
    assert_eq!(saved["ids_to_skip"], json!([]));
}

#[tokio::test]
async fn test_history_error_persists_processed_page_then_fails() {
    let dir = tempdir().unwrap();
    let config_path = write_config(&dir, json!({ "last_read_message_id": 100 }));
    let client = FakeClient::new()
        .with_history(vec![document(101), document(102), document(103)])
        .with_history_error_after(1);
    let config = app_config(&dir, 5);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let result = ImportJob::new(&client, &config, &mut store).run().await;

    assert!(matches!(result, Err(AppError::Api { status: 500, .. })));
    assert_eq!(client.download_ids(), vec![101]);
    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 101);
    assert_eq!(saved["ids_to_skip"], json!([101]));
}

#[tokio::test]
async fn test_backlog_lookup_error_keeps_retry_ids_and_continues_forward() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        &dir,
        json!({ "last_read_message_id": 100, "ids_to_retry": [95, 96] }),
    );
    let client = FakeClient::new()
        .with_server_message(document(95))
        .with_history(vec![document(101), document(102)])
        .with_lookup_error();
    let config = app_config(&dir, 5);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert_eq!(*client.lookups.lock().unwrap(), vec![vec![95, 96]]);
    assert_eq!(client.download_ids(), vec![101, 102]);
    assert_eq!(summary.last_read_message_id, 102);
    let saved = read_config(&config_path);
    assert_eq!(saved["ids_to_retry"], json!([95, 96]));
    assert_eq!(saved["ids_to_skip"], json!([101, 102]));
    assert_eq!(saved["last_read_message_id"], 102);
}

#[tokio::test]
async fn test_large_backlog_is_split_into_full_pages() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        &dir,
        json!({ "last_read_message_id": 100, "ids_to_retry": [1, 2, 3] }),
    );
    let client = FakeClient::new()
        .with_server_message(document(1))
        .with_server_message(document(2))
        .with_server_message(document(3))
        .with_history(vec![document(101), document(102)])
        .watching_config(&config_path);
    let config = app_config(&dir, 2);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert_eq!(client.download_ids(), vec![1, 2, 3, 101, 102]);
    // 第一页 [1, 2] 不推进水位线；第二页 [3, 101]；第三页 [102]
    assert_eq!(
        *client.observed_watermarks.lock().unwrap(),
        vec![(1, 100), (2, 100), (3, 100), (101, 100), (102, 101)]
    );
    assert_eq!(summary.pages, 3);
    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 102);
    assert_eq!(saved["ids_to_retry"], json!([]));
    assert_eq!(saved["ids_to_skip"], json!([1, 2, 3, 101, 102]));
}

#[tokio::test]
async fn test_empty_history_keeps_state() {
    let dir = tempdir().unwrap();
    let config_path = write_config(
        &dir,
        json!({ "last_read_message_id": 7, "ids_to_skip": [3, 5] }),
    );
    let client = FakeClient::new();
    let config = app_config(&dir, 3);
    let mut store = ConfigStore::load(&config_path).unwrap();

    let summary = ImportJob::new(&client, &config, &mut store).run().await.unwrap();

    assert_eq!(summary.pages, 0);
    assert_eq!(summary.last_read_message_id, 7);
    let saved = read_config(&config_path);
    assert_eq!(saved["last_read_message_id"], 7);
    assert_eq!(saved["ids_to_skip"], json!([3, 5]));
    assert!(dir.path().join("downloads").is_dir());
}

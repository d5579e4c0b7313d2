//! Library mode end to end against a mock API

mod common;

use common::{
    api_error, assert_file_content, files_under, library_node, mount_library_level,
    mount_library_page, mount_raw_download, mount_successful_export, runner, test_config,
};
use feishu_backup::{BackupSource, Config};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer};

const SPACE: &str = "spcLib";

fn library_config(server: &MockServer, root: &Path) -> Config {
    let mut config = test_config(server, BackupSource::MyLibrary, root);
    config.space_id = SPACE.to_string();
    config.run_subdir_by_date = false;
    config
}

/// Reject every export submission for `token` with a non-retryable error
async fn mount_export_rejected(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/drive/v1/export_tasks"))
        .and(body_partial_json(json!({"token": token})))
        .respond_with(api_error(1069902, "file type not supported"))
        .mount(server)
        .await;
}

// ============================================================================
// Raw download fallback
// ============================================================================

#[tokio::test]
async fn uploaded_files_fall_back_to_raw_download() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![
            library_node("wikPhoto", "boxPhoto", "file", "photo", false),
            library_node("wikScan", "boxScan", "file", "scan.png", false),
        ],
    )
    .await;
    mount_export_rejected(&server, "boxPhoto").await;
    mount_export_rejected(&server, "boxScan").await;
    mount_raw_download(&server, "boxPhoto", b"jpeg").await;
    mount_raw_download(&server, "boxScan", b"png").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_eq!(files_under(temp_dir.path()), vec!["photo.bin", "scan.png"]);
    assert_file_content(&temp_dir.path().join("photo.bin"), b"jpeg");
    assert_file_content(&temp_dir.path().join("scan.png"), b"png");

    let stats = &report.stats;
    assert_eq!(stats.files, 2);
    assert_eq!(stats.exported, 0);
    assert_eq!(stats.fallback_downloaded, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn failed_fallback_records_both_errors() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![library_node("wikGone", "boxGone", "file", "gone.zip", false)],
    )
    .await;
    mount_export_rejected(&server, "boxGone").await;
    Mock::given(method("GET"))
        .and(path("/drive/v1/files/boxGone/download"))
        .respond_with(wiremock::ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert!(files_under(temp_dir.path()).is_empty());
    assert_eq!(report.stats.failed, 1);

    let failure = report.stats.failures[0].to_string();
    assert!(failure.starts_with("gone.zip (boxGone) export_error="), "{failure}");
    assert!(failure.contains("; download_error="), "{failure}");
    assert!(failure.contains("404"), "{failure}");
    assert_eq!(report.exit_code(), 2);
}

// ============================================================================
// Node tree
// ============================================================================

#[tokio::test]
async fn nodes_with_children_become_directories() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![
            library_node("wikHandbook", "doxHandbook", "docx", "Handbook", true),
            library_node("wikBudget", "shtBudget", "sheet", "Budget", false),
        ],
    )
    .await;
    mount_library_level(
        &server,
        SPACE,
        Some("wikHandbook"),
        vec![library_node("wikOnboard", "doxOnboard", "docx", "Onboarding", true)],
    )
    .await;
    mount_library_level(
        &server,
        SPACE,
        Some("wikOnboard"),
        vec![library_node("wikDeck", "sldDeck", "slides", "Welcome", false)],
    )
    .await;
    mount_successful_export(&server, "doxHandbook", "docx", b"handbook").await;
    mount_successful_export(&server, "shtBudget", "xlsx", b"budget").await;
    mount_successful_export(&server, "doxOnboard", "docx", b"onboarding").await;
    mount_successful_export(&server, "sldDeck", "pptx", b"deck").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_eq!(
        files_under(temp_dir.path()),
        vec![
            "Budget.xlsx",
            "Handbook.docx",
            "Handbook/Onboarding.docx",
            "Handbook/Onboarding/Welcome.pptx",
        ]
    );
    assert_file_content(
        &temp_dir.path().join("Handbook/Onboarding/Welcome.pptx"),
        b"deck",
    );

    let stats = &report.stats;
    assert_eq!(stats.folders, 2);
    assert_eq!(stats.files, 4);
    assert_eq!(stats.exported, 4);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn library_listing_uses_space_and_page_size() {
    let server = MockServer::start().await;
    mount_library_level(&server, SPACE, None, vec![]).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_eq!(report.stats.files, 0);
    assert_eq!(report.exit_code(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/wiki/v2/spaces/spcLib/nodes");
    assert!(
        requests[0]
            .url
            .query_pairs()
            .any(|(k, v)| k == "page_size" && v == "50")
    );
}

#[tokio::test]
async fn failing_child_listing_keeps_siblings() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![
            library_node("wikBroken", "doxBroken", "docx", "Broken", true),
            library_node("wikAfter", "doxAfter", "docx", "After", false),
        ],
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/wiki/v2/spaces/{SPACE}/nodes")))
        .and(wiremock::matchers::query_param("parent_node_token", "wikBroken"))
        .respond_with(api_error(131006, "permission denied"))
        .mount(&server)
        .await;
    mount_successful_export(&server, "doxBroken", "docx", b"b").await;
    mount_successful_export(&server, "doxAfter", "docx", b"a").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_eq!(
        files_under(temp_dir.path()),
        vec!["After.docx", "Broken.docx"]
    );
    assert_eq!(report.stats.exported, 2);
    assert_eq!(report.stats.failed, 1);

    let failure = report.stats.failures[0].to_string();
    assert!(
        failure.starts_with("Broken (wikBroken) listing_error="),
        "{failure}"
    );
    assert!(failure.contains("131006"), "{failure}");
}

#[tokio::test]
async fn null_has_child_is_treated_as_leaf() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![json!({
            "node_token": "wikLeaf",
            "obj_token": "doxLeaf",
            "obj_type": "docx",
            "title": "Leaf",
            "has_child": null
        })],
    )
    .await;
    mount_successful_export(&server, "doxLeaf", "docx", b"leaf").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_eq!(files_under(temp_dir.path()), vec!["Leaf.docx"]);
    assert_eq!(report.stats.exported, 1);
    assert_eq!(report.stats.folders, 0);
    assert_eq!(report.stats.failed, 0);
}

#[tokio::test]
async fn dot_titled_node_keeps_children_inside_the_run_directory() {
    let server = MockServer::start().await;
    mount_library_level(
        &server,
        SPACE,
        None,
        vec![library_node("wikDot", "doxDot", "docx", ".", true)],
    )
    .await;
    mount_library_level(
        &server,
        SPACE,
        Some("wikDot"),
        vec![library_node("wikChild", "doxChild", "docx", "child", false)],
    )
    .await;
    mount_successful_export(&server, "doxDot", "docx", b"dot").await;
    mount_successful_export(&server, "doxChild", "docx", b"child").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("backup");
    let config = library_config(&server, &root);
    let report = runner(&config).run(&root).await.unwrap();

    assert_eq!(
        files_under(temp_dir.path()),
        vec!["backup/_.docx", "backup/_/child.docx"]
    );
    assert_eq!(report.stats.failed, 0);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn library_pages_are_followed_in_order() {
    let server = MockServer::start().await;
    mount_library_page(
        &server,
        SPACE,
        None,
        None,
        json!({
            "items": [library_node("wikA", "doxA", "docx", "Chapter", false)],
            "has_more": true,
            "page_token": "L2"
        }),
    )
    .await;
    mount_library_page(
        &server,
        SPACE,
        None,
        Some("L2"),
        json!({
            "items": [library_node("wikB", "doxB", "docx", "Chapter", false)],
            "has_more": false
        }),
    )
    .await;
    mount_successful_export(&server, "doxA", "docx", b"one").await;
    mount_successful_export(&server, "doxB", "docx", b"two").await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = library_config(&server, temp_dir.path());
    let report = runner(&config).run(temp_dir.path()).await.unwrap();

    assert_file_content(&temp_dir.path().join("Chapter.docx"), b"one");
    assert_file_content(&temp_dir.path().join("Chapter (1).docx"), b"two");
    assert_eq!(report.stats.exported, 2);
    assert_eq!(report.stats.failed, 0);

    let cursors: Vec<Option<String>> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == format!("/wiki/v2/spaces/{SPACE}/nodes"))
        .map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "page_token")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert_eq!(cursors, vec![None, Some("L2".to_string())]);
}

//! Pixiv fetch-by-id through the acquisition pool.

mod common;

use common::{png_fixture, TestHarness};
use pixluna::acquisition::AcquisitionResult;
use pixluna::config::Config;
use pixluna_common::ErrorKind;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_work(h: &TestHarness, page_count: u32) {
    let uri = h.server.uri();
    Mock::given(method("GET"))
        .and(path("/ajax/illust/777"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "message": "",
            "body": {
                "id": "777",
                "title": "Multi",
                "userName": "artist",
                "xRestrict": 0,
                "createDate": "2024-01-02T17:04:05+09:00",
                "urls": {"original": format!("{uri}/img-original/777_p0.png")},
                "tags": {"tags": [{"tag": "multi"}]},
                "pageCount": page_count
            }
        })))
        .mount(&h.server)
        .await;

    for page in 0..page_count {
        Mock::given(method("GET"))
            .and(path(format!("/img-original/777_p{page}.png")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_fixture()))
            .mount(&h.server)
            .await;
    }
}

fn pixiv_config() -> Config {
    let mut config = Config::default();
    config.pixiv.php_sessid = "sess".into();
    config.max_concurrency = 2;
    config
}

#[tokio::test]
async fn test_fetches_every_page() {
    let h = TestHarness::new().await;
    mount_work(&h, 3).await;
    let acquirer = h.acquirer(pixiv_config());

    let results = acquirer.acquire_pixiv_pages("777", 0, true).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));
    for r in &results {
        assert_eq!(r.image().unwrap().metadata.id, "777");
    }
}

#[tokio::test]
async fn test_page_out_of_range_is_error_entry() {
    let h = TestHarness::new().await;
    mount_work(&h, 2).await;
    let acquirer = h.acquirer(pixiv_config());

    let results = acquirer.acquire_pixiv_pages("777", 5, false).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::PageOutOfRange));
}

#[tokio::test]
async fn test_missing_session_is_error_entry() {
    let h = TestHarness::new().await;
    mount_work(&h, 1).await;
    let acquirer = h.acquirer(Config::default());

    let results = acquirer.acquire_pixiv_pages("777", 0, false).await.unwrap();
    assert_eq!(results[0].error_kind(), Some(ErrorKind::UpstreamMetadata));
}

#[tokio::test]
async fn test_all_pages_without_session_is_error_entry() {
    let h = TestHarness::new().await;
    mount_work(&h, 3).await;
    let acquirer = h.acquirer(Config::default());

    let results = acquirer.acquire_pixiv_pages("777", 0, true).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].index(), 0);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::UpstreamMetadata));
    assert_eq!(h.request_count().await, 0);
}

#[tokio::test]
async fn test_all_pages_with_failed_detail_is_error_entry() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path("/ajax/illust/888"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true,
            "message": "work has been deleted",
            "body": null
        })))
        .mount(&h.server)
        .await;
    let acquirer = h.acquirer(pixiv_config());

    let results = acquirer.acquire_pixiv_pages("888", 0, true).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::UpstreamMetadata));
    assert!(matches!(
        &results[0],
        AcquisitionResult::Error { message, .. } if message.contains("deleted")
    ));

    // Unmounted id: the detail call 404s.
    let results = acquirer.acquire_pixiv_pages("999", 0, true).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].is_success());
}

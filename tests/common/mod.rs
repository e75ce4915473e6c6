//! Shared test harness for integration tests.
//!
//! [`TestHarness`] starts a [`MockServer`] that impersonates a Lolicon-style
//! API and an image host, and registers a handful of aliases whose providers
//! point at it:
//!
//! - `good` serves a real PNG with no regular variant;
//! - `regular` serves a real PNG and reports a regular variant;
//! - `empty` answers with no items;
//! - `broken` points at an image URL that returns 404;
//! - `garbage` serves bytes that are not an image.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use pixluna::acquisition::Acquirer;
use pixluna::config::Config;
use pixluna::http::HttpClient;
use pixluna::source::providers::LoliconProvider;
use pixluna::source::ProviderRegistry;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ALIASES: [&str; 5] = ["good", "regular", "empty", "broken", "garbage"];

pub struct TestHarness {
    pub server: MockServer,
    pub registry: Arc<ProviderRegistry>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();

        mount_api(&server, "good", json!({"original": format!("{uri}/img/good.png")})).await;
        mount_api(
            &server,
            "regular",
            json!({
                "original": format!("{uri}/img/good.png"),
                "regular": format!("{uri}/img/good.png")
            }),
        )
        .await;
        mount_api(&server, "broken", json!({"original": format!("{uri}/img/missing.png")})).await;
        mount_api(&server, "garbage", json!({"original": format!("{uri}/img/garbage.png")})).await;
        Mock::given(method("POST"))
            .and(path("/api/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "", "data": []})))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/img/good.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_fixture()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/garbage.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not an image at all".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let registry = ProviderRegistry::new();
        for alias in ALIASES {
            let endpoint = format!("{uri}/api/{alias}");
            registry.register(&[alias], "mock source", move |ctx| {
                Box::new(LoliconProvider::lolicon(ctx).with_endpoint(endpoint.clone()))
            });
        }

        Self {
            server,
            registry: Arc::new(registry),
        }
    }

    pub fn acquirer(&self, config: Config) -> Acquirer {
        Acquirer::new(
            Arc::clone(&self.registry),
            Arc::new(config),
            HttpClient::new(None).expect("http client"),
        )
        .with_pixiv_endpoint(self.server.uri())
    }

    /// Number of requests the mock server has seen so far.
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

pub fn config_with_defaults(defaults: &[&str]) -> Config {
    Config {
        max_concurrency: 3,
        default_source_provider: defaults.iter().map(|s| s.to_string()).collect(),
        ..Config::default()
    }
}

/// 4x4 opaque PNG.
pub fn png_fixture() -> Vec<u8> {
    let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode fixture");
    buf.into_inner()
}

async fn mount_api(server: &MockServer, alias: &str, urls: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/api/{alias}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "",
            "data": [{
                "pid": 1000,
                "title": format!("{alias} work"),
                "author": "mock",
                "r18": false,
                "tags": ["mock"],
                "ext": "png",
                "aiType": 0,
                "uploadDate": 0,
                "urls": urls
            }]
        })))
        .mount(server)
        .await;
}

//! Lolicon-compatible random setu APIs.
//!
//! Lolicon and Lolisuki share one request/response shape, so a single
//! [`LoliconProvider`] serves both with a different endpoint and name.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const LOLICON_URL: &str = "https://api.lolicon.app/setu/v2";
pub const LOLISUKI_URL: &str = "https://lolisuki.cn/api/setu/v1";
const PIXIV_REFERER: &str = "https://www.pixiv.net/";

// ---------------------------------------------------------------------------
// API types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetuRequest<'a> {
    r18: u8,
    num: u8,
    size: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<[&'a str; 1]>,
    #[serde(rename = "excludeAI")]
    exclude_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SetuResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    data: Vec<SetuItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetuItem {
    pid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    r18: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    ai_type: u8,
    #[serde(default)]
    upload_date: i64,
    urls: SetuUrls,
}

#[derive(Debug, Deserialize)]
struct SetuUrls {
    original: Option<String>,
    regular: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

pub struct LoliconProvider {
    name: &'static str,
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl LoliconProvider {
    pub fn lolicon(ctx: &ProviderContext) -> Self {
        Self::new("lolicon", LOLICON_URL, ctx)
    }

    pub fn lolisuki(ctx: &ProviderContext) -> Self {
        Self::new("lolisuki", LOLISUKI_URL, ctx)
    }

    fn new(name: &'static str, endpoint: &str, ctx: &ProviderContext) -> Self {
        Self {
            name,
            endpoint: endpoint.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    /// Point the provider at a different API URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ImageProvider for LoliconProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: self.name,
            referer: Some(PIXIV_REFERER),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let tag = request.tag.as_deref();
        let body = SetuRequest {
            r18: u8::from(request.adult),
            num: 1,
            size: &request.sizes,
            keyword: tag,
            tag: tag.map(|t| [t]),
            exclude_ai: request.exclude_ai,
            proxy: request.proxy.as_deref(),
        };

        let resp: SetuResponse = self.http.post_json(&self.endpoint, &body).await?;
        if !resp.error.is_empty() {
            return Err(Error::upstream(format!("{}: {}", self.name, resp.error)));
        }

        let item = resp
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream(format!("{}: no image data returned", self.name)))?;

        let original = item
            .urls
            .original
            .filter(|u| !u.is_empty())
            .or_else(|| item.urls.regular.clone())
            .ok_or_else(|| Error::upstream(format!("{}: item {} has no url", self.name, item.pid)))?;
        let urls = ImageUrls {
            original,
            regular: item.urls.regular,
        };

        let url = if self.config.image_processing.compress || !urls.has_regular() {
            urls.original.clone()
        } else {
            urls.regular.clone().unwrap_or_else(|| urls.original.clone())
        };

        let raw = GeneralImageData {
            id: item.pid.to_string(),
            title: item.title,
            author: item.author,
            r18: item.r18,
            tags: item.tags,
            extension: item.ext,
            ai_type: item.ai_type,
            upload_date: item.upload_date,
            urls: urls.clone(),
        };

        debug!(source = self.name, id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::registry::tests::test_context;
    use pixluna_common::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(tag: Option<&str>) -> AcquisitionRequest {
        AcquisitionRequest::from_config(tag, &Config::default())
    }

    #[tokio::test]
    async fn test_parses_first_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/setu/v2"))
            .and(body_partial_json(json!({"r18": 0, "num": 1, "tag": ["cat"], "excludeAI": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "",
                "data": [{
                    "pid": 123,
                    "p": 0,
                    "uid": 9,
                    "title": "Cat",
                    "author": "someone",
                    "r18": false,
                    "tags": ["cat"],
                    "ext": "jpg",
                    "aiType": 1,
                    "uploadDate": 1700000000000i64,
                    "urls": {
                        "original": "https://i.pixiv.re/img-original/123_p0.jpg",
                        "regular": "https://i.pixiv.re/img-master/123_p0_master1200.jpg"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let provider =
            LoliconProvider::lolicon(&test_context()).with_endpoint(format!("{}/setu/v2", server.uri()));
        let meta = provider.fetch_metadata(&request(Some("cat"))).await.unwrap();

        assert_eq!(meta.raw.id, "123");
        assert_eq!(meta.raw.ai_type, 1);
        assert_eq!(meta.raw.upload_date, 1_700_000_000_000);
        // Not compressing, so the regular rendition is downloaded.
        assert!(meta.url.contains("master1200"));
        assert!(meta.urls.has_regular());
    }

    #[tokio::test]
    async fn test_compress_prefers_original() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "",
                "data": [{
                    "pid": 1,
                    "urls": {"original": "https://x/o.png", "regular": "https://x/r.jpg"}
                }]
            })))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.image_processing.compress = true;
        let mut provider = LoliconProvider::lolisuki(&test_context()).with_endpoint(server.uri());
        provider.configure(Arc::new(config));

        let meta = provider.fetch_metadata(&request(None)).await.unwrap();
        assert_eq!(meta.url, "https://x/o.png");
        assert_eq!(provider.meta().name, "lolisuki");
    }

    #[tokio::test]
    async fn test_empty_data_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "", "data": []})))
            .mount(&server)
            .await;

        let provider = LoliconProvider::lolicon(&test_context()).with_endpoint(server.uri());
        let err = provider.fetch_metadata(&request(None)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMetadata);
    }

    #[tokio::test]
    async fn test_api_error_string_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "bad tag", "data": []})),
            )
            .mount(&server)
            .await;

        let provider = LoliconProvider::lolicon(&test_context()).with_endpoint(server.uri());
        let err = provider.fetch_metadata(&request(None)).await.unwrap_err();
        assert!(err.to_string().contains("bad tag"));
    }
}

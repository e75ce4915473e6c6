//! Danbooru random post provider.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, LoginKeyPair};
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

pub const DANBOORU_URL: &str = "https://danbooru.donmai.us";

#[derive(Debug, Deserialize)]
struct DanbooruPost {
    id: u64,
    #[serde(default)]
    created_at: String,
    file_url: Option<String>,
    large_file_url: Option<String>,
    #[serde(default)]
    tag_string: String,
    #[serde(default)]
    tag_string_artist: String,
    #[serde(default)]
    rating: String,
}

pub struct DanbooruProvider {
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl DanbooruProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            endpoint: DANBOORU_URL.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn key_pair(&self) -> Option<&LoginKeyPair> {
        self.config
            .danbooru
            .key_pairs
            .choose(&mut rand::thread_rng())
    }
}

/// `"a, b|c"` → `"a b c rating:general"`.
fn build_tags(tag: Option<&str>, adult: bool) -> String {
    let mut tags: Vec<&str> = tag
        .unwrap_or_default()
        .split([',', '，', '|', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    tags.push(if adult { "rating:explicit" } else { "rating:general" });
    tags.join(" ")
}

fn parse_timestamp(s: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

#[async_trait]
impl ImageProvider for DanbooruProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "danbooru",
            referer: Some("https://danbooru.donmai.us"),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let mut query = vec![
            ("tags", build_tags(request.tag.as_deref(), request.adult)),
            ("random", "true".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(pair) = self.key_pair() {
            query.push(("login", pair.login.clone()));
            query.push(("api_key", pair.api_key.clone()));
        }

        let url = format!("{}/posts.json", self.endpoint);
        let posts: Vec<DanbooruPost> = self.http.get_json(&url, &query, &[]).await?;
        let post = posts
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("danbooru: no posts matched"))?;

        // Restricted posts come back without file URLs for anonymous users.
        let original = post
            .file_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::upstream(format!("danbooru: post {} has no file url", post.id)))?;
        let urls = ImageUrls {
            regular: post.large_file_url.filter(|u| !u.is_empty()),
            original,
        };

        let url = match (&urls.regular, self.config.image_processing.compress) {
            (Some(large), true) => large.clone(),
            _ => urls.original.clone(),
        };

        let raw = GeneralImageData {
            id: post.id.to_string(),
            title: String::new(),
            author: post.tag_string_artist.replace('_', " "),
            r18: matches!(post.rating.as_str(), "e" | "q"),
            tags: post.tag_string.split_whitespace().map(String::from).collect(),
            extension: url_extension(&urls.original),
            ai_type: 0,
            upload_date: parse_timestamp(&post.created_at),
            urls: urls.clone(),
        };

        debug!(source = "danbooru", id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::registry::tests::test_context;
    use pixluna_common::ErrorKind;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_tags() {
        assert_eq!(build_tags(None, false), "rating:general");
        assert_eq!(
            build_tags(Some("blue_sky, cloud|sea"), true),
            "blue_sky cloud sea rating:explicit"
        );
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2024-01-02T03:04:05.000-05:00"), 1_704_182_645_000);
        assert_eq!(parse_timestamp("garbage"), 0);
    }

    #[tokio::test]
    async fn test_fetches_random_post_with_key_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts.json"))
            .and(query_param("tags", "cat rating:general"))
            .and(query_param("random", "true"))
            .and(query_param("login", "me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 42,
                "created_at": "2024-01-02T03:04:05.000-05:00",
                "file_url": "https://cdn.donmai.us/original/ab/cd/abcd.png",
                "large_file_url": "https://cdn.donmai.us/sample/ab/cd/sample-abcd.jpg",
                "tag_string": "cat 1girl",
                "tag_string_artist": "some_artist",
                "rating": "q"
            }])))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.danbooru.key_pairs.push(LoginKeyPair {
            login: "me".into(),
            api_key: "secret".into(),
        });
        let mut provider = DanbooruProvider::new(&test_context()).with_endpoint(server.uri());
        provider.configure(Arc::new(config.clone()));

        let req = AcquisitionRequest::from_config(Some("cat"), &config);
        let meta = provider.fetch_metadata(&req).await.unwrap();

        assert_eq!(meta.raw.id, "42");
        assert_eq!(meta.raw.author, "some artist");
        assert!(meta.raw.r18);
        assert_eq!(meta.raw.tags, vec!["cat", "1girl"]);
        assert_eq!(meta.raw.extension, "png");
        assert_eq!(meta.url, "https://cdn.donmai.us/original/ab/cd/abcd.png");
    }

    #[tokio::test]
    async fn test_post_without_file_url_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "rating": "e"}])))
            .mount(&server)
            .await;

        let provider = DanbooruProvider::new(&test_context()).with_endpoint(server.uri());
        let req = AcquisitionRequest::from_config(None, &Config::default());
        let err = provider.fetch_metadata(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMetadata);
    }

    #[tokio::test]
    async fn test_empty_list_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let provider = DanbooruProvider::new(&test_context()).with_endpoint(server.uri());
        let req = AcquisitionRequest::from_config(None, &Config::default());
        let err = provider.fetch_metadata(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamMetadata);
    }
}

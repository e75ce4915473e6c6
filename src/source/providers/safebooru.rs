//! Safebooru (Gelbooru-style DAPI) provider.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

pub const SAFEBOORU_URL: &str = "https://safebooru.org";

/// Format of DAPI's `created_at`, e.g. `Sat Jan 06 12:30:00 -0600 2024`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Deserialize)]
struct SafebooruPost {
    id: u64,
    directory: String,
    image: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    rating: String,
    #[serde(default)]
    sample: bool,
    #[serde(default)]
    created_at: String,
}

pub struct SafebooruProvider {
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl SafebooruProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            endpoint: SAFEBOORU_URL.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn urls_for(&self, post: &SafebooruPost) -> ImageUrls {
        let original = format!(
            "{}/images/{}/{}?{}",
            self.endpoint, post.directory, post.image, post.id
        );
        let regular = post.sample.then(|| {
            format!(
                "{}/samples/{}/sample_{}?{}",
                self.endpoint, post.directory, post.image, post.id
            )
        });
        ImageUrls { original, regular }
    }
}

fn build_tags(tag: Option<&str>) -> String {
    let mut tags: Vec<&str> = tag
        .unwrap_or_default()
        .split([',', '，'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    tags.push("sort:random");
    tags.join(" ")
}

pub(super) fn parse_timestamp(s: &str) -> i64 {
    chrono::DateTime::parse_from_str(s, CREATED_AT_FORMAT)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

#[async_trait]
impl ImageProvider for SafebooruProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "safebooru",
            referer: Some("https://safebooru.org"),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let query = [
            ("page", "dapi".to_string()),
            ("s", "post".to_string()),
            ("q", "index".to_string()),
            ("json", "1".to_string()),
            ("limit", "1".to_string()),
            ("tags", build_tags(request.tag.as_deref())),
        ];

        let url = format!("{}/index.php", self.endpoint);
        // DAPI answers an empty body rather than `[]` when nothing matches,
        // which surfaces as an UpstreamMetadata parse error.
        let posts: Vec<SafebooruPost> = self.http.get_json(&url, &query, &[]).await?;
        let post = posts
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("safebooru: no posts matched"))?;

        let urls = self.urls_for(&post);
        let url = match (&urls.regular, self.config.image_processing.compress) {
            (Some(sample), true) => sample.clone(),
            _ => urls.original.clone(),
        };

        let raw = GeneralImageData {
            id: post.id.to_string(),
            title: format!("Safebooru - {}", post.id),
            author: post.owner.replace('_', " "),
            r18: !matches!(post.rating.as_str(), "safe" | "general" | ""),
            tags: post.tags.split_whitespace().map(String::from).collect(),
            extension: url_extension(&post.image),
            ai_type: 0,
            upload_date: parse_timestamp(&post.created_at),
            urls: urls.clone(),
        };

        debug!(source = "safebooru", id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

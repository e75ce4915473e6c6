//! e621 provider.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, LoginKeyPair};
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

pub const E621_URL: &str = "https://e621.net";

/// e621 rejects browser-looking agents; it wants a project name.
const E621_USER_AGENT: &str = concat!("pixluna/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<E621Post>,
}

#[derive(Debug, Deserialize)]
struct E621Post {
    id: u64,
    #[serde(default)]
    created_at: String,
    file: FileRef,
    #[serde(default)]
    sample: FileRef,
    #[serde(default)]
    tags: PostTags,
    #[serde(default)]
    rating: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileRef {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PostTags {
    #[serde(default)]
    general: Vec<String>,
    #[serde(default)]
    artist: Vec<String>,
}

pub struct E621Provider {
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl E621Provider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            endpoint: E621_URL.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("user-agent", E621_USER_AGENT.to_string())];
        if let Some(pair) = self.key_pair() {
            headers.push(("authorization", basic_auth(pair)));
        }
        headers
    }

    fn key_pair(&self) -> Option<&LoginKeyPair> {
        self.config.e621.key_pairs.choose(&mut rand::thread_rng())
    }
}

fn basic_auth(pair: &LoginKeyPair) -> String {
    let token = STANDARD.encode(format!("{}:{}", pair.login, pair.api_key));
    format!("Basic {token}")
}

fn build_tags(tag: Option<&str>, adult: bool) -> String {
    let mut tags: Vec<&str> = tag
        .unwrap_or_default()
        .split([',', '，', '|', ' '])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    tags.push("order:random");
    tags.push(if adult { "-rating:s" } else { "rating:s" });
    tags.join(" ")
}

fn parse_timestamp(s: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

#[async_trait]
impl ImageProvider for E621Provider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "e621",
            referer: Some("https://e621.net"),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let query = [
            ("tags", build_tags(request.tag.as_deref(), request.adult)),
            ("limit", "1".to_string()),
        ];

        let url = format!("{}/posts.json", self.endpoint);
        let resp: PostsResponse = self.http.get_json(&url, &query, &self.headers()).await?;
        let post = resp
            .posts
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("e621: no posts matched"))?;

        // Posts hidden from anonymous users carry a null file url.
        let original = post
            .file
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::upstream(format!("e621: post {} has no file url", post.id)))?;
        let urls = ImageUrls {
            regular: post.sample.url.filter(|u| !u.is_empty()),
            original,
        };
        let url = match (&urls.regular, self.config.image_processing.compress) {
            (Some(sample), true) => sample.clone(),
            _ => urls.original.clone(),
        };

        let PostTags { general, artist } = post.tags;
        let raw = GeneralImageData {
            id: post.id.to_string(),
            title: String::new(),
            author: artist.join(", "),
            r18: post.rating != "s",
            tags: general.into_iter().chain(artist).collect(),
            extension: url_extension(&urls.original),
            ai_type: 0,
            upload_date: parse_timestamp(&post.created_at),
            urls: urls.clone(),
        };

        debug!(source = "e621", id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

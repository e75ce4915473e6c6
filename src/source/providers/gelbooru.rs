//! Gelbooru DAPI provider.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::debug;

use super::safebooru::parse_timestamp;
use crate::config::{Config, GelbooruKeyPair};
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

pub const GELBOORU_URL: &str = "https://gelbooru.com";

/// Gelbooru wraps the post list, and omits `post` entirely on no match.
#[derive(Debug, Deserialize)]
struct GelbooruResponse {
    #[serde(default)]
    post: Vec<GelbooruPost>,
}

#[derive(Debug, Deserialize)]
struct GelbooruPost {
    id: u64,
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    sample_url: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    rating: String,
    #[serde(default)]
    created_at: String,
}

pub struct GelbooruProvider {
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl GelbooruProvider {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            endpoint: GELBOORU_URL.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn key_pair(&self) -> Option<&GelbooruKeyPair> {
        self.config
            .gelbooru
            .key_pairs
            .choose(&mut rand::thread_rng())
    }
}

fn build_tags(tag: Option<&str>, adult: bool) -> String {
    let mut tags: Vec<&str> = tag
        .unwrap_or_default()
        .split([',', '，'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    tags.push("sort:random");
    if !adult {
        tags.push("rating:general");
    }
    tags.join(" ")
}

#[async_trait]
impl ImageProvider for GelbooruProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: "gelbooru",
            referer: Some("https://gelbooru.com/"),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let mut query = vec![
            ("page", "dapi".to_string()),
            ("s", "post".to_string()),
            ("q", "index".to_string()),
            ("json", "1".to_string()),
            ("limit", "1".to_string()),
            ("tags", build_tags(request.tag.as_deref(), request.adult)),
        ];
        if let Some(pair) = self.key_pair() {
            query.push(("api_key", pair.api_key.clone()));
        }

        let url = format!("{}/index.php", self.endpoint);
        let resp: GelbooruResponse = self.http.get_json(&url, &query, &[]).await?;
        let post = resp
            .post
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("gelbooru: no posts matched"))?;
        if post.file_url.is_empty() {
            return Err(Error::upstream(format!("gelbooru: post {} has no file url", post.id)));
        }

        let urls = ImageUrls {
            regular: Some(post.sample_url).filter(|u| !u.is_empty()),
            original: post.file_url,
        };
        let url = match (&urls.regular, self.config.image_processing.compress) {
            (Some(sample), true) => sample.clone(),
            _ => urls.original.clone(),
        };

        let title = if post.source.is_empty() {
            format!("Gelbooru - {}", post.id)
        } else {
            post.source
        };
        let raw = GeneralImageData {
            id: post.id.to_string(),
            title,
            author: post.owner.replace('_', " "),
            r18: matches!(post.rating.as_str(), "explicit" | "questionable"),
            tags: post.tags.split_whitespace().map(String::from).collect(),
            extension: url_extension(&urls.original),
            ai_type: 0,
            upload_date: parse_timestamp(&post.created_at),
            urls: urls.clone(),
        };

        debug!(source = "gelbooru", id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

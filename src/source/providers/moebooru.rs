//! Moebooru-family providers: Konachan, yande.re and Lolibooru.
//!
//! The three sites run the same engine and differ only in endpoint, rating
//! tag vocabulary and the salt wrapped around the password before hashing.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{url_extension, Error, GeneralImageData, ImageMetadata, ImageUrls, Result};
use rand::seq::SliceRandom;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::config::{Config, PasswordKeyPair};
use crate::http::HttpClient;
use crate::source::provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};

/// Per-site constants.
#[derive(Debug, Clone, Copy)]
pub struct MoebooruSite {
    pub name: &'static str,
    pub endpoint: &'static str,
    /// Path of the JSON post listing.
    pub posts_path: &'static str,
    /// Password salt; `{}` is replaced with the password.
    pub salt: &'static str,
    pub adult_rating: &'static str,
    pub safe_rating: &'static str,
    /// Image URLs may contain raw spaces and need escaping.
    pub escape_urls: bool,
    pub key_pairs: fn(&Config) -> &[PasswordKeyPair],
}

pub const KONACHAN: MoebooruSite = MoebooruSite {
    name: "konachan",
    endpoint: "https://konachan.com",
    posts_path: "/post.json",
    salt: "So-I-Heard-You-Like-Mupkids-?--{}--",
    adult_rating: "-rating:s",
    safe_rating: "rating:safe",
    escape_urls: false,
    key_pairs: |c| c.konachan.key_pairs.as_slice(),
};

pub const YANDE: MoebooruSite = MoebooruSite {
    name: "yande",
    endpoint: "https://yande.re",
    posts_path: "/post.json",
    salt: "choujin-steiner--{}--",
    adult_rating: "rating:explicit",
    safe_rating: "rating:safe",
    escape_urls: false,
    key_pairs: |c| c.yande.key_pairs.as_slice(),
};

pub const LOLIBOORU: MoebooruSite = MoebooruSite {
    name: "lolibooru",
    endpoint: "https://lolibooru.moe",
    posts_path: "/post/index.json",
    salt: "--{}--",
    adult_rating: "-rating:s",
    safe_rating: "rating:s",
    escape_urls: true,
    key_pairs: |c| c.lolibooru.key_pairs.as_slice(),
};

/// Moebooru reports `created_at` as epoch seconds; some forks send a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreatedAt {
    Seconds(i64),
    Text(String),
}

impl CreatedAt {
    fn millis(&self) -> i64 {
        match self {
            CreatedAt::Seconds(s) => s * 1000,
            CreatedAt::Text(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|d| d.timestamp_millis())
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MoebooruPost {
    id: u64,
    created_at: Option<CreatedAt>,
    #[serde(default)]
    file_url: String,
    #[serde(default)]
    sample_url: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    rating: String,
}

pub struct MoebooruProvider {
    site: MoebooruSite,
    endpoint: String,
    config: Arc<Config>,
    http: HttpClient,
}

impl MoebooruProvider {
    pub fn new(site: MoebooruSite, ctx: &ProviderContext) -> Self {
        Self {
            site,
            endpoint: site.endpoint.to_string(),
            config: Arc::clone(&ctx.config),
            http: ctx.http.clone(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn key_pair(&self) -> Option<&PasswordKeyPair> {
        (self.site.key_pairs)(&self.config).choose(&mut rand::thread_rng())
    }

    fn build_tags(&self, tag: Option<&str>, adult: bool) -> String {
        let mut tags: Vec<&str> = tag
            .unwrap_or_default()
            .split([',', '，', '|', ' '])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        tags.push("order:random");
        tags.push(if adult {
            self.site.adult_rating
        } else {
            self.site.safe_rating
        });
        tags.join(" ")
    }

    fn escape(&self, url: String) -> String {
        if !self.site.escape_urls {
            return url;
        }
        match reqwest::Url::parse(&url) {
            Ok(parsed) => parsed.into(),
            Err(_) => url,
        }
    }
}

/// Hex SHA-1 of the salted password, as Moebooru's `password_hash` expects.
pub fn password_hash(salt: &str, password: &str) -> String {
    let salted = salt.replacen("{}", password, 1);
    hex::encode(Sha1::digest(salted.as_bytes()))
}

#[async_trait]
impl ImageProvider for MoebooruProvider {
    fn meta(&self) -> ProviderMeta {
        ProviderMeta {
            name: self.site.name,
            referer: Some(self.site.endpoint),
        }
    }

    fn configure(&mut self, config: Arc<Config>) {
        self.config = config;
    }

    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata> {
        let mut query = vec![
            ("tags", self.build_tags(request.tag.as_deref(), request.adult)),
            ("limit", "1".to_string()),
        ];
        if let Some(pair) = self.key_pair() {
            query.push(("login", pair.login.clone()));
            query.push(("password_hash", password_hash(self.site.salt, &pair.password)));
        }

        let url = format!("{}{}", self.endpoint, self.site.posts_path);
        let posts: Vec<MoebooruPost> = self.http.get_json(&url, &query, &[]).await?;
        let post = posts
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream(format!("{}: no posts matched", self.site.name)))?;
        if post.file_url.is_empty() {
            return Err(Error::upstream(format!(
                "{}: post {} has no file url",
                self.site.name, post.id
            )));
        }

        let urls = ImageUrls {
            regular: Some(post.sample_url)
                .filter(|u| !u.is_empty())
                .map(|u| self.escape(u)),
            original: self.escape(post.file_url),
        };
        let url = match (&urls.regular, self.config.image_processing.compress) {
            (Some(sample), true) => sample.clone(),
            _ => urls.original.clone(),
        };

        let raw = GeneralImageData {
            id: post.id.to_string(),
            title: post.source,
            author: post.author.replace('_', " "),
            r18: matches!(post.rating.as_str(), "e" | "q"),
            tags: post.tags.split_whitespace().map(String::from).collect(),
            extension: url_extension(&urls.original),
            ai_type: 0,
            upload_date: post.created_at.as_ref().map_or(0, CreatedAt::millis),
            urls: urls.clone(),
        };

        debug!(source = self.site.name, id = %raw.id, "Fetched image metadata");
        Ok(ImageMetadata { url, urls, raw })
    }
}

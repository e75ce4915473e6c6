//! Trait definition and request types for image source providers.
//!
//! This module defines the [`ImageProvider`] trait that every content source
//! (Lolicon, Danbooru, Pixiv discovery, ...) must implement, along with the
//! per-job [`AcquisitionRequest`] handed to it.

use std::sync::Arc;

use async_trait::async_trait;
use pixluna_common::{ImageMetadata, Result};
use rand::Rng;

use crate::config::Config;
use crate::http::HttpClient;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything a provider needs to pick one item. Built fresh for each job and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    /// Free-text tag query as typed by the caller.
    pub tag: Option<String>,
    /// Whether adult content is permitted at all.
    pub allow_adult: bool,
    /// Probability of asking for adult content when permitted.
    pub adult_probability: f64,
    /// The outcome of the adult-content draw for this job.
    pub adult: bool,
    /// Skip AI-generated works where the source can tell.
    pub exclude_ai: bool,
    /// Size variants the source should return.
    pub sizes: Vec<String>,
    /// Base-URL override for image hosts that support a reverse proxy.
    pub proxy: Option<String>,
}

impl AcquisitionRequest {
    /// Build a request from the configuration, drawing the adult flag from
    /// the thread-local RNG.
    pub fn from_config(tag: Option<&str>, config: &Config) -> Self {
        Self::from_config_with_rng(tag, config, &mut rand::thread_rng())
    }

    /// Same as [`from_config`](Self::from_config) with an explicit RNG.
    pub fn from_config_with_rng<R: Rng + ?Sized>(
        tag: Option<&str>,
        config: &Config,
        rng: &mut R,
    ) -> Self {
        let adult = config.is_r18 && rng.gen::<f64>() < config.r18_probability;
        let tag = tag.map(str::trim).filter(|t| !t.is_empty()).map(String::from);
        let proxy = Some(config.base_url.trim())
            .filter(|u| !u.is_empty())
            .map(String::from);

        Self {
            tag,
            allow_adult: config.is_r18,
            adult_probability: config.r18_probability,
            adult,
            exclude_ai: config.exclude_ai,
            sizes: vec!["original".to_string(), "regular".to_string()],
            proxy,
        }
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Static facts about a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderMeta {
    /// Short, lowercase identifier (e.g. `"danbooru"`).
    pub name: &'static str,
    /// Referer the image host insists on, if any.
    pub referer: Option<&'static str>,
}

/// What a provider factory receives when building an instance.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub config: Arc<Config>,
    pub http: HttpClient,
}

impl ProviderContext {
    pub fn new(config: Arc<Config>, http: HttpClient) -> Self {
        Self { config, http }
    }
}

/// Async trait that all image sources must implement.
///
/// Each provider wraps a single external API and exposes a uniform interface
/// for picking one item. Instances are created per job by the resolver, so
/// implementations may hold per-instance state without synchronisation.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Name and download requirements of this source.
    fn meta(&self) -> ProviderMeta;

    /// Replace the configuration the provider reads credentials and
    /// preferences from.
    fn configure(&mut self, config: Arc<Config>);

    /// Fetch metadata for one item matching `request`.
    ///
    /// Returns [`Error::UpstreamMetadata`](pixluna_common::Error::UpstreamMetadata)
    /// when the source answers without a usable item.
    async fn fetch_metadata(&self, request: &AcquisitionRequest) -> Result<ImageMetadata>;
}

//! Batch acquisition entry point.

use std::sync::Arc;

use pixluna_common::Result;
use tracing::{info, warn};

use super::assembler;
use super::job::Job;
use super::pool::{AcquisitionPool, MAX_JOBS};
use super::result::AcquisitionResult;
use crate::config::Config;
use crate::http::HttpClient;
use crate::source::providers::PixivByIdProvider;
use crate::source::{
    AcquisitionRequest, ImageProvider, ProviderContext, ProviderRegistry, ProviderResolver,
};

/// Resolves providers and runs batches through an [`AcquisitionPool`].
///
/// # Examples
///
/// ```rust,ignore
/// let acquirer = Acquirer::new(Arc::new(ProviderRegistry::with_builtin()), config, http);
/// let results = acquirer.acquire_batch(Some("cat"), 3, None).await?;
/// assert_eq!(results.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Acquirer {
    resolver: ProviderResolver,
    config: Arc<Config>,
    http: HttpClient,
    pixiv_endpoint: Option<String>,
}

impl Acquirer {
    pub fn new(registry: Arc<ProviderRegistry>, config: Arc<Config>, http: HttpClient) -> Self {
        let ctx = ProviderContext::new(Arc::clone(&config), http.clone());
        Self {
            resolver: ProviderResolver::new(registry, ctx),
            config,
            http,
            pixiv_endpoint: None,
        }
    }

    /// Send Pixiv fetch-by-id traffic to a different ajax host.
    pub fn with_pixiv_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.pixiv_endpoint = Some(endpoint.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve a single provider instance, explicitly or from the default list.
    pub fn resolve_provider(&self, alias: Option<&str>) -> Result<Box<dyn ImageProvider>> {
        self.resolver.resolve(alias)
    }

    fn job(&self, request: AcquisitionRequest, provider: Box<dyn ImageProvider>) -> Job {
        Job::new(
            request,
            provider,
            self.config.image_processing.clone(),
            self.http.clone(),
        )
    }

    async fn run_jobs(&self, jobs: Vec<Job>) -> Result<Vec<AcquisitionResult>> {
        let mut pool = AcquisitionPool::new(self.config.max_concurrency);
        for job in jobs {
            pool.submit(job)?;
        }
        Ok(pool.run().await)
    }

    /// Acquire `count` items (capped at 10).
    ///
    /// Every provider is resolved before any job starts, so an unknown alias
    /// or an empty default list fails the whole call without network
    /// traffic. Once jobs are running, failures only show up as error entries
    /// and the batch always has `count` results.
    pub async fn acquire_batch(
        &self,
        tag: Option<&str>,
        count: usize,
        alias: Option<&str>,
    ) -> Result<Vec<AcquisitionResult>> {
        let count = count.min(MAX_JOBS);
        if count == 0 {
            return Ok(Vec::new());
        }

        let jobs = (0..count)
            .map(|_| -> Result<Job> {
                let provider = self.resolver.resolve(alias)?;
                let request = AcquisitionRequest::from_config(tag, &self.config);
                Ok(self.job(request, provider))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count, tag = ?tag, alias = ?alias, "Acquiring batch");
        self.run_jobs(jobs).await
    }

    /// Acquire one page of a Pixiv work, or with `all` every page (capped at 10).
    ///
    /// Upstream failures, including a failed page-count lookup for `all`,
    /// come back as error entries rather than `Err`.
    pub async fn acquire_pixiv_pages(
        &self,
        pid: &str,
        page: u32,
        all: bool,
    ) -> Result<Vec<AcquisitionResult>> {
        let mut base = PixivByIdProvider::new(self.resolver.context(), pid, page);
        if let Some(endpoint) = &self.pixiv_endpoint {
            base = base.with_endpoint(endpoint.clone());
        }

        let pages: Vec<u32> = if all {
            match base.page_count().await {
                Ok(page_count) => (0..page_count).take(MAX_JOBS).collect(),
                Err(e) => {
                    warn!(pid, error = %e, "Failed to count pixiv pages");
                    return Ok(vec![assembler::failure(0, &e)]);
                }
            }
        } else {
            vec![page]
        };

        info!(pid, pages = pages.len(), "Acquiring pixiv pages");
        let jobs = pages
            .into_iter()
            .map(|p| {
                let request = AcquisitionRequest::from_config(None, &self.config);
                self.job(request, Box::new(base.for_page(p)))
            })
            .collect();
        self.run_jobs(jobs).await
    }
}

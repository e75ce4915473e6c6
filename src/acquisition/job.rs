//! One unit of acquisition work.

use bytes::Bytes;
use pixluna_common::{Error, Result};
use tracing::debug;

use super::assembler;
use super::result::AcquisitionResult;
use crate::config::ImageProcessingConfig;
use crate::http::HttpClient;
use crate::images::TransformPipeline;
use crate::source::{AcquisitionRequest, ImageProvider};

/// Request, provider instance and transform settings for one item.
pub struct Job {
    pub request: AcquisitionRequest,
    pub provider: Box<dyn ImageProvider>,
    pub transform: ImageProcessingConfig,
    pub http: HttpClient,
}

impl Job {
    pub fn new(
        request: AcquisitionRequest,
        provider: Box<dyn ImageProvider>,
        transform: ImageProcessingConfig,
        http: HttpClient,
    ) -> Self {
        Self {
            request,
            provider,
            transform,
            http,
        }
    }

    /// Fetch metadata, download, transform, and assemble.
    pub async fn run(self, index: usize) -> Result<AcquisitionResult> {
        let meta = self.provider.meta();
        let metadata = self.provider.fetch_metadata(&self.request).await?;
        debug!(index, source = meta.name, url = %metadata.url, "Downloading");

        let data: Bytes = self.http.get_bytes(&metadata.url, meta.referer).await?;
        let has_regular = metadata.urls.has_regular();
        let pipeline = TransformPipeline::new(self.transform);

        let transformed = tokio::task::spawn_blocking(move || pipeline.apply(data, has_regular))
            .await
            .map_err(|e| Error::internal(format!("transform task failed: {e}")))?;

        Ok(assembler::assemble(index, metadata, transformed))
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("request", &self.request)
            .field("provider", &self.provider.meta().name)
            .field("transform", &self.transform)
            .finish()
    }
}

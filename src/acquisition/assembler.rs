//! Packages job outcomes into [`AcquisitionResult`]s.

use pixluna_common::{Error, ImageMetadata};
use tracing::warn;

use super::result::{AcquiredImage, AcquisitionResult};
use crate::images::Transformed;

/// Combine provider metadata with transformed bytes.
pub fn assemble(index: usize, metadata: ImageMetadata, transformed: Transformed) -> AcquisitionResult {
    if let Some(notice) = &transformed.notice {
        warn!(index, id = %metadata.raw.id, kind = %notice.kind(), "{notice}");
    }
    AcquisitionResult::Success {
        index,
        image: Box::new(AcquiredImage {
            metadata: metadata.raw,
            data: transformed.data,
            content_type: transformed.content_type.to_string(),
            notice: transformed.notice,
        }),
    }
}

/// Convert a job failure into an error entry.
pub fn failure(index: usize, err: &Error) -> AcquisitionResult {
    AcquisitionResult::Error {
        index,
        kind: err.kind(),
        message: err.to_string(),
    }
}

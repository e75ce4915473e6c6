use bytes::Bytes;
use pixluna_common::{ErrorKind, GeneralImageData};

use crate::images::TransformNotice;

/// A deliverable image: metadata plus the (possibly transformed) bytes.
#[derive(Debug, Clone)]
pub struct AcquiredImage {
    pub metadata: GeneralImageData,
    pub data: Bytes,
    /// Sniffed from `data`.
    pub content_type: String,
    /// Set when the transform pipeline fell back to the original bytes.
    pub notice: Option<TransformNotice>,
}

impl AcquiredImage {
    /// File extension matching the delivered bytes.
    pub fn extension(&self) -> &'static str {
        crate::images::mime::extension_for(&self.data)
    }

    /// `<index>_<id>.<ext>`, with every id character outside
    /// `[A-Za-z0-9_-]` replaced by `_` so a remote id cannot escape the
    /// output directory.
    pub fn file_name(&self, index: usize) -> String {
        let id: String = self
            .metadata
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        format!("{index}_{id}.{}", self.extension())
    }
}

/// Outcome of one job. A batch holds exactly one per submitted job.
#[derive(Debug, Clone)]
pub enum AcquisitionResult {
    Success {
        index: usize,
        image: Box<AcquiredImage>,
    },
    Error {
        index: usize,
        kind: ErrorKind,
        message: String,
    },
}

impl AcquisitionResult {
    /// Submission index of the job that produced this result.
    pub fn index(&self) -> usize {
        match self {
            Self::Success { index, .. } | Self::Error { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn image(&self) -> Option<&AcquiredImage> {
        match self {
            Self::Success { image, .. } => Some(image),
            Self::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Error { kind, .. } => Some(*kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_id(id: &str) -> AcquiredImage {
        AcquiredImage {
            metadata: GeneralImageData {
                id: id.to_string(),
                ..Default::default()
            },
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            content_type: "image/png".into(),
            notice: None,
        }
    }

    #[test]
    fn test_file_name_keeps_plain_ids() {
        assert_eq!(image_with_id("12345").file_name(3), "3_12345.png");
        assert_eq!(image_with_id("a-b_C").file_name(0), "0_a-b_C.png");
    }

    #[test]
    fn test_file_name_neutralizes_path_characters() {
        let name = image_with_id("../../etc/passwd").file_name(1);
        assert_eq!(name, "1_______etc_passwd.png");
        assert!(!name.contains('/'));
        assert_eq!(image_with_id("a\\b c").file_name(2), "2_a_b_c.png");
    }
}

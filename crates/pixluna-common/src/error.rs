//! Error taxonomy shared by every pixluna component.
//!
//! [`Error`] carries the failure itself; [`ErrorKind`] is the flat,
//! copyable classification that ends up inside per-job batch results.

use std::fmt;

/// Coarse classification of a failure or notice.
///
/// `OversizeSkipped` and `TransformDecodeFailure` are informational: they are
/// attached to successful results as notices and never raised as [`Error`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The alias is not present in the provider registry.
    ProviderNotFound,
    /// No explicit alias was given and the default list is empty.
    NoProviderConfigured,
    /// The source answered but returned no usable item.
    UpstreamMetadata,
    /// The requested page index is past the item's page count.
    PageOutOfRange,
    /// Transform skipped because the input exceeded the size ceiling.
    OversizeSkipped,
    /// The raster could not be decoded; original bytes were kept.
    TransformDecodeFailure,
    /// Network or HTTP-level failure talking to a source.
    Transport,
    /// Configuration values are out of range or malformed.
    InvalidConfig,
    /// The acquisition pool refused a job because it is full.
    PoolFull,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name, used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderNotFound => "provider_not_found",
            Self::NoProviderConfigured => "no_provider_configured",
            Self::UpstreamMetadata => "upstream_metadata",
            Self::PageOutOfRange => "page_out_of_range",
            Self::OversizeSkipped => "oversize_skipped",
            Self::TransformDecodeFailure => "transform_decode_failure",
            Self::Transport => "transport",
            Self::InvalidConfig => "invalid_config",
            Self::PoolFull => "pool_full",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common error type for pixluna.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No provider is registered under the alias.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Neither an explicit alias nor a default provider list was available.
    #[error("No image source provider configured")]
    NoProviderConfigured,

    /// The source returned no usable item.
    #[error("Upstream returned no usable item: {0}")]
    UpstreamMetadata(String),

    /// Page index past the end of a multi-page work.
    #[error("Page {page} out of range, the work has {page_count} page(s)")]
    PageOutOfRange {
        /// Requested zero-based page.
        page: u32,
        /// Number of pages the work actually has.
        page_count: u32,
    },

    /// A request to a source failed at the transport or HTTP layer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pool already holds its maximum number of jobs.
    #[error("Acquisition pool is full ({capacity} jobs)")]
    PoolFull {
        /// Maximum number of jobs one pool accepts.
        capacity: usize,
    },

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new ProviderNotFound error.
    pub fn provider_not_found<S: Into<String>>(alias: S) -> Self {
        Self::ProviderNotFound(alias.into())
    }

    /// Create a new UpstreamMetadata error.
    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        Self::UpstreamMetadata(msg.into())
    }

    /// Create a new Transport error from anything displayable (e.g. a
    /// `reqwest::Error`).
    pub fn transport<E: fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Create a new InvalidConfig error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProviderNotFound(_) => ErrorKind::ProviderNotFound,
            Self::NoProviderConfigured => ErrorKind::NoProviderConfigured,
            Self::UpstreamMetadata(_) => ErrorKind::UpstreamMetadata,
            Self::PageOutOfRange { .. } => ErrorKind::PageOutOfRange,
            Self::Transport(_) => ErrorKind::Transport,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::PoolFull { .. } => ErrorKind::PoolFull,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Resolution failures point at configuration, not at a flaky source.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::ProviderNotFound(_) | Self::NoProviderConfigured)
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::provider_not_found("pixiv");
        assert_eq!(err.to_string(), "Provider not found: pixiv");

        let err = Error::NoProviderConfigured;
        assert_eq!(err.to_string(), "No image source provider configured");

        let err = Error::PageOutOfRange {
            page: 3,
            page_count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Page 3 out of range, the work has 2 page(s)"
        );

        let err = Error::PoolFull { capacity: 10 };
        assert_eq!(err.to_string(), "Acquisition pool is full (10 jobs)");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::provider_not_found("x").kind(),
            ErrorKind::ProviderNotFound
        );
        assert_eq!(Error::upstream("empty").kind(), ErrorKind::UpstreamMetadata);
        assert_eq!(Error::transport("timed out").kind(), ErrorKind::Transport);
        assert_eq!(
            Error::invalid_config("bad").kind(),
            ErrorKind::InvalidConfig
        );
        assert_eq!(Error::internal("bug").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_resolution_errors() {
        assert!(Error::NoProviderConfigured.is_resolution());
        assert!(Error::provider_not_found("x").is_resolution());
        assert!(!Error::upstream("x").is_resolution());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::OversizeSkipped.to_string(), "oversize_skipped");
        assert_eq!(
            ErrorKind::TransformDecodeFailure.to_string(),
            "transform_decode_failure"
        );
    }
}

//! Image sources: the provider contract, the alias registry, resolution of
//! aliases to instances, and the concrete providers.

pub mod provider;
pub mod providers;
pub mod registry;
pub mod resolver;
pub mod tag_filter;

pub use provider::{AcquisitionRequest, ImageProvider, ProviderContext, ProviderMeta};
pub use registry::{ProviderDescriptor, ProviderFactory, ProviderRegistry};
pub use resolver::ProviderResolver;
pub use tag_filter::{filter_by_tags, parse_tags, CandidateItem};

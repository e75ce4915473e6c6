//! Image byte handling: the transform pipeline and content-type sniffing.

pub mod mime;
pub mod transform;

pub use transform::{TransformNotice, TransformPipeline, Transformed, MAX_PROCESS_BYTES};

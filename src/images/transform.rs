//! Raster transform pipeline: flip, single-pixel confusion, recompression.
//!
//! Stages run in that fixed order and only when enabled. Every failure
//! degrades to passing the original bytes through with a [`TransformNotice`];
//! nothing here returns an error.
//!
//! Decoding and encoding are CPU-bound. Callers on an async runtime should
//! run [`TransformPipeline::apply`] inside `spawn_blocking`.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use pixluna_common::{ErrorKind, FlipMode};
use rand::Rng;
use tracing::{debug, warn};

use super::mime;
use crate::config::ImageProcessingConfig;

/// Inputs at or above this size skip the pipeline entirely.
pub const MAX_PROCESS_BYTES: usize = 32 * 1024 * 1024;

/// Non-fatal outcome recorded alongside a passthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformNotice {
    /// Input was too large to process.
    OversizeSkipped { size: usize },
    /// Input could not be decoded or re-encoded.
    DecodeFailure { message: String },
}

impl TransformNotice {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OversizeSkipped { .. } => ErrorKind::OversizeSkipped,
            Self::DecodeFailure { .. } => ErrorKind::TransformDecodeFailure,
        }
    }
}

impl std::fmt::Display for TransformNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OversizeSkipped { size } => {
                write!(f, "transform skipped, input is {size} bytes")
            }
            Self::DecodeFailure { message } => {
                write!(f, "transform abandoned, original kept: {message}")
            }
        }
    }
}

/// Output of the pipeline.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub data: Bytes,
    /// Sniffed from `data`, never taken from a URL or header.
    pub content_type: &'static str,
    pub notice: Option<TransformNotice>,
}

impl Transformed {
    fn passthrough(data: Bytes, notice: Option<TransformNotice>) -> Self {
        let content_type = mime::sniff(&data);
        Self {
            data,
            content_type,
            notice,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    config: ImageProcessingConfig,
}

impl TransformPipeline {
    pub fn new(config: ImageProcessingConfig) -> Self {
        Self { config }
    }

    /// Whether compression runs for an item.
    ///
    /// Compression is forced when the source supplied no pre-sized regular
    /// rendition.
    pub fn compression_triggered(&self, has_regular_variant: bool) -> bool {
        self.config.compress || !has_regular_variant
    }

    /// Run the enabled stages over `input`.
    pub fn apply(&self, input: Bytes, has_regular_variant: bool) -> Transformed {
        self.apply_with_rng(input, has_regular_variant, &mut rand::thread_rng())
    }

    /// [`apply`](Self::apply) with an explicit RNG for the confusion stage.
    pub fn apply_with_rng<R: Rng + ?Sized>(
        &self,
        input: Bytes,
        has_regular_variant: bool,
        rng: &mut R,
    ) -> Transformed {
        let size = input.len();
        if size >= MAX_PROCESS_BYTES {
            debug!(size, "Input over size ceiling, skipping transforms");
            return Transformed::passthrough(input, Some(TransformNotice::OversizeSkipped { size }));
        }

        let compress = self.compression_triggered(has_regular_variant);
        if !self.config.flip_mode.is_active() && !self.config.confusion && !compress {
            return Transformed::passthrough(input, None);
        }

        let mut img = match image::load_from_memory(&input) {
            Ok(img) => img.into_rgba8(),
            Err(e) => {
                warn!(error = %e, "Failed to decode image, returning original bytes");
                return Transformed::passthrough(
                    input,
                    Some(TransformNotice::DecodeFailure {
                        message: e.to_string(),
                    }),
                );
            }
        };

        flip(&mut img, self.config.flip_mode);
        if self.config.confusion {
            confuse_pixel_with(&mut img, rng);
        }

        let level = if compress {
            self.config.compression_level
        } else {
            DEFAULT_LEVEL
        };
        match encode_png(&img, level) {
            Ok(data) => Transformed::passthrough(Bytes::from(data), None),
            Err(e) => {
                warn!(error = %e, "Failed to encode image, returning original bytes");
                Transformed::passthrough(
                    input,
                    Some(TransformNotice::DecodeFailure {
                        message: e.to_string(),
                    }),
                )
            }
        }
    }
}

const DEFAULT_LEVEL: u8 = 6;

/// Mirror `img` in place.
pub fn flip(img: &mut RgbaImage, mode: FlipMode) {
    match mode {
        FlipMode::None => {}
        FlipMode::Horizontal => image::imageops::flip_horizontal_in_place(img),
        FlipMode::Vertical => image::imageops::flip_vertical_in_place(img),
        FlipMode::Both => {
            image::imageops::flip_horizontal_in_place(img);
            image::imageops::flip_vertical_in_place(img);
        }
    }
}

/// Nudge the RGB channels of one random pixel by one step. 255 steps down to
/// 254, everything else steps up. Alpha is left alone.
pub fn confuse_pixel_with<R: Rng + ?Sized>(img: &mut RgbaImage, rng: &mut R) -> Option<(u32, u32)> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let (x, y) = (rng.gen_range(0..w), rng.gen_range(0..h));
    let pixel = img.get_pixel_mut(x, y);
    for channel in pixel.0.iter_mut().take(3) {
        *channel = if *channel == u8::MAX { u8::MAX - 1 } else { *channel + 1 };
    }
    Some((x, y))
}

fn compression_type(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode_png(img: &RgbaImage, level: u8) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = PngEncoder::new_with_quality(&mut buf, compression_type(level), FilterType::Adaptive);
    encoder.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)?;
    Ok(buf.into_inner())
}

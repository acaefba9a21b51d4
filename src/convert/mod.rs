// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Conversion pipeline.
//!
//! A pure function from (input bytes, declared source name, requested output kind) to
//! converted bytes or a typed failure. Inputs classify into three families: HEIC goes
//! through the dedicated reader, EPS through the external rasterizer with a
//! direct-decode fallback, everything else straight through the generic codec. Every
//! failure identifies which stage broke (read, write, external tool), and the EPS
//! fallback preserves both stages' classifications instead of collapsing them.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use tracing::{info, warn};

pub mod formats;
pub mod ghostscript;
pub mod heic;

pub use formats::{
    classify, supported_formats, FormatError, OutputFormat, SourceClass, SupportedFormats,
};
pub use ghostscript::{ExternalToolError, Ghostscript, RasterTarget, Rasterizer};

/// Rasterization resolution for the EPS primary path.
pub const RASTER_DPI: u32 = 300;

const JPEG_QUALITY: u8 = 95;

#[derive(Debug)]
pub enum ConvertError {
    CodecRead {
        source_name: String,
        source: image::ImageError,
    },
    CodecWrite {
        source_name: String,
        format: String,
        source: image::ImageError,
    },
    HeicRead {
        source_name: String,
        message: String,
    },
    ExternalTool {
        source: ExternalToolError,
    },
    /// Both EPS strategies failed; carries each stage's own classification.
    EpsExhausted {
        primary: Box<ConvertError>,
        fallback: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Names the stage that failed, preserved across the EPS fallback.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::CodecRead { .. } | Self::HeicRead { .. } => "read",
            Self::CodecWrite { .. } => "write",
            Self::ExternalTool { .. } => "external-tool",
            Self::EpsExhausted { .. } => "conversion",
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodecRead {
                source_name,
                source,
            } => write!(f, "Failed to open image file {source_name}: {source}"),
            Self::CodecWrite {
                source_name,
                format,
                source,
            } => write!(f, "Failed to save {source_name} as {format}: {source}"),
            Self::HeicRead {
                source_name,
                message,
            } => write!(f, "Failed to read HEIC file {source_name}: {message}"),
            Self::ExternalTool { source } => write!(f, "Rasterizer failed: {source}"),
            Self::EpsExhausted { primary, fallback } => write!(
                f,
                "Failed to convert EPS file, all conversion methods failed (rasterizer: {primary}; direct decode: {fallback})"
            ),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CodecRead { source, .. } | Self::CodecWrite { source, .. } => Some(source),
            Self::ExternalTool { source } => Some(source),
            Self::EpsExhausted { fallback, .. } => Some(fallback),
            Self::HeicRead { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
}

impl Pipeline {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            dpi: RASTER_DPI,
        }
    }

    pub fn convert(
        &self,
        input: &[u8],
        source_name: &str,
        output: &OutputFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        match classify(source_name) {
            SourceClass::HeicFamily => {
                let image =
                    heic::decode(input).map_err(|message| ConvertError::HeicRead {
                        source_name: source_name.to_owned(),
                        message,
                    })?;
                encode(image, source_name, output)
            }
            SourceClass::EpsFamily => self.convert_eps(input, source_name, output),
            SourceClass::Generic => decode_and_encode(input, source_name, output),
        }
    }

    /// Primary: external rasterizer at fixed DPI, then re-encode the intermediate.
    /// Secondary, on any primary failure: direct decode with the generic codec (lower
    /// fidelity, not guaranteed to succeed for all producers).
    fn convert_eps(
        &self,
        input: &[u8],
        source_name: &str,
        output: &OutputFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        match self.rasterize_and_encode(input, source_name, output) {
            Ok(bytes) => Ok(bytes),
            Err(primary) => {
                warn!(source_name, %primary, "EPS rasterizer path failed, attempting direct decode");
                match decode_and_encode(input, source_name, output) {
                    Ok(bytes) => {
                        info!(source_name, "EPS direct decode fallback succeeded");
                        Ok(bytes)
                    }
                    Err(fallback) => Err(ConvertError::EpsExhausted {
                        primary: Box::new(primary),
                        fallback: Box::new(fallback),
                    }),
                }
            }
        }
    }

    fn rasterize_and_encode(
        &self,
        input: &[u8],
        source_name: &str,
        output: &OutputFormat,
    ) -> Result<Vec<u8>, ConvertError> {
        let target = if output.is_png() {
            RasterTarget::Png
        } else {
            RasterTarget::Jpeg
        };
        let raster = self
            .rasterizer
            .rasterize(input, target, self.dpi)
            .map_err(|source| ConvertError::ExternalTool { source })?;
        decode_and_encode(&raster, source_name, output)
    }
}

fn decode_and_encode(
    input: &[u8],
    source_name: &str,
    output: &OutputFormat,
) -> Result<Vec<u8>, ConvertError> {
    let image = image::load_from_memory(input).map_err(|source| ConvertError::CodecRead {
        source_name: source_name.to_owned(),
        source,
    })?;
    encode(image, source_name, output)
}

/// Shared encode step with color-model fix-ups: JPEG targets are flattened to RGB,
/// PNG targets get an alpha channel unless already RGB/RGBA.
fn encode(
    image: image::DynamicImage,
    source_name: &str,
    output: &OutputFormat,
) -> Result<Vec<u8>, ConvertError> {
    use image::DynamicImage;

    let image = if output.is_jpeg() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else if output.is_png()
        && !matches!(
            image,
            DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_)
        )
    {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        image
    };

    let mut cursor = Cursor::new(Vec::new());
    let written = if output.is_jpeg() {
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        image.write_with_encoder(encoder)
    } else {
        image.write_to(&mut cursor, output.image_format())
    };

    written.map_err(|source| ConvertError::CodecWrite {
        source_name: source_name.to_owned(),
        format: output.label(),
        source,
    })?;
    Ok(cursor.into_inner())
}

// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Format negotiation.
//!
//! Supported kinds are enumerated from the codec library rather than hard-coded; the
//! only special cases are HEIC (readable through the dedicated reader), and EPS, which
//! is readable through the rasterizer path but rejected as an output kind system-wide.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The format is write-unsupported system-wide and explicitly rejected.
    Disallowed { name: String },
    /// Not a format name the codec library knows.
    Unknown { name: String },
    /// Known, but no encoder is available.
    Unwritable { name: String },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disallowed { name } => {
                write!(f, "{} output format is not supported", name.to_uppercase())
            }
            Self::Unknown { name } | Self::Unwritable { name } => {
                write!(f, "Unsupported output format: {name}")
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// A validated, encoder-supported output kind for a whole batch.
///
/// Keeps the name the caller asked for, so `photo` converted to `JPEG` becomes
/// `photo.jpeg` while `JPG` yields `photo.jpg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    name: String,
    format: image::ImageFormat,
}

impl OutputFormat {
    pub fn parse(requested: &str) -> Result<Self, FormatError> {
        let name = requested.trim().to_lowercase();
        if name.is_empty() {
            return Err(FormatError::Unknown { name });
        }
        if name == "eps" || name == "epsf" {
            return Err(FormatError::Disallowed { name });
        }

        let Some(format) = image::ImageFormat::from_extension(&name) else {
            return Err(FormatError::Unknown { name });
        };
        if !format.writing_enabled() {
            return Err(FormatError::Unwritable { name });
        }
        Ok(Self { name, format })
    }

    pub fn image_format(&self) -> image::ImageFormat {
        self.format
    }

    /// Lowercase file extension, as requested by the caller.
    pub fn extension(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn is_jpeg(&self) -> bool {
        self.format == image::ImageFormat::Jpeg
    }

    pub fn is_png(&self) -> bool {
        self.format == image::ImageFormat::Png
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Input family, classified by the declared file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    HeicFamily,
    EpsFamily,
    Generic,
}

pub fn classify(source_name: &str) -> SourceClass {
    let extension = source_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "heic" | "heif" => SourceClass::HeicFamily,
        "eps" | "epsf" => SourceClass::EpsFamily,
        _ => SourceClass::Generic,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportedFormats {
    pub input_formats: Vec<String>,
    pub output_formats: Vec<String>,
}

/// Enumerates readable and writable kinds from the codec library, plus the two
/// special-cased inputs. Both lists are uppercase extension labels, sorted.
pub fn supported_formats() -> SupportedFormats {
    let mut input_formats = vec!["HEIC".to_owned(), "HEIF".to_owned(), "EPS".to_owned()];
    let mut output_formats = Vec::new();

    for format in image::ImageFormat::all() {
        for extension in format.extensions_str() {
            let label = extension.to_uppercase();
            if format.reading_enabled() {
                input_formats.push(label.clone());
            }
            if format.writing_enabled() {
                output_formats.push(label);
            }
        }
    }

    input_formats.sort();
    input_formats.dedup();
    output_formats.sort();
    output_formats.dedup();

    SupportedFormats {
        input_formats,
        output_formats,
    }
}

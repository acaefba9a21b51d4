// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Dedicated HEIC reader.
//!
//! The generic codec does not decode HEIC, so this family goes through libheif into a
//! raw RGBA buffer and from there through the shared encode step. Decoding requires
//! the system libheif and is gated behind the `heic` cargo feature; without it the
//! reader reports a typed failure and the rest of the pipeline is unaffected.

#[cfg(feature = "heic")]
pub fn decode(input: &[u8]) -> Result<image::DynamicImage, String> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_bytes(input).map_err(|err| err.to_string())?;
    let handle = context.primary_image_handle().map_err(|err| err.to_string())?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(|err| err.to_string())?;

    let planes = decoded.planes();
    let Some(interleaved) = planes.interleaved else {
        return Err("decoded HEIC image has no interleaved plane".to_owned());
    };

    let width = interleaved.width;
    let height = interleaved.height;
    let row_bytes = width as usize * 4;
    let mut buffer = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * interleaved.stride;
        let Some(slice) = interleaved.data.get(start..start + row_bytes) else {
            return Err("decoded HEIC plane is shorter than its geometry".to_owned());
        };
        buffer.extend_from_slice(slice);
    }

    let image = image::RgbaImage::from_raw(width, height, buffer)
        .ok_or_else(|| "decoded HEIC pixel buffer has unexpected size".to_owned())?;
    Ok(image::DynamicImage::ImageRgba8(image))
}

#[cfg(not(feature = "heic"))]
pub fn decode(_input: &[u8]) -> Result<image::DynamicImage, String> {
    Err("HEIC support is not enabled in this build (enable the `heic` feature)".to_owned())
}

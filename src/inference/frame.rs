// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Decoded video frames

use std::sync::Arc;
use chrono::{DateTime, Utc};
use image::RgbImage;
use thiserror::Error;

/// Errors for frames that cannot enter the pipeline
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,

    #[error("Failed to decode image: {0}")]
    Decode(String),
}

/// One decoded frame together with the bytes it was decoded from.
///
/// Cloning is cheap; pixel data and encoded bytes are shared.
#[derive(Debug, Clone)]
pub struct Frame {
    encoded: Arc<Vec<u8>>,
    pixels: Arc<RgbImage>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Decode an encoded image (JPEG or PNG)
    pub fn decode(bytes: Vec<u8>) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }

        let pixels = image::load_from_memory(&bytes)
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .to_rgb8();

        Ok(Self {
            encoded: Arc::new(bytes),
            pixels: Arc::new(pixels),
            captured_at: Utc::now(),
        })
    }

    /// Original encoded bytes, used as the alert snapshot
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    pub fn encoded_shared(&self) -> Arc<Vec<u8>> {
        self.encoded.clone()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Encode a small solid image as PNG. Used by tests across the crate.
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([12, 34, 56]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

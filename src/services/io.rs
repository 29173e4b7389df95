//! Image decode and persistence operations
//!
//! This module keeps byte-level image handling apart from the network code
//! so the decode and save steps can be exercised without HTTP.

use crate::error::{DatasetError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Service for decoding downloaded bytes and saving dataset images
pub struct ImageIOService;

impl ImageIOService {
    /// Decode raw bytes into a 3-channel RGB image.
    ///
    /// The format is sniffed from content, so locators without a file
    /// extension decode fine. Alpha, grayscale and palette images are all
    /// normalized to RGB8.
    pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
        let image = image::load_from_memory(bytes)?;
        Ok(image.to_rgb8())
    }

    /// Load an image file from disk
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| DatasetError::file_io_error("read image file", path, &e))?;
        Ok(image::load_from_memory(&data)?)
    }

    /// Encode `image` as JPEG at `path`.
    ///
    /// The encoded data is written to a sibling `.part` file that is renamed
    /// into place once complete; on any failure the partial file is removed
    /// and nothing is left at `path`.
    pub fn write_jpeg_atomic<P: AsRef<Path>>(image: &RgbImage, path: P, quality: u8) -> Result<()> {
        let path = path.as_ref();
        let partial = partial_path(path);

        let result = Self::write_jpeg(image, &partial, quality).and_then(|()| {
            std::fs::rename(&partial, path)
                .map_err(|e| DatasetError::file_io_error("move image into place", path, &e))
        });

        if result.is_err() && partial.exists() {
            if let Err(cleanup_err) = std::fs::remove_file(&partial) {
                tracing::warn!(
                    path = %partial.display(),
                    error = %cleanup_err,
                    "Failed to remove partial image"
                );
            }
        }
        result
    }

    fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| DatasetError::file_io_error("create image file", path, &e))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(image)?;
        writer
            .flush()
            .map_err(|e| DatasetError::file_io_error("flush image file", path, &e))?;
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

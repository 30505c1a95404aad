use std::path::Path;

use image::{DynamicImage, ImageEncoder as _, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::{
    error::ContextError,
    fitting::{PixelSlice, RasterImage},
};

/// How the pixels of a snapshot are stored inside the PDF document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ImageEncoding {
    /// Lossy JPEG at the given quality (1-100), embedded with `DCTDecode`.
    Jpeg { quality: u8 },
    /// Raw 8-bit RGB samples, compressed with `FlateDecode` when the document is written.
    Lossless,
}

/// A snapshot ready to be embedded into a PDF document as an image XObject.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub bytes: Vec<u8>,
}

/// A rendered document, as produced by whichever renderer took the screenshot.
#[derive(Debug, Clone)]
pub struct RasterSnapshot {
    image: DynamicImage,
}

impl RasterSnapshot {
    pub fn from_image(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_path(snapshot_path: &Path) -> Result<Self, ContextError> {
        let image = image::open(snapshot_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to load the snapshot {:?}", snapshot_path),
                &error,
            )
        })?;
        log::debug!(
            "Loaded the snapshot {:?} ({}x{} px, {:?})",
            snapshot_path,
            image.width(),
            image.height(),
            image.color()
        );

        Ok(Self { image })
    }

    pub fn from_bytes(snapshot_bytes: &[u8]) -> Result<Self, ContextError> {
        let image = image::load_from_memory(snapshot_bytes).map_err(|error| {
            ContextError::with_error("Unable to decode the snapshot bytes", &error)
        })?;

        Ok(Self { image })
    }

    pub fn dimensions(&self) -> RasterImage {
        RasterImage::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Composites the snapshot onto an opaque background, dropping the alpha channel.
    pub fn flatten_onto(&self, background: [u8; 3]) -> RasterSnapshot {
        if !self.image.color().has_alpha() {
            return RasterSnapshot::from_image(DynamicImage::ImageRgb8(self.image.to_rgb8()));
        }
        log::debug!(
            "Flattening the transparent snapshot onto the background {:?}",
            background
        );

        let rgba_image = self.image.to_rgba8();
        let flattened = RgbImage::from_fn(rgba_image.width(), rgba_image.height(), |x, y| {
            let [red, green, blue, alpha] = rgba_image.get_pixel(x, y).0;
            let coverage = alpha as f32 / 255.0;
            let blend = |channel: u8, background_channel: u8| {
                (channel as f32 * coverage + background_channel as f32 * (1.0 - coverage)).round()
                    as u8
            };
            Rgb([
                blend(red, background[0]),
                blend(green, background[1]),
                blend(blue, background[2]),
            ])
        });

        RasterSnapshot::from_image(DynamicImage::ImageRgb8(flattened))
    }

    /// A new snapshot holding only the rows of the given slice.
    ///
    /// Fails when the slice is empty or reaches past the bottom of the snapshot.
    pub fn crop_rows(&self, slice: &PixelSlice) -> Result<RasterSnapshot, ContextError> {
        let snapshot_height = self.image.height();
        let bottom = u64::from(slice.top) + u64::from(slice.height);
        if slice.height == 0 || bottom > u64::from(snapshot_height) {
            return Err(ContextError::with_context(format!(
                "The rows {}..{} are outside of the {} px tall snapshot",
                slice.top, bottom, snapshot_height
            )));
        }

        Ok(RasterSnapshot::from_image(self.image.crop_imm(
            0,
            slice.top,
            self.image.width(),
            slice.height,
        )))
    }

    /// Encodes the snapshot as RGB, any alpha channel is discarded.
    pub fn encode(&self, encoding: ImageEncoding) -> Result<EncodedImage, ContextError> {
        let rgb_image = self.image.to_rgb8();
        let (width, height) = rgb_image.dimensions();

        let bytes = match encoding {
            ImageEncoding::Jpeg { quality } => {
                if !(1..=100).contains(&quality) {
                    return Err(ContextError::with_context(format!(
                        "The JPEG quality must be between 1 and 100, got {}",
                        quality
                    )));
                }
                let mut jpeg_bytes = Vec::new();
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, quality)
                    .write_image(
                        rgb_image.as_raw(),
                        width,
                        height,
                        image::ExtendedColorType::Rgb8,
                    )
                    .map_err(|error| {
                        ContextError::with_error("Unable to encode the snapshot as JPEG", &error)
                    })?;
                jpeg_bytes
            }
            ImageEncoding::Lossless => rgb_image.into_raw(),
        };

        Ok(EncodedImage {
            width,
            height,
            encoding,
            bytes,
        })
    }
}

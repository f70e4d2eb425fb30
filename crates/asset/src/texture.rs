//! Texture loading and data structures.
//! TGA is the only decoded source format; 3- and 4-channel images are accepted.

use std::{borrow::Cow, fs, path::Path};

use corelib::{CoreError, CoreResult};
use image::{ImageFormat, RgbaImage, imageops::FilterType};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgb8,
    Rgba8,
}

impl TextureFormat {
    /// 3 → RGB, 4 → RGBA, anything else is unsupported.
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            3 => Some(TextureFormat::Rgb8),
            4 => Some(TextureFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u32 {
        match self {
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }
}

impl TextureData {
    pub fn new(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * format.channel_count()) as usize,
            "Data size doesn't match {format:?} format"
        );
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Read and decode a texture file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
        let texture = Self::decode(&bytes).map_err(|e| match e {
            CoreError::UnsupportedFormat(msg) => {
                CoreError::UnsupportedFormat(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;

        log::info!(
            "Loaded texture {}x{} ({:?}) with {} bytes",
            texture.width,
            texture.height,
            texture.format,
            texture.data.len()
        );
        Ok(texture)
    }

    /// Decode TGA bytes, keeping the source channel layout.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Tga)
            .map_err(|e| CoreError::UnsupportedFormat(format!("undecodable image: {e}")))?;

        let channels = img.color().channel_count();
        let format = TextureFormat::from_channel_count(channels).ok_or_else(|| {
            CoreError::UnsupportedFormat(format!("unsupported number of channels ({channels})"))
        })?;

        let (width, height) = (img.width(), img.height());
        let data = match format {
            TextureFormat::Rgb8 => img.into_rgb8().into_raw(),
            TextureFormat::Rgba8 => img.into_rgba8().into_raw(),
        };
        Ok(Self::new(width, height, format, data))
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.channel_count()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.width * self.height * self.bytes_per_pixel()) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }

    /// Pixels expanded to RGBA8; GPU formats have no 3-channel 8-bit variant.
    pub fn to_rgba8(&self) -> Cow<'_, [u8]> {
        match self.format {
            TextureFormat::Rgba8 => Cow::Borrowed(&self.data),
            TextureFormat::Rgb8 => Cow::Owned(
                self.data
                    .chunks_exact(3)
                    .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
                    .collect(),
            ),
        }
    }

    /// Full RGBA8 mip chain, level 0 first, halving down to 1×1.
    pub fn mip_chain(&self) -> Vec<TextureData> {
        let mut levels = Vec::with_capacity(mip_level_count(self.width, self.height) as usize);
        let base = TextureData::new(
            self.width,
            self.height,
            TextureFormat::Rgba8,
            self.to_rgba8().into_owned(),
        );
        let Some(mut current) = RgbaImage::from_raw(base.width, base.height, base.data.clone())
        else {
            return vec![base];
        };
        levels.push(base);

        let (mut w, mut h) = (self.width, self.height);
        while w > 1 || h > 1 {
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            current = image::imageops::resize(&current, w, h, FilterType::Triangle);
            levels.push(TextureData::new(
                w,
                h,
                TextureFormat::Rgba8,
                current.as_raw().clone(),
            ));
        }
        levels
    }
}

/// Number of mip levels for a full chain.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

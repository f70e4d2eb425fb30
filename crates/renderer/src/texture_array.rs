//! Layered texture assembly for a material's core channels.
//!
//! Arrays are built per material and are not shared through the
//! [`TextureCache`](crate::texture_cache::TextureCache).

use std::path::PathBuf;

use asset::TextureData;
use corelib::{CoreError, Diagnostics};

use crate::gpu::{GpuBackend, TextureHandle};

/// A built array texture. `handle` is null when no source could be decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureArray {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    /// Allocated layers, one per source path.
    pub layers: u32,
    /// Layers that actually received texels.
    pub filled: u32,
}

impl TextureArray {
    #[inline]
    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }
}

pub struct TextureArrayBuilder<'a> {
    backend: &'a dyn GpuBackend,
}

impl<'a> TextureArrayBuilder<'a> {
    pub fn new(backend: &'a dyn GpuBackend) -> Self {
        Self { backend }
    }

    /// One layer per source, in order. The array takes the size of the first
    /// source that decodes; sources that fail to decode or differ in size are
    /// skipped and their layer stays undefined.
    pub fn build(&self, label: &str, sources: &[PathBuf], diag: &mut Diagnostics) -> TextureArray {
        let layers = sources.len() as u32;
        let mut array: Option<TextureArray> = None;

        for (layer, path) in sources.iter().enumerate() {
            let image = match TextureData::load(path) {
                Ok(image) => image,
                Err(e) => {
                    diag.push(CoreError::UnsupportedFormat(format!(
                        "{label}: layer {layer} left empty: {e}"
                    )));
                    continue;
                }
            };

            let target = array.get_or_insert_with(|| TextureArray {
                handle: self
                    .backend
                    .create_texture_array(label, image.width, image.height, layers),
                width: image.width,
                height: image.height,
                layers,
                filled: 0,
            });

            if (image.width, image.height) != (target.width, target.height) {
                diag.push(CoreError::UnsupportedFormat(format!(
                    "{label}: layer {layer} is {}x{}, array is {}x{}; layer left empty",
                    image.width, image.height, target.width, target.height
                )));
                continue;
            }

            self.backend
                .write_texture_layer(target.handle, layer as u32, &image);
            target.filled += 1;
        }

        match array {
            Some(array) => {
                self.backend.generate_mipmaps(array.handle);
                log::debug!(
                    "Built {label}: {}x{}, {}/{} layers",
                    array.width,
                    array.height,
                    array.filled,
                    array.layers
                );
                array
            }
            None => TextureArray::default(),
        }
    }
}

//! GPU resource seam. Everything that creates or frees a GPU object goes
//! through [`GpuBackend`], so the loading pipeline can run against wgpu or
//! against a recording double in tests.

use std::fmt;

use asset::TextureData;

/// Opaque texture id. [`TextureHandle::NULL`] marks "nothing loaded".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Opaque buffer id. [`BufferHandle::NULL`] marks "nothing uploaded".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

impl BufferHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// GPU calls used by the loaders. Implementations never return the null
/// handles from the `create_*` methods.
pub trait GpuBackend: Send + Sync {
    /// Upload a 2D texture with a full mip chain, repeat wrapping and linear filtering.
    fn create_texture(&self, label: &str, image: &TextureData) -> TextureHandle;

    /// Allocate a layered texture; layers are filled with [`GpuBackend::write_texture_layer`].
    fn create_texture_array(&self, label: &str, width: u32, height: u32, layers: u32)
    -> TextureHandle;

    fn write_texture_layer(&self, array: TextureHandle, layer: u32, image: &TextureData);

    /// Fill mip levels below level 0 from what has been written so far.
    fn generate_mipmaps(&self, texture: TextureHandle);

    fn destroy_texture(&self, texture: TextureHandle);

    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> BufferHandle;

    fn destroy_buffer(&self, buffer: BufferHandle);
}

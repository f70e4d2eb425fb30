//! Renderer: GPU upload of PSK meshes, their materials and shared textures.
//! wgpu = 23.x

pub mod config;
pub mod draw;
pub mod gpu;
pub mod material;
pub mod mesh;
pub mod model;
pub mod texture_array;
pub mod texture_cache;
pub mod wgpu_backend;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{LoadContext, LoaderConfig};
pub use draw::DrawSink;
pub use gpu::{BufferHandle, BufferUsage, GpuBackend, TextureHandle};
pub use material::{AuxTexture, Material};
pub use mesh::MeshAsset;
pub use model::Model;
pub use texture_array::{TextureArray, TextureArrayBuilder};
pub use texture_cache::{Release, TextureCache};
pub use wgpu_backend::WgpuBackend;

//! Asset loading/parsers (PSK meshes, key-value sidecars, textures).
//! Everything here is CPU-side; GPU upload lives in the renderer crate.

pub mod chunk;
pub mod keyvalue;
pub mod mesh;
pub mod psk;
pub mod texture;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use keyvalue::KeyValueStore;
pub use mesh::{Batch, MeshGeometry, MeshVertex};
pub use psk::{DecodeOptions, MeshData, load_psk};
pub use texture::{TextureData, TextureFormat};

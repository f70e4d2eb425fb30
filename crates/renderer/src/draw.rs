//! Draw submission seam.

use std::ops::Range;

use crate::gpu::{BufferHandle, TextureHandle};

/// Receives the bind/draw sequence a mesh produces for one frame.
///
/// Slot 0 holds the material's layered texture; auxiliary textures follow
/// from slot 1 in material order.
pub trait DrawSink {
    fn bind_texture_array(&mut self, slot: u32, texture: TextureHandle);
    fn bind_texture(&mut self, slot: u32, texture: TextureHandle);
    /// Number of auxiliary textures bound for the next draw.
    fn set_aux_texture_count(&mut self, count: u32);
    fn draw_indexed(&mut self, vertex_buffer: BufferHandle, index_buffer: BufferHandle, indices: Range<u32>);
}

//! Recording doubles for the GPU and draw seams.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
    sync::atomic::{AtomicU32, Ordering},
};

use asset::TextureData;
use parking_lot::Mutex;

use crate::{
    draw::DrawSink,
    gpu::{BufferHandle, BufferUsage, GpuBackend, TextureHandle},
};

#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateTexture(TextureHandle, u32, u32),
    CreateTextureArray(TextureHandle, u32, u32, u32),
    /// Array, layer, first pixel as RGBA.
    WriteLayer(TextureHandle, u32, [u8; 4]),
    GenerateMipmaps(TextureHandle),
    DestroyTexture(TextureHandle),
    CreateBuffer(BufferHandle, BufferUsage, usize),
    DestroyBuffer(BufferHandle),
}

/// Hands out increasing ids starting at 1 and records every call.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<GpuCall>>,
    last_id: AtomicU32,
    live_textures: Mutex<HashSet<TextureHandle>>,
    live_buffers: Mutex<HashMap<BufferHandle, usize>>,
}

impl RecordingBackend {
    fn next_id(&self) -> u32 {
        self.last_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, call: GpuCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.calls.lock().clone()
    }

    /// Standalone textures created, arrays excluded.
    pub fn textures_created(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GpuCall::CreateTexture(..)))
            .count()
    }

    /// Textures and arrays created but not yet destroyed.
    pub fn live_textures(&self) -> usize {
        self.live_textures.lock().len()
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.lock().len()
    }

    /// Byte length of a live buffer.
    pub fn buffer_len(&self, buffer: BufferHandle) -> Option<usize> {
        self.live_buffers.lock().get(&buffer).copied()
    }

    /// `(layer, first pixel)` for each write into `array`, in call order.
    pub fn layer_writes(&self, array: TextureHandle) -> Vec<(u32, [u8; 4])> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GpuCall::WriteLayer(h, layer, px) if *h == array => Some((*layer, *px)),
                _ => None,
            })
            .collect()
    }
}

impl GpuBackend for RecordingBackend {
    fn create_texture(&self, _label: &str, image: &TextureData) -> TextureHandle {
        let handle = TextureHandle(self.next_id());
        self.live_textures.lock().insert(handle);
        self.record(GpuCall::CreateTexture(handle, image.width, image.height));
        handle
    }

    fn create_texture_array(
        &self,
        _label: &str,
        width: u32,
        height: u32,
        layers: u32,
    ) -> TextureHandle {
        let handle = TextureHandle(self.next_id());
        self.live_textures.lock().insert(handle);
        self.record(GpuCall::CreateTextureArray(handle, width, height, layers));
        handle
    }

    fn write_texture_layer(&self, array: TextureHandle, layer: u32, image: &TextureData) {
        let rgba = image.to_rgba8();
        let mut px = [0u8; 4];
        let n = rgba.len().min(4);
        px[..n].copy_from_slice(&rgba[..n]);
        self.record(GpuCall::WriteLayer(array, layer, px));
    }

    fn generate_mipmaps(&self, texture: TextureHandle) {
        self.record(GpuCall::GenerateMipmaps(texture));
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        if !self.live_textures.lock().remove(&texture) {
            panic!("destroy of unknown or already destroyed {texture}");
        }
        self.record(GpuCall::DestroyTexture(texture));
    }

    fn create_buffer(&self, _label: &str, usage: BufferUsage, contents: &[u8]) -> BufferHandle {
        let handle = BufferHandle(self.next_id());
        self.live_buffers.lock().insert(handle, contents.len());
        self.record(GpuCall::CreateBuffer(handle, usage, contents.len()));
        handle
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        if self.live_buffers.lock().remove(&buffer).is_none() {
            panic!("destroy of unknown or already destroyed buffer {}", buffer.0);
        }
        self.record(GpuCall::DestroyBuffer(buffer));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCall {
    BindArray(u32, TextureHandle),
    Bind(u32, TextureHandle),
    AuxCount(u32),
    Draw(BufferHandle, BufferHandle, Range<u32>),
}

#[derive(Default)]
pub struct RecordingSink {
    pub calls: Vec<DrawCall>,
}

impl RecordingSink {
    pub fn draws(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DrawCall::Draw(..)))
            .count()
    }
}

impl DrawSink for RecordingSink {
    fn bind_texture_array(&mut self, slot: u32, texture: TextureHandle) {
        self.calls.push(DrawCall::BindArray(slot, texture));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle) {
        self.calls.push(DrawCall::Bind(slot, texture));
    }

    fn set_aux_texture_count(&mut self, count: u32) {
        self.calls.push(DrawCall::AuxCount(count));
    }

    fn draw_indexed(&mut self, vertex_buffer: BufferHandle, index_buffer: BufferHandle, indices: Range<u32>) {
        self.calls.push(DrawCall::Draw(vertex_buffer, index_buffer, indices));
    }
}

//! wgpu implementation of [`GpuBackend`].
//! wgpu = 23.x; device bring-up is headless unless a device is handed in.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU32, Ordering},
};

use anyhow::{Context, Result};
use asset::{MeshVertex, TextureData, texture::mip_level_count};
use parking_lot::Mutex;
use wgpu::{
    AddressMode, Buffer, BufferUsages, Device, DeviceDescriptor, Extent3d, Features, FilterMode,
    Instance, InstanceDescriptor, Limits, Origin3d, PowerPreference, Queue, Sampler,
    SamplerDescriptor, Texture, TextureAspect, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexBufferLayout,
    VertexStepMode, util::DeviceExt,
};

use crate::gpu::{BufferHandle, BufferUsage, GpuBackend, TextureHandle};

/// Every texture is uploaded as linear RGBA8; 3-channel sources are expanded first.
/// Normal and SpecPower layers share the array with Diffuse, so no layer gets sRGB decode.
pub const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Layout of [`MeshVertex`]: position, uv, material index.
/// For the render pipeline that consumes the uploaded vertex buffers.
pub const MESH_VERTEX_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: std::mem::size_of::<MeshVertex>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Sint32],
};

/// A live texture with its default view and sampler.
pub struct GpuTexture {
    pub texture: Texture,
    pub view: TextureView,
    pub sampler: Sampler,
    pub layers: u32,
    /// Level-0 layer images kept until mips are generated.
    pending: Vec<(u32, TextureData)>,
}

pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    textures: Mutex<HashMap<TextureHandle, GpuTexture>>,
    buffers: Mutex<HashMap<BufferHandle, Buffer>>,
    next_id: AtomicU32,
}

impl WgpuBackend {
    /// Wrap an existing device, e.g. the one the render loop already owns.
    pub fn from_device(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Create a device without a surface.
    pub fn new_headless(backends: wgpu::Backends) -> Result<Self> {
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context("No suitable GPU adapter")?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(
            &DeviceDescriptor {
                label: Some("pskview device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("request_device failed")?;

        Ok(Self::from_device(device, queue))
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Run `f` against a live texture, e.g. to bind its view and sampler.
    pub fn with_texture<R>(&self, handle: TextureHandle, f: impl FnOnce(&GpuTexture) -> R) -> Option<R> {
        self.textures.lock().get(&handle).map(f)
    }

    /// Run `f` against a live buffer, e.g. to set it as a vertex or index source.
    pub fn with_buffer<R>(&self, handle: BufferHandle, f: impl FnOnce(&Buffer) -> R) -> Option<R> {
        self.buffers.lock().get(&handle).map(f)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().len()
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn create_sampler(&self, label: &str) -> Sampler {
        self.device.create_sampler(&SamplerDescriptor {
            label: Some(label),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        })
    }

    /// Copy one RGBA8 image into `mip_level` of `layer`.
    fn write_level(&self, texture: &Texture, mip_level: u32, layer: u32, image: &TextureData) {
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level,
                origin: Origin3d {
                    x: 0,
                    y: 0,
                    z: layer,
                },
                aspect: TextureAspect::All,
            },
            &image.to_rgba8(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

impl GpuBackend for WgpuBackend {
    fn create_texture(&self, label: &str, image: &TextureData) -> TextureHandle {
        let levels = image.mip_chain();
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, mip) in levels.iter().enumerate() {
            self.write_level(&texture, level as u32, 0, mip);
        }

        let view = texture.create_view(&TextureViewDescriptor::default());
        let handle = TextureHandle(self.next_id());
        self.textures.lock().insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler: self.create_sampler(label),
                layers: 1,
                pending: Vec::new(),
            },
        );
        handle
    }

    fn create_texture_array(&self, label: &str, width: u32, height: u32, layers: u32) -> TextureHandle {
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: layers.max(1),
            },
            mip_level_count: mip_level_count(width, height),
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor {
            label: Some(label),
            dimension: Some(TextureViewDimension::D2Array),
            ..Default::default()
        });

        let handle = TextureHandle(self.next_id());
        self.textures.lock().insert(
            handle,
            GpuTexture {
                texture,
                view,
                sampler: self.create_sampler(label),
                layers: layers.max(1),
                pending: Vec::new(),
            },
        );
        handle
    }

    fn write_texture_layer(&self, array: TextureHandle, layer: u32, image: &TextureData) {
        let mut textures = self.textures.lock();
        let Some(gpu) = textures.get_mut(&array) else {
            log::warn!("Layer write to unknown texture {array}");
            return;
        };
        let size = gpu.texture.size();
        if layer >= gpu.layers || (image.width, image.height) != (size.width, size.height) {
            log::warn!(
                "Layer {layer} ({}x{}) does not fit texture {array} ({}x{}x{})",
                image.width,
                image.height,
                size.width,
                size.height,
                gpu.layers
            );
            return;
        }
        self.write_level(&gpu.texture, 0, layer, image);
        gpu.pending.push((layer, image.clone()));
    }

    fn generate_mipmaps(&self, texture: TextureHandle) {
        let mut textures = self.textures.lock();
        let Some(gpu) = textures.get_mut(&texture) else {
            log::warn!("Mip generation for unknown texture {texture}");
            return;
        };
        for (layer, image) in std::mem::take(&mut gpu.pending) {
            for (level, mip) in image.mip_chain().iter().enumerate().skip(1) {
                self.write_level(&gpu.texture, level as u32, layer, mip);
            }
        }
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        match self.textures.lock().remove(&texture) {
            Some(gpu) => gpu.texture.destroy(),
            None => log::warn!("Destroy of unknown texture {texture}"),
        }
    }

    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> BufferHandle {
        let usage = match usage {
            BufferUsage::Vertex => BufferUsages::VERTEX,
            BufferUsage::Index => BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        let handle = BufferHandle(self.next_id());
        self.buffers.lock().insert(handle, buffer);
        handle
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        match self.buffers.lock().remove(&buffer) {
            Some(b) => b.destroy(),
            None => log::warn!("Destroy of unknown buffer {:?}", buffer),
        }
    }
}

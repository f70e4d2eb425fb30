//! Material assembly from `.mat` + `.skmap` sidecars.
//!
//! `.mat` maps channel names to identifiers, `.skmap` maps identifiers to
//! texture paths. `Diffuse`, `Normal` and `SpecPower` go into one layered
//! texture in that order; every other channel is a standalone texture taken
//! from the shared cache.

use std::{path::PathBuf, sync::Arc};

use asset::KeyValueStore;
use corelib::{CoreError, Diagnostics};

use crate::{
    config::LoadContext,
    gpu::TextureHandle,
    texture_array::{TextureArray, TextureArrayBuilder},
    texture_cache::{Release, TextureCache},
};

/// Channels packed into the layered texture, in layer order.
pub const CORE_CHANNELS: [&str; 3] = ["Diffuse", "Normal", "SpecPower"];

/// A standalone texture bound next to the layered one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxTexture {
    pub channel: String,
    pub path: PathBuf,
    /// Null when registration failed.
    pub handle: TextureHandle,
}

/// GPU bindings for one PSK material. Releases everything it acquired on drop.
pub struct Material {
    name: String,
    texture_array: TextureArray,
    array_channels: Vec<String>,
    aux_textures: Vec<AuxTexture>,
    /// Paths holding a claim in `cache`; each is released exactly once.
    registered: Vec<PathBuf>,
    cache: Arc<TextureCache>,
}

impl Material {
    /// A material with no textures, used when its sidecar entry is missing.
    pub fn empty(name: impl Into<String>, cache: Arc<TextureCache>) -> Self {
        Self {
            name: name.into(),
            texture_array: TextureArray::default(),
            array_channels: Vec::new(),
            aux_textures: Vec::new(),
            registered: Vec::new(),
            cache,
        }
    }

    pub fn assemble(
        name: impl Into<String>,
        material_data: &KeyValueStore,
        key_map: &KeyValueStore,
        ctx: &LoadContext,
        diag: &mut Diagnostics,
    ) -> Self {
        let mut material = Self::empty(name, ctx.cache.clone());

        let mut array_sources = Vec::with_capacity(CORE_CHANNELS.len());
        for channel in CORE_CHANNELS {
            let Some(id) = material_data.get(channel) else {
                continue;
            };
            if let Some(path) = material.resolve(channel, id, key_map, ctx, diag) {
                array_sources.push(path);
                material.array_channels.push(channel.to_owned());
            }
        }

        // Key order keeps aux slot numbers independent of hash order.
        let aux = material_data
            .sorted()
            .into_iter()
            .filter(|(channel, _)| !CORE_CHANNELS.contains(channel));
        for (channel, id) in aux {
            let Some(path) = material.resolve(channel, id, key_map, ctx, diag) else {
                continue;
            };
            let handle = match ctx.cache.register(&path) {
                Ok(handle) => {
                    material.registered.push(path.clone());
                    handle
                }
                Err(e) => {
                    diag.push(e);
                    TextureHandle::NULL
                }
            };
            material.aux_textures.push(AuxTexture {
                channel: channel.to_owned(),
                path,
                handle,
            });
        }

        let label = format!("{} array", material.name);
        material.texture_array =
            TextureArrayBuilder::new(&**ctx.backend()).build(&label, &array_sources, diag);

        log::info!(
            "Material {}: {} array layers, {} aux textures",
            material.name,
            material.texture_array.layers,
            material.aux_textures.len()
        );
        material
    }

    fn resolve(
        &self,
        channel: &str,
        id: &str,
        key_map: &KeyValueStore,
        ctx: &LoadContext,
        diag: &mut Diagnostics,
    ) -> Option<PathBuf> {
        match key_map.get(id) {
            Some(path) => Some(ctx.config.resolve(path)),
            None => {
                diag.push(CoreError::Format(format!(
                    "material {}: channel {channel} refers to unknown identifier {id:?}",
                    self.name
                )));
                None
            }
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layered texture handle; null if no core channel could be loaded.
    #[inline]
    pub fn texture_array(&self) -> TextureHandle {
        self.texture_array.handle
    }

    #[inline]
    pub fn texture_array_info(&self) -> &TextureArray {
        &self.texture_array
    }

    /// Core channel names in layer order.
    pub fn array_channels(&self) -> &[String] {
        &self.array_channels
    }

    pub fn aux_textures(&self) -> &[AuxTexture] {
        &self.aux_textures
    }

    /// Paths this material holds a cache claim on.
    pub fn texture_paths(&self) -> &[PathBuf] {
        &self.registered
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        if !self.texture_array.is_null() {
            self.cache.backend().destroy_texture(self.texture_array.handle);
        }
        for path in self.registered.drain(..) {
            if self.cache.unregister(&path) == Release::NotRegistered {
                log::warn!("Material {} released {:?} twice", self.name, path);
            }
        }
    }
}

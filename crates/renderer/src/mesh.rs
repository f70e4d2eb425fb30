//! A PSK file uploaded to the GPU, with its materials.

use std::{
    ops::Range,
    path::{Path, PathBuf},
    sync::Arc,
};

use asset::{
    DecodeOptions, KeyValueStore, MeshGeometry, load_psk,
    mesh::{Batch, index_ranges},
    psk::MaterialRecord,
};
use corelib::{Aabb, CoreError, CoreResult, Diagnostics};

use crate::{
    config::LoadContext,
    draw::DrawSink,
    gpu::{BufferHandle, BufferUsage, GpuBackend},
    material::Material,
};

pub struct MeshAsset {
    path: PathBuf,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_count: u32,
    index_count: u32,
    batches: Vec<Batch>,
    bounds: Aabb,
    materials: Vec<Material>,
    diagnostics: Diagnostics,
    backend: Arc<dyn GpuBackend>,
}

impl MeshAsset {
    /// Decode `path`, upload its geometry and build its materials.
    ///
    /// Fails only when the PSK, its `.skmap` or a referenced `.mat` cannot be
    /// read (or on any format problem in strict mode). Everything else ends up
    /// in [`MeshAsset::diagnostics`].
    pub fn load(path: impl AsRef<Path>, ctx: &LoadContext) -> CoreResult<Self> {
        let path = path.as_ref();
        let mut diag = Diagnostics::new();
        let data = load_psk(path, DecodeOptions { strict: ctx.config.strict }, &mut diag)?;
        let geometry = MeshGeometry::from_mesh_data(&data, &mut diag);
        log::info!(
            "Mesh {:?}: {} vertices, {} indices, {} batches, {} materials",
            path,
            geometry.vertices.len(),
            geometry.indices.len(),
            geometry.batches.len(),
            data.materials.len()
        );

        let backend = ctx.backend().clone();
        let label = path.display().to_string();
        // Built before the materials so a failed sidecar read still frees the buffers.
        let mut mesh = Self {
            path: path.to_path_buf(),
            vertex_buffer: backend.create_buffer(
                &format!("{label} VB"),
                BufferUsage::Vertex,
                bytemuck::cast_slice(&geometry.vertices),
            ),
            index_buffer: backend.create_buffer(
                &format!("{label} IB"),
                BufferUsage::Index,
                bytemuck::cast_slice(&geometry.indices),
            ),
            vertex_count: geometry.vertices.len() as u32,
            index_count: geometry.indices.len() as u32,
            batches: geometry.batches,
            bounds: geometry.bounds,
            materials: Vec::new(),
            diagnostics: Diagnostics::new(),
            backend,
        };

        mesh.materials = load_materials(path, &data.materials, ctx, &mut diag)?;
        mesh.diagnostics = diag;
        Ok(mesh)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// `(material_index, index range)` per batch, in draw order.
    pub fn index_ranges(&self) -> Vec<(i32, Range<u32>)> {
        index_ranges(&self.batches)
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, material_index: i32) -> Option<&Material> {
        usize::try_from(material_index)
            .ok()
            .and_then(|i| self.materials.get(i))
    }

    /// Warnings collected while loading; empty for a clean load.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// One indexed draw per batch, with that batch's material bound.
    pub fn draw(&self, sink: &mut dyn DrawSink) {
        for (material_index, range) in self.index_ranges() {
            match self.material(material_index) {
                Some(material) => {
                    sink.bind_texture_array(0, material.texture_array());
                    let aux = material.aux_textures();
                    for (slot, texture) in aux.iter().enumerate() {
                        sink.bind_texture(1 + slot as u32, texture.handle);
                    }
                    sink.set_aux_texture_count(aux.len() as u32);
                }
                None => sink.set_aux_texture_count(0),
            }
            sink.draw_indexed(self.vertex_buffer, self.index_buffer, range);
        }
    }
}

impl Drop for MeshAsset {
    fn drop(&mut self) {
        self.backend.destroy_buffer(self.vertex_buffer);
        self.backend.destroy_buffer(self.index_buffer);
    }
}

/// One [`Material`] per record, resolved through `<psk>.skmap`.
fn load_materials(
    psk_path: &Path,
    records: &[MaterialRecord],
    ctx: &LoadContext,
    diag: &mut Diagnostics,
) -> CoreResult<Vec<Material>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let key_map = KeyValueStore::load(psk_path.with_extension("skmap"))?;
    let mut materials = Vec::with_capacity(records.len());
    for record in records {
        let material = match key_map.get(&record.name) {
            Some(mat_path) => {
                let material_data = KeyValueStore::load(ctx.config.resolve(mat_path))?;
                Material::assemble(&record.name, &material_data, &key_map, ctx, diag)
            }
            None => {
                diag.push(CoreError::Format(format!(
                    "material {} has no entry in {:?}",
                    record.name,
                    psk_path.with_extension("skmap")
                )));
                Material::empty(&record.name, ctx.cache.clone())
            }
        };
        materials.push(material);
    }
    Ok(materials)
}

#[cfg(test)]
mod tests {
    use asset::testing::{PskBuilder, tga_solid};
    use corelib::{ErrorKind, vec3};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::LoaderConfig,
        gpu::TextureHandle,
        testing::{DrawCall, RecordingBackend, RecordingSink},
    };

    fn context(dir: &TempDir, backend: &Arc<RecordingBackend>) -> LoadContext {
        LoadContext::new(
            backend.clone(),
            LoaderConfig {
                asset_root: Some(dir.path().to_path_buf()),
                strict: false,
            },
        )
    }

    /// Two materials, faces `[0, 0, 1]`, with sidecars and textures on disk.
    fn write_two_material_mesh(dir: &TempDir) -> PathBuf {
        let psk = PskBuilder::new()
            .points(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0], [-1.0, -2.0, -3.0]])
            .wedges(&[(0, 0.0, 0.0, 0), (1, 1.0, 0.0, 0), (2, 0.0, 1.0, 1)])
            .faces_legacy(&[([0, 1, 2], 0, 0, 0), ([2, 1, 0], 0, 0, 0), ([0, 2, 1], 1, 0, 0)])
            .materials(&["MI_Skin", "MI_Cloth"])
            .build();
        let path = dir.path().join("body.psk");
        std::fs::write(&path, psk).unwrap();
        std::fs::write(
            dir.path().join("body.skmap"),
            "MI_Skin=skin.mat\r\nMI_Cloth=cloth.mat\r\nT_D=d.tga\r\nT_M=mask.tga\r\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("skin.mat"), "Diffuse=T_D\r\nMask=T_M\r\n").unwrap();
        std::fs::write(dir.path().join("cloth.mat"), "Diffuse=T_D\r\n").unwrap();
        std::fs::write(dir.path().join("d.tga"), tga_solid(2, 2, &[9, 9, 9])).unwrap();
        std::fs::write(dir.path().join("mask.tga"), tga_solid(2, 2, &[1, 2, 3, 4])).unwrap();
        path
    }

    #[test]
    fn load_uploads_geometry_and_materials() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let mesh = MeshAsset::load(write_two_material_mesh(&dir), &ctx).unwrap();

        assert!(mesh.diagnostics().is_clean(), "{:?}", mesh.diagnostics());
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.index_count(), 9);
        assert_eq!(mesh.index_ranges(), vec![(0, 0..6), (1, 6..9)]);
        assert_eq!(mesh.bounds().min, vec3(-1.0, -3.0, -2.0));
        assert_eq!(mesh.bounds().max, vec3(1.0, 3.0, 2.0));
        assert_eq!(mesh.materials().len(), 2);
        assert_eq!(mesh.materials()[0].name(), "MI_Skin");
        assert_eq!(backend.buffer_len(mesh.vertex_buffer()), Some(3 * 24));
        assert_eq!(backend.buffer_len(mesh.index_buffer()), Some(9 * 4));
    }

    #[test]
    fn draw_binds_material_per_batch() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let mesh = MeshAsset::load(write_two_material_mesh(&dir), &ctx).unwrap();

        let mut sink = RecordingSink::default();
        mesh.draw(&mut sink);

        let skin = &mesh.materials()[0];
        let cloth = &mesh.materials()[1];
        let vb = mesh.vertex_buffer();
        let ib = mesh.index_buffer();
        assert_eq!(
            sink.calls,
            vec![
                DrawCall::BindArray(0, skin.texture_array()),
                DrawCall::Bind(1, skin.aux_textures()[0].handle),
                DrawCall::AuxCount(1),
                DrawCall::Draw(vb, ib, 0..6),
                DrawCall::BindArray(0, cloth.texture_array()),
                DrawCall::AuxCount(0),
                DrawCall::Draw(vb, ib, 6..9),
            ]
        );
    }

    #[test]
    fn drop_releases_everything() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let path = write_two_material_mesh(&dir);

        let a = MeshAsset::load(&path, &ctx).unwrap();
        let b = MeshAsset::load(&path, &ctx).unwrap();
        assert_eq!(ctx.cache.ref_count(&dir.path().join("mask.tga")), 2);

        drop(a);
        assert_eq!(ctx.cache.ref_count(&dir.path().join("mask.tga")), 1);
        drop(b);
        assert!(ctx.cache.is_empty());
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn missing_psk_is_fatal() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let err = MeshAsset::load(dir.path().join("ghost.psk"), &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn missing_skmap_is_fatal_and_frees_buffers() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let path = dir.path().join("lonely.psk");
        std::fs::write(&path, PskBuilder::triangle().build()).unwrap();

        let err = MeshAsset::load(&path, &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn unmapped_material_degrades_to_empty_binding() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let path = dir.path().join("tri.psk");
        std::fs::write(&path, PskBuilder::triangle().build()).unwrap();
        std::fs::write(dir.path().join("tri.skmap"), "Other=x.mat\n").unwrap();

        let mesh = MeshAsset::load(&path, &ctx).unwrap();
        assert_eq!(mesh.diagnostics().count(ErrorKind::Format), 1);
        assert_eq!(mesh.materials()[0].texture_array(), TextureHandle::NULL);

        let mut sink = RecordingSink::default();
        mesh.draw(&mut sink);
        assert_eq!(sink.draws(), 1);
    }

    #[test]
    fn sparse_batch_without_material_still_draws() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = context(&dir, &backend);
        let path = dir.path().join("gap.psk");
        let psk = PskBuilder::new()
            .points(&[[0.0; 3]; 3])
            .wedges(&[(0, 0.0, 0.0, 0), (1, 0.0, 0.0, 0), (2, 0.0, 0.0, 0)])
            .faces_legacy(&[([0, 1, 2], 0, 0, 0), ([0, 1, 2], 2, 0, 0), ([0, 1, 2], 2, 0, 0)])
            .build();
        std::fs::write(&path, psk).unwrap();

        let mesh = MeshAsset::load(&path, &ctx).unwrap();
        assert!(mesh.materials().is_empty());
        assert_eq!(mesh.index_ranges(), vec![(0, 0..3), (2, 3..9)]);

        let mut sink = RecordingSink::default();
        mesh.draw(&mut sink);
        assert_eq!(
            sink.calls,
            vec![
                DrawCall::AuxCount(0),
                DrawCall::Draw(mesh.vertex_buffer(), mesh.index_buffer(), 0..3),
                DrawCall::AuxCount(0),
                DrawCall::Draw(mesh.vertex_buffer(), mesh.index_buffer(), 3..9),
            ]
        );
    }

    #[test]
    fn strict_mode_rejects_malformed_chunk() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let ctx = LoadContext::new(
            backend.clone(),
            LoaderConfig {
                asset_root: None,
                strict: true,
            },
        );
        let path = dir.path().join("bad.psk");
        std::fs::write(
            &path,
            PskBuilder::new().raw_chunk(b"PNTS0000", 0, 16, 1, &[0u8; 16]).build(),
        )
        .unwrap();

        let err = MeshAsset::load(&path, &ctx).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}

use std::path::Path;

use corelib::{Aabb, CoreResult};
use glam::{Mat4, vec3};

use crate::{config::LoadContext, draw::DrawSink, mesh::MeshAsset};

/// Ordered meshes sharing one load context, plus a model matrix.
pub struct Model {
    meshes: Vec<MeshAsset>,
    model_matrix: Mat4,
    ctx: LoadContext,
}

impl Model {
    pub fn new(ctx: LoadContext) -> Self {
        Self {
            meshes: Vec::new(),
            model_matrix: Mat4::IDENTITY,
            ctx,
        }
    }

    #[inline]
    pub fn context(&self) -> &LoadContext {
        &self.ctx
    }

    /// Load a PSK and append it. Nothing is appended on failure.
    pub fn add_mesh(&mut self, path: impl AsRef<Path>) -> CoreResult<&MeshAsset> {
        let mesh = MeshAsset::load(path, &self.ctx)?;
        let index = self.meshes.len();
        self.meshes.push(mesh);
        Ok(&self.meshes[index])
    }

    pub fn meshes(&self) -> &[MeshAsset] {
        &self.meshes
    }

    #[inline]
    pub fn model_matrix(&self) -> Mat4 {
        self.model_matrix
    }

    #[inline]
    pub fn set_model_matrix(&mut self, m: Mat4) {
        self.model_matrix = m;
    }

    /// Union of the mesh boxes in model space.
    pub fn bounds(&self) -> Aabb {
        self.meshes
            .iter()
            .fold(Aabb::EMPTY, |acc, mesh| acc.union(mesh.bounds()))
    }

    /// [`Model::bounds`] with the model matrix applied to all eight corners.
    pub fn world_bounds(&self) -> Aabb {
        let local = self.bounds();
        if local.is_empty() {
            return local;
        }
        let (lo, hi) = (local.min, local.max);
        let corners = (0..8u8).map(|i| {
            let corner = vec3(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            self.model_matrix.transform_point3(corner)
        });
        Aabb::from_points(corners)
    }

    pub fn draw(&self, sink: &mut dyn DrawSink) {
        for mesh in &self.meshes {
            mesh.draw(sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use asset::testing::{PskBuilder, tga_solid};
    use corelib::ErrorKind;
    use glam::Vec3;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::LoaderConfig,
        testing::{RecordingBackend, RecordingSink},
    };

    fn write_mesh(dir: &TempDir, stem: &str, offset: f32) {
        let psk = PskBuilder::new()
            .points(&[[offset, 0.0, 0.0], [offset + 1.0, 1.0, 0.0], [offset, 0.0, 1.0]])
            .wedges(&[(0, 0.0, 0.0, 0), (1, 1.0, 0.0, 0), (2, 0.0, 1.0, 0)])
            .faces_legacy(&[([0, 1, 2], 0, 0, 0)])
            .materials(&["MI_Shared"])
            .build();
        std::fs::write(dir.path().join(format!("{stem}.psk")), psk).unwrap();
        std::fs::write(
            dir.path().join(format!("{stem}.skmap")),
            "MI_Shared=shared.mat\nT_D=d.tga\nT_Mask=mask.tga\n",
        )
        .unwrap();
    }

    fn setup() -> (TempDir, Arc<RecordingBackend>, Model) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("shared.mat"), "Diffuse=T_D\nMask=T_Mask\n").unwrap();
        std::fs::write(dir.path().join("d.tga"), tga_solid(2, 2, &[4, 4, 4])).unwrap();
        std::fs::write(dir.path().join("mask.tga"), tga_solid(2, 2, &[8, 8, 8, 8])).unwrap();
        write_mesh(&dir, "head", 0.0);
        write_mesh(&dir, "body", 10.0);

        let backend = Arc::new(RecordingBackend::default());
        let ctx = LoadContext::new(
            backend.clone(),
            LoaderConfig {
                asset_root: Some(dir.path().to_path_buf()),
                strict: false,
            },
        );
        (dir, backend, Model::new(ctx))
    }

    #[test]
    fn meshes_share_cached_textures() {
        let (dir, backend, mut model) = setup();
        model.add_mesh(dir.path().join("head.psk")).unwrap();
        model.add_mesh(dir.path().join("body.psk")).unwrap();

        let mask = dir.path().join("mask.tga");
        assert_eq!(model.context().cache.ref_count(&mask), 2);
        assert_eq!(backend.textures_created(), 1);

        let a = &model.meshes()[0].materials()[0];
        let b = &model.meshes()[1].materials()[0];
        assert_eq!(a.aux_textures()[0].handle, b.aux_textures()[0].handle);
    }

    #[test]
    fn bounds_union_all_meshes() {
        let (dir, _backend, mut model) = setup();
        assert!(model.bounds().is_empty());

        model.add_mesh(dir.path().join("head.psk")).unwrap();
        model.add_mesh(dir.path().join("body.psk")).unwrap();
        let b = model.bounds();
        assert_eq!(b.min, vec3(0.0, 0.0, 0.0));
        assert_eq!(b.max, vec3(11.0, 1.0, 1.0));

        model.set_model_matrix(Mat4::from_translation(Vec3::Y * 5.0));
        let w = model.world_bounds();
        assert_eq!(w.min, vec3(0.0, 5.0, 0.0));
        assert_eq!(w.max, vec3(11.0, 6.0, 1.0));
    }

    #[test]
    fn draw_visits_meshes_in_order() {
        let (dir, _backend, mut model) = setup();
        model.add_mesh(dir.path().join("head.psk")).unwrap();
        model.add_mesh(dir.path().join("body.psk")).unwrap();

        let mut sink = RecordingSink::default();
        model.draw(&mut sink);
        assert_eq!(sink.draws(), 2);
    }

    #[test]
    fn failed_add_leaves_model_untouched() {
        let (dir, backend, mut model) = setup();
        model.add_mesh(dir.path().join("head.psk")).unwrap();
        let err = model.add_mesh(dir.path().join("missing.psk")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(model.meshes().len(), 1);
        assert_eq!(backend.live_buffers(), 2);
    }

    #[test]
    fn dropping_model_releases_all_gpu_objects() {
        let (dir, backend, mut model) = setup();
        model.add_mesh(dir.path().join("head.psk")).unwrap();
        model.add_mesh(dir.path().join("body.psk")).unwrap();
        let cache = model.context().cache.clone();

        drop(model);
        assert!(cache.is_empty());
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }
}

//! Reference-counted texture registry shared by every material.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use asset::TextureData;
use corelib::{CoreError, CoreResult};
use parking_lot::Mutex;

use crate::gpu::{GpuBackend, TextureHandle};

struct CacheEntry {
    handle: TextureHandle,
    ref_count: u64,
}

/// Outcome of [`TextureCache::unregister`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Release {
    /// Other claims remain; carries the new count.
    Retained(u64),
    /// The last claim was released and the texture freed.
    Destroyed,
    /// The path held no claims. Logged and otherwise ignored.
    NotRegistered,
}

/// Maps a texture path to one GPU texture plus a claim count.
///
/// An entry exists exactly while its count is above zero.
pub struct TextureCache {
    backend: Arc<dyn GpuBackend>,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl TextureCache {
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            backend,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Claim the texture at `path`, loading it on first use.
    ///
    /// On failure nothing is cached and the caller should fall back to
    /// [`TextureHandle::NULL`]; the error is never fatal to a mesh load.
    pub fn register(&self, path: &Path) -> CoreResult<TextureHandle> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(path) {
            entry.ref_count += 1;
            return Ok(entry.handle);
        }

        log::info!("Registering new texture: {:?}", path);
        let image = TextureData::load(path)?;
        let handle = self
            .backend
            .create_texture(&path.display().to_string(), &image);
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                handle,
                ref_count: 1,
            },
        );
        Ok(handle)
    }

    /// Drop one claim; the texture is freed when the last one goes.
    pub fn unregister(&self, path: &Path) -> Release {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(path) else {
            let err = CoreError::Misuse(format!(
                "attempt to unregister texture that is not registered: {}",
                path.display()
            ));
            log::warn!("{err}");
            return Release::NotRegistered;
        };

        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Release::Retained(entry.ref_count);
        }

        let handle = entry.handle;
        entries.remove(path);
        log::debug!("Last claim on {:?} released, destroying {handle}", path);
        self.backend.destroy_texture(handle);
        Release::Destroyed
    }

    /// Current claim count, 0 when absent.
    pub fn ref_count(&self, path: &Path) -> u64 {
        self.entries.lock().get(path).map_or(0, |e| e.ref_count)
    }

    pub fn handle(&self, path: &Path) -> Option<TextureHandle> {
        self.entries.lock().get(path).map(|e| e.handle)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Drop for TextureCache {
    fn drop(&mut self) {
        for (path, entry) in self.entries.get_mut().drain() {
            log::warn!(
                "Texture {:?} still held {} claims when the cache was dropped",
                path,
                entry.ref_count
            );
            self.backend.destroy_texture(entry.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use asset::testing::tga_solid;
    use corelib::ErrorKind;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{GpuCall, RecordingBackend};

    fn cache_with_texture(pixel: &[u8]) -> (TempDir, PathBuf, Arc<RecordingBackend>, TextureCache) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.tga");
        std::fs::write(&path, tga_solid(4, 4, pixel)).unwrap();
        let backend = Arc::new(RecordingBackend::default());
        let cache = TextureCache::new(backend.clone());
        (dir, path, backend, cache)
    }

    #[test]
    fn register_n_times_shares_one_texture() {
        let (_dir, path, backend, cache) = cache_with_texture(&[1, 2, 3]);

        let first = cache.register(&path).unwrap();
        assert!(!first.is_null());
        for _ in 0..4 {
            assert_eq!(cache.register(&path).unwrap(), first);
        }
        assert_eq!(cache.ref_count(&path), 5);
        assert_eq!(backend.textures_created(), 1);

        for remaining in (1..5).rev() {
            assert_eq!(cache.unregister(&path), Release::Retained(remaining));
        }
        assert_eq!(cache.unregister(&path), Release::Destroyed);
        assert_eq!(cache.ref_count(&path), 0);
        assert!(cache.is_empty());
        assert!(backend.calls().contains(&GpuCall::DestroyTexture(first)));

        // One past the matched releases is a logged no-op.
        assert_eq!(cache.unregister(&path), Release::NotRegistered);
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn unsupported_channels_leave_no_entry() {
        let (_dir, path, backend, cache) = cache_with_texture(&[200]);
        let err = cache.register(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(cache.is_empty());
        assert_eq!(backend.textures_created(), 0);
        assert_eq!(cache.unregister(&path), Release::NotRegistered);
    }

    #[test]
    fn missing_file_is_reported_not_cached() {
        let backend = Arc::new(RecordingBackend::default());
        let cache = TextureCache::new(backend);
        let err = cache.register(Path::new("/nonexistent/tex.tga")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn re_register_after_destroy_reloads() {
        let (_dir, path, backend, cache) = cache_with_texture(&[9, 9, 9, 9]);
        let a = cache.register(&path).unwrap();
        assert_eq!(cache.unregister(&path), Release::Destroyed);
        let b = cache.register(&path).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.handle(&path), Some(b));
        assert_eq!(backend.textures_created(), 2);
    }

    #[test]
    fn dropping_cache_frees_leftover_textures() {
        let (_dir, path, backend, cache) = cache_with_texture(&[1, 1, 1]);
        cache.register(&path).unwrap();
        drop(cache);
        assert_eq!(backend.live_textures(), 0);
    }
}

//! Loader configuration and the context shared by every load call.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{gpu::GpuBackend, texture_cache::TextureCache};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Base for relative paths found in `.skmap` files. `None` keeps them
    /// relative to the working directory.
    pub asset_root: Option<PathBuf>,
    /// Treat PSK format irregularities as fatal.
    pub strict: bool,
}

impl LoaderConfig {
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.asset_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Shared state handed to every mesh/material load.
#[derive(Clone)]
pub struct LoadContext {
    pub cache: Arc<TextureCache>,
    pub config: LoaderConfig,
}

impl LoadContext {
    pub fn new(backend: Arc<dyn GpuBackend>, config: LoaderConfig) -> Self {
        Self {
            cache: Arc::new(TextureCache::new(backend)),
            config,
        }
    }

    #[inline]
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        self.cache.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_joins_only_relative_paths() {
        let cfg = LoaderConfig {
            asset_root: Some(PathBuf::from("/assets")),
            strict: false,
        };
        assert_eq!(cfg.resolve("tex/a.tga"), PathBuf::from("/assets/tex/a.tga"));

        let abs = std::env::temp_dir().join("b.tga");
        assert_eq!(cfg.resolve(&abs), abs);

        let plain = LoaderConfig::default();
        assert_eq!(plain.resolve("tex/a.tga"), PathBuf::from("tex/a.tga"));
    }
}

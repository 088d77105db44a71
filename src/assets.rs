use std::path::{Path, PathBuf};

use anyhow::Context;
use image::RgbaImage;

use crate::catalog::Catalog;
use crate::scene_graph::Model;

/// Where the catalog and the assets it names come from.
pub trait AssetSource: Send + Sync {
    fn fetch_catalog(&self) -> anyhow::Result<Catalog>;

    fn load_model(&self, path: &str) -> anyhow::Result<Model>;

    fn load_image(&self, path: &str) -> anyhow::Result<RgbaImage>;
}

/// Reads the catalog from disk on every request. Asset paths in the catalog
/// are relative to the catalog's own directory.
pub struct FileAssetSource {
    catalog_path: PathBuf,
}

impl FileAssetSource {
    pub fn new(catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }

        match self.catalog_path.parent() {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }
}

impl AssetSource for FileAssetSource {
    fn fetch_catalog(&self) -> anyhow::Result<Catalog> {
        let json = std::fs::read_to_string(&self.catalog_path).with_context(|| {
            format!("Failed to read catalog {}", self.catalog_path.display())
        })?;

        Catalog::from_json(&json)
            .with_context(|| format!("Failed to parse catalog {}", self.catalog_path.display()))
    }

    fn load_model(&self, path: &str) -> anyhow::Result<Model> {
        Model::load(&self.resolve(path))
    }

    fn load_image(&self, path: &str) -> anyhow::Result<RgbaImage> {
        let path = self.resolve(path);
        let image = image::open(&path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?;

        Ok(image.to_rgba8())
    }
}

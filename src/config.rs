use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub catalog_path: PathBuf,
    pub window_title: String,
    /// Catalog entry requested as soon as the viewer starts.
    pub initial_model: Option<String>,
    /// Radians added to the model's Y rotation every frame.
    pub auto_rotate_speed: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("assets/models.json"),
            window_title: String::from("Product Viewer"),
            initial_model: None,
            auto_rotate_speed: 0.001,
        }
    }
}

impl ViewerConfig {
    pub const DEFAULT_PATH: &'static str = "viewer.json";

    /// Reads `path` if it exists; a missing file means defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub clear_color: wgpu::Color,
    /// Multiplied into the material colour of wireframe edges.
    pub wireframe_tint: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: wgpu::Color::TRANSPARENT,
            wireframe_tint: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = ViewerConfig::load_or_default(Path::new("no/such/viewer.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{ "initialModel": "Cola", "autoRotateSpeed": 0.0 }"#).unwrap();

        assert_eq!(config.initial_model.as_deref(), Some("Cola"));
        assert_eq!(config.auto_rotate_speed, 0.0);
        assert_eq!(config.catalog_path, PathBuf::from("assets/models.json"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("showcase-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();

        let result = ViewerConfig::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(result.is_err());
    }
}

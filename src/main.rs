use std::path::Path;

use anyhow::Result;

mod assets;
mod camera;
mod catalog;
mod command;
mod config;
mod controls;
mod error;
mod lighting;
mod loader;
mod math;
mod rendering;
mod scene_graph;
mod ui;
mod view;
mod viewer;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = config::ViewerConfig::load_or_default(Path::new(config::ViewerConfig::DEFAULT_PATH))?;
    log::info!("Using catalog {}", config.catalog_path.display());

    pollster::block_on(window::run(config))?;

    Ok(())
}

use std::sync::Arc;

use image::RgbaImage;

use crate::{
    assets::AssetSource,
    camera::Camera,
    command::Command,
    config::ViewerConfig,
    controls::OrbitControls,
    lighting::LightingPreset,
    loader::{LoadEvent, ModelLoader, RequestId},
    scene_graph::Scene,
    view::CameraView,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    Model3D,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub description: String,
}

pub struct FallbackImage {
    pub path: String,
    pub image: Option<RgbaImage>,
    /// Bumped whenever the image changes so GPU copies can be refreshed.
    pub revision: u64,
}

/// Application state shared by the UI, the frame loop and the renderer.
pub struct Viewer {
    pub scene: Scene,
    pub camera: Camera,
    pub controls: OrbitControls,
    presentation: Presentation,
    info: Option<ModelInfo>,
    fallback_image: Option<FallbackImage>,
    menu: Vec<String>,
    loader: ModelLoader,
    /// Latest request that resolved to a catalog entry. Only its model is shown.
    resolved: Option<RequestId>,
    auto_rotate_speed: f32,
}

impl Viewer {
    pub fn new(config: &ViewerConfig, source: Arc<dyn AssetSource>) -> anyhow::Result<Self> {
        let loader = ModelLoader::new(source)?;
        loader.list_catalog();

        let viewer = Self {
            scene: Scene::new(),
            camera: Camera::new(16.0 / 9.0),
            controls: OrbitControls::default(),
            presentation: Presentation::Model3D,
            info: None,
            fallback_image: None,
            menu: Vec::new(),
            loader,
            resolved: None,
            auto_rotate_speed: config.auto_rotate_speed,
        };

        if let Some(name) = &config.initial_model {
            viewer.load_model(name);
        }

        Ok(viewer)
    }

    pub fn dispatch(&mut self, command: Command) {
        log::debug!("Dispatching {command:?}");

        match command {
            Command::ToggleWireframe => self.toggle_wireframe(),
            Command::ChangeLighting(direction) => self.change_lighting(&direction),
            Command::ChangeView(view) => self.change_view(&view),
            Command::Show3D => self.show_3d(),
            Command::ShowImage => self.show_image(),
            Command::LoadModel(name) => self.load_model(&name),
        }
    }

    pub fn toggle_wireframe(&mut self) {
        if let Some(model) = self.scene.model_mut() {
            model.toggle_wireframe();
        }
    }

    pub fn change_lighting(&mut self, direction: &str) {
        match direction.parse::<LightingPreset>() {
            Ok(preset) => self.scene.lights.apply_preset(preset),
            Err(error) => log::debug!("Ignoring lighting change: {error}"),
        }
    }

    pub fn change_view(&mut self, view: &str) {
        match view.parse::<CameraView>() {
            Ok(view) => view.apply(&mut self.camera, &mut self.scene.lights),
            Err(error) => log::debug!("Ignoring view change: {error}"),
        }
    }

    pub fn show_3d(&mut self) {
        self.presentation = Presentation::Model3D;
    }

    pub fn show_image(&mut self) {
        self.presentation = Presentation::Image;
    }

    pub fn load_model(&self, name: &str) {
        self.loader.request(name);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
    }

    /// The per-frame task: apply finished loads, spin the model, then let
    /// the orbit controls settle the camera.
    pub fn update(&mut self) {
        for event in self.loader.poll() {
            self.handle_event(event);
        }

        if let Some(model) = self.scene.model_mut() {
            model.rotate_y(self.auto_rotate_speed);
        }

        self.controls.update(&mut self.camera);
    }

    fn handle_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::CatalogListed(names) => {
                self.menu = names;
            }
            LoadEvent::CatalogResolved {
                request,
                entry,
                image,
            } => {
                if self.resolved.is_some_and(|resolved| request <= resolved) {
                    log::debug!("Discarding catalog entry {} from {request:?}", entry.name);
                    return;
                }
                self.resolved = Some(request);

                let revision = self
                    .fallback_image
                    .as_ref()
                    .map_or(0, |fallback| fallback.revision + 1);
                self.fallback_image = Some(FallbackImage {
                    path: entry.image_path,
                    image,
                    revision,
                });
                self.info = Some(ModelInfo {
                    name: entry.name,
                    description: entry.description,
                });

                self.scene.detach_model();
                self.show_3d();
            }
            LoadEvent::ModelReady { request, model } => {
                if self.resolved != Some(request) {
                    log::debug!("Discarding model {} from {request:?}", model.name);
                    return;
                }

                self.scene.attach_model(model);
            }
            LoadEvent::Failed { request, error } => {
                log::error!("{error} ({request:?})");
            }
        }
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.info.as_ref()
    }

    pub fn fallback_image(&self) -> Option<&FallbackImage> {
        self.fallback_image.as_ref()
    }

    pub fn menu(&self) -> &[String] {
        &self.menu
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use glam::Vec3;

    use super::*;
    use crate::loader::tests::MemorySource;
    use crate::scene_graph::model::tests::test_model;

    fn viewer_with(source: MemorySource) -> Viewer {
        let mut viewer = Viewer::new(&ViewerConfig::default(), Arc::new(source)).unwrap();
        // The startup catalog listing is always answered first.
        pump_events(&mut viewer, 1);
        viewer
    }

    fn pump_events(viewer: &mut Viewer, count: usize) {
        for _ in 0..count {
            let event = viewer
                .loader
                .recv_timeout(Duration::from_secs(5))
                .expect("loader produced no event");
            viewer.handle_event(event);
        }
    }

    fn pump_until(viewer: &mut Viewer, done: impl Fn(&Viewer) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(event) = viewer.loader.recv_timeout(Duration::from_millis(20)) {
                viewer.handle_event(event);
                if done(viewer) {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "timed out waiting for loader");
        }
    }

    fn model_name(viewer: &Viewer) -> Option<&str> {
        viewer.scene.model().map(|model| model.name.as_str())
    }

    #[test]
    fn startup_lists_the_catalog() {
        let viewer = viewer_with(MemorySource::drinks());
        assert_eq!(viewer.menu(), ["Cola", "Lemonade", "Broken"]);
        assert_eq!(viewer.presentation(), Presentation::Model3D);
        assert!(viewer.scene.model().is_none());
    }

    #[test]
    fn loading_a_known_name_attaches_it_and_fills_the_info_panel() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.show_image();

        viewer.dispatch(Command::LoadModel("Cola".into()));
        pump_events(&mut viewer, 2);

        assert_eq!(model_name(&viewer), Some("cola"));
        assert_eq!(
            viewer.info(),
            Some(&ModelInfo {
                name: "Cola".into(),
                description: "A can of Cola".into(),
            })
        );
        let fallback = viewer.fallback_image().unwrap();
        assert_eq!(fallback.path, "cola.png");
        assert!(fallback.image.is_some());
        assert_eq!(viewer.presentation(), Presentation::Model3D);

        let model = viewer.scene.model().unwrap();
        assert_eq!(model.transform.scale(), Vec3::splat(8.0));
    }

    #[test]
    fn loading_an_unknown_name_changes_nothing() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Cola".into()));
        pump_events(&mut viewer, 2);
        let attached = viewer.scene.model().map(|model| model.id());

        viewer.dispatch(Command::LoadModel("Water".into()));
        pump_events(&mut viewer, 1);

        assert_eq!(viewer.scene.model().map(|model| model.id()), attached);
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Cola"));
        assert_eq!(viewer.fallback_image().unwrap().path, "cola.png");
    }

    #[test]
    fn unreachable_catalog_changes_nothing() {
        let mut viewer = viewer_with(MemorySource::offline());
        viewer.show_image();

        viewer.dispatch(Command::LoadModel("Cola".into()));
        pump_events(&mut viewer, 1);

        assert!(viewer.scene.model().is_none());
        assert!(viewer.info().is_none());
        assert_eq!(viewer.presentation(), Presentation::Image);
    }

    #[test]
    fn failed_asset_load_leaves_the_viewport_empty() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Cola".into()));
        pump_events(&mut viewer, 2);

        viewer.dispatch(Command::LoadModel("Broken".into()));
        pump_events(&mut viewer, 2);

        assert!(viewer.scene.model().is_none());
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Broken"));
        assert!(viewer.fallback_image().unwrap().image.is_none());
    }

    #[test]
    fn the_latest_request_wins() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Cola".into()));
        viewer.dispatch(Command::LoadModel("Lemonade".into()));

        pump_until(&mut viewer, |viewer| model_name(viewer) == Some("lemonade"));
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Lemonade"));
    }

    #[test]
    fn unknown_name_does_not_cancel_a_load_in_flight() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Cola".into()));
        match viewer.loader.recv_timeout(Duration::from_secs(5)) {
            Some(event @ LoadEvent::CatalogResolved { .. }) => viewer.handle_event(event),
            other => panic!("unexpected event {other:?}"),
        }

        viewer.dispatch(Command::LoadModel("Water".into()));
        pump_events(&mut viewer, 2);

        assert_eq!(model_name(&viewer), Some("cola"));
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Cola"));
        assert_eq!(viewer.fallback_image().unwrap().path, "cola.png");
    }

    #[test]
    fn unreachable_catalog_does_not_cancel_a_load_in_flight() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Cola".into()));
        pump_events(&mut viewer, 1);

        viewer.handle_event(LoadEvent::Failed {
            request: RequestId(2),
            error: crate::error::LoadError::CatalogFetch(anyhow::anyhow!("offline")),
        });
        pump_events(&mut viewer, 1);

        assert_eq!(model_name(&viewer), Some("cola"));
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Cola"));
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::LoadModel("Lemonade".into()));
        pump_events(&mut viewer, 2);
        let current = viewer.scene.model().map(|model| model.id());

        viewer.handle_event(LoadEvent::ModelReady {
            request: RequestId(0),
            model: test_model("stale"),
        });
        viewer.handle_event(LoadEvent::CatalogResolved {
            request: RequestId(0),
            entry: crate::catalog::CatalogEntry {
                name: "Stale".into(),
                description: String::new(),
                image_path: "stale.png".into(),
                model_path: "stale.glb".into(),
            },
            image: None,
        });

        assert_eq!(viewer.scene.model().map(|model| model.id()), current);
        assert_eq!(viewer.info().map(|info| info.name.as_str()), Some("Lemonade"));
    }

    #[test]
    fn wireframe_toggle_round_trips_and_ignores_missing_model() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.dispatch(Command::ToggleWireframe);

        viewer.scene.attach_model(test_model("Cola"));
        let flags = |viewer: &Viewer| -> Vec<bool> {
            viewer
                .scene
                .model()
                .unwrap()
                .meshes()
                .flat_map(|(_, mesh)| mesh.primitives.iter().map(|p| p.material.wireframe))
                .collect()
        };
        let original = flags(&viewer);

        viewer.dispatch(Command::ToggleWireframe);
        assert_ne!(flags(&viewer), original);
        viewer.dispatch(Command::ToggleWireframe);
        assert_eq!(flags(&viewer), original);
    }

    #[test]
    fn presets_dispatch_by_name() {
        let mut viewer = viewer_with(MemorySource::drinks());

        viewer.dispatch(Command::ChangeView("top".into()));
        assert_eq!(viewer.camera.eye, Vec3::new(0.0, 20.0, 0.0));
        assert_eq!(viewer.camera.target, Vec3::ZERO);
        assert_eq!(viewer.scene.lights.directional.position, Vec3::new(0.0, 20.0, 0.0));

        viewer.dispatch(Command::ChangeView("left".into()));
        assert_eq!(viewer.camera.eye, Vec3::new(-20.0, 0.0, 0.0));
        assert_eq!(
            viewer.scene.lights.directional.position,
            Vec3::new(500.0, 500.0, 500.0)
        );

        viewer.dispatch(Command::ChangeLighting("bottom".into()));
        assert_eq!(viewer.scene.lights.directional.position, Vec3::new(0.0, -20.0, 0.0));

        viewer.dispatch(Command::ChangeView("diagonal".into()));
        viewer.dispatch(Command::ChangeLighting("dusk".into()));
        assert_eq!(viewer.camera.eye, Vec3::new(-20.0, 0.0, 0.0));
        assert_eq!(viewer.scene.lights.directional.position, Vec3::new(0.0, -20.0, 0.0));
    }

    #[test]
    fn presentation_is_exclusive() {
        let mut viewer = viewer_with(MemorySource::drinks());

        viewer.dispatch(Command::Show3D);
        viewer.dispatch(Command::ShowImage);
        assert_eq!(viewer.presentation(), Presentation::Image);

        viewer.dispatch(Command::Show3D);
        assert_eq!(viewer.presentation(), Presentation::Model3D);
    }

    #[test]
    fn update_spins_the_model_once_per_frame() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.update();

        viewer.scene.attach_model(test_model("Cola"));
        for _ in 0..10 {
            viewer.update();
        }

        let rotation = viewer.scene.model().unwrap().rotation_y();
        assert!((rotation - 0.01).abs() < 1e-6);
    }

    #[test]
    fn resize_updates_the_camera_aspect() {
        let mut viewer = viewer_with(MemorySource::drinks());
        viewer.resize(1000, 500);
        assert_eq!(viewer.camera.aspect, 2.0);
    }
}

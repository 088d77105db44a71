use crate::lighting::LightingRig;
use crate::scene_graph::model::Model;

/// Root of the displayed world: the lighting rig and at most one model.
pub struct Scene {
    model: Option<Model>,
    pub lights: LightingRig,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            model: None,
            lights: LightingRig::default(),
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.model.as_mut()
    }

    /// Attaches `model`, handing back whichever model it replaces.
    pub fn attach_model(&mut self, model: Model) -> Option<Model> {
        log::info!("Attaching model {} ({:?})", model.name, model.id());
        self.model.replace(model)
    }

    pub fn detach_model(&mut self) -> Option<Model> {
        let detached = self.model.take();
        if let Some(model) = &detached {
            log::debug!("Detached model {} ({:?})", model.name, model.id());
        }
        detached
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

use std::str::FromStr;

use glam::Vec3;

use crate::camera::{Camera, VIEW_DISTANCE};
use crate::lighting::{LightingRig, DEFAULT_LIGHT_POSITION};

/// Fixed viewpoints. Top and bottom also move the light with the camera;
/// left and right put it back at its default offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraView {
    Top,
    Bottom,
    Left,
    Right,
}

impl CameraView {
    pub const ALL: [CameraView; 4] = [
        CameraView::Top,
        CameraView::Bottom,
        CameraView::Left,
        CameraView::Right,
    ];

    pub fn camera_position(self) -> Vec3 {
        match self {
            CameraView::Top => Vec3::new(0.0, VIEW_DISTANCE, 0.0),
            CameraView::Bottom => Vec3::new(0.0, -VIEW_DISTANCE, 0.0),
            CameraView::Left => Vec3::new(-VIEW_DISTANCE, 0.0, 0.0),
            CameraView::Right => Vec3::new(VIEW_DISTANCE, 0.0, 0.0),
        }
    }

    pub fn light_position(self) -> Vec3 {
        match self {
            CameraView::Top | CameraView::Bottom => self.camera_position(),
            CameraView::Left | CameraView::Right => DEFAULT_LIGHT_POSITION,
        }
    }

    pub fn apply(self, camera: &mut Camera, lights: &mut LightingRig) {
        camera.eye = self.camera_position();
        camera.look_at(Vec3::ZERO);
        lights.directional.position = self.light_position();
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraView::Top => "top",
            CameraView::Bottom => "bottom",
            CameraView::Left => "left",
            CameraView::Right => "right",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown camera view: {0}")]
pub struct UnknownCameraView(pub String);

impl FromStr for CameraView {
    type Err = UnknownCameraView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CameraView::ALL
            .into_iter()
            .find(|view| view.label() == s)
            .ok_or_else(|| UnknownCameraView(s.to_string()))
    }
}

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::camera::Camera;

const POLAR_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Spherical {
    radius: f32,
    /// Polar angle from +Y.
    phi: f32,
    /// Azimuth around +Y, measured from +Z.
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }

        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

/// Orbits the camera around its target from pointer input, with optional
/// inertia. Input only accumulates deltas; `update` applies them.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    spherical_delta: Spherical,
    scale: f32,
    pan_offset: Vec3,

    drag: Option<DragMode>,
    last_cursor: Option<Vec2>,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.25,
            enable_zoom: true,
            enable_pan: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            spherical_delta: Spherical::default(),
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: None,
            last_cursor: None,
        }
    }
}

impl OrbitControls {
    pub fn begin_drag(&mut self, mode: DragMode) {
        if mode == DragMode::Pan && !self.enable_pan {
            return;
        }
        self.drag = Some(mode);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Feeds a cursor position in physical pixels.
    pub fn cursor_moved(&mut self, position: Vec2, viewport_height: f32, camera: &Camera) {
        let previous = self.last_cursor.replace(position);

        let (Some(mode), Some(previous)) = (self.drag, previous) else {
            return;
        };

        if viewport_height <= 0.0 {
            return;
        }

        let delta = position - previous;

        match mode {
            DragMode::Rotate => {
                self.rotate_left(TAU * delta.x / viewport_height * self.rotate_speed);
                self.rotate_up(TAU * delta.y / viewport_height * self.rotate_speed);
            }
            DragMode::Pan => self.pan(delta, viewport_height, camera),
        }
    }

    /// Positive `lines` zooms in.
    pub fn scrolled(&mut self, lines: f32) {
        if !self.enable_zoom || lines == 0.0 {
            return;
        }

        let zoom_scale = 0.95f32.powf(self.zoom_speed * lines.abs());
        if lines > 0.0 {
            self.scale *= zoom_scale;
        } else {
            self.scale /= zoom_scale;
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    fn pan(&mut self, delta: Vec2, viewport_height: f32, camera: &Camera) {
        let offset = camera.eye - camera.target;
        let target_distance =
            offset.length() * (camera.fov_y_degrees.to_radians() * 0.5).tan();

        let camera_to_world = camera.view_matrix().inverse();
        let right = camera_to_world.x_axis.truncate();
        let up = camera_to_world.y_axis.truncate();

        self.pan_offset -= right * (2.0 * delta.x * target_distance / viewport_height);
        self.pan_offset += up * (2.0 * delta.y * target_distance / viewport_height);
    }

    /// Applies accumulated input to the camera. Call once per frame.
    pub fn update(&mut self, camera: &mut Camera) {
        let mut spherical = Spherical::from_offset(camera.eye - camera.target);

        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };

        spherical.theta += self.spherical_delta.theta * factor;
        spherical.phi += self.spherical_delta.phi * factor;
        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        camera.target += self.pan_offset * factor;
        camera.eye = camera.target + spherical.to_offset();

        if self.enable_damping {
            self.spherical_delta.theta *= 1.0 - self.damping_factor;
            self.spherical_delta.phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }

        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azimuth(camera: &Camera) -> f32 {
        Spherical::from_offset(camera.eye - camera.target).theta
    }

    #[test]
    fn spherical_round_trips_offsets() {
        let offset = Vec3::new(3.0, -4.0, 12.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).length() < 1e-4);
    }

    #[test]
    fn update_without_input_keeps_camera_in_place() {
        let mut controls = OrbitControls::default();
        let mut camera = Camera::new(1.0);

        controls.update(&mut camera);
        assert!((camera.eye - Vec3::new(0.0, 0.0, 20.0)).length() < 1e-4);
    }

    #[test]
    fn damping_spreads_rotation_over_frames() {
        let mut controls = OrbitControls::default();
        let mut camera = Camera::new(1.0);

        controls.rotate_left(-1.0);
        controls.update(&mut camera);
        assert!((azimuth(&camera) - 0.25).abs() < 1e-4);

        for _ in 0..100 {
            controls.update(&mut camera);
        }
        assert!((azimuth(&camera) - 1.0).abs() < 1e-3);
        assert!((camera.eye.length() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn without_damping_rotation_applies_at_once() {
        let mut controls = OrbitControls {
            enable_damping: false,
            ..Default::default()
        };
        let mut camera = Camera::new(1.0);

        controls.rotate_left(-0.5);
        controls.update(&mut camera);
        assert!((azimuth(&camera) - 0.5).abs() < 1e-4);

        controls.update(&mut camera);
        assert!((azimuth(&camera) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn polar_angle_never_reaches_the_pole() {
        let mut controls = OrbitControls {
            enable_damping: false,
            ..Default::default()
        };
        let mut camera = Camera::new(1.0);

        controls.rotate_up(10.0);
        controls.update(&mut camera);
        assert!(camera.eye.is_finite());
        assert!(camera.eye.y <= 20.0);
        assert!(camera.eye.z > 0.0);
        assert!(camera.view_matrix().is_finite());
    }

    #[test]
    fn scrolling_forward_moves_closer() {
        let mut controls = OrbitControls::default();
        let mut camera = Camera::new(1.0);

        controls.scrolled(1.0);
        controls.update(&mut camera);
        assert!((camera.eye.length() - 19.0).abs() < 1e-3);

        controls.scrolled(-1.0);
        controls.update(&mut camera);
        assert!((camera.eye.length() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn zoom_can_be_disabled() {
        let mut controls = OrbitControls {
            enable_zoom: false,
            ..Default::default()
        };
        let mut camera = Camera::new(1.0);

        controls.scrolled(3.0);
        controls.update(&mut camera);
        assert!((camera.eye.length() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn dragging_rotates_only_while_a_button_is_held() {
        let mut controls = OrbitControls {
            enable_damping: false,
            ..Default::default()
        };
        let mut camera = Camera::new(1.0);

        controls.cursor_moved(Vec2::new(100.0, 100.0), 600.0, &camera);
        controls.cursor_moved(Vec2::new(200.0, 100.0), 600.0, &camera);
        controls.update(&mut camera);
        assert!(azimuth(&camera).abs() < 1e-5);

        controls.begin_drag(DragMode::Rotate);
        assert!(controls.is_dragging());
        controls.cursor_moved(Vec2::new(300.0, 100.0), 600.0, &camera);
        controls.end_drag();
        assert!(!controls.is_dragging());
        controls.update(&mut camera);
        assert!((azimuth(&camera) + TAU * 100.0 / 600.0).abs() < 1e-4);
    }

    #[test]
    fn panning_moves_target_and_eye_together() {
        let mut controls = OrbitControls {
            enable_damping: false,
            ..Default::default()
        };
        let mut camera = Camera::new(1.0);

        controls.begin_drag(DragMode::Pan);
        controls.cursor_moved(Vec2::new(0.0, 0.0), 600.0, &camera);
        controls.cursor_moved(Vec2::new(60.0, 0.0), 600.0, &camera);
        controls.update(&mut camera);

        assert!(camera.target.x < 0.0);
        assert!(camera.target.y.abs() < 1e-5);
        assert!(((camera.eye - camera.target) - Vec3::new(0.0, 0.0, 20.0)).length() < 1e-3);
    }
}

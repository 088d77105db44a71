use glam::{Mat4, Vec3};

/// Distance of the initial camera and of every view preset from the origin.
pub const VIEW_DISTANCE: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, VIEW_DISTANCE),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            aspect,
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        let forward = (self.target - self.eye).normalize_or_zero();

        // Looking straight along the up axis leaves the roll undefined.
        let up = if forward.cross(self.up).length_squared() < 1e-8 {
            Vec3::Z
        } else {
            self.up
        };

        Mat4::look_at_rh(self.eye, self.target, up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn get_vp_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_twenty_units_down_the_view_axis() {
        let camera = Camera::new(16.0 / 9.0);
        assert_eq!(camera.eye, Vec3::new(0.0, 0.0, 20.0));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.fov_y_degrees, 75.0);
        assert_eq!(camera.near, 0.1);
        assert_eq!(camera.far, 1000.0);
    }

    #[test]
    fn origin_projects_to_screen_centre() {
        let camera = Camera::new(1.0);
        let clip = camera.get_vp_matrix().project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 1e-6 && clip.y.abs() < 1e-6);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn view_from_straight_above_is_finite() {
        let mut camera = Camera::new(1.0);
        camera.eye = Vec3::new(0.0, VIEW_DISTANCE, 0.0);

        let view = camera.view_matrix();
        assert!(view.is_finite());
        let origin = view.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -VIEW_DISTANCE)).length() < 1e-4);
    }

    #[test]
    fn zero_sized_viewport_keeps_previous_aspect() {
        let mut camera = Camera::new(2.0);
        camera.set_aspect(0, 600);
        assert_eq!(camera.aspect, 2.0);

        camera.set_aspect(800, 400);
        assert_eq!(camera.aspect, 2.0);
        camera.set_aspect(400, 800);
        assert_eq!(camera.aspect, 0.5);
    }
}

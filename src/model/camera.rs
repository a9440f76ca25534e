use glam::{Mat4, Vec2, Vec3};

use crate::config::CameraConfig;
use crate::utils::Ray;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32, cfg: &CameraConfig) -> Self {
        Self {
            eye: Vec3::new(0.0, cfg.height_offset, cfg.distance),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: cfg.fov_y_degrees.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: cfg.z_near,
            z_far: cfg.z_far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// View direction flattened onto the ground plane. `None` when looking
    /// straight up or down.
    pub fn planar_forward(&self) -> Option<Vec3> {
        let f = self.forward();
        Vec3::new(f.x, 0.0, f.z).try_normalize()
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Ray from the eye through a pointer in normalized device coordinates
    /// (x right, y up, both in [-1, 1]), unprojected at the far plane.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let inv = self.view_proj().inverse();
        let far = inv.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        Ray::new(self.eye, far - self.eye)
    }

    /// Screen position of a world point in NDC.
    pub fn project(&self, point: Vec3) -> Vec2 {
        let p = self.view_proj().project_point3(point);
        Vec2::new(p.x, p.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        let mut cam = Camera::new(800, 600, &CameraConfig::default());
        cam.eye = Vec3::new(0.0, 5.0, -10.0);
        cam.look_at(Vec3::ZERO);
        cam
    }

    #[test]
    fn planar_forward_drops_pitch() {
        let f = camera().planar_forward().unwrap();
        assert!((f - Vec3::Z).length() < 1e-5, "{f:?}");
    }

    #[test]
    fn planar_forward_degenerate_when_looking_down() {
        let mut cam = camera();
        cam.eye = Vec3::new(0.0, 10.0, 0.0);
        assert!(cam.planar_forward().is_none());
    }

    #[test]
    fn center_ray_points_at_target() {
        let cam = camera();
        let ray = cam.ray_through(Vec2::ZERO);
        let expected = (cam.target - cam.eye).normalize();
        assert!((ray.dir - expected).length() < 1e-3, "{:?}", ray.dir);
    }

    #[test]
    fn project_then_unproject_hits_point() {
        let cam = camera();
        let p = Vec3::new(1.0, 0.5, 2.0);
        let ray = cam.ray_through(cam.project(p));
        let to_p = (p - cam.eye).normalize();
        assert!((ray.dir - to_p).length() < 1e-3);
    }
}

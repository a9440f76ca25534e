use glam::Vec3;

use crate::config::CameraConfig;
use crate::model::camera::Camera;

/// Third-person rig. The eye is recomputed from the target every frame, so
/// there is no camera state to drift.
pub struct CameraRig {
    pub distance: f32,
    pub height_offset: f32,
    pub orbit_sensitivity: f32,
}

impl CameraRig {
    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            distance: cfg.distance,
            height_offset: cfg.height_offset,
            orbit_sensitivity: cfg.orbit_sensitivity,
        }
    }

    /// Heading change for a horizontal drag of `dx` pixels. Orbiting turns
    /// the character too; the camera has no heading of its own.
    pub fn orbit_delta(&self, dx: f32) -> f32 {
        dx * self.orbit_sensitivity
    }

    pub fn eye_for(&self, target: Vec3, heading: f32) -> Vec3 {
        let back = Vec3::new(heading.sin(), 0.0, heading.cos()) * self.distance;
        target - back + Vec3::new(0.0, self.height_offset, 0.0)
    }

    pub fn update(&self, camera: &mut Camera, target: Vec3, heading: f32) {
        camera.eye = self.eye_for(target, heading);
        camera.look_at(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_distance_is_constant_for_all_headings() {
        let rig = CameraRig::new(&CameraConfig::default());
        let target = Vec3::new(3.0, 0.5, -2.0);
        for i in 0..64 {
            let heading = i as f32 / 64.0 * std::f32::consts::TAU;
            let eye = rig.eye_for(target, heading);
            let planar = Vec3::new(eye.x - target.x, 0.0, eye.z - target.z).length();
            assert!((planar - rig.distance).abs() < 1e-4, "heading {heading}");
            assert!((eye.y - target.y - rig.height_offset).abs() < 1e-5);
        }
    }

    #[test]
    fn camera_looks_at_target_along_heading() {
        let rig = CameraRig::new(&CameraConfig::default());
        let mut cam = Camera::new(800, 600, &CameraConfig::default());
        let target = Vec3::new(0.0, 0.5, 0.0);
        rig.update(&mut cam, target, std::f32::consts::FRAC_PI_2);
        assert_eq!(cam.target, target);
        let f = cam.planar_forward().unwrap();
        assert!((f - Vec3::X).length() < 1e-4, "{f:?}");
    }

    #[test]
    fn same_inputs_same_pose() {
        let rig = CameraRig::new(&CameraConfig::default());
        let a = rig.eye_for(Vec3::ONE, 1.234);
        let b = rig.eye_for(Vec3::ONE, 1.234);
        assert_eq!(a, b);
    }
}

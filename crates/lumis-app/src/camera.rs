use glam::{Mat4, Vec2, Vec3};

/// 围绕目标点旋转的相机，3D 场景共用
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// 弧度
    pub yaw: f32,
    pub pitch: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            yaw: 0.0,
            pitch: 0.3,
        }
    }

    /// 左键拖动旋转
    pub fn handle_drag(&mut self, mouse_delta: Vec2) {
        self.yaw += mouse_delta.x * 0.01;
        self.pitch = (self.pitch + mouse_delta.y * 0.01).clamp(-1.5, 1.5);
    }

    pub fn position(&self) -> Vec3 {
        let dir = Vec3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        );
        self.target + dir * self.distance
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        // Vulkan 的 clip space Y 朝下
        let mut proj = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 1000.0);
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 5.0);
        camera.handle_drag(Vec2::new(0.0, 1000.0));
        assert!(camera.pitch <= 1.5);
        camera.handle_drag(Vec2::new(0.0, -10000.0));
        assert!(camera.pitch >= -1.5);
    }

    #[test]
    fn position_keeps_distance() {
        let camera = OrbitCamera::new(Vec3::new(1.0, 2.0, 3.0), 7.0);
        let dist = (camera.position() - camera.target).length();
        assert!((dist - 7.0).abs() < 1e-4);
    }
}

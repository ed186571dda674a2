use crate::config::CameraConfig;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Pixel rectangle the 3D view is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            origin: Vec2::ZERO,
            size: Vec2::new(width, height),
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.size.y > 0.0 {
            self.size.x / self.size.y
        } else {
            1.0
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let local = point - self.origin;
        local.cmpge(Vec2::ZERO).all() && local.cmplt(self.size).all()
    }

    /// Pixel → normalised device coordinates (y up).
    pub fn to_ndc(&self, point: Vec2) -> Vec2 {
        let local = (point - self.origin) / self.size.max(Vec2::ONE);
        Vec2::new(local.x * 2.0 - 1.0, 1.0 - local.y * 2.0)
    }

    /// Normalised device coordinates → pixel.
    pub fn from_ndc(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x * 0.5 + 0.5) * self.size.x,
            (-ndc.y * 0.5 + 0.5) * self.size.y,
        ) + self.origin
    }
}

/// Damped orbit camera around a target point.
///
/// Drag and wheel input accumulate into pending deltas which `update` bleeds
/// into the orbit a fraction at a time, so motion eases out after release.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Around +Y, zero looks down -Z.
    pub yaw: f32,
    /// Elevation above the horizon.
    pub pitch: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    pending_zoom: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    damping: f32,
    min_distance: f32,
    max_distance: f32,
    min_pitch: f32,
    max_pitch: f32,
    rotate_speed: f32,
    zoom_speed: f32,
}

impl OrbitCamera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let target = Vec3::from(config.target);
        let offset = Vec3::from(config.eye) - target;
        let distance = offset.length().max(1e-3);
        let (yaw, pitch) = offset_to_yaw_pitch(offset);
        let min_pitch = std::f32::consts::FRAC_PI_2 - config.max_polar_angle;
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        Self {
            target,
            distance: distance.clamp(config.min_distance, config.max_distance),
            yaw,
            pitch: pitch.clamp(min_pitch, max_pitch),
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            pending_zoom: 0.0,
            fov_y: config.fov_y_deg.to_radians(),
            near: config.near,
            far: config.far,
            aspect,
            damping: config.damping.clamp(0.0, 1.0),
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_pitch,
            max_pitch,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Pointer drag in pixels.
    pub fn on_drag(&mut self, delta: Vec2) {
        self.pending_yaw -= delta.x * self.rotate_speed;
        self.pending_pitch += delta.y * self.rotate_speed;
    }

    /// Wheel steps, positive zooms in.
    pub fn on_scroll(&mut self, steps: f32) {
        self.pending_zoom += steps * self.zoom_speed;
    }

    /// Advances damping by one frame. Returns true while still moving.
    pub fn update(&mut self) -> bool {
        let factor = if self.damping > 0.0 { self.damping } else { 1.0 };

        self.yaw = wrap_angle(self.yaw + self.pending_yaw * factor);
        self.pitch =
            (self.pitch + self.pending_pitch * factor).clamp(self.min_pitch, self.max_pitch);
        self.distance = (self.distance * (1.0 - self.pending_zoom * factor))
            .clamp(self.min_distance, self.max_distance);

        let keep = 1.0 - factor;
        self.pending_yaw *= keep;
        self.pending_pitch *= keep;
        self.pending_zoom *= keep;

        const SETTLED: f32 = 1e-5;
        let moving = self.pending_yaw.abs() > SETTLED
            || self.pending_pitch.abs() > SETTLED
            || self.pending_zoom.abs() > SETTLED;
        if !moving {
            self.pending_yaw = 0.0;
            self.pending_pitch = 0.0;
            self.pending_zoom = 0.0;
        }
        moving
    }

    pub fn eye(&self) -> Vec3 {
        let x = self.distance * self.pitch.cos() * self.yaw.sin();
        let y = self.distance * self.pitch.sin();
        let z = self.distance * self.pitch.cos() * self.yaw.cos();
        self.target + Vec3::new(x, y, z)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Clip-space position of a world point.
    pub fn project(&self, point: Vec3) -> Vec4 {
        self.view_proj() * point.extend(1.0)
    }
}

fn offset_to_yaw_pitch(offset: Vec3) -> (f32, f32) {
    let len = offset.length().max(1e-6);
    let yaw = offset.x.atan2(offset.z);
    let pitch = (offset.y / len).clamp(-1.0, 1.0).asin();
    (yaw, pitch)
}

fn wrap_angle(angle: f32) -> f32 {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        (angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI
    } else {
        0.0
    }
}

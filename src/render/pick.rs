//! Pointer picking
//!
//! Unprojects a pointer position through the inverse view-projection into a
//! world-space ray and slab-tests it against the current bounds of every
//! visible room. The nearest entry point wins. Pure: nothing in the scene or
//! camera is touched, so the same query serves hover and click.

use crate::catalog::RoomId;
use crate::render::camera::{OrbitCamera, Viewport};
use crate::scene::{Aabb, SceneGraph};
use glam::{Vec2, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickHit {
    pub room_id: RoomId,
    /// Ray parameter of the entry point, in world units.
    pub distance: f32,
}

pub fn screen_to_ray(screen: Vec2, viewport: &Viewport, camera: &OrbitCamera) -> Ray {
    let ndc = viewport.to_ndc(screen);
    let inv_vp = camera.view_proj().inverse();
    let near4 = inv_vp * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
    let far4 = inv_vp * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
    let near = near4.truncate() / near4.w;
    let far = far4.truncate() / far4.w;
    Ray {
        origin: near,
        dir: (far - near).normalize_or_zero(),
    }
}

pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    let t1 = (aabb.min - ray.origin) / ray.dir;
    let t2 = (aabb.max - ray.origin) / ray.dir;
    let tmin = t1.min(t2);
    let tmax = t1.max(t2);
    let enter = tmin.max_element();
    let exit = tmax.min_element();
    if exit >= enter.max(0.0) {
        Some(enter.max(0.0))
    } else {
        None
    }
}

/// Nearest visible room under `screen`, if any.
pub fn pick(
    screen: Vec2,
    viewport: &Viewport,
    camera: &OrbitCamera,
    scene: &SceneGraph,
) -> Option<PickHit> {
    if !viewport.contains(screen) {
        return None;
    }
    let ray = screen_to_ray(screen, viewport, camera);
    if ray.dir == Vec3::ZERO {
        return None;
    }

    let mut closest: Option<PickHit> = None;
    for node in scene.visible_nodes() {
        if let Some(t) = ray_aabb(&ray, &node.aabb()) {
            if closest.as_ref().map_or(true, |hit| t < hit.distance) {
                closest = Some(PickHit {
                    room_id: node.room_id.clone(),
                    distance: t,
                });
            }
        }
    }
    closest
}

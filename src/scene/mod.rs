pub mod controller;

use crate::catalog::{Floor, RoomCatalog, RoomId, Rgb};
use crate::config::ViewerConfig;
use glam::{Mat4, Vec2, Vec3};
use std::collections::HashMap;

/// Arena slot of a room node. Only valid for the scene that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomHandle(usize);

impl RoomHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
}

impl Transform {
    pub fn at(translation: Vec3) -> Self {
        Self { translation }
    }

    /// Model matrix for a unit box scaled to `size`.
    pub fn to_matrix(&self, size: Vec3) -> Mat4 {
        Mat4::from_scale_rotation_translation(size, glam::Quat::IDENTITY, self.translation)
    }
}

#[derive(Debug, Clone)]
pub struct RoomNode {
    pub handle: RoomHandle,
    pub room_id: RoomId,
    pub name: String,
    pub floor: Floor,
    pub size: Vec3,
    pub rest: Transform,
    pub current: Transform,
    pub visible: bool,
    pub emphasized: bool,
    /// Linear RGBA with the room opacity in alpha.
    pub tint: [f32; 4],
    pub emissive: [f32; 3],
}

impl RoomNode {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.current.translation, self.size)
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.current.to_matrix(self.size)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GroundPlane {
    pub size: f32,
    pub height: f32,
    pub color: Rgb,
}

impl GroundPlane {
    pub fn model_matrix(&self, center: Vec2) -> Mat4 {
        Mat4::from_translation(Vec3::new(center.x, self.height, center.y))
            * Mat4::from_scale(Vec3::new(self.size, 1.0, self.size))
    }
}

/// Runtime scene: one node per catalog room, addressed by handle or id.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<RoomNode>,
    index: HashMap<RoomId, RoomHandle>,
    ground: GroundPlane,
    center: Vec2,
}

impl SceneGraph {
    pub fn nodes(&self) -> &[RoomNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [RoomNode] {
        &mut self.nodes
    }

    pub fn node(&self, handle: RoomHandle) -> Option<&RoomNode> {
        self.nodes.get(handle.0)
    }

    #[cfg(test)]
    pub fn handle_of(&self, id: &str) -> Option<RoomHandle> {
        self.index.get(id).copied()
    }

    #[cfg(test)]
    pub fn node_by_id(&self, id: &str) -> Option<&RoomNode> {
        self.handle_of(id).and_then(|handle| self.node(handle))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &RoomNode> {
        self.nodes.iter().filter(|node| node.visible)
    }

    pub fn ground(&self) -> &GroundPlane {
        &self.ground
    }

    /// Horizontal centre of the building (union of all footprints).
    pub fn center(&self) -> Vec2 {
        self.center
    }
}

pub fn build_scene(catalog: &RoomCatalog, config: &ViewerConfig) -> SceneGraph {
    let rooms = catalog.rooms();
    let mut nodes = Vec::with_capacity(rooms.len());
    let mut index = HashMap::with_capacity(rooms.len());

    for (slot, room) in rooms.iter().enumerate() {
        let handle = RoomHandle(slot);
        let center = room.footprint.center();
        let y = room.floor.index() * config.floor_height + config.room_height * 0.5;
        let rest = Transform::at(Vec3::new(center.x, y, center.y));
        nodes.push(RoomNode {
            handle,
            room_id: room.id.clone(),
            name: room.name.clone(),
            floor: room.floor,
            size: Vec3::new(room.footprint.width, config.room_height, room.footprint.depth),
            rest,
            current: rest,
            visible: true,
            emphasized: false,
            tint: room.color.to_linear_rgba(config.room_opacity),
            emissive: [0.0; 3],
        });
        index.insert(room.id.clone(), handle);
    }

    let center = rooms
        .iter()
        .map(|room| (room.footprint.min(), room.footprint.max()))
        .reduce(|(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)))
        .map(|(min, max)| (min + max) * 0.5)
        .unwrap_or(Vec2::ZERO);

    log::info!(
        "Built scene with {} rooms, centre ({:.2}, {:.2})",
        nodes.len(),
        center.x,
        center.y
    );

    SceneGraph {
        nodes,
        index,
        ground: GroundPlane {
            size: config.ground_size,
            height: -0.01,
            color: config.ground_color,
        },
        center,
    }
}

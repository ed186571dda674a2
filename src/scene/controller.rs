//! View state and its application to the scene graph.
//!
//! [`ViewState`] is the single source of truth. [`ViewController::apply`]
//! derives every node's current transform, visibility and emphasis from it
//! and the node's rest transform, so repeated calls never drift.

use crate::catalog::{Floor, RoomCatalog, RoomDescriptor, RoomId};
use crate::config::ViewerConfig;
use crate::scene::SceneGraph;
use glam::{Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FloorFilter {
    #[default]
    All,
    Floor(Floor),
}

impl FloorFilter {
    pub fn admits(self, floor: Floor) -> bool {
        match self {
            FloorFilter::All => true,
            FloorFilter::Floor(only) => only == floor,
        }
    }

    pub fn label(self) -> String {
        match self {
            FloorFilter::All => "All".to_string(),
            FloorFilter::Floor(floor) => floor.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub floor_filter: FloorFilter,
    pub explode_amount: f32,
    pub hovered_room_id: Option<RoomId>,
    pub selected_room_id: Option<RoomId>,
}

pub type SelectionCallback = Box<dyn FnMut(Option<&RoomDescriptor>)>;

pub struct ViewController {
    state: ViewState,
    on_room_selected: Option<SelectionCallback>,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewController {
    pub fn new() -> Self {
        Self {
            state: ViewState::default(),
            on_room_selected: None,
        }
    }

    pub fn with_selection_callback(mut self, callback: SelectionCallback) -> Self {
        self.on_room_selected = Some(callback);
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Visibility changes at once so picking never sees filtered rooms;
    /// transforms and emphasis follow on the next [`apply`](Self::apply).
    pub fn set_floor_filter(&mut self, filter: FloorFilter, scene: &mut SceneGraph) {
        if self.state.floor_filter != filter {
            log::debug!("Floor filter -> {}", filter.label());
        }
        self.state.floor_filter = filter;
        for node in scene.nodes_mut() {
            node.visible = filter.admits(node.floor);
        }
    }

    /// Clamped to `[0, 1]`; non-finite input is ignored.
    pub fn set_explode_amount(&mut self, amount: f32) {
        if !amount.is_finite() {
            log::debug!("Ignoring non-finite explode amount");
            return;
        }
        self.state.explode_amount = amount.clamp(0.0, 1.0);
    }

    /// Returns true when the hovered room changed.
    pub fn set_hovered_room(&mut self, id: Option<&str>, scene: &SceneGraph) -> bool {
        let next = match id {
            Some(id) if scene.contains(id) => Some(RoomId::from(id)),
            Some(id) => {
                log::debug!("Hover on unknown room '{id}' reset");
                None
            }
            None => None,
        };
        let changed = self.state.hovered_room_id != next;
        self.state.hovered_room_id = next;
        changed
    }

    pub fn select_room(&mut self, id: Option<&str>, catalog: &RoomCatalog) {
        let Some(id) = id else {
            self.state.selected_room_id = None;
            self.notify(None);
            return;
        };
        match catalog.room(id) {
            Some(room) => {
                self.state.selected_room_id = Some(room.id.clone());
                if let Some(callback) = self.on_room_selected.as_mut() {
                    callback(Some(room));
                }
            }
            None => {
                log::debug!("Selection of unknown room '{id}' reset");
                if self.state.selected_room_id.take().is_some() {
                    self.notify(None);
                }
            }
        }
    }

    /// Drops hover and selection that no longer resolve after a catalog swap.
    pub fn on_catalog_replaced(&mut self, catalog: &RoomCatalog) {
        if let Some(hovered) = &self.state.hovered_room_id {
            if !catalog.contains(hovered.as_str()) {
                log::debug!("Hovered room '{hovered}' no longer exists");
                self.state.hovered_room_id = None;
            }
        }
        let stale = self
            .state
            .selected_room_id
            .as_ref()
            .is_some_and(|selected| !catalog.contains(selected.as_str()));
        if stale {
            log::debug!("Selected room no longer exists; clearing selection");
            self.state.selected_room_id = None;
            self.notify(None);
        }
    }

    fn notify(&mut self, room: Option<&RoomDescriptor>) {
        if let Some(callback) = self.on_room_selected.as_mut() {
            callback(room);
        }
    }

    /// Writes visibility, current transforms and emphasis into every node.
    pub fn apply(&self, scene: &mut SceneGraph, config: &ViewerConfig, elapsed: f32) {
        let center = scene.center();
        let amount = self.state.explode_amount;
        let filter = self.state.floor_filter;
        let hovered = self.state.hovered_room_id.as_ref();
        let glow = config.hover_emissive.to_linear_rgba(1.0);

        for node in scene.nodes_mut() {
            node.visible = filter.admits(node.floor);

            let offset = explode_offset(node.rest.translation, node.floor, center, amount, config);
            let mut translation = node.rest.translation + offset;

            node.emphasized = node.visible && hovered == Some(&node.room_id);
            if node.emphasized {
                translation.y +=
                    (elapsed * config.hover_bob_speed).sin() * config.hover_bob_amplitude;
                node.emissive = [glow[0], glow[1], glow[2]];
            } else {
                node.emissive = [0.0; 3];
            }
            node.current.translation = translation;
        }
    }
}

fn explode_offset(
    rest: Vec3,
    floor: Floor,
    center: Vec2,
    amount: f32,
    config: &ViewerConfig,
) -> Vec3 {
    let away = Vec2::new(rest.x, rest.z) - center;
    let horizontal = if away.length() > 0.0 {
        away.normalize() * amount * config.explode_scale
    } else {
        Vec2::ZERO
    };
    let vertical = floor.index() * amount * config.floor_separation;
    Vec3::new(horizontal.x, vertical, horizontal.y)
}

//! Floating room labels.
//!
//! One [`LabelOverlay`] per room node, rebuilt with the scene. Every frame the
//! anchor above each room is projected into pixel space; labels behind the
//! camera or belonging to filtered-out rooms are hidden.

use crate::render::camera::{OrbitCamera, Viewport};
use crate::scene::{RoomHandle, SceneGraph};
use glam::{Vec2, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct LabelOverlay {
    pub handle: RoomHandle,
    pub text: String,
    pub position: Vec2,
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct LabelOverlayProjector {
    labels: Vec<LabelOverlay>,
}

impl LabelOverlayProjector {
    /// Replaces all labels with one per node of `scene`.
    pub fn rebuild(&mut self, scene: &SceneGraph) {
        self.labels = scene
            .nodes()
            .iter()
            .map(|node| LabelOverlay {
                handle: node.handle,
                text: node.name.clone(),
                position: Vec2::ZERO,
                visible: false,
            })
            .collect();
    }

    pub fn clear(&mut self) {
        if !self.labels.is_empty() {
            log::debug!("Removing {} room labels", self.labels.len());
        }
        self.labels.clear();
    }

    #[cfg(test)]
    pub fn labels(&self) -> &[LabelOverlay] {
        &self.labels
    }

    pub fn visible_labels(&self) -> impl Iterator<Item = &LabelOverlay> {
        self.labels.iter().filter(|label| label.visible)
    }

    #[cfg(test)]
    pub fn label_for(&self, handle: RoomHandle) -> Option<&LabelOverlay> {
        self.labels.iter().find(|label| label.handle == handle)
    }

    pub fn project(
        &mut self,
        scene: &SceneGraph,
        camera: &OrbitCamera,
        viewport: &Viewport,
        label_offset: f32,
    ) {
        let view_proj = camera.view_proj();
        for label in &mut self.labels {
            let Some(node) = scene.node(label.handle) else {
                label.visible = false;
                continue;
            };
            if !node.visible {
                label.visible = false;
                continue;
            }
            let anchor = node.current.translation + Vec3::new(0.0, label_offset, 0.0);
            let clip = view_proj * anchor.extend(1.0);
            if clip.w <= 0.0 {
                label.visible = false;
                continue;
            }
            let ndc = clip.truncate() / clip.w;
            if ndc.z > 1.0 {
                label.visible = false;
                continue;
            }
            label.position = viewport.from_ndc(Vec2::new(ndc.x, ndc.y));
            label.visible = true;
        }
    }

    pub fn paint(&self, ctx: &egui::Context) {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Background,
            egui::Id::new("room_labels"),
        ));
        let font = egui::FontId::proportional(13.0);
        for label in self.visible_labels() {
            let anchor = egui::pos2(label.position.x, label.position.y);
            let galley =
                painter.layout_no_wrap(label.text.clone(), font.clone(), egui::Color32::WHITE);
            let rect = egui::Align2::CENTER_BOTTOM
                .anchor_size(anchor, galley.size())
                .expand2(egui::vec2(6.0, 3.0));
            painter.rect_filled(rect, 4.0, egui::Color32::from_black_alpha(180));
            painter.galley(rect.min + egui::vec2(6.0, 3.0), galley, egui::Color32::WHITE);
        }
    }
}

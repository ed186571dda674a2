pub mod modal;

use crate::catalog::Floor;
use crate::scene::controller::{FloorFilter, ViewState};

/// Something the user asked for through the control panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    SetFloor(FloorFilter),
    SetExplode(f32),
    OpenSiteView,
}

pub struct UiState {
    explode: f32,
    status: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

impl UiState {
    pub fn new() -> Self {
        Self {
            explode: 0.0,
            status: None,
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Floor buttons, explode slider and the site view button.
    pub fn show_controls(
        &mut self,
        ctx: &egui::Context,
        state: &ViewState,
        floors: &[Floor],
    ) -> Vec<UiAction> {
        let mut actions = Vec::new();
        self.explode = state.explode_amount;

        egui::Area::new(egui::Id::new("viewer_controls"))
            .anchor(egui::Align2::LEFT_TOP, egui::vec2(12.0, 12.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Floor");
                        for filter in floor_choices(floors) {
                            if ui
                                .selectable_label(state.floor_filter == filter, filter.label())
                                .clicked()
                            {
                                actions.push(UiAction::SetFloor(filter));
                            }
                        }
                    });
                    let slider = egui::Slider::new(&mut self.explode, 0.0..=1.0)
                        .step_by(0.01)
                        .text("Explode");
                    if ui.add(slider).changed() {
                        actions.push(UiAction::SetExplode(self.explode));
                    }
                    if ui.button("Site View").clicked() {
                        actions.push(UiAction::OpenSiteView);
                    }
                    if let Some(status) = self.status() {
                        ui.colored_label(egui::Color32::LIGHT_RED, status);
                    }
                });
            });

        egui::Area::new(egui::Id::new("viewer_instructions"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(
                    egui::RichText::new(
                        "Drag to rotate\nScroll to zoom\nClick room to view photos",
                    )
                    .small()
                    .color(egui::Color32::from_gray(200)),
                );
            });

        actions
    }

    pub fn show_loading(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Loading 3D viewer...");
                });
            });
        });
    }
}

pub fn floor_choices(floors: &[Floor]) -> Vec<FloorFilter> {
    std::iter::once(FloorFilter::All)
        .chain(floors.iter().copied().map(FloorFilter::Floor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_choices_start_with_all() {
        let choices = floor_choices(&[Floor::GROUND, Floor::UPPER]);
        assert_eq!(
            choices,
            vec![
                FloorFilter::All,
                FloorFilter::Floor(Floor::GROUND),
                FloorFilter::Floor(Floor::UPPER)
            ]
        );
        assert_eq!(choices[2].label(), "Floor 2");
        assert_eq!(floor_choices(&[]), vec![FloorFilter::All]);
    }

    #[test]
    fn controls_report_nothing_without_input() {
        let ctx = egui::Context::default();
        let mut ui = UiState::new();
        let state = ViewState::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = ui.show_controls(ctx, &state, &[Floor::GROUND, Floor::UPPER]);
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn status_round_trip() {
        let mut ui = UiState::new();
        assert!(ui.status().is_none());
        ui.set_status("Catalog reload failed");
        assert_eq!(ui.status(), Some("Catalog reload failed"));
        ui.clear_status();
        assert!(ui.status().is_none());
    }
}

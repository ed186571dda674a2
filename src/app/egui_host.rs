use winit::event::WindowEvent;
use winit::window::Window;

/// Everything the renderer needs to paint one egui frame on top of the scene.
pub struct UiFrame {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// Bridges winit events into egui and runs the overlay each frame.
pub struct EguiHost {
    context: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiHost {
    /// `max_texture_side` is the GPU's 2D texture limit; egui sizes its font
    /// atlas against it and reports it through `InputState::max_texture_side`.
    pub fn new(window: &Window, max_texture_side: usize) -> Self {
        let context = egui::Context::default();
        let winit_state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            Some(max_texture_side),
        );
        Self {
            context,
            winit_state,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.context
    }

    /// True when egui took the event and the scene must not see it.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    /// Whether the pointer currently sits over an overlay widget.
    pub fn pointer_over_ui(&self) -> bool {
        self.context.is_pointer_over_area() || self.context.wants_pointer_input()
    }

    pub fn run_ui<F>(&mut self, window: &Window, build: F) -> UiFrame
    where
        F: FnMut(&egui::Context),
    {
        let raw_input = self.winit_state.take_egui_input(window);
        let full_output = self.context.run(raw_input, build);
        self.winit_state
            .handle_platform_output(window, full_output.platform_output);
        let pixels_per_point = full_output.pixels_per_point;
        let clipped_primitives = self
            .context
            .tessellate(full_output.shapes, pixels_per_point);

        UiFrame {
            clipped_primitives,
            textures_delta: full_output.textures_delta,
            pixels_per_point,
        }
    }
}

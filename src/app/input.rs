use glam::Vec2;
use winit::event::MouseScrollDelta;

/// Pointer travel (logical px) beyond which a press becomes a drag.
const CLICK_SLOP: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    None,
    Hover(Vec2),
    Drag(Vec2),
}

/// Left-button pointer state: separates clicks (select) from drags (orbit).
#[derive(Debug, Clone, Copy)]
pub struct PointerInput {
    position: Option<Vec2>,
    pressed_at: Option<Vec2>,
    dragging: bool,
    attached: bool,
}

impl Default for PointerInput {
    fn default() -> Self {
        Self {
            position: None,
            pressed_at: None,
            dragging: false,
            attached: true,
        }
    }
}

impl PointerInput {
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn moved(&mut self, to: Vec2) -> PointerAction {
        if !self.attached {
            return PointerAction::None;
        }
        let from = self.position.replace(to);
        match (self.pressed_at, from) {
            (Some(origin), Some(from)) => {
                if !self.dragging && origin.distance(to) > CLICK_SLOP {
                    self.dragging = true;
                }
                if self.dragging {
                    PointerAction::Drag(to - from)
                } else {
                    PointerAction::None
                }
            }
            _ => PointerAction::Hover(to),
        }
    }

    pub fn pressed(&mut self) {
        if self.attached {
            self.pressed_at = self.position;
            self.dragging = false;
        }
    }

    /// Returns the click position when the press never turned into a drag.
    pub fn released(&mut self) -> Option<Vec2> {
        let origin = self.pressed_at.take();
        let was_drag = std::mem::replace(&mut self.dragging, false);
        if !self.attached || was_drag {
            return None;
        }
        origin.and(self.position)
    }

    pub fn left(&mut self) {
        self.position = None;
        self.pressed_at = None;
        self.dragging = false;
    }

    /// Stops reacting to pointer events for good.
    pub fn detach(&mut self) {
        self.left();
        self.attached = false;
    }
}

/// Wheel delta in "steps", positive zooms in.
pub fn scroll_steps(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_release_in_place_is_a_click() {
        let mut pointer = PointerInput::default();
        assert_eq!(
            pointer.moved(Vec2::new(10.0, 10.0)),
            PointerAction::Hover(Vec2::new(10.0, 10.0))
        );
        pointer.pressed();
        assert_eq!(pointer.moved(Vec2::new(12.0, 11.0)), PointerAction::None);
        assert_eq!(pointer.released(), Some(Vec2::new(12.0, 11.0)));
    }

    #[test]
    fn travel_beyond_slop_is_a_drag() {
        let mut pointer = PointerInput::default();
        pointer.moved(Vec2::new(0.0, 0.0));
        pointer.pressed();
        assert_eq!(
            pointer.moved(Vec2::new(10.0, 0.0)),
            PointerAction::Drag(Vec2::new(10.0, 0.0))
        );
        assert_eq!(
            pointer.moved(Vec2::new(15.0, 2.0)),
            PointerAction::Drag(Vec2::new(5.0, 2.0))
        );
        assert!(pointer.is_dragging());
        assert_eq!(pointer.released(), None);
        assert!(!pointer.is_dragging());
    }

    #[test]
    fn detached_pointer_ignores_everything() {
        let mut pointer = PointerInput::default();
        pointer.moved(Vec2::new(5.0, 5.0));
        pointer.detach();
        assert_eq!(pointer.moved(Vec2::new(6.0, 6.0)), PointerAction::None);
        pointer.pressed();
        assert_eq!(pointer.released(), None);
        assert!(!pointer.is_dragging());
    }

    #[test]
    fn wheel_deltas_normalise() {
        assert_eq!(scroll_steps(MouseScrollDelta::LineDelta(0.0, 2.0)), 2.0);
        assert_eq!(
            scroll_steps(MouseScrollDelta::PixelDelta(
                winit::dpi::PhysicalPosition::new(0.0, -50.0)
            )),
            -0.5
        );
    }
}

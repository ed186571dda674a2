//! Photo carousel shown for the selected room (or the site overview).

use crate::assets::{LoadToken, PhotoLoaded, PhotoLoader};
use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

/// Background scroll of the viewer shell: camera orbit and zoom.
/// Suspended while any [`ScrollLock`] is held.
#[derive(Debug, Default)]
pub struct PageScroll {
    locks: Cell<usize>,
    restores: Cell<usize>,
}

impl PageScroll {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn is_suspended(&self) -> bool {
        self.locks.get() > 0
    }

    /// How many times scroll has been handed back.
    #[cfg(test)]
    pub fn restore_count(&self) -> usize {
        self.restores.get()
    }

    pub fn lock(self: &Rc<Self>) -> ScrollLock {
        self.locks.set(self.locks.get() + 1);
        ScrollLock {
            scroll: Rc::clone(self),
            held: true,
        }
    }
}

/// Released exactly once, by `release` or on drop.
#[derive(Debug)]
pub struct ScrollLock {
    scroll: Rc<PageScroll>,
    held: bool,
}

impl ScrollLock {
    pub fn release(&mut self) -> bool {
        if !self.held {
            return false;
        }
        self.held = false;
        self.scroll.locks.set(self.scroll.locks.get().saturating_sub(1));
        self.scroll.restores.set(self.scroll.restores.get() + 1);
        log::trace!("Background scroll restored (#{})", self.scroll.restores.get());
        true
    }
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalCommand {
    Next,
    Previous,
    JumpTo(usize),
    Close,
}

pub fn command_for_key(key: egui::Key) -> Option<ModalCommand> {
    match key {
        egui::Key::Escape => Some(ModalCommand::Close),
        egui::Key::ArrowLeft => Some(ModalCommand::Previous),
        egui::Key::ArrowRight => Some(ModalCommand::Next),
        _ => None,
    }
}

/// Horizontal swipe: `start - end` beyond the threshold pages the carousel.
#[derive(Debug, Clone, Copy)]
pub struct SwipeTracker {
    start: Option<f32>,
    min_distance: f32,
}

impl SwipeTracker {
    pub fn new(min_distance: f32) -> Self {
        Self {
            start: None,
            min_distance,
        }
    }

    pub fn begin(&mut self, x: f32) {
        self.start = Some(x);
    }

    pub fn end(&mut self, x: f32) -> Option<ModalCommand> {
        let distance = self.start.take()? - x;
        if distance > self.min_distance {
            Some(ModalCommand::Next)
        } else if distance < -self.min_distance {
            Some(ModalCommand::Previous)
        } else {
            None
        }
    }
}

pub enum PhotoSlot {
    Loading,
    Ready(egui::TextureHandle),
    Failed(String),
}

pub struct RoomModal {
    title: String,
    photos: Vec<String>,
    current_index: usize,
    swipe: SwipeTracker,
    scroll: ScrollLock,
    token: LoadToken,
    slots: HashMap<String, PhotoSlot>,
    open: bool,
}

impl RoomModal {
    pub fn open(
        title: impl Into<String>,
        photos: Vec<String>,
        scroll: &Rc<PageScroll>,
        min_swipe_distance: f32,
    ) -> Self {
        Self {
            title: title.into(),
            photos,
            current_index: 0,
            swipe: SwipeTracker::new(min_swipe_distance),
            scroll: scroll.lock(),
            token: LoadToken::new(),
            slots: HashMap::new(),
            open: true,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_photo(&self) -> Option<&str> {
        self.photos.get(self.current_index).map(String::as_str)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn next(&mut self) {
        if !self.photos.is_empty() {
            self.current_index = (self.current_index + 1) % self.photos.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.photos.is_empty() {
            let len = self.photos.len();
            self.current_index = (self.current_index + len - 1) % len;
        }
    }

    pub fn jump_to(&mut self, index: usize) {
        if index < self.photos.len() {
            self.current_index = index;
        }
    }

    /// Applies a command; returns false once the modal has closed.
    pub fn apply(&mut self, command: ModalCommand) -> bool {
        match command {
            ModalCommand::Next => self.next(),
            ModalCommand::Previous => self.previous(),
            ModalCommand::JumpTo(index) => self.jump_to(index),
            ModalCommand::Close => self.close(),
        }
        self.open
    }

    pub fn handle_key(&mut self, key: egui::Key) -> bool {
        match command_for_key(key) {
            Some(command) => self.apply(command),
            None => self.open,
        }
    }

    pub fn swipe_begin(&mut self, x: f32) {
        self.swipe.begin(x);
    }

    pub fn swipe_end(&mut self, x: f32) {
        if let Some(command) = self.swipe.end(x) {
            self.apply(command);
        }
    }

    /// Cancels pending loads and hands background scroll back. Idempotent.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.token.cancel();
        self.scroll.release();
        log::debug!("Closed gallery '{}'", self.title);
    }

    pub fn request_photos(&mut self, loader: &mut PhotoLoader) {
        for photo in &self.photos {
            if self.slots.contains_key(photo) {
                continue;
            }
            let slot = match loader.request(photo, &self.token) {
                Ok(()) => PhotoSlot::Loading,
                Err(err) => PhotoSlot::Failed(err.to_string()),
            };
            self.slots.insert(photo.clone(), slot);
        }
    }

    /// Stores a finished load. Ignored once closed or for foreign photos.
    pub fn accept(&mut self, loaded: PhotoLoaded, ctx: &egui::Context) {
        if !self.open || !self.photos.contains(&loaded.photo) {
            return;
        }
        let limit = ctx.input(|input| input.max_texture_side);
        let slot = match loaded.result {
            Ok(decoded) if decoded.size.iter().any(|&side| side > limit) => {
                let [width, height] = decoded.size;
                log::warn!(
                    "{}: {width}x{height} exceeds the {limit}px texture limit",
                    loaded.photo
                );
                PhotoSlot::Failed(format!("{width}x{height} is too large to display"))
            }
            Ok(decoded) => {
                let image = egui::ColorImage::from_rgba_unmultiplied(decoded.size, &decoded.rgba);
                PhotoSlot::Ready(ctx.load_texture(
                    loaded.photo.clone(),
                    image,
                    egui::TextureOptions::LINEAR,
                ))
            }
            Err(err) => {
                log::warn!("{err}");
                PhotoSlot::Failed(err.to_string())
            }
        };
        self.slots.insert(loaded.photo, slot);
    }

    pub fn slot(&self, photo: &str) -> Option<&PhotoSlot> {
        self.slots.get(photo)
    }

    /// Draws the carousel and applies whatever the user did this frame.
    pub fn show(&mut self, ctx: &egui::Context) {
        if !self.open {
            return;
        }
        let keys: Vec<egui::Key> = ctx.input(|input| {
            input
                .events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key, pressed: true, ..
                    } => Some(*key),
                    _ => None,
                })
                .collect()
        });
        for key in keys {
            if !self.handle_key(key) {
                return;
            }
        }

        let mut commands = Vec::new();

        let screen = ctx.screen_rect();
        let backdrop = egui::Area::new(egui::Id::new("gallery_backdrop"))
            .order(egui::Order::Middle)
            .fixed_pos(screen.min)
            .show(ctx, |ui| {
                let response = ui.allocate_rect(screen, egui::Sense::click());
                ui.painter()
                    .rect_filled(screen, 0.0, egui::Color32::from_black_alpha(200));
                response
            });
        if backdrop.inner.clicked() {
            commands.push(ModalCommand::Close);
        }

        let count = self.photos.len();
        egui::Window::new(self.title.clone())
            .id(egui::Id::new("gallery"))
            .order(egui::Order::Foreground)
            .collapsible(false)
            .resizable(false)
            .title_bar(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .fixed_size(egui::vec2(screen.width() * 0.8, screen.height() * 0.8))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(&self.title);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("✕").on_hover_text("Close").clicked() {
                            commands.push(ModalCommand::Close);
                        }
                        if count > 1 {
                            ui.label(format!("{} / {}", self.current_index + 1, count));
                        }
                    });
                });
                ui.separator();

                let thumbs_height = if count > 1 { 72.0 } else { 0.0 };
                let stage =
                    egui::vec2(ui.available_width(), ui.available_height() - thumbs_height);
                ui.horizontal(|ui| {
                    if count > 1 && ui.button("◀").clicked() {
                        commands.push(ModalCommand::Previous);
                    }
                    let nav_width = if count > 1 { 80.0 } else { 0.0 };
                    let image_size =
                        egui::vec2((stage.x - nav_width).max(1.0), stage.y.max(1.0));
                    let response = self.paint_current(ui, image_size);
                    if response.drag_started() {
                        if let Some(pos) = response.interact_pointer_pos() {
                            self.swipe_begin(pos.x);
                        }
                    }
                    if response.drag_stopped() {
                        if let Some(pos) = ctx.input(|input| input.pointer.latest_pos()) {
                            self.swipe_end(pos.x);
                        }
                    }
                    if count > 1 && ui.button("▶").clicked() {
                        commands.push(ModalCommand::Next);
                    }
                });

                if count > 1 {
                    egui::ScrollArea::horizontal().show(ui, |ui| {
                        ui.horizontal(|ui| {
                            for (index, photo) in self.photos.iter().enumerate() {
                                let selected = index == self.current_index;
                                let clicked = match self.slots.get(photo) {
                                    Some(PhotoSlot::Ready(texture)) => ui
                                        .add(
                                            egui::ImageButton::new(
                                                egui::Image::new(texture)
                                                    .fit_to_exact_size(egui::vec2(96.0, 60.0)),
                                            )
                                            .selected(selected),
                                        )
                                        .clicked(),
                                    _ => ui
                                        .selectable_label(selected, format!("{}", index + 1))
                                        .clicked(),
                                };
                                if clicked {
                                    commands.push(ModalCommand::JumpTo(index));
                                }
                            }
                        });
                    });
                }
            });

        for command in commands {
            if !self.apply(command) {
                break;
            }
        }
    }

    fn paint_current(&self, ui: &mut egui::Ui, size: egui::Vec2) -> egui::Response {
        let slot = self.current_photo().and_then(|photo| self.slot(photo));
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::drag());
        match slot {
            Some(PhotoSlot::Ready(texture)) => {
                let fitted = fit_within(texture.size_vec2(), rect.size());
                let target = egui::Rect::from_center_size(rect.center(), fitted);
                egui::Image::new(texture).paint_at(ui, target);
            }
            Some(PhotoSlot::Failed(reason)) => {
                let painter = ui.painter();
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_BOTTOM,
                    "Photo unavailable",
                    egui::FontId::proportional(16.0),
                    egui::Color32::LIGHT_RED,
                );
                painter.text(
                    rect.center() + egui::vec2(0.0, 4.0),
                    egui::Align2::CENTER_TOP,
                    reason,
                    egui::FontId::proportional(12.0),
                    egui::Color32::GRAY,
                );
            }
            Some(PhotoSlot::Loading) | None => {
                egui::Spinner::new().paint_at(
                    ui,
                    egui::Rect::from_center_size(rect.center(), egui::vec2(24.0, 24.0)),
                );
            }
        }
        response
    }
}

impl Drop for RoomModal {
    fn drop(&mut self) {
        self.close();
    }
}

fn fit_within(image: egui::Vec2, bounds: egui::Vec2) -> egui::Vec2 {
    if image.x <= 0.0 || image.y <= 0.0 {
        return bounds;
    }
    let scale = (bounds.x / image.x).min(bounds.y / image.y);
    image * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DecodedPhoto;

    fn modal(photos: usize, scroll: &Rc<PageScroll>) -> RoomModal {
        RoomModal::open(
            "Kitchen",
            (0..photos).map(|i| format!("kitchen-{i}.jpg")).collect(),
            scroll,
            50.0,
        )
    }

    #[test]
    fn next_wraps_after_n_steps() {
        let scroll = PageScroll::new();
        for n in 1..=5 {
            let mut carousel = modal(n, &scroll);
            for _ in 0..n {
                carousel.next();
            }
            assert_eq!(carousel.current_index(), 0);
        }
    }

    #[test]
    fn previous_wraps_to_last() {
        let scroll = PageScroll::new();
        let mut carousel = modal(3, &scroll);
        carousel.previous();
        assert_eq!(carousel.current_index(), 2);
        carousel.next();
        assert_eq!(carousel.current_index(), 0);
        carousel.jump_to(1);
        assert_eq!(carousel.current_photo(), Some("kitchen-1.jpg"));
        carousel.jump_to(7);
        assert_eq!(carousel.current_index(), 1);
    }

    #[test]
    fn keyboard_navigation() {
        let scroll = PageScroll::new();
        let mut carousel = modal(3, &scroll);
        assert!(carousel.handle_key(egui::Key::ArrowRight));
        assert_eq!(carousel.current_index(), 1);
        assert!(carousel.handle_key(egui::Key::ArrowLeft));
        assert!(carousel.handle_key(egui::Key::ArrowLeft));
        assert_eq!(carousel.current_index(), 2);
        assert!(carousel.handle_key(egui::Key::A));
        assert!(!carousel.handle_key(egui::Key::Escape));
        assert!(!carousel.is_open());
    }

    #[test]
    fn swipe_thresholds() {
        let mut swipe = SwipeTracker::new(50.0);
        swipe.begin(300.0);
        assert_eq!(swipe.end(200.0), Some(ModalCommand::Next));
        swipe.begin(200.0);
        assert_eq!(swipe.end(300.0), Some(ModalCommand::Previous));
        swipe.begin(200.0);
        assert_eq!(swipe.end(250.0), None);
        swipe.begin(200.0);
        assert_eq!(swipe.end(160.0), None);
        assert_eq!(swipe.end(0.0), None);
    }

    #[test]
    fn swipe_pages_the_carousel() {
        let scroll = PageScroll::new();
        let mut carousel = modal(2, &scroll);
        carousel.swipe_begin(400.0);
        carousel.swipe_end(320.0);
        assert_eq!(carousel.current_index(), 1);
        carousel.swipe_begin(100.0);
        carousel.swipe_end(200.0);
        assert_eq!(carousel.current_index(), 0);
    }

    #[test]
    fn scroll_restored_exactly_once_on_any_close_path() {
        let scroll = PageScroll::new();

        let mut carousel = modal(2, &scroll);
        assert!(scroll.is_suspended());
        carousel.close();
        carousel.close();
        carousel.apply(ModalCommand::Close);
        drop(carousel);
        assert!(!scroll.is_suspended());
        assert_eq!(scroll.restore_count(), 1);

        let carousel = modal(1, &scroll);
        assert!(scroll.is_suspended());
        drop(carousel);
        assert!(!scroll.is_suspended());
        assert_eq!(scroll.restore_count(), 2);
    }

    #[test]
    fn results_after_close_are_ignored() {
        let ctx = egui::Context::default();
        let scroll = PageScroll::new();
        let mut carousel = modal(1, &scroll);
        let decoded = DecodedPhoto {
            size: [1, 1],
            rgba: vec![255, 255, 255, 255],
        };

        carousel.accept(
            PhotoLoaded {
                photo: "elsewhere.jpg".to_string(),
                result: Ok(decoded.clone()),
            },
            &ctx,
        );
        assert!(carousel.slot("elsewhere.jpg").is_none());

        carousel.accept(
            PhotoLoaded {
                photo: "kitchen-0.jpg".to_string(),
                result: Ok(decoded.clone()),
            },
            &ctx,
        );
        assert!(matches!(
            carousel.slot("kitchen-0.jpg"),
            Some(PhotoSlot::Ready(_))
        ));

        carousel.close();
        carousel.accept(
            PhotoLoaded {
                photo: "kitchen-0.jpg".to_string(),
                result: Err(crate::assets::AssetError::Disconnected),
            },
            &ctx,
        );
        assert!(matches!(
            carousel.slot("kitchen-0.jpg"),
            Some(PhotoSlot::Ready(_))
        ));
    }

    #[test]
    fn photos_beyond_the_texture_limit_are_not_uploaded() {
        let ctx = egui::Context::default();
        let limit = ctx.input(|input| input.max_texture_side);
        let scroll = PageScroll::new();
        let mut carousel = modal(1, &scroll);
        carousel.accept(
            PhotoLoaded {
                photo: "kitchen-0.jpg".to_string(),
                result: Ok(DecodedPhoto {
                    size: [limit + 1, 1],
                    rgba: vec![0; (limit + 1) * 4],
                }),
            },
            &ctx,
        );
        assert!(matches!(
            carousel.slot("kitchen-0.jpg"),
            Some(PhotoSlot::Failed(reason)) if reason.contains("too large")
        ));
    }

    fn key_press(key: egui::Key) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        }
    }

    fn show_with(ctx: &egui::Context, carousel: &mut RoomModal, events: Vec<egui::Event>) {
        let input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(1024.0, 768.0),
            )),
            events,
            ..Default::default()
        };
        let _ = ctx.run(input, |ctx| carousel.show(ctx));
    }

    #[test]
    fn shown_carousel_follows_arrow_keys_and_escape() {
        let ctx = egui::Context::default();
        let scroll = PageScroll::new();
        let mut carousel = modal(3, &scroll);

        show_with(&ctx, &mut carousel, vec![key_press(egui::Key::ArrowRight)]);
        assert_eq!(carousel.current_index(), 1);
        show_with(
            &ctx,
            &mut carousel,
            vec![key_press(egui::Key::ArrowLeft), key_press(egui::Key::ArrowLeft)],
        );
        assert_eq!(carousel.current_index(), 2);
        show_with(&ctx, &mut carousel, Vec::new());
        assert!(carousel.is_open());

        show_with(&ctx, &mut carousel, vec![key_press(egui::Key::Escape)]);
        assert!(!carousel.is_open());
        assert!(!scroll.is_suspended());
        assert_eq!(scroll.restore_count(), 1);
    }

    #[test]
    fn fit_preserves_aspect() {
        let fitted = fit_within(egui::vec2(400.0, 200.0), egui::vec2(100.0, 100.0));
        assert_eq!(fitted, egui::vec2(100.0, 50.0));
    }
}

mod egui_host;
mod input;
mod lifecycle;
mod timing;

use crate::assets::PhotoLoader;
use crate::catalog::serialization::{load_catalog_from_file, save_catalog_to_file};
use crate::catalog::{load_catalog, CatalogError, RoomCatalog, RoomDescriptor};
use crate::config::{ConfigError, ViewerConfig};
use crate::render::{
    self, pick, LabelOverlayProjector, OrbitCamera, RenderContext, RenderError, Viewport,
};
use crate::scene::controller::ViewController;
use crate::scene::{build_scene, SceneGraph};
use crate::ui::modal::{PageScroll, RoomModal};
use crate::ui::{UiAction, UiState};
use crossbeam_channel::Receiver;
use egui_host::EguiHost;
use glam::Vec2;
use input::{scroll_steps, PointerAction, PointerInput};
use lifecycle::{Lifecycle, LifecycleError, Phase, ViewerResources};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use timing::FrameTiming;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Dollhouse Property Viewer";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// What the selection callback asks of the gallery.
#[derive(Debug)]
enum GalleryEvent {
    Open { title: String, photos: Vec<String> },
    Close,
}

/// Everything torn down by [`Lifecycle::dispose`].
#[derive(Default)]
struct Runtime {
    render: Option<RenderContext>,
    host: Option<EguiHost>,
    labels: LabelOverlayProjector,
    pointer: PointerInput,
    photos: Option<PhotoLoader>,
    modal: Option<RoomModal>,
    frame_requested: bool,
}

impl ViewerResources for Runtime {
    fn cancel_frame_request(&mut self) {
        self.frame_requested = false;
        if let Some(mut photos) = self.photos.take() {
            photos.shutdown();
        }
    }

    fn detach_input(&mut self) {
        self.pointer.detach();
        self.host = None;
        if let Some(mut modal) = self.modal.take() {
            modal.close();
        }
    }

    fn release_gpu(&mut self) {
        if let Some(render) = self.render.take() {
            render.release();
        }
    }

    fn remove_labels(&mut self) {
        self.labels.clear();
    }
}

pub struct App {
    config: ViewerConfig,
    catalog: RoomCatalog,
    scene: SceneGraph,
    controller: ViewController,
    gallery_events: Receiver<GalleryEvent>,
    camera: OrbitCamera,
    lifecycle: Lifecycle,
    runtime: Runtime,
    window: Option<Arc<Window>>,
    ui: UiState,
    scroll: Rc<PageScroll>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    pub fn new(config: ViewerConfig, catalog: RoomCatalog) -> Self {
        let (events_tx, gallery_events) = crossbeam_channel::unbounded();
        let controller = ViewController::new().with_selection_callback(Box::new(
            move |room: Option<&RoomDescriptor>| {
                let event = match room {
                    Some(room) => GalleryEvent::Open {
                        title: room.name.clone(),
                        photos: room.photos.clone(),
                    },
                    None => GalleryEvent::Close,
                };
                if events_tx.send(event).is_err() {
                    log::debug!("Gallery receiver gone; dropping selection event");
                }
            },
        ));
        let scene = build_scene(&catalog, &config);
        let camera = OrbitCamera::from_config(&config.camera, 16.0 / 9.0);

        Self {
            config,
            catalog,
            scene,
            controller,
            gallery_events,
            camera,
            lifecycle: Lifecycle::new(),
            runtime: Runtime::default(),
            window: None,
            ui: UiState::new(),
            scroll: PageScroll::new(),
            timing: FrameTiming::new(WINDOW_TITLE),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
        }
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    /// Probes the GPU and builds the backend. Any failure leaves the viewer
    /// uninitialized for good.
    fn initialize(&mut self, window: &Arc<Window>) -> Result<(), AppError> {
        let gpu = render::probe(window.clone())?;
        log::info!("GPU adapter: {}", gpu.adapter_name());
        let size = window.inner_size();
        let render = RenderContext::new(gpu, (size.width, size.height), &self.config)?;
        self.lifecycle.begin_initializing()?;

        self.runtime.host = Some(EguiHost::new(window, render.max_texture_side() as usize));
        self.runtime.render = Some(render);
        self.camera.set_aspect(self.viewport().aspect());
        self.runtime.frame_requested = true;
        window.request_redraw();
        Ok(())
    }

    /// Runs after the loading frame has been presented.
    fn finish_initializing(&mut self) {
        if let Some(render) = self.runtime.render.as_mut() {
            render.upload_scene(&self.scene);
        }
        self.runtime.labels.rebuild(&self.scene);
        let max_side = self.photo_side_limit();
        self.runtime.photos = match PhotoLoader::spawn(&self.config.asset_root, max_side) {
            Ok(loader) => Some(loader),
            Err(err) => {
                log::warn!("{err}");
                self.ui.set_status("Photos unavailable");
                None
            }
        };
        if let Err(err) = self.lifecycle.start_running() {
            log::error!("{err}");
        }
    }

    /// Decoded photos must fit both the configured cap and the GPU.
    fn photo_side_limit(&self) -> u32 {
        let device = self
            .runtime
            .render
            .as_ref()
            .map_or(u32::MAX, RenderContext::max_texture_side);
        self.config.max_photo_side.min(device)
    }

    fn viewport(&self) -> Viewport {
        match &self.window {
            Some(window) => {
                let size = window.inner_size().to_logical::<f32>(window.scale_factor());
                Viewport::new(size.width.max(1.0), size.height.max(1.0))
            }
            None => Viewport::new(1.0, 1.0),
        }
    }

    fn logical(&self, position: PhysicalPosition<f64>) -> Vec2 {
        let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
        let logical = position.to_logical::<f32>(scale);
        Vec2::new(logical.x, logical.y)
    }

    /// Orbit and zoom pause while the gallery holds the background.
    fn orbit_enabled(&self) -> bool {
        !self.scroll.is_suspended()
    }

    fn pointer_over_ui(&self) -> bool {
        self.runtime
            .host
            .as_ref()
            .is_some_and(EguiHost::pointer_over_ui)
    }

    fn update_hover(&mut self, position: Option<Vec2>) {
        let hit = match position {
            Some(pos) if self.orbit_enabled() && !self.pointer_over_ui() => {
                pick(pos, &self.viewport(), &self.camera, &self.scene)
            }
            _ => None,
        };
        let id = hit.as_ref().map(|hit| hit.room_id.as_str());
        if self.controller.set_hovered_room(id, &self.scene) {
            log::trace!("Hover -> {id:?}");
        }
    }

    fn click(&mut self, position: Vec2) {
        if !self.orbit_enabled() || self.pointer_over_ui() {
            return;
        }
        if let Some(hit) = pick(position, &self.viewport(), &self.camera, &self.scene) {
            log::info!("Selected {}", hit.room_id);
            self.controller
                .select_room(Some(hit.room_id.as_str()), &self.catalog);
            self.drain_selection_events();
        }
    }

    fn cursor_icon(&self) -> egui::CursorIcon {
        if self.runtime.pointer.is_dragging() {
            egui::CursorIcon::Grabbing
        } else if self.controller.state().hovered_room_id.is_some() {
            egui::CursorIcon::PointingHand
        } else {
            egui::CursorIcon::Grab
        }
    }

    fn open_gallery(&mut self, title: String, photos: Vec<String>) {
        if let Some(mut previous) = self.runtime.modal.take() {
            previous.close();
        }
        let mut modal =
            RoomModal::open(title, photos, &self.scroll, self.config.min_swipe_distance);
        match self.runtime.photos.as_mut() {
            Some(loader) => modal.request_photos(loader),
            None => log::warn!("No photo loader; gallery '{}' stays empty", modal.title()),
        }
        self.runtime.modal = Some(modal);
        // The room under the pointer stops bobbing behind the gallery.
        self.update_hover(None);
    }

    /// Drops a gallery the user closed and clears the selection it showed.
    fn reap_closed_gallery(&mut self) {
        if !self.runtime.modal.as_ref().is_some_and(|modal| !modal.is_open()) {
            return;
        }
        self.runtime.modal = None;
        if self.controller.state().selected_room_id.is_some() {
            self.controller.select_room(None, &self.catalog);
            self.drain_selection_events();
        }
    }

    fn drain_selection_events(&mut self) {
        while let Ok(event) = self.gallery_events.try_recv() {
            match event {
                GalleryEvent::Open { title, photos } => self.open_gallery(title, photos),
                GalleryEvent::Close => {
                    if let Some(mut modal) = self.runtime.modal.take() {
                        modal.close();
                    }
                }
            }
        }
    }

    fn poll_photos(&mut self) {
        if let (Some(loader), Some(host)) = (&self.runtime.photos, &self.runtime.host) {
            for loaded in loader.poll() {
                if let Some(modal) = self.runtime.modal.as_mut() {
                    modal.accept(loaded, host.context());
                }
            }
        }
    }

    fn reload_catalog(&mut self) {
        match read_catalog(&self.config) {
            Ok(catalog) => self.replace_catalog(catalog),
            Err(err) => {
                log::warn!("Catalog reload failed: {err}");
                self.ui.set_status(format!("Catalog reload failed: {err}"));
            }
        }
    }

    fn replace_catalog(&mut self, catalog: RoomCatalog) {
        self.controller.on_catalog_replaced(&catalog);
        self.drain_selection_events();
        self.scene = build_scene(&catalog, &self.config);
        self.catalog = catalog;
        if let Some(render) = self.runtime.render.as_mut() {
            render.upload_scene(&self.scene);
        }
        self.runtime.labels.rebuild(&self.scene);
        self.ui.clear_status();
        log::info!("Catalog reloaded ({} rooms)", self.catalog.len());
    }

    fn apply_actions(&mut self, actions: Vec<UiAction>) {
        for action in actions {
            match action {
                UiAction::SetFloor(filter) => {
                    self.controller.set_floor_filter(filter, &mut self.scene)
                }
                UiAction::SetExplode(amount) => self.controller.set_explode_amount(amount),
                UiAction::OpenSiteView => {
                    let aerial = self.catalog.aerial().clone();
                    self.open_gallery(aerial.name, aerial.photos);
                }
            }
        }
    }

    fn draw_loading(&mut self, window: &Window) {
        let Runtime { render, host, .. } = &mut self.runtime;
        let (Some(render), Some(host)) = (render.as_mut(), host.as_mut()) else {
            return;
        };
        let ui = &self.ui;
        let frame = host.run_ui(window, |ctx| ui.show_loading(ctx));
        if let Err(err) = render.render_frame(
            &self.scene,
            &self.camera,
            &frame.clipped_primitives,
            &frame.textures_delta,
            frame.pixels_per_point,
        ) {
            log::warn!("Loading frame failed: {err}");
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if self.lifecycle.phase() == Phase::Initializing {
            self.draw_loading(&window);
            self.finish_initializing();
            return;
        }
        if !self.lifecycle.frame_allowed() {
            return;
        }

        self.timing.update(Some(&window), Instant::now());
        self.drain_selection_events();
        self.poll_photos();
        self.camera.update();
        self.controller
            .apply(&mut self.scene, &self.config, self.timing.elapsed());
        let viewport = self.viewport();
        self.runtime.labels.project(
            &self.scene,
            &self.camera,
            &viewport,
            self.config.label_offset,
        );

        let floors = self.catalog.floors();
        let state = self.controller.state().clone();
        let cursor = self.cursor_icon();
        let mut actions = Vec::new();
        let frame = {
            let Runtime {
                host,
                labels,
                modal,
                ..
            } = &mut self.runtime;
            let Some(host) = host.as_mut() else {
                return;
            };
            let ui = &mut self.ui;
            host.run_ui(&window, |ctx| {
                labels.paint(ctx);
                actions = ui.show_controls(ctx, &state, &floors);
                if let Some(modal) = modal.as_mut() {
                    modal.show(ctx);
                }
                if !ctx.is_pointer_over_area() {
                    ctx.set_cursor_icon(cursor);
                }
            })
        };

        self.reap_closed_gallery();
        self.apply_actions(actions);

        let Some(render) = self.runtime.render.as_mut() else {
            return;
        };
        if let Err(err) = render.render_frame(
            &self.scene,
            &self.camera,
            &frame.clipped_primitives,
            &frame.textures_delta,
            frame.pixels_per_point,
        ) {
            log::error!("Render failed: {err}");
            self.shutdown(event_loop);
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.lifecycle.dispose(&mut self.runtime);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.lifecycle.phase() == Phase::Disposed {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.timing.base_title())
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        self.update_target_frame_duration(&window);
        self.window = Some(window.clone());
        if let Err(err) = self.initialize(&window) {
            self.lifecycle.mark_unavailable(err.to_string());
            let reason = self.lifecycle.unavailable_reason().unwrap_or_default();
            window.set_title(&format!(
                "{WINDOW_TITLE} - 3D viewer not available ({reason})"
            ));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match (&mut self.runtime.host, &self.window) {
            (Some(host), Some(window)) => host.on_window_event(window, &event),
            _ => false,
        };

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Focused(false) | WindowEvent::CursorLeft { .. } => {
                self.runtime.pointer.left();
                self.update_hover(None);
            }
            WindowEvent::Resized(size) => {
                if let Some(render) = self.runtime.render.as_mut() {
                    render.resize(size.width, size.height);
                }
                self.camera.set_aspect(self.viewport().aspect());
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && !event.repeat
                    && event.physical_key == PhysicalKey::Code(KeyCode::F5)
                {
                    self.reload_catalog();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = self.logical(position);
                match self.runtime.pointer.moved(position) {
                    PointerAction::Drag(delta) => {
                        if self.orbit_enabled() {
                            self.camera.on_drag(delta);
                        }
                    }
                    PointerAction::Hover(position) => self.update_hover(Some(position)),
                    PointerAction::None => {}
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if !consumed && !self.pointer_over_ui() && self.orbit_enabled() {
                        self.runtime.pointer.pressed();
                    }
                }
                ElementState::Released => {
                    if let Some(position) = self.runtime.pointer.released() {
                        self.click(position);
                    }
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                if !consumed && !self.pointer_over_ui() && self.orbit_enabled() {
                    self.camera.on_scroll(scroll_steps(delta));
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let animating = match self.lifecycle.phase() {
            Phase::Running => true,
            Phase::Initializing => self.runtime.frame_requested,
            Phase::Uninitialized | Phase::Disposed => false,
        };
        if !animating {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.lifecycle.dispose(&mut self.runtime);
    }
}

/// Reads the configured catalog file. A missing file is seeded with the
/// built-in catalog so there is something to edit and reload.
fn read_catalog(config: &ViewerConfig) -> Result<RoomCatalog, CatalogError> {
    let Some(path) = &config.catalog_path else {
        return load_catalog();
    };
    if !path.exists() {
        let catalog = load_catalog()?;
        save_catalog_to_file(&catalog, path)?;
        log::info!("Wrote built-in catalog to {}", path.display());
        return Ok(catalog);
    }
    load_catalog_from_file(path)
}

pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("{WINDOW_TITLE}");
    log::info!(
        "   Drag to rotate, scroll to zoom, click a room for photos, F5 reloads the catalog"
    );

    let config = ViewerConfig::from_env()?;
    let catalog = read_catalog(&config)?;
    log::info!(
        "Catalog: {} rooms on {} floors",
        catalog.len(),
        catalog.floors().len()
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, catalog);
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{aerial, descriptor};
    use crate::catalog::Footprint;
    use crate::ui::modal::ModalCommand;

    fn app() -> App {
        App::new(ViewerConfig::default(), load_catalog().unwrap())
    }

    fn gallery_title(app: &App) -> Option<&str> {
        app.runtime.modal.as_ref().map(RoomModal::title)
    }

    #[test]
    fn selecting_a_room_opens_its_gallery_and_null_closes_it() {
        let mut app = app();
        app.controller.set_hovered_room(Some("kitchen"), &app.scene);

        app.controller.select_room(Some("kitchen"), &app.catalog);
        app.drain_selection_events();
        assert_eq!(gallery_title(&app), Some("Kitchen"));
        assert!(app.scroll.is_suspended());
        assert_eq!(app.controller.state().hovered_room_id, None);

        app.controller.select_room(None, &app.catalog);
        app.drain_selection_events();
        assert!(app.runtime.modal.is_none());
        assert!(!app.scroll.is_suspended());
        assert_eq!(app.scroll.restore_count(), 1);
    }

    #[test]
    fn closing_the_gallery_clears_the_selection() {
        let mut app = app();
        app.controller.select_room(Some("bedroom-b"), &app.catalog);
        app.drain_selection_events();

        app.reap_closed_gallery();
        assert!(app.runtime.modal.is_some());

        if let Some(modal) = app.runtime.modal.as_mut() {
            modal.apply(ModalCommand::Close);
        }
        app.reap_closed_gallery();
        assert!(app.runtime.modal.is_none());
        assert_eq!(app.controller.state().selected_room_id, None);
        assert!(!app.scroll.is_suspended());
        assert_eq!(app.scroll.restore_count(), 1);
    }

    #[test]
    fn opening_another_room_replaces_the_gallery() {
        let mut app = app();
        app.controller.select_room(Some("kitchen"), &app.catalog);
        app.drain_selection_events();
        app.controller.select_room(Some("hall-bath"), &app.catalog);
        app.drain_selection_events();
        assert_eq!(gallery_title(&app), Some("Hall / Bath Entry"));
        assert!(app.scroll.is_suspended());
        assert_eq!(app.scroll.restore_count(), 1);
    }

    #[test]
    fn site_view_opens_the_aerial_photos_without_a_selection() {
        let mut app = app();
        app.controller.set_hovered_room(Some("kitchen"), &app.scene);
        app.apply_actions(vec![UiAction::OpenSiteView]);
        assert_eq!(gallery_title(&app), Some("Site Overview"));
        assert_eq!(app.controller.state().selected_room_id, None);
        assert_eq!(app.controller.state().hovered_room_id, None);

        if let Some(modal) = app.runtime.modal.as_mut() {
            modal.close();
        }
        app.reap_closed_gallery();
        assert!(app.runtime.modal.is_none());
        assert!(!app.scroll.is_suspended());
    }

    #[test]
    fn catalog_swap_closes_a_gallery_for_a_removed_room() {
        let mut app = app();
        app.controller.select_room(Some("kitchen"), &app.catalog);
        app.drain_selection_events();

        let replacement = RoomCatalog::new(
            vec![descriptor("bedroom-a", 2, Footprint::new(0.0, 0.0, 3.0, 3.0), 1)],
            aerial(),
        )
        .unwrap();
        app.replace_catalog(replacement);

        assert!(app.runtime.modal.is_none());
        assert_eq!(app.controller.state().selected_room_id, None);
        assert!(!app.scroll.is_suspended());
        assert_eq!(app.scene.len(), 1);
    }

    #[test]
    fn floor_buttons_filter_the_scene_immediately() {
        let mut app = app();
        app.apply_actions(vec![UiAction::SetFloor(
            crate::scene::controller::FloorFilter::Floor(crate::catalog::Floor::UPPER),
        )]);
        assert_eq!(app.scene.visible_nodes().count(), 3);
        assert!(app.scene.visible_nodes().all(|node| node.floor.0 == 2));
    }

    #[test]
    fn photo_side_limit_falls_back_to_config_without_a_gpu() {
        let app = app();
        assert_eq!(app.photo_side_limit(), app.config.max_photo_side);
    }
}

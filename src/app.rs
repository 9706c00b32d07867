use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::error::PlanningError;
use crate::grid::{GridLayout, GridMesh};
use crate::render::GridRenderer;
use crate::upload::{MaintenanceSummary, OptimId};

/// Everything the page handlers and the window loop share. Single-threaded,
/// so it lives behind `Rc<RefCell<_>>`; never hold a borrow across an await.
#[derive(Default)]
pub struct Planning {
    renderer: Option<GridRenderer>,
    mesh: Option<GridMesh>,
    // Set when a mesh is waiting for its one draw.
    dirty: bool,
    optim: Option<OptimId>,
    summary: Option<MaintenanceSummary>,
}

pub type SharedPlanning = Rc<RefCell<Planning>>;

impl Planning {
    pub fn shared() -> SharedPlanning {
        Rc::new(RefCell::new(Planning::default()))
    }

    pub fn attach_renderer(&mut self, mut renderer: GridRenderer) {
        if let Some(mesh) = &self.mesh {
            match renderer.load_mesh(mesh) {
                Ok(()) => {
                    self.dirty = true;
                    renderer.window().request_redraw();
                }
                Err(e) => log::error!("{}", e),
            }
        }
        self.renderer = Some(renderer);
    }

    pub fn renderer_mut(&mut self) -> Option<&mut GridRenderer> {
        self.renderer.as_mut()
    }

    /// Sizes the grid to `days` columns and schedules one draw. On error the
    /// previous grid stays.
    pub fn show_days(&mut self, days: u32) -> Result<(), PlanningError> {
        let mesh = GridLayout::new(days)?.build_mesh();
        if let Some(renderer) = &mut self.renderer {
            renderer.load_mesh(&mesh)?;
            renderer.window().request_redraw();
        }
        self.mesh = Some(mesh);
        self.dirty = true;
        Ok(())
    }

    pub fn layout(&self) -> Option<GridLayout> {
        self.mesh.as_ref().map(GridMesh::layout)
    }

    pub fn record_optim(&mut self, id: OptimId) {
        self.optim = Some(id);
    }

    pub fn optim(&self) -> Option<OptimId> { self.optim }

    pub fn record_summary(&mut self, summary: MaintenanceSummary) -> Result<(), PlanningError> {
        self.summary = Some(summary);
        self.show_days(summary.ndays())
    }

    pub fn summary(&self) -> Option<MaintenanceSummary> { self.summary }

    pub fn needs_draw(&self) -> bool {
        self.dirty && self.renderer.is_some()
    }

    pub fn draw(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.needs_draw() {
            return Ok(());
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.render()?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Reconfigures a lost surface and asks for the grid to be drawn again.
    pub fn recover_surface(&mut self) {
        self.mark_dirty();
        if let Some(renderer) = &mut self.renderer {
            let size = renderer.size();
            renderer.resize(size);
            if self.dirty {
                renderer.window().request_redraw();
            }
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = self.mesh.is_some();
    }
}

pub struct App {
    planning: SharedPlanning,
    #[cfg(target_arch = "wasm32")]
    canvas: Option<web_sys::HtmlCanvasElement>,
    // Prevent repeated window creation on wasm while async init is pending
    initialized: bool,
}

impl App {
    pub fn new(planning: SharedPlanning) -> Self {
        App {
            planning,
            #[cfg(target_arch = "wasm32")]
            canvas: None,
            initialized: false,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn with_canvas(mut self, canvas: web_sys::HtmlCanvasElement) -> Self {
        self.canvas = Some(canvas);
        self
    }

    fn window_attributes(&mut self) -> winit::window::WindowAttributes {
        let window_attributes = Window::default_attributes().with_title("planboard");

        #[cfg(target_arch = "wasm32")]
        let window_attributes = {
            use winit::platform::web::WindowAttributesExtWebSys;
            match self.canvas.take() {
                Some(canvas) => window_attributes.with_canvas(Some(canvas)),
                None => window_attributes.with_append(true),
            }
        };

        window_attributes
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        let attributes = self.window_attributes();
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("could not create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(target_arch = "wasm32")]
        {
            // Async initialize the renderer without blocking the single-threaded wasm main thread.
            let planning = self.planning.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match GridRenderer::new(window).await {
                    Ok(renderer) => planning.borrow_mut().attach_renderer(renderer),
                    Err(e) => log::error!("{}", e),
                }
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(GridRenderer::new(window)) {
                Ok(renderer) => self.planning.borrow_mut().attach_renderer(renderer),
                Err(e) => {
                    log::error!("{}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let mut planning = self.planning.borrow_mut();
        let Some(renderer) = planning.renderer_mut() else {
            return;
        };
        if window_id != renderer.window().id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                renderer.resize(physical_size);
                planning.mark_dirty();
            }
            WindowEvent::RedrawRequested => {
                match planning.draw() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => planning.recover_surface(),
                    Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                    Err(e) => log::error!("{:?}", e),
                }
            }
            _ => {}
        }
    }
}

/// Hands the app to the browser's event loop and returns immediately.
#[cfg(target_arch = "wasm32")]
pub fn start(app: App) -> Result<(), winit::error::EventLoopError> {
    use winit::platform::web::EventLoopExtWebSys;

    let event_loop = EventLoop::new()?;
    event_loop.spawn_app(app);
    Ok(())
}

/// Runs the app until its window is closed.
#[cfg(not(target_arch = "wasm32"))]
pub fn start(mut app: App) -> Result<(), winit::error::EventLoopError> {
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;

    const ID: [u8; 16] = [7; 16];

    #[test]
    fn summary_sizes_the_grid() {
        let planning = Planning::shared();
        let summary: MaintenanceSummary =
            serde_json::from_str(r#"{"ndays": 42, "ninterventions": 3, "nresources": 5, "nscenarios": 2}"#).unwrap();

        planning.borrow_mut().record_summary(summary).unwrap();

        let p = planning.borrow();
        assert_eq!(p.layout().map(|l| l.columns()), Some(42));
        assert_eq!(p.summary(), Some(summary));
        // Nothing to draw on until a renderer is attached.
        assert!(!p.needs_draw());
    }

    #[test]
    fn zero_day_summary_keeps_previous_grid() {
        let mut planning = Planning::default();
        planning.show_days(10).unwrap();
        let empty = MaintenanceSummary::default();
        assert!(matches!(planning.record_summary(empty), Err(PlanningError::Grid(GridError::NoDays))));
        assert_eq!(planning.layout().map(|l| l.columns()), Some(10));
    }

    #[test]
    fn oversized_summary_keeps_previous_grid() {
        let mut planning = Planning::default();
        planning.show_days(10).unwrap();
        let huge: MaintenanceSummary =
            serde_json::from_str(r#"{"ndays": 4000000, "ninterventions": 1, "nresources": 5, "nscenarios": 1}"#).unwrap();
        assert!(matches!(
            planning.record_summary(huge),
            Err(PlanningError::Grid(GridError::TooManyDays { days: 4_000_000, .. }))
        ));
        assert_eq!(planning.layout().map(|l| l.columns()), Some(10));
    }

    #[test]
    fn lost_surface_schedules_another_draw() {
        let mut planning = Planning::default();
        planning.recover_surface();
        assert!(!planning.dirty);

        planning.show_days(8).unwrap();
        planning.dirty = false;
        planning.recover_surface();
        assert!(planning.dirty);
    }

    #[test]
    fn draw_without_renderer_is_a_no_op() {
        let mut planning = Planning::default();
        planning.show_days(3).unwrap();
        assert!(planning.draw().is_ok());
    }

    #[test]
    fn optim_id_is_kept() {
        let mut planning = Planning::default();
        assert!(planning.optim().is_none());
        let id = OptimId::from_bytes(&ID).unwrap();
        planning.record_optim(id);
        assert_eq!(planning.optim(), Some(id));
    }
}

#[cfg(target_arch="wasm32")]
use wasm_bindgen::prelude::*;

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod grid;
pub mod render;
pub mod upload;
#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::app::{App, Planning, SharedPlanning};
use crate::config::SiteConfig;

fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            // Replies from the summary endpoint are logged at info level.
            if let Err(e) = console_log::init_with_level(log::Level::Info) {
                web_sys::console::error_1(&format!("Couldn't initialize logger: {}", e).into());
            }
        } else {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        }
    }
}

fn preview(planning: &SharedPlanning, config: &SiteConfig) {
    if let Some(days) = config.preview_days {
        if let Err(e) = planning.borrow_mut().show_days(days) {
            log::error!("{}", e);
        }
    }
}

/// Native entry: opens a window showing the grid for `config.preview_days`.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: SiteConfig) -> Result<(), winit::error::EventLoopError> {
    init_logging();
    log::info!("optimization server: {}", config.server);

    let planning = Planning::shared();
    preview(&planning, &config);
    app::start(App::new(planning))
}

/// Browser entry: wires the upload page and adopts its `planning` canvas.
/// Exported without `start`; the wasm binary's `main` calls it once.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn run() -> Result<(), JsValue> {
    use std::rc::Rc;

    init_logging();

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window.document().ok_or_else(|| JsValue::from_str("no document"))?;
    let config = web::page_config(&window)?;
    log::info!("optimization server: {}", config.server);

    let page = web::Page::locate(&document)?;
    let planning = Planning::shared();
    let uploader = Rc::new(upload::Uploader::new(web::FetchTransport, &config));
    web::wire(&page, planning.clone(), uploader)?;
    preview(&planning, &config);

    app::start(App::new(planning).with_canvas(page.planning.clone()))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

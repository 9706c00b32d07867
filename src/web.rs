// Browser side: DOM lookups, event handlers and the fetch-backed transport.

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Document, File, FormData, HtmlCanvasElement, HtmlElement, HtmlInputElement, Request, RequestInit, Response};

use crate::app::SharedPlanning;
use crate::config::SiteConfig;
use crate::error::UploadError;
use crate::upload::{HttpReply, MaintenanceSummary, Transport, UploadForm, Uploader};

fn js_error(value: JsValue) -> UploadError {
    UploadError::Network(format!("{:?}", value))
}

/// Posts multipart forms with `fetch`.
pub struct FetchTransport;

impl Transport for FetchTransport {
    type File = File;

    async fn post_form(&self, url: &str, form: UploadForm<File>) -> Result<HttpReply, UploadError> {
        let window = web_sys::window().ok_or_else(|| UploadError::Network("no window".into()))?;

        let data = FormData::new().map_err(js_error)?;
        data.append_with_blob(form.field, &form.file).map_err(js_error)?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&data);
        let request = Request::new_with_str_and_init(url, &init).map_err(js_error)?;

        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(js_error)?
            .dyn_into()
            .map_err(js_error)?;
        let status = response.status();
        let buffer = JsFuture::from(response.array_buffer().map_err(js_error)?)
            .await
            .map_err(js_error)?;

        Ok(HttpReply { status, body: js_sys::Uint8Array::new(&buffer).to_vec() })
    }
}

/// Elements of the upload page. The summary table is optional.
#[derive(Clone)]
pub struct Page {
    pub file_input: HtmlInputElement,
    pub send_file: HtmlElement,
    pub send_file_json: HtmlElement,
    pub planning: HtmlCanvasElement,
    summary_table: Option<HtmlElement>,
    ndays: Option<HtmlElement>,
    ninterventions: Option<HtmlElement>,
    nresources: Option<HtmlElement>,
    nscenarios: Option<HtmlElement>,
}

fn element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing element #{}", id)))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("element #{} has the wrong type", id)))
}

fn optional(document: &Document, id: &str) -> Option<HtmlElement> {
    document.get_element_by_id(id)?.dyn_into::<HtmlElement>().ok()
}

impl Page {
    pub fn locate(document: &Document) -> Result<Page, JsValue> {
        Ok(Page {
            file_input: element(document, "file")?,
            send_file: element(document, "send-file")?,
            send_file_json: element(document, "send-file-json")?,
            planning: element(document, "planning")?,
            summary_table: optional(document, "summary-table"),
            ndays: optional(document, "ndays"),
            ninterventions: optional(document, "ninterventions"),
            nresources: optional(document, "nresources"),
            nscenarios: optional(document, "nscenarios"),
        })
    }

    pub fn selected_file(&self) -> Option<File> {
        self.file_input.files()?.get(0)
    }

    pub fn show_summary(&self, summary: &MaintenanceSummary) {
        if let Some(table) = &self.summary_table {
            let _ = table.style().remove_property("display");
        }
        let cells = [
            (&self.ndays, summary.ndays()),
            (&self.ninterventions, summary.ninterventions()),
            (&self.nresources, summary.nresources()),
            (&self.nscenarios, summary.nscenarios()),
        ];
        for (cell, value) in cells {
            if let Some(cell) = cell {
                cell.set_inner_text(&value.to_string());
            }
        }
    }
}

/// Attaches the page's event handlers. The closures live as long as the page.
pub fn wire(page: &Page, planning: SharedPlanning, uploader: Rc<Uploader<FetchTransport>>) -> Result<(), JsValue> {
    {
        let onchange = Closure::<dyn FnMut()>::wrap(Box::new(move || {
            log::info!("load file");
        }));
        page.file_input.add_event_listener_with_callback("change", onchange.as_ref().unchecked_ref())?;
        onchange.forget();
    }

    {
        let pg = page.clone();
        let planning = planning.clone();
        let uploader = uploader.clone();
        let onclick = Closure::<dyn FnMut()>::wrap(Box::new(move || {
            let Some(file) = pg.selected_file() else {
                log::warn!("{}", UploadError::NoFile);
                return;
            };
            let planning = planning.clone();
            let uploader = uploader.clone();
            spawn_local(async move {
                match uploader.send_new_optim(file).await {
                    Ok(id) => {
                        log::info!("optimization {} created", id);
                        planning.borrow_mut().record_optim(id);
                    }
                    Err(e) => log::error!("upload failed: {}", e),
                }
            });
        }));
        page.send_file.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    {
        let pg = page.clone();
        let onclick = Closure::<dyn FnMut()>::wrap(Box::new(move || {
            let Some(file) = pg.selected_file() else {
                log::warn!("{}", UploadError::NoFile);
                return;
            };
            let pg = pg.clone();
            let planning = planning.clone();
            let uploader = uploader.clone();
            spawn_local(async move {
                let reply = match uploader.send_summary_json(file).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        log::error!("upload failed: {}", e);
                        return;
                    }
                };
                if let Some(summary) = reply.summary {
                    pg.show_summary(&summary);
                    if let Err(e) = planning.borrow_mut().record_summary(summary) {
                        log::error!("{}", e);
                    }
                }
            });
        }));
        page.send_file_json.add_event_listener_with_callback("click", onclick.as_ref().unchecked_ref())?;
        onclick.forget();
    }

    Ok(())
}

/// Page host, overridden by `?server=` and `?days=`.
pub fn page_config(window: &web_sys::Window) -> Result<SiteConfig, JsValue> {
    let location = window.location();
    let mut config = SiteConfig::for_host(&location.hostname()?);
    let params = web_sys::UrlSearchParams::new_with_str(&location.search()?)?;
    if let Some(server) = params.get("server") {
        config = config.with_server(&server).map_err(|e| JsValue::from_str(&e.to_string()))?;
    }
    if let Some(days) = params.get("days") {
        config = config.with_preview_days(&days).map_err(|e| JsValue::from_str(&e.to_string()))?;
    }
    Ok(config)
}

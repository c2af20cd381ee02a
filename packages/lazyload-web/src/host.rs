use js_sys::{Promise, Reflect};
use lazyload_core::{Host, HostError, Signal};
use lazyload_scheduler::{Scheduler, Task};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlLinkElement, HtmlScriptElement, Window};

/// [`Host`] over the live page: `web-sys` for the DOM, promise jobs for
/// microtasks and `window.setTimeout` for timers.
#[derive(Debug, Clone)]
pub struct WebHost {
    window: Window,
    document: Document,
}

impl WebHost {
    pub fn new() -> Result<Self, HostError> {
        let window = web_sys::window()
            .ok_or_else(|| HostError::Unavailable("no global `window` exists".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| HostError::Unavailable("window has no document".to_string()))?;
        Ok(Self { window, document })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

impl Scheduler for WebHost {
    fn schedule_microtask(&self, task: Task) {
        let job = Closure::once(move |_: JsValue| task());
        let _ = Promise::resolve(&JsValue::UNDEFINED).then(&job);
        job.forget();
    }

    fn set_timeout(&self, delay_ms: u32, task: Task) {
        let callback = Closure::once_into_js(move || task());
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
        {
            tracing::warn!(error = %describe(&err), "setTimeout failed");
        }
    }

    fn now(&self) -> f64 {
        self.window
            .performance()
            .map(|perf| perf.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

impl Host for WebHost {
    type Node = Element;
    type Document = Document;

    fn user_agent(&self) -> String {
        self.window.navigator().user_agent().unwrap_or_default()
    }

    fn script_async_default(&self) -> bool {
        self.document
            .create_element("script")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlScriptElement>().ok())
            .is_some_and(|script| script.r#async())
    }

    fn document(&self) -> Document {
        self.document.clone()
    }

    fn head(&self) -> Result<Element, HostError> {
        self.document
            .head()
            .map(Element::from)
            .ok_or(HostError::MissingHead)
    }

    fn create_element(&self, tag: &str) -> Result<Element, HostError> {
        self.document
            .create_element(tag)
            .map_err(|err| HostError::CreateElement {
                tag: tag.to_string(),
                reason: describe(&err),
            })
    }

    fn set_attribute(&self, node: &Element, name: &str, value: &str) -> Result<(), HostError> {
        node.set_attribute(name, value)
            .map_err(|err| HostError::SetAttribute {
                name: name.to_string(),
                reason: describe(&err),
            })
    }

    fn set_async(&self, node: &Element, value: bool) {
        if let Some(script) = node.dyn_ref::<HtmlScriptElement>() {
            script.set_async(value);
        }
    }

    fn href(&self, node: &Element) -> Option<String> {
        node.dyn_ref::<HtmlLinkElement>()
            .map(HtmlLinkElement::href)
            .filter(|href| !href.is_empty())
    }

    fn ready_state(&self, node: &Element) -> Option<String> {
        Reflect::get(node, &JsValue::from_str("readyState"))
            .ok()?
            .as_string()
    }

    fn append_child(&self, parent: &Element, child: &Element) -> Result<(), HostError> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|err| HostError::Append(describe(&err)))
    }

    fn listen(&self, node: &Element, signal: Signal, handler: Box<dyn FnMut()>) {
        let closure = Closure::<dyn FnMut()>::wrap(handler);
        if let Err(err) = node
            .add_event_listener_with_callback(signal.event_name(), closure.as_ref().unchecked_ref())
        {
            tracing::warn!(event = signal.event_name(), error = %describe(&err), "addEventListener failed");
        }
        // The node owns the listener from here on.
        closure.forget();
    }

    fn style_sheet_hrefs(&self) -> Vec<String> {
        let sheets = self.document.style_sheets();
        (0..sheets.length())
            .filter_map(|i| sheets.item(i))
            .filter_map(|sheet| sheet.href().ok().flatten())
            .collect()
    }
}

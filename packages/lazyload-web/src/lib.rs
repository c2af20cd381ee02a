//! Browser build of the loader: [`WebHost`] drives the real DOM and
//! [`LazyLoad`] exposes `css`/`js` to page scripts.

mod host;

pub use host::WebHost;

use js_sys::{Array, Function, Object, Reflect};
use lazyload_core::{
    EnvironmentInfo, Flow, LoadRequest, Loader, LoaderConfig, Progress, ResourceType,
};
use wasm_bindgen::prelude::*;

/// JS-facing loader: `css(urls, callback, obj, context, insert)` and the same for `js`.
#[wasm_bindgen]
pub struct LazyLoad {
    loader: Loader<WebHost>,
}

#[wasm_bindgen]
impl LazyLoad {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<LazyLoad, JsValue> {
        Self::with_config(LoaderConfig::default())
    }

    /// Builds a loader from a JSON config; missing fields take their defaults.
    pub fn configure(config_json: &str) -> Result<LazyLoad, JsValue> {
        let config = LoaderConfig::from_json(config_json)
            .map_err(|err| JsValue::from_str(&format!("invalid loader config: {err}")))?;
        Self::with_config(config)
    }

    pub fn css(
        &self,
        urls: JsValue,
        callback: Option<Function>,
        obj: JsValue,
        context: JsValue,
        insert: Option<bool>,
    ) {
        self.load(ResourceType::Style, urls, callback, obj, context, insert);
    }

    pub fn js(
        &self,
        urls: JsValue,
        callback: Option<Function>,
        obj: JsValue,
        context: JsValue,
        insert: Option<bool>,
    ) {
        self.load(ResourceType::Script, urls, callback, obj, context, insert);
    }

    /// Restarts a pipeline after a callback returned a truthy value.
    pub fn resume(&self, kind: &str) -> Result<(), JsValue> {
        let ty: ResourceType = kind
            .parse()
            .map_err(|err| JsValue::from_str(&format!("{err}")))?;
        self.loader.resume(ty);
        Ok(())
    }

    pub fn environment(&self) -> Result<JsValue, JsValue> {
        environment_object(&self.loader.environment()).map(JsValue::from)
    }

    /// Calls a page-defined global bootstrap function, if one exists, so a page
    /// can hand its script list to the loader once the loader itself is ready.
    #[wasm_bindgen(js_name = runSetupHook)]
    pub fn run_setup_hook(name: &str) -> Result<bool, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global `window` exists"))?;
        let hook = Reflect::get(&window, &JsValue::from_str(name))?;
        match hook.dyn_ref::<Function>() {
            Some(hook) => {
                console_log(&format!("LazyLoad: running setup hook {name}"));
                hook.call0(&window)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl LazyLoad {
    pub fn with_config(config: LoaderConfig) -> Result<LazyLoad, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let host = WebHost::new().map_err(|err| JsValue::from_str(&err.to_string()))?;
        Ok(Self {
            loader: Loader::with_config(host, config),
        })
    }

    pub fn loader(&self) -> &Loader<WebHost> {
        &self.loader
    }

    fn load(
        &self,
        ty: ResourceType,
        urls: JsValue,
        callback: Option<Function>,
        obj: JsValue,
        context: JsValue,
        insert: Option<bool>,
    ) {
        let mut request = LoadRequest::<WebHost>::new(urls_from_js(&urls))
            .payload(obj)
            .context(context)
            .insert_at_front(insert.unwrap_or(false));

        if let Some(callback) = callback {
            request = request.callback(move |payload, progress| {
                let obj = payload
                    .and_then(|p| p.downcast_ref::<JsValue>())
                    .cloned()
                    .unwrap_or(JsValue::UNDEFINED);
                let this = progress
                    .context_as::<JsValue>()
                    .cloned()
                    .unwrap_or(JsValue::UNDEFINED);
                let info = match progress_object(progress) {
                    Ok(info) => JsValue::from(info),
                    Err(err) => {
                        tracing::warn!(?err, "failed to build progress object");
                        JsValue::UNDEFINED
                    }
                };
                match callback.call2(&this, &obj, &info) {
                    Ok(stop) => Flow::from_stop(stop.is_truthy()),
                    Err(err) => {
                        // A throwing callback must not wedge the pipeline.
                        tracing::warn!(?err, "load callback threw");
                        Flow::Continue
                    }
                }
            });
        }
        self.loader.load(ty, request);
    }
}

/// A string or an array of strings; anything else yields no URLs.
fn urls_from_js(urls: &JsValue) -> Vec<String> {
    if Array::is_array(urls) {
        Array::from(urls)
            .iter()
            .filter_map(|url| url.as_string())
            .collect()
    } else {
        urls.as_string().into_iter().collect()
    }
}

fn set(target: &Object, key: &str, value: impl Into<JsValue>) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), &value.into()).map(|_| ())
}

fn environment_object(env: &EnvironmentInfo) -> Result<Object, JsValue> {
    let obj = Object::new();
    set(&obj, "no_async", env.explicit_order)?;
    set(&obj, "gecko", env.gecko())?;
    set(&obj, "ie", env.ie())?;
    set(&obj, "opera", env.opera())?;
    set(&obj, "webkit", env.webkit())?;
    Ok(obj)
}

fn progress_object(progress: &Progress<'_, WebHost>) -> Result<Object, JsValue> {
    let obj = Object::new();
    set(&obj, "type", progress.resource_type.as_str())?;
    set(&obj, "todo_count", progress.todo_count as f64)?;
    set(&obj, "pending_count", progress.pending_count as f64)?;
    set(&obj, "done_count", progress.done_count as f64)?;
    set(&obj, "finish_pollcount", progress.poll_count)?;
    set(&obj, "document", progress.document.clone())?;
    match &progress.head {
        Some(head) => set(&obj, "htmlhead", head.clone())?,
        None => set(&obj, "htmlhead", JsValue::NULL)?,
    }

    let queue = Array::new();
    for group in &progress.queued {
        let urls: Array = group.iter().map(|url| JsValue::from_str(url)).collect();
        queue.push(&urls);
    }
    set(&obj, "load_queue", queue)?;
    let in_flight: Array = progress
        .in_flight
        .iter()
        .map(|url| JsValue::from_str(url))
        .collect();
    set(&obj, "pending_set", in_flight)?;
    let sheets: Array = progress
        .style_sheets()
        .iter()
        .map(|href| JsValue::from_str(href))
        .collect();
    set(&obj, "page_stylesheets", sheets)?;
    set(&obj, "user_environment", environment_object(&progress.environment)?)?;
    Ok(obj)
}

fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

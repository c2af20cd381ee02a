use lazyload_core::{Host, Loader, ResourceType};
use lazyload_web::{LazyLoad, WebHost};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn injected(selector: &str) -> u32 {
    let document = web_sys::window().unwrap().document().unwrap();
    document.query_selector_all(selector).unwrap().length()
}

#[wasm_bindgen_test]
fn test_web_host_sees_document_head() {
    let host = WebHost::new().unwrap();
    assert!(host.head().is_ok());
    assert!(!host.user_agent().is_empty());
}

#[wasm_bindgen_test]
fn test_css_injects_link_into_head() {
    let before = injected("head link.lazyload");
    let lazy = LazyLoad::new().unwrap();
    lazy.css(
        JsValue::from_str("data:text/css,body{}"),
        None,
        JsValue::UNDEFINED,
        JsValue::UNDEFINED,
        None,
    );
    assert_eq!(injected("head link.lazyload"), before + 1);
    assert!(lazy.loader().is_busy(ResourceType::Style));
}

#[wasm_bindgen_test]
fn test_unknown_resume_kind_is_rejected() {
    let lazy = LazyLoad::new().unwrap();
    assert!(lazy.resume("img").is_err());
    assert!(lazy.resume("js").is_ok());
}

#[wasm_bindgen_test]
fn test_missing_setup_hook_is_not_run() {
    assert_eq!(LazyLoad::run_setup_hook("lazyloadSetupMissing").unwrap(), false);
}

#[wasm_bindgen_test]
async fn test_scripts_future_resolves_after_load() {
    let loader = Loader::new(WebHost::new().unwrap());
    let done = loader.scripts_future(vec![
        "data:text/javascript,window.__lazyA=1",
        "data:text/javascript,window.__lazyB=2",
    ]);
    let summary = done.await.unwrap();
    assert_eq!(summary.resource_type, ResourceType::Script);
    assert_eq!(summary.done_count, 2);
    assert_eq!(summary.todo_count, 0);
}

use lazyload_core::sim::SimHost;
use lazyload_core::{EnvironmentInfo, Flow, LoadRequest, Loader, Progress, ResourceType};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const SAFARI: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_6_4; en-us) AppleWebKit/533.17.9 (KHTML, like Gecko) Version/5.0.1 Safari/533.17.9";
const UNKNOWN: &str = "TestBrowser/1.0";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_children_inserted_at_front_run_before_siblings() {
    init_tracing();
    let loader = Loader::new(SimHost::new(SAFARI));

    loader.load_scripts(LoadRequest::new("parent.js").callback(|_, progress| {
        // The parent discovered two dependencies of its own.
        progress
            .loader()
            .load_scripts(LoadRequest::new(["child1.js", "child2.js"]).insert_at_front(true));
        Flow::Continue
    }));
    loader.js(["sibling.js"]);

    loader.host().load("parent.js");
    assert_eq!(loader.in_flight_urls(ResourceType::Script), vec!["child1.js"]);
    assert_eq!(
        loader.queued_urls(ResourceType::Script),
        vec![vec!["child2.js".to_string()], vec!["sibling.js".to_string()]]
    );

    for url in ["child1.js", "child2.js", "sibling.js"] {
        loader.host().load(url);
    }
    assert_eq!(
        loader.host().injected_urls(),
        vec!["parent.js", "child1.js", "child2.js", "sibling.js"]
    );
}

#[test]
fn test_insert_at_front_does_not_disturb_in_flight_group() {
    let loader = Loader::new(SimHost::new(UNKNOWN));

    loader.css(["a.css"]);
    loader.css(["b.css"]);
    loader.load_styles(LoadRequest::new(["c1.css", "c2.css"]).insert_at_front(true));

    assert_eq!(loader.in_flight_urls(ResourceType::Style), vec!["a.css"]);
    assert_eq!(
        loader.queued_urls(ResourceType::Style),
        vec![
            vec!["c1.css".to_string(), "c2.css".to_string()],
            vec!["b.css".to_string()],
        ]
    );
}

#[test]
fn test_suspend_leaves_pipeline_idle_until_resumed() {
    let loader = Loader::new(SimHost::new(SAFARI));

    loader.load_scripts(LoadRequest::new("a.js").callback(|_, _| Flow::Suspend));
    loader.js("b.js");

    loader.host().load("a.js");
    assert!(!loader.is_busy(ResourceType::Script));
    assert_eq!(loader.queued_urls(ResourceType::Script), vec![vec!["b.js".to_string()]]);
    assert_eq!(loader.host().injected_urls(), vec!["a.js"]);

    loader.resume(ResourceType::Script);
    assert_eq!(loader.host().injected_urls(), vec!["a.js", "b.js"]);
}

#[test]
fn test_pipelines_are_independent() {
    let loader = Loader::new(SimHost::new(UNKNOWN));

    loader.css("a.css");
    loader.css("b.css");
    loader.js("a.js");
    loader.js("b.js");

    // One group per type in flight, both types at once.
    assert_eq!(loader.in_flight_urls(ResourceType::Style), vec!["a.css"]);
    assert_eq!(loader.in_flight_urls(ResourceType::Script), vec!["a.js"]);
    assert_eq!(loader.outstanding(ResourceType::Style), 2);

    loader.host().load("a.js");
    assert_eq!(loader.in_flight_urls(ResourceType::Style), vec!["a.css"]);
    assert_eq!(loader.in_flight_urls(ResourceType::Script), vec!["b.js"]);
}

#[test]
fn test_payload_and_context_reach_callback() {
    let loader = Loader::new(SimHost::new(UNKNOWN));
    let seen = Rc::new(RefCell::new(None));
    let out = seen.clone();

    loader.load_scripts(
        LoadRequest::new("a.js")
            .payload(42u32)
            .context("widget")
            .callback(move |payload, progress| {
                let payload = payload.and_then(|p| p.downcast_ref::<u32>()).copied();
                let context = progress.context_as::<&str>().copied();
                *out.borrow_mut() = Some((payload, context, progress.resource_type));
                Flow::Continue
            }),
    );
    loader.host().load("a.js");

    assert_eq!(
        *seen.borrow(),
        Some((Some(42), Some("widget"), ResourceType::Script))
    );
}

#[test]
fn test_progress_exposes_document_and_head() {
    let loader = Loader::new(SimHost::new(UNKNOWN));
    let checked = Rc::new(Cell::new(false));
    let flag = checked.clone();

    loader.load_styles(LoadRequest::new("a.css").callback(
        move |_, progress: &Progress<'_, SimHost>| {
            assert_eq!(progress.document.url, "http://localhost/");
            assert!(progress.head.is_some());
            assert!(progress.queued.is_empty());
            assert!(progress.in_flight.is_empty());
            flag.set(true);
            Flow::Continue
        },
    ));
    loader.host().load("a.css");

    assert!(checked.get());
}

#[test]
fn test_injection_failure_finishes_resource() {
    let loader = Loader::new(SimHost::new(SAFARI));
    let fired = Rc::new(Cell::new(0));
    let count = fired.clone();
    loader.host().reject_appends(true);

    loader.load_scripts(LoadRequest::new(["a.js", "b.js"]).callback(move |_, _| {
        count.set(count.get() + 1);
        Flow::Continue
    }));
    // Failures are delivered as microtasks, never synchronously.
    assert_eq!(fired.get(), 0);

    loader.host().tick();
    assert_eq!(fired.get(), 1);
    assert_eq!(loader.done_count(ResourceType::Script), 2);
}

#[test]
fn test_missing_head_does_not_stall() {
    let loader = Loader::new(SimHost::new(UNKNOWN).without_head());

    loader.css(["a.css", "b.css"]);
    loader.css("c.css");
    loader.host().tick();

    assert_eq!(loader.done_count(ResourceType::Style), 3);
    assert!(!loader.is_busy(ResourceType::Style));
}

#[test]
fn test_future_resolves_with_summary() {
    let loader = Loader::new(SimHost::new(SAFARI));

    let mut rx = loader.scripts_future(["a.js", "b.js"]);
    assert!(matches!(rx.try_recv(), Ok(None)));

    loader.host().load("a.js");
    loader.host().load("b.js");

    let summary = futures::executor::block_on(rx).unwrap();
    assert_eq!(summary.resource_type, ResourceType::Script);
    assert_eq!(summary.done_count, 2);
}

#[test]
fn test_empty_request_cancels_future() {
    let loader = Loader::new(SimHost::new(UNKNOWN));

    let rx = loader.styles_future(Vec::<String>::new());

    assert!(futures::executor::block_on(rx).is_err());
    assert!(!loader.is_busy(ResourceType::Style));
}

#[test]
fn test_environment_is_memoized_per_loader() {
    let loader = Loader::new(SimHost::new(SAFARI));

    let env = loader.environment();
    assert_eq!(env.webkit(), 533.17);
    assert!(!loader.set_environment(EnvironmentInfo::default()));
    assert_eq!(loader.environment(), env);

    // A pinned environment overrides sniffing.
    let pinned = Loader::new(SimHost::new(SAFARI));
    assert!(pinned.set_environment(EnvironmentInfo::default()));
    assert_eq!(pinned.environment().webkit(), 0.0);
}

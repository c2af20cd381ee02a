//! In-memory host: a tiny document with a `<head>`, a stylesheet list and a
//! virtual clock. Nothing loads by itself; the driver decides when each node
//! fires `load`, `error` or `readystatechange`.

use crate::error::HostError;
use crate::host::{Host, Signal};
use lazyload_scheduler::{LocalScheduler, Scheduler, Task};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

new_key_type! {
    pub struct SimNodeId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDocument {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SimElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    /// Only scripts have an `async` property.
    pub async_flag: Option<bool>,
    pub ready_state: Option<String>,
    pub parent: Option<SimNodeId>,
    pub children: Vec<SimNodeId>,
}

impl SimElement {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            async_flag: None,
            ready_state: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// `src` for scripts, `href` for links.
    pub fn url(&self) -> Option<&str> {
        self.attribute("src").or_else(|| self.attribute("href"))
    }
}

/// A node as seen in the head, in insertion order.
#[derive(Debug, Clone)]
pub struct InjectedNode {
    pub id: SimNodeId,
    pub tag: String,
    pub url: String,
    pub async_flag: Option<bool>,
    pub attributes: Vec<(String, String)>,
}

type Handler = Rc<RefCell<Box<dyn FnMut()>>>;

struct SimDom {
    nodes: SlotMap<SimNodeId, SimElement>,
    head: Option<SimNodeId>,
    sheets: Vec<String>,
    listeners: FxHashMap<(SimNodeId, Signal), Vec<Handler>>,
    reject_appends: bool,
}

pub struct SimHost {
    scheduler: LocalScheduler,
    user_agent: String,
    script_async_default: bool,
    base: Url,
    dom: RefCell<SimDom>,
}

impl SimHost {
    pub fn new(user_agent: impl Into<String>) -> Self {
        let mut nodes = SlotMap::with_key();
        let head = nodes.insert(SimElement::new("head"));
        Self {
            scheduler: LocalScheduler::new(),
            user_agent: user_agent.into(),
            script_async_default: false,
            base: Url::parse("http://localhost/").expect("static base URL"),
            dom: RefCell::new(SimDom {
                nodes,
                head: Some(head),
                sheets: Vec::new(),
                listeners: FxHashMap::default(),
                reject_appends: false,
            }),
        }
    }

    pub fn with_base_url(mut self, base: &str) -> Result<Self, url::ParseError> {
        self.base = Url::parse(base)?;
        Ok(self)
    }

    /// Makes fresh script nodes report `async == true`, like engines that
    /// support explicit execution ordering.
    pub fn with_script_async_default(mut self, value: bool) -> Self {
        self.script_async_default = value;
        self
    }

    pub fn without_head(self) -> Self {
        self.dom.borrow_mut().head = None;
        self
    }

    /// Every subsequent `append_child` fails.
    pub fn reject_appends(&self, reject: bool) {
        self.dom.borrow_mut().reject_appends = reject;
    }

    pub fn scheduler(&self) -> &LocalScheduler {
        &self.scheduler
    }

    pub fn advance(&self, ms: u64) -> usize {
        self.scheduler.advance(ms)
    }

    pub fn tick(&self) -> bool {
        self.scheduler.tick()
    }

    /// Resolves `url` against the document base, falling back to the input.
    pub fn resolve(&self, url: &str) -> String {
        self.base
            .join(url)
            .map(String::from)
            .unwrap_or_else(|_| url.to_string())
    }

    pub fn element(&self, id: SimNodeId) -> Option<SimElement> {
        self.dom.borrow().nodes.get(id).cloned()
    }

    /// Children of the head, in the order they were appended.
    pub fn injected(&self) -> Vec<InjectedNode> {
        let dom = self.dom.borrow();
        let Some(head) = dom.head.and_then(|id| dom.nodes.get(id)) else {
            return Vec::new();
        };
        head.children
            .iter()
            .filter_map(|id| dom.nodes.get(*id).map(|el| (*id, el)))
            .map(|(id, el)| InjectedNode {
                id,
                tag: el.tag.clone(),
                url: el.url().unwrap_or_default().to_string(),
                async_flag: el.async_flag,
                attributes: el.attributes.clone(),
            })
            .collect()
    }

    pub fn injected_urls(&self) -> Vec<String> {
        self.injected().into_iter().map(|node| node.url).collect()
    }

    /// Most recently injected node whose `src`/`href` is `url`.
    pub fn node_for(&self, url: &str) -> Option<SimNodeId> {
        self.injected()
            .into_iter()
            .rev()
            .find(|node| node.url == url)
            .map(|node| node.id)
    }

    /// Delivers `signal` to every listener on the node for `url`.
    /// Returns false if no such node was injected.
    pub fn fire(&self, url: &str, signal: Signal) -> bool {
        let Some(id) = self.node_for(url) else {
            return false;
        };
        // Clone the handler list so no borrow is held while the loader re-enters.
        let handlers = self
            .dom
            .borrow()
            .listeners
            .get(&(id, signal))
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            (*handler.borrow_mut())();
        }
        true
    }

    pub fn load(&self, url: &str) -> bool {
        self.fire(url, Signal::Load)
    }

    pub fn fail(&self, url: &str) -> bool {
        self.fire(url, Signal::Error)
    }

    pub fn set_ready_state(&self, url: &str, state: &str) -> bool {
        let Some(id) = self.node_for(url) else {
            return false;
        };
        if let Some(el) = self.dom.borrow_mut().nodes.get_mut(id) {
            el.ready_state = Some(state.to_string());
        }
        self.fire(url, Signal::ReadyStateChange)
    }

    /// Adds a stylesheet to `document.styleSheets`, as the engine would once it has parsed one.
    pub fn attach_style_sheet(&self, href: &str) {
        let resolved = self.resolve(href);
        self.dom.borrow_mut().sheets.push(resolved);
    }
}

impl Scheduler for SimHost {
    fn schedule_microtask(&self, task: Task) {
        self.scheduler.schedule_microtask(task);
    }

    fn set_timeout(&self, delay_ms: u32, task: Task) {
        self.scheduler.set_timeout(delay_ms, task);
    }

    fn now(&self) -> f64 {
        Scheduler::now(&self.scheduler)
    }
}

impl Host for SimHost {
    type Node = SimNodeId;
    type Document = SimDocument;

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn script_async_default(&self) -> bool {
        self.script_async_default
    }

    fn document(&self) -> SimDocument {
        SimDocument {
            url: self.base.to_string(),
        }
    }

    fn head(&self) -> Result<SimNodeId, HostError> {
        self.dom.borrow().head.ok_or(HostError::MissingHead)
    }

    fn create_element(&self, tag: &str) -> Result<SimNodeId, HostError> {
        let mut el = SimElement::new(tag);
        if tag == "script" {
            el.async_flag = Some(self.script_async_default);
        }
        Ok(self.dom.borrow_mut().nodes.insert(el))
    }

    fn set_attribute(&self, node: &SimNodeId, name: &str, value: &str) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        let el = dom.nodes.get_mut(*node).ok_or(HostError::UnknownNode)?;
        match el.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attributes.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn set_async(&self, node: &SimNodeId, value: bool) {
        if let Some(el) = self.dom.borrow_mut().nodes.get_mut(*node) {
            if el.async_flag.is_some() {
                el.async_flag = Some(value);
            }
        }
    }

    fn href(&self, node: &SimNodeId) -> Option<String> {
        let href = self
            .dom
            .borrow()
            .nodes
            .get(*node)?
            .attribute("href")?
            .to_string();
        Some(self.resolve(&href))
    }

    fn ready_state(&self, node: &SimNodeId) -> Option<String> {
        self.dom.borrow().nodes.get(*node)?.ready_state.clone()
    }

    fn append_child(&self, parent: &SimNodeId, child: &SimNodeId) -> Result<(), HostError> {
        let mut dom = self.dom.borrow_mut();
        if dom.reject_appends {
            return Err(HostError::Append("appends are disabled".to_string()));
        }
        if !dom.nodes.contains_key(*child) {
            return Err(HostError::UnknownNode);
        }
        let parent_el = dom.nodes.get_mut(*parent).ok_or(HostError::UnknownNode)?;
        parent_el.children.push(*child);
        if let Some(child_el) = dom.nodes.get_mut(*child) {
            child_el.parent = Some(*parent);
        }
        Ok(())
    }

    fn listen(&self, node: &SimNodeId, signal: Signal, handler: Box<dyn FnMut()>) {
        self.dom
            .borrow_mut()
            .listeners
            .entry((*node, signal))
            .or_default()
            .push(Rc::new(RefCell::new(handler)));
    }

    fn style_sheet_hrefs(&self) -> Vec<String> {
        self.dom.borrow().sheets.clone()
    }
}

use crate::error::HostError;
use lazyload_scheduler::Scheduler;
use std::fmt::Debug;

/// Native completion signals a host can deliver for an injected node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Load,
    Error,
    /// IE-style `readystatechange`; the handler reads [`Host::ready_state`].
    ReadyStateChange,
}

impl Signal {
    pub fn event_name(self) -> &'static str {
        match self {
            Signal::Load => "load",
            Signal::Error => "error",
            Signal::ReadyStateChange => "readystatechange",
        }
    }
}

/// The DOM-like environment the loader drives.
///
/// A browser implementation sits on `web-sys`; [`SimHost`](crate::sim::SimHost)
/// is an in-memory one for tests and headless use. Timers come from the
/// [`Scheduler`] supertrait.
pub trait Host: Scheduler + 'static {
    type Node: Clone + Debug + 'static;
    type Document: Clone + Debug + 'static;

    fn user_agent(&self) -> String;

    /// True when a freshly created script node reports `async == true`,
    /// meaning dynamic scripts may opt back into ordered execution.
    fn script_async_default(&self) -> bool;

    fn document(&self) -> Self::Document;

    fn head(&self) -> Result<Self::Node, HostError>;

    fn create_element(&self, tag: &str) -> Result<Self::Node, HostError>;

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str) -> Result<(), HostError>;

    /// Sets the `async` property of a script node.
    fn set_async(&self, node: &Self::Node, value: bool);

    /// Absolute URL of a link node's `href`, as the engine resolved it.
    fn href(&self, node: &Self::Node) -> Option<String>;

    fn ready_state(&self, node: &Self::Node) -> Option<String>;

    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    /// Registers `handler` for `signal` on `node`. It may be invoked more than once.
    fn listen(&self, node: &Self::Node, signal: Signal, handler: Box<dyn FnMut()>);

    /// `href` of every stylesheet currently attached to the document.
    fn style_sheet_hrefs(&self) -> Vec<String>;
}

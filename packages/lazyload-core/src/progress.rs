use crate::env::EnvironmentInfo;
use crate::host::Host;
use crate::loader::Loader;
use crate::resource::ResourceType;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::rc::Rc;

/// What a callback wants the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Dequeue the next group right away.
    #[default]
    Continue,
    /// Leave the pipeline idle; [`Loader::resume`] or a later enqueue restarts it.
    Suspend,
}

impl Flow {
    /// `true` maps to [`Flow::Suspend`], matching the "truthy stops loading" convention.
    pub fn from_stop(stop: bool) -> Self {
        if stop { Flow::Suspend } else { Flow::Continue }
    }
}

/// Snapshot handed to callbacks and progress hooks.
///
/// Owned copies of the counters and queue contents; only valid for the
/// duration of the call it was passed to.
pub struct Progress<'a, H: Host> {
    pub(crate) loader: &'a Loader<H>,
    pub resource_type: ResourceType,
    /// URLs of this type still outstanding: queued groups plus the in-flight remainder.
    pub todo_count: usize,
    /// URLs still outstanding in the group being reported.
    pub pending_count: usize,
    pub done_count: u64,
    pub poll_count: u32,
    pub environment: EnvironmentInfo,
    pub document: H::Document,
    pub head: Option<H::Node>,
    pub queued: Vec<Vec<String>>,
    pub in_flight: Vec<String>,
    pub(crate) payload: Option<Rc<dyn Any>>,
    pub(crate) context: Option<Rc<dyn Any>>,
}

impl<'a, H: Host> Progress<'a, H> {
    /// The loader that produced this snapshot, for enqueueing follow-up work.
    pub fn loader(&self) -> &'a Loader<H> {
        self.loader
    }

    pub fn payload(&self) -> Option<&dyn Any> {
        self.payload.as_deref()
    }

    pub fn context(&self) -> Option<&dyn Any> {
        self.context.as_deref()
    }

    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload()?.downcast_ref()
    }

    pub fn context_as<T: 'static>(&self) -> Option<&T> {
        self.context()?.downcast_ref()
    }

    /// Live stylesheet list, read from the host now.
    pub fn style_sheets(&self) -> Vec<String> {
        self.loader.host().style_sheet_hrefs()
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            resource_type: self.resource_type,
            todo_count: self.todo_count,
            pending_count: self.pending_count,
            done_count: self.done_count,
            poll_count: self.poll_count,
            environment: self.environment,
        }
    }
}

/// The plain-data part of a [`Progress`], detached from the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub resource_type: ResourceType,
    pub todo_count: usize,
    pub pending_count: usize,
    pub done_count: u64,
    pub poll_count: u32,
    pub environment: EnvironmentInfo,
}

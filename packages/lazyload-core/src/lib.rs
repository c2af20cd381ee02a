//! Dependency-ordered CSS and JavaScript loading.
//!
//! A [`Loader`] keeps one pipeline per [`ResourceType`]. Each call to
//! [`Loader::load_styles`] / [`Loader::load_scripts`] becomes one or more
//! groups; a group's URLs are injected into the document head together and
//! its callback fires once every one of them has finished, success or error.

pub mod completion;
pub mod config;
pub mod env;
pub mod error;
pub mod host;
pub mod inject;
pub mod loader;
pub mod progress;
pub mod queue;
pub mod resource;
pub mod sim;

pub use completion::Completion;
pub use config::LoaderConfig;
pub use env::{Engine, EnvironmentInfo};
pub use error::HostError;
pub use host::{Host, Signal};
pub use loader::{LoadRequest, Loader};
pub use progress::{Flow, Progress, ProgressSummary};
pub use queue::{LoadGroup, RequestQueue};
pub use resource::ResourceType;

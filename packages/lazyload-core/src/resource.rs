use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two independent pipelines. Nothing is shared between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[serde(alias = "css")]
    Style,
    #[serde(alias = "js")]
    Script,
}

impl ResourceType {
    /// Tag of the element injected for this type.
    pub fn tag(self) -> &'static str {
        match self {
            ResourceType::Style => "link",
            ResourceType::Script => "script",
        }
    }

    /// Short name used in logs and in the JS-facing progress object.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Style => "css",
            ResourceType::Script => "js",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ResourceType::Style => 0,
            ResourceType::Script => 1,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource type `{0}` (expected css/style or js/script)")]
pub struct UnknownResourceType(pub String);

impl FromStr for ResourceType {
    type Err = UnknownResourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "css" | "style" => Ok(ResourceType::Style),
            "js" | "script" => Ok(ResourceType::Script),
            _ => Err(UnknownResourceType(s.to_string())),
        }
    }
}

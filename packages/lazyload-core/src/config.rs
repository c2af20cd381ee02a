use serde::{Deserialize, Serialize};

/// Tunables for injection and completion detection.
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Interval between WebKit stylesheet polls.
    pub poll_interval_ms: u32,
    /// Polls without a match before a stylesheet is declared finished anyway.
    pub max_polls: u32,
    /// Gecko has no stylesheet load signal; finish after this many ms per URL in the group.
    pub gecko_delay_per_url_ms: u32,
    pub charset: String,
    /// Class stamped on every injected node, if any.
    pub node_class: Option<String>,
    /// `type` attribute for injected `<link>` nodes.
    pub style_type: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            max_polls: 200,
            gecko_delay_per_url_ms: 50,
            charset: "utf-8".to_string(),
            node_class: Some("lazyload".to_string()),
            style_type: Some("text/css".to_string()),
        }
    }
}

impl LoaderConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = LoaderConfig::from_json(r#"{ "max_polls": 10, "node_class": null }"#).unwrap();
        assert_eq!(config.max_polls, 10);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.node_class, None);
        assert_eq!(config.charset, "utf-8");
    }
}

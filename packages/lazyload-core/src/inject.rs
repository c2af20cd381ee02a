use crate::config::LoaderConfig;
use crate::env::EnvironmentInfo;
use crate::error::HostError;
use crate::host::Host;
use crate::resource::ResourceType;
use smallvec::SmallVec;

/// Description of a node to inject, before any host is involved.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub tag: &'static str,
    pub attributes: SmallVec<[(&'static str, String); 6]>,
    /// `Some(false)` forces in-order execution of a dynamic script.
    pub async_flag: Option<bool>,
}

impl NodeSpec {
    pub fn for_resource(
        ty: ResourceType,
        url: &str,
        env: &EnvironmentInfo,
        config: &LoaderConfig,
    ) -> Self {
        let mut attributes = SmallVec::new();
        attributes.push(("charset", config.charset.clone()));
        if let Some(class) = &config.node_class {
            attributes.push(("class", class.clone()));
        }

        let async_flag = match ty {
            ResourceType::Style => {
                attributes.push(("href", url.to_string()));
                attributes.push(("rel", "stylesheet".to_string()));
                if let Some(style_type) = &config.style_type {
                    attributes.push(("type", style_type.clone()));
                }
                None
            }
            ResourceType::Script => {
                attributes.push(("src", url.to_string()));
                env.explicit_order.then_some(false)
            }
        };

        Self {
            tag: ty.tag(),
            attributes,
            async_flag,
        }
    }

    /// Creates the node on `host`. The caller attaches completion hooks, then appends it.
    pub fn create<H: Host>(&self, host: &H) -> Result<H::Node, HostError> {
        let node = host.create_element(self.tag)?;
        for (name, value) in &self.attributes {
            host.set_attribute(&node, name, value)?;
        }
        if let Some(flag) = self.async_flag {
            host.set_async(&node, flag);
        }
        Ok(node)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Engine;

    #[test]
    fn test_style_node_attributes() {
        let env = EnvironmentInfo::default();
        let spec = NodeSpec::for_resource(ResourceType::Style, "a.css", &env, &LoaderConfig::default());

        assert_eq!(spec.tag, "link");
        assert_eq!(spec.attribute("rel"), Some("stylesheet"));
        assert_eq!(spec.attribute("href"), Some("a.css"));
        assert_eq!(spec.attribute("charset"), Some("utf-8"));
        assert_eq!(spec.attribute("type"), Some("text/css"));
        assert_eq!(spec.attribute("class"), Some("lazyload"));
        assert_eq!(spec.async_flag, None);
    }

    #[test]
    fn test_script_async_only_with_explicit_order() {
        let config = LoaderConfig::default();
        let plain = EnvironmentInfo::new(Engine::WebKit, 533.0, false);
        let ordered = EnvironmentInfo::new(Engine::Gecko, 2.0, true);

        let spec = NodeSpec::for_resource(ResourceType::Script, "a.js", &plain, &config);
        assert_eq!(spec.tag, "script");
        assert_eq!(spec.attribute("src"), Some("a.js"));
        assert_eq!(spec.async_flag, None);

        let spec = NodeSpec::for_resource(ResourceType::Script, "a.js", &ordered, &config);
        assert_eq!(spec.async_flag, Some(false));
    }
}

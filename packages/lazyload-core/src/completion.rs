use crate::config::LoaderConfig;
use crate::env::{Engine, EnvironmentInfo};
use crate::resource::ResourceType;

/// How the loader learns that an injected node has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// IE: `readystatechange` reaching `loaded` or `complete`. Errors look the same.
    ReadyState,
    /// WebKit stylesheets: poll the document's stylesheet list for the resolved href.
    StylesheetPoll,
    /// Gecko stylesheets: no signal at all, finish after a fixed delay.
    FixedDelay { delay_ms: u32 },
    /// Everything else: `load` or `error`, whichever comes first.
    LoadOrError,
}

impl Completion {
    /// Picks the strategy for one node of a group with `group_len` URLs.
    pub fn select(
        ty: ResourceType,
        env: &EnvironmentInfo,
        group_len: usize,
        config: &LoaderConfig,
    ) -> Self {
        let style = ty == ResourceType::Style;
        match env.engine {
            Engine::InternetExplorer => Completion::ReadyState,
            Engine::WebKit if style => Completion::StylesheetPoll,
            Engine::Gecko if style => {
                let len = u32::try_from(group_len).unwrap_or(u32::MAX);
                Completion::FixedDelay {
                    delay_ms: config.gecko_delay_per_url_ms.saturating_mul(len),
                }
            }
            _ => Completion::LoadOrError,
        }
    }
}

/// Ready states that end an IE load.
pub fn is_terminal_ready_state(state: &str) -> bool {
    matches!(state, "loaded" | "complete")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(ty: ResourceType, engine: Engine, version: f64) -> Completion {
        let env = EnvironmentInfo::new(engine, version, false);
        Completion::select(ty, &env, 3, &LoaderConfig::default())
    }

    #[test]
    fn test_strategy_table() {
        use ResourceType::*;

        assert_eq!(select(Style, Engine::InternetExplorer, 8.0), Completion::ReadyState);
        assert_eq!(select(Script, Engine::InternetExplorer, 6.0), Completion::ReadyState);
        assert_eq!(select(Style, Engine::WebKit, 533.0), Completion::StylesheetPoll);
        assert_eq!(
            select(Style, Engine::Gecko, 1.9),
            Completion::FixedDelay { delay_ms: 150 }
        );
        assert_eq!(select(Script, Engine::WebKit, 533.0), Completion::LoadOrError);
        assert_eq!(select(Script, Engine::Gecko, 2.0), Completion::LoadOrError);
        assert_eq!(select(Style, Engine::Opera, 9.0), Completion::LoadOrError);
        assert_eq!(select(Style, Engine::None, 0.0), Completion::LoadOrError);
    }

    #[test]
    fn test_terminal_ready_states() {
        assert!(is_terminal_ready_state("loaded"));
        assert!(is_terminal_ready_state("complete"));
        assert!(!is_terminal_ready_state("loading"));
        assert!(!is_terminal_ready_state("interactive"));
    }
}

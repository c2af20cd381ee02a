use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WEBKIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"AppleWebKit/(\S*)").unwrap());
static MSIE: Lazy<Regex> = Lazy::new(|| Regex::new(r"MSIE\s([^;]*)").unwrap());
static GECKO: Lazy<Regex> = Lazy::new(|| Regex::new(r"Gecko/(\S*)").unwrap());
static GECKO_RV: Lazy<Regex> = Lazy::new(|| Regex::new(r"rv:([^\s)]*)").unwrap());
static OPERA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Opera/(\S*)").unwrap());
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    #[default]
    None,
    Gecko,
    InternetExplorer,
    WebKit,
    Opera,
}

/// What the loader knows about the browser it runs in.
///
/// Only one engine family is ever detected, so at most one of the
/// per-engine version accessors returns a non-zero value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Dynamically created scripts accept `async = false`, which makes the
    /// browser run them in insertion order while still fetching in parallel.
    pub explicit_order: bool,
    pub engine: Engine,
    pub version: f64,
}

impl EnvironmentInfo {
    /// Sniffs the user agent and records the script-ordering capability.
    ///
    /// Matching order is WebKit, IE, Gecko, Opera; the first hit wins. An
    /// unrecognised agent yields `Engine::None`, which selects the most
    /// conservative behaviour everywhere.
    pub fn probe(user_agent: &str, script_async_default: bool) -> Self {
        let (engine, version) = sniff(user_agent);
        let env = Self {
            explicit_order: script_async_default,
            engine,
            version,
        };
        tracing::debug!(?env, "environment probed");
        env
    }

    pub fn new(engine: Engine, version: f64, explicit_order: bool) -> Self {
        Self {
            explicit_order,
            engine,
            version,
        }
    }

    pub fn gecko(&self) -> f64 {
        self.version_for(Engine::Gecko)
    }

    pub fn ie(&self) -> f64 {
        self.version_for(Engine::InternetExplorer)
    }

    pub fn webkit(&self) -> f64 {
        self.version_for(Engine::WebKit)
    }

    pub fn opera(&self) -> f64 {
        self.version_for(Engine::Opera)
    }

    pub fn is(&self, engine: Engine) -> bool {
        engine != Engine::None && self.engine == engine && self.version > 0.0
    }

    /// Whether several scripts can be in flight at once without breaking execution order.
    /// Old Gecko and old Opera preserve insertion order on their own.
    pub fn parallel_scripts(&self) -> bool {
        self.explicit_order
            || (self.is(Engine::Gecko) && self.version < 1.9)
            || (self.is(Engine::Opera) && self.version < 9.8)
    }

    fn version_for(&self, engine: Engine) -> f64 {
        if self.engine == engine { self.version } else { 0.0 }
    }
}

fn sniff(ua: &str) -> (Engine, f64) {
    if let Some(version) = capture_version(&WEBKIT, ua) {
        return (Engine::WebKit, version);
    }
    if let Some(version) = capture_version(&MSIE, ua) {
        return (Engine::InternetExplorer, version);
    }
    if GECKO.is_match(ua) {
        // Gecko without a parsable revision still counts as Gecko.
        let version = capture_version(&GECKO_RV, ua).unwrap_or(1.0);
        return (Engine::Gecko, version);
    }
    if let Some(version) = capture_version(&OPERA, ua) {
        return (Engine::Opera, version);
    }
    (Engine::None, 0.0)
}

/// First capture group, parsed with `parseFloat` semantics. Empty or unparsable captures are misses.
fn capture_version(pattern: &Regex, ua: &str) -> Option<f64> {
    let captured = pattern.captures(ua)?.get(1)?.as_str();
    let version = parse_float(captured);
    (version > 0.0).then_some(version)
}

/// Longest leading decimal literal, like JavaScript's `parseFloat`. Returns 0 when there is none.
pub fn parse_float(s: &str) -> f64 {
    FLOAT_PREFIX
        .find(s)
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFARI: &str = "Mozilla/5.0 (Macintosh; U; Intel Mac OS X 10_6_4; en-us) AppleWebKit/533.17.9 (KHTML, like Gecko) Version/5.0.1 Safari/533.17.9";
    const IE8: &str = "Mozilla/4.0 (compatible; MSIE 8.0; Windows NT 6.1; Trident/4.0)";
    const FIREFOX_36: &str =
        "Mozilla/5.0 (Windows; U; Windows NT 6.1; en-US; rv:1.9.2.8) Gecko/20100722 Firefox/3.6.8";
    const OPERA_9: &str = "Opera/9.64 (Windows NT 5.1; U; en) Presto/2.1.1";

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float("533.17.9"), 533.17);
        assert_eq!(parse_float("8.0"), 8.0);
        assert_eq!(parse_float("1.9.2.8"), 1.9);
        assert_eq!(parse_float("abc"), 0.0);
        assert_eq!(parse_float(""), 0.0);
    }

    #[test]
    fn test_webkit_wins_over_gecko_token() {
        // Safari's UA also says "like Gecko"; WebKit is checked first.
        let env = EnvironmentInfo::probe(SAFARI, false);
        assert_eq!(env.engine, Engine::WebKit);
        assert_eq!(env.webkit(), 533.17);
        assert_eq!(env.gecko(), 0.0);
    }

    #[test]
    fn test_ie_and_gecko_and_opera() {
        assert_eq!(EnvironmentInfo::probe(IE8, false).ie(), 8.0);

        let ff = EnvironmentInfo::probe(FIREFOX_36, false);
        assert_eq!(ff.engine, Engine::Gecko);
        assert_eq!(ff.gecko(), 1.9);

        let opera = EnvironmentInfo::probe(OPERA_9, false);
        assert_eq!(opera.opera(), 9.64);
        assert!(opera.parallel_scripts());
    }

    #[test]
    fn test_unknown_agent_is_conservative() {
        let env = EnvironmentInfo::probe("curl/8.0", false);
        assert_eq!(env, EnvironmentInfo::default());
        assert!(!env.parallel_scripts());
    }

    #[test]
    fn test_explicit_order_enables_parallel_scripts() {
        let env = EnvironmentInfo::probe(SAFARI, true);
        assert!(env.explicit_order);
        assert!(env.parallel_scripts());
    }
}

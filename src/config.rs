use std::env;
use std::path::PathBuf;

pub const DEFAULT_ARK_URL: &str = "https://ark.cn-beijing.volces.com/api/v3/images/generations";
pub const DEFAULT_MODEL: &str = "doubao-seedream-4-5-251128";
pub const API_KEY_ENV: &str = "VOLC_ARK_API_KEY";

#[derive(Debug, Clone)]
pub struct ArkConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl Default for ArkConfig {
    fn default() -> Self {
        ArkConfig {
            api_key: None,
            base_url: None,
            model: None,
        }
    }
}

impl ArkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let api_key = env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        let base_url = env::var("ARK_BASE_URL").ok().filter(|u| !u.is_empty());
        let model = env::var("ARK_MODEL").ok().filter(|m| !m.is_empty());

        ArkConfig {
            api_key,
            base_url,
            model,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_ARK_URL)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: Option<u16>,
    pub max_concurrency: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub ark: ArkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: None,
            max_concurrency: None,
            output_dir: None,
            ark: ArkConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());
        // Zero or garbage means "no cap".
        let max_concurrency = env::var("MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0);
        let output_dir = env::var("OUTPUT_DIR").ok().map(PathBuf::from);

        Config {
            port,
            max_concurrency,
            output_dir,
            ark: ArkConfig::from_env(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit).filter(|n| *n > 0);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_ark(mut self, config: ArkConfig) -> Self {
        self.ark = config;
        self
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(8080)
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    static ENV: Mutex<()> = Mutex::new(());

    /// Tests touching process environment variables hold this for their
    /// whole env section.
    pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
        ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    const VARS: &[&str] = &[
        "PORT",
        "MAX_CONCURRENCY",
        "OUTPUT_DIR",
        API_KEY_ENV,
        "ARK_BASE_URL",
        "ARK_MODEL",
    ];

    fn with_env(vars: &[(&str, &str)]) -> Config {
        let _env = env_lock();
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let config = Config::from_env();
        for var in VARS {
            env::remove_var(var);
        }
        config
    }

    #[test]
    fn test_from_env_reads_everything() {
        let config = with_env(&[
            ("PORT", "9090"),
            ("MAX_CONCURRENCY", "4"),
            ("OUTPUT_DIR", "/tmp/xmas"),
            (API_KEY_ENV, "secret"),
            ("ARK_BASE_URL", "http://localhost:9"),
            ("ARK_MODEL", "seedream-test"),
        ]);

        assert_eq!(config.port_or_default(), 9090);
        assert_eq!(config.max_concurrency, Some(4));
        assert_eq!(config.output_dir_or_default(), PathBuf::from("/tmp/xmas"));
        assert_eq!(config.ark.api_key.as_deref(), Some("secret"));
        assert_eq!(config.ark.endpoint(), "http://localhost:9");
        assert_eq!(config.ark.model.as_deref(), Some("seedream-test"));
    }

    #[test]
    fn test_from_env_unset_and_unusable_values() {
        let config = with_env(&[]);
        assert_eq!(config.port_or_default(), 8080);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.ark.api_key, None);
        assert_eq!(config.ark.endpoint(), DEFAULT_ARK_URL);

        let config = with_env(&[
            ("PORT", "not-a-port"),
            ("MAX_CONCURRENCY", "0"),
            (API_KEY_ENV, ""),
            ("ARK_MODEL", ""),
        ]);
        assert_eq!(config.port, None);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.ark.api_key, None);
        assert_eq!(config.ark.model, None);

        let config = with_env(&[("MAX_CONCURRENCY", "lots")]);
        assert_eq!(config.max_concurrency, None);
    }

    #[test]
    fn test_builders() {
        let config = Config::new()
            .with_port(9000)
            .with_max_concurrency(0)
            .with_ark(ArkConfig::new().with_api_key("k").with_model("m"));

        assert_eq!(config.port_or_default(), 9000);
        assert_eq!(config.max_concurrency, None);
        assert_eq!(config.ark.api_key.as_deref(), Some("k"));
        assert_eq!(config.ark.model.as_deref(), Some("m"));
        assert_eq!(config.ark.endpoint(), DEFAULT_ARK_URL);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port_or_default(), 8080);
        assert_eq!(config.output_dir_or_default(), PathBuf::from("."));
        assert_eq!(
            ArkConfig::new().with_base_url("http://localhost:1").endpoint(),
            "http://localhost:1"
        );
    }
}

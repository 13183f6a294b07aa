//! Application state and configuration.

use std::sync::Arc;
use std::time::Duration;

use lectio_core::select::LinkStyle;
use lectio_core::{CanonEntry, InMemoryVerseStore, VerseStore};

use crate::cache::{self, ListingKey, ResponseCache, get_or_compute};
use crate::error::ApiError;
use crate::llm::MotifClient;
use crate::scripture::{ProviderBook, ScriptureClient, UpstreamError};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Scripture provider base URL.
    pub scripture_api_url: String,

    /// Scripture provider credential. Handlers degrade when absent.
    pub scripture_api_key: Option<String>,

    /// Default edition identifier used when a request carries no `bibleId`.
    pub scripture_bible_id: Option<String>,

    /// OpenAI-compatible API base URL.
    pub openai_api_url: String,

    /// LLM credential. Studies use the local heuristic when absent.
    pub openai_api_key: Option<String>,

    pub openai_model: String,

    /// Timeout applied to every outbound call.
    pub upstream_timeout: Duration,

    /// Version code used in citation links when the request names none.
    pub default_version: String,

    pub link_style: LinkStyle,

    /// Port of the Prometheus exporter (disabled when unset).
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - None; every credential is optional and its absence degrades the
    ///   matching handlers instead of failing start-up.
    ///
    /// Optional environment variables:
    /// - `LECTIO_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `SCRIPTURE_API_URL`: Provider URL (default: "https://api.scripture.api.bible/v1")
    /// - `SCRIPTURE_API_KEY`, `SCRIPTURE_BIBLE_ID`: Provider credential and edition
    /// - `OPENAI_API_URL`: LLM URL (default: "https://api.openai.com/v1")
    /// - `OPENAI_API_KEY`, `OPENAI_MODEL`: LLM credential and model (default: "gpt-4o-mini")
    /// - `LECTIO_UPSTREAM_TIMEOUT_SECS`: Outbound timeout in seconds (default: 10)
    /// - `LECTIO_DEFAULT_VERSION`: Version code for links (default: "LSG")
    /// - `LECTIO_LINK_STYLE`: "biblegateway" (default) or "youversion"
    /// - `LECTIO_METRICS_PORT`: Prometheus exporter port
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("LECTIO_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let scripture_api_url = std::env::var("SCRIPTURE_API_URL")
            .unwrap_or_else(|_| "https://api.scripture.api.bible/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let scripture_api_key = optional_var("SCRIPTURE_API_KEY");
        let scripture_bible_id = optional_var("SCRIPTURE_BIBLE_ID");

        let openai_api_url = std::env::var("OPENAI_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let openai_api_key = optional_var("OPENAI_API_KEY");
        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let timeout_secs: u64 = match optional_var("LECTIO_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                anyhow::anyhow!("LECTIO_UPSTREAM_TIMEOUT_SECS must be a positive integer, got '{raw}'")
            })?,
            None => 10,
        };
        if timeout_secs == 0 {
            anyhow::bail!("LECTIO_UPSTREAM_TIMEOUT_SECS must be greater than zero");
        }

        let default_version = optional_var("LECTIO_DEFAULT_VERSION")
            .unwrap_or_else(|| "LSG".to_string())
            .to_uppercase();

        let link_style = optional_var("LECTIO_LINK_STYLE")
            .map(|s| LinkStyle::parse(&s))
            .unwrap_or_default();

        let metrics_port = optional_var("LECTIO_METRICS_PORT")
            .map(|raw| {
                raw.parse::<u16>()
                    .map_err(|_| anyhow::anyhow!("LECTIO_METRICS_PORT must be a port number, got '{raw}'"))
            })
            .transpose()?;

        tracing::info!(
            bind_addr = %bind_addr,
            scripture_api_url = %scripture_api_url,
            scripture_configured = scripture_api_key.is_some(),
            bible_id = ?scripture_bible_id,
            llm_configured = openai_api_key.is_some(),
            model = %openai_model,
            timeout_secs,
            link_style = ?link_style,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            scripture_api_url,
            scripture_api_key,
            scripture_bible_id,
            openai_api_url,
            openai_api_key,
            openai_model,
            upstream_timeout: Duration::from_secs(timeout_secs),
            default_version,
            link_style,
            metrics_port,
        })
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
fn optional_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// Scripture provider client.
    pub scripture: ScriptureClient,

    /// LLM client, present only when a credential is configured.
    pub llm: Option<MotifClient>,

    /// Response cache for provider listings.
    pub cache: ResponseCache,

    /// Verse overrides pushed through the bulk endpoint.
    pub store: Arc<dyn VerseStore>,
}

impl AppState {
    /// Create a new application state from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let scripture = ScriptureClient::new(
            &config.scripture_api_url,
            config.scripture_api_key.clone(),
            config.upstream_timeout,
        )?;

        let llm = match &config.openai_api_key {
            Some(key) => Some(MotifClient::new(
                &config.openai_api_url,
                key,
                &config.openai_model,
                config.upstream_timeout,
            )?),
            None => {
                tracing::info!("OPENAI_API_KEY not set, studies use local motifs");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            scripture,
            llm,
            cache: cache::new_cache(),
            store: Arc::new(InMemoryVerseStore::new()),
        })
    }

    /// Replace the verse store.
    pub fn with_store(mut self, store: Arc<dyn VerseStore>) -> Self {
        self.store = store;
        self
    }

    /// Edition to query: the request's `bibleId`, else the configured default.
    ///
    /// Fails with `ConfigurationMissing` when the provider cannot be called.
    pub fn bible_id(&self, requested: Option<&str>) -> Result<String, ApiError> {
        if !self.scripture.is_configured() {
            return Err(ApiError::ConfigurationMissing("SCRIPTURE_API_KEY"));
        }
        requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.scripture_bible_id.clone())
            .ok_or(ApiError::ConfigurationMissing("SCRIPTURE_BIBLE_ID"))
    }

    /// Map a canon entry onto the edition's own book id.
    ///
    /// The edition's book list is cached.
    pub async fn provider_book(
        &self,
        bible_id: &str,
        entry: &CanonEntry,
    ) -> Result<ProviderBook, UpstreamError> {
        let key = ListingKey::books(bible_id);
        let books = get_or_compute(&self.cache, &key, || self.scripture.list_books(bible_id)).await?;
        crate::scripture::map_book(&books, entry)
            .cloned()
            .ok_or_else(|| UpstreamError::NoMapping(entry.name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "LECTIO_BIND_ADDR",
        "SCRIPTURE_API_URL",
        "SCRIPTURE_API_KEY",
        "SCRIPTURE_BIBLE_ID",
        "OPENAI_API_URL",
        "OPENAI_API_KEY",
        "OPENAI_MODEL",
        "LECTIO_UPSTREAM_TIMEOUT_SECS",
        "LECTIO_DEFAULT_VERSION",
        "LECTIO_LINK_STYLE",
        "LECTIO_METRICS_PORT",
    ];

    /// Helper to run config tests with isolated env vars.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:8080");
            assert_eq!(config.scripture_api_url, "https://api.scripture.api.bible/v1");
            assert_eq!(config.scripture_api_key, None);
            assert_eq!(config.scripture_bible_id, None);
            assert_eq!(config.openai_api_url, "https://api.openai.com/v1");
            assert_eq!(config.openai_api_key, None);
            assert_eq!(config.openai_model, "gpt-4o-mini");
            assert_eq!(config.upstream_timeout, Duration::from_secs(10));
            assert_eq!(config.default_version, "LSG");
            assert_eq!(config.link_style, LinkStyle::BibleGateway);
            assert_eq!(config.metrics_port, None);
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("LECTIO_BIND_ADDR", "127.0.0.1:9090"),
                ("SCRIPTURE_API_URL", "http://provider.test/v1/"),
                ("SCRIPTURE_API_KEY", "secret"),
                ("SCRIPTURE_BIBLE_ID", "a93a92589195411f-01"),
                ("OPENAI_MODEL", "gpt-4o"),
                ("LECTIO_UPSTREAM_TIMEOUT_SECS", "3"),
                ("LECTIO_DEFAULT_VERSION", "s21"),
                ("LECTIO_LINK_STYLE", "youversion"),
                ("LECTIO_METRICS_PORT", "9091"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:9090");
                assert_eq!(config.scripture_api_url, "http://provider.test/v1");
                assert_eq!(config.scripture_api_key.as_deref(), Some("secret"));
                assert_eq!(config.scripture_bible_id.as_deref(), Some("a93a92589195411f-01"));
                assert_eq!(config.openai_model, "gpt-4o");
                assert_eq!(config.upstream_timeout, Duration::from_secs(3));
                assert_eq!(config.default_version, "S21");
                assert_eq!(config.link_style, LinkStyle::YouVersion);
                assert_eq!(config.metrics_port, Some(9091));
            },
        );
    }

    #[test]
    fn config_blank_credentials_are_unset() {
        with_env_vars(&[("SCRIPTURE_API_KEY", "  "), ("OPENAI_API_KEY", "")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.scripture_api_key, None);
            assert_eq!(config.openai_api_key, None);
        });
    }

    #[test]
    fn config_rejects_bad_numbers() {
        with_env_vars(&[("LECTIO_UPSTREAM_TIMEOUT_SECS", "soon")], || {
            assert!(Config::from_env().is_err());
        });
        with_env_vars(&[("LECTIO_UPSTREAM_TIMEOUT_SECS", "0")], || {
            assert!(Config::from_env().is_err());
        });
        with_env_vars(&[("LECTIO_METRICS_PORT", "99999")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn bible_id_requires_credentials() {
        with_env_vars(&[("SCRIPTURE_BIBLE_ID", "default-01")], || {
            let state = AppState::new(Config::from_env().unwrap()).unwrap();
            assert!(matches!(
                state.bible_id(None),
                Err(ApiError::ConfigurationMissing("SCRIPTURE_API_KEY"))
            ));
        });
    }

    #[test]
    fn bible_id_prefers_request_over_default() {
        with_env_vars(
            &[("SCRIPTURE_API_KEY", "k"), ("SCRIPTURE_BIBLE_ID", "default-01")],
            || {
                let state = AppState::new(Config::from_env().unwrap()).unwrap();
                assert_eq!(state.bible_id(Some("other-02")).unwrap(), "other-02");
                assert_eq!(state.bible_id(Some(" ")).unwrap(), "default-01");
                assert_eq!(state.bible_id(None).unwrap(), "default-01");
            },
        );
        with_env_vars(&[("SCRIPTURE_API_KEY", "k")], || {
            let state = AppState::new(Config::from_env().unwrap()).unwrap();
            assert!(matches!(
                state.bible_id(None),
                Err(ApiError::ConfigurationMissing("SCRIPTURE_BIBLE_ID"))
            ));
        });
    }
}

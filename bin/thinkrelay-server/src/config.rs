//! Server configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults,
//! 2. a JSON config file (`--config`, `THINKRELAY_CONFIG`, or `./config.json`),
//! 3. `THINKRELAY_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::auth::registry::DEFAULT_TOKEN_TTL;

const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Runtime configuration for thinkrelay-server.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// Host name shown in the startup banner. Does not affect binding.
    pub public_host: String,

    /// sqlx connection string of the credential store.
    pub database_url: String,

    /// Base URL of the OpenAI-compatible provider, without `/chat/completions`.
    pub upstream_url: String,

    pub upstream_key: String,

    /// Models offered to clients. The first one is the default for relay
    /// requests that name none.
    pub models: Vec<String>,

    /// Lifetime of issued session tokens.
    pub token_ttl: Duration,

    /// Directory served as the router fallback, if any.
    pub static_dir: Option<PathBuf>,

    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,

    pub enable_swagger: bool,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are also written to a daily-rolling file here.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            public_host: "localhost".to_owned(),
            database_url: "sqlite://users.db".to_owned(),
            upstream_url: "https://api.openai.com/v1".to_owned(),
            upstream_key: String::new(),
            models: Vec::new(),
            token_ttl: DEFAULT_TOKEN_TTL,
            static_dir: None,
            cors_origins: Vec::new(),
            enable_swagger: true,
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
        }
    }
}

/// On-disk layout. Key names follow the historical `config.json` format.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    hostname: Option<String>,
    port: Option<u16>,
    #[serde(rename = "OPEN_AI_API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "OPEN_AI_API_URL")]
    api_url: Option<String>,
    available_models: Option<Vec<String>>,
    database_url: Option<String>,
    token_ttl_secs: Option<u64>,
    static_dir: Option<PathBuf>,
    cors_origins: Option<Vec<String>>,
    enable_swagger: Option<bool>,
}

impl Config {
    /// Load configuration from the process environment and an optional file.
    ///
    /// An explicitly named file (argument or `THINKRELAY_CONFIG`) must exist;
    /// the implicit `./config.json` is used only when present.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let env = |key: &str| std::env::var(key).ok();

        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env("THINKRELAY_CONFIG").map(PathBuf::from));
        let file = match named {
            Some(path) => Some(read_file(&path)?),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() { Some(read_file(fallback)?) } else { None }
            }
        };

        Ok(Self::resolve(file.unwrap_or_default(), env))
    }

    /// Layer a parsed file and an environment lookup over the defaults.
    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        // ── file ──
        if let Some(port) = file.port {
            cfg.bind_address = format!("0.0.0.0:{port}");
        }
        if let Some(host) = file.hostname {
            cfg.public_host = host;
        }
        if let Some(key) = file.api_key {
            cfg.upstream_key = key;
        }
        if let Some(url) = file.api_url {
            cfg.upstream_url = url;
        }
        if let Some(models) = file.available_models {
            cfg.models = models;
        }
        if let Some(url) = file.database_url {
            cfg.database_url = url;
        }
        if let Some(secs) = file.token_ttl_secs {
            cfg.token_ttl = Duration::from_secs(secs);
        }
        cfg.static_dir = file.static_dir.or(cfg.static_dir);
        if let Some(origins) = file.cors_origins {
            cfg.cors_origins = origins;
        }
        if let Some(enabled) = file.enable_swagger {
            cfg.enable_swagger = enabled;
        }

        // ── environment ──
        if let Some(v) = env("THINKRELAY_BIND") {
            cfg.bind_address = v;
        }
        if let Some(v) = env("THINKRELAY_DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Some(v) = env("THINKRELAY_UPSTREAM_URL") {
            cfg.upstream_url = v;
        }
        if let Some(v) = env("THINKRELAY_UPSTREAM_KEY") {
            cfg.upstream_key = v;
        }
        if let Some(v) = env("THINKRELAY_MODELS") {
            cfg.models = split_list(&v);
        }
        if let Some(secs) = env("THINKRELAY_TOKEN_TTL_SECS").and_then(|v| v.parse().ok()) {
            cfg.token_ttl = Duration::from_secs(secs);
        }
        if let Some(v) = env("THINKRELAY_STATIC_DIR") {
            cfg.static_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("THINKRELAY_CORS_ORIGINS") {
            cfg.cors_origins = split_list(&v);
        }
        if let Some(v) = env("THINKRELAY_ENABLE_SWAGGER") {
            cfg.enable_swagger = parse_flag(&v);
        }
        if let Some(v) = env("THINKRELAY_LOG") {
            cfg.log_level = v;
        }
        if let Some(v) = env("THINKRELAY_LOG_JSON") {
            cfg.log_json = parse_flag(&v);
        }
        if let Some(v) = env("THINKRELAY_LOG_DIR") {
            cfg.log_dir = Some(PathBuf::from(v));
        }

        cfg
    }

    /// Model used when a relay request names none.
    pub fn default_model(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn read_file(path: &Path) -> anyhow::Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    raw == "1" || raw.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let cfg = Config::resolve(FileConfig::default(), env_of(&[]));
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.database_url, "sqlite://users.db");
        assert_eq!(cfg.token_ttl, Duration::from_secs(300));
        assert!(cfg.enable_swagger);
        assert!(cfg.models.is_empty());
        assert_eq!(cfg.default_model(), None);
    }

    #[test]
    fn historical_file_keys_are_read() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "hostname": "chat.local",
                "port": 8080,
                "OPEN_AI_API_KEY": "sk-test",
                "OPEN_AI_API_URL": "https://api.deepseek.com",
                "available_models": ["deepseek-reasoner", "deepseek-chat"]
            }"#,
        )
        .unwrap();
        let cfg = Config::resolve(file, env_of(&[]));
        assert_eq!(cfg.bind_address, "0.0.0.0:8080");
        assert_eq!(cfg.public_host, "chat.local");
        assert_eq!(cfg.upstream_key, "sk-test");
        assert_eq!(cfg.upstream_url, "https://api.deepseek.com");
        assert_eq!(cfg.default_model(), Some("deepseek-reasoner"));
    }

    #[test]
    fn environment_overrides_file() {
        let file = FileConfig {
            port: Some(8080),
            available_models: Some(vec!["a".into()]),
            ..Default::default()
        };
        let cfg = Config::resolve(
            file,
            env_of(&[
                ("THINKRELAY_BIND", "127.0.0.1:9000"),
                ("THINKRELAY_MODELS", "x, y,,z"),
                ("THINKRELAY_TOKEN_TTL_SECS", "60"),
                ("THINKRELAY_ENABLE_SWAGGER", "false"),
                ("THINKRELAY_LOG_JSON", "1"),
            ]),
        );
        assert_eq!(cfg.bind_address, "127.0.0.1:9000");
        assert_eq!(cfg.models, vec!["x", "y", "z"]);
        assert_eq!(cfg.token_ttl, Duration::from_secs(60));
        assert!(!cfg.enable_swagger);
        assert!(cfg.log_json);
    }

    #[test]
    fn unparsable_ttl_keeps_previous_value() {
        let cfg = Config::resolve(
            FileConfig { token_ttl_secs: Some(42), ..Default::default() },
            env_of(&[("THINKRELAY_TOKEN_TTL_SECS", "soon")]),
        );
        assert_eq!(cfg.token_ttl, Duration::from_secs(42));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/thinkrelay.json"))).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }
}

//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `relay-gateway.toml` in the working directory
//! 3. Default values
//!
//! `${VAR_NAME}` inside the config file is expanded from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default config file looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "relay-gateway.toml";

/// Facebook Messenger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookConfig {
    /// Page access token used as the Send API credential
    pub page_access_token: Option<String>,

    /// Token compared against `hub.verify_token` during the handshake
    pub verify_token: String,

    /// Graph API base URL, including the version segment
    pub graph_url: String,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            page_access_token: None,
            verify_token: default_verify_token(),
            graph_url: default_graph_url(),
        }
    }
}

/// Generative-text (Gemini) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. AI replies are disabled when unset.
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// API base URL
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_gemini_url(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Main configuration for the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub facebook: FacebookConfig,

    #[serde(rename = "gemini")]
    pub llm: LlmConfig,

    pub server: ServerConfig,

    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            facebook: FacebookConfig::default(),
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_verify_token() -> String {
    "verify-token".to_string()
}

fn default_graph_url() -> String {
    "https://graph.facebook.com/v15.0".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load `.env`, then the default config file if present, otherwise the
    /// environment alone.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from defaults plus whatever `lookup` yields for
    /// the known variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file, expanding `${VAR}` references and letting the
    /// environment override file values.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let lookup = |name: &str| std::env::var(name).ok();
        let mut config = Self::from_toml_str(&content, &lookup)?;
        config.apply_overrides(&lookup);
        config.validate()?;
        Ok(config)
    }

    fn from_toml_str<F>(content: &str, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, lookup);
        let mut config: Config = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        // `${UNSET}` expands to "", which means "not configured"
        config.facebook.page_access_token = config.facebook.page_access_token.filter(|s| !s.is_empty());
        config.llm.api_key = config.llm.api_key.filter(|s| !s.is_empty());

        Ok(config)
    }

    /// Override fields from environment-style variables. Empty values are
    /// treated as unset.
    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("FACEBOOK_PAGE_ACCESS_TOKEN") {
            self.facebook.page_access_token = Some(token);
        }
        if let Some(token) = get("FACEBOOK_VERIFY_TOKEN") {
            self.facebook.verify_token = token;
        }
        if let Some(url) = get("FACEBOOK_GRAPH_URL") {
            self.facebook.graph_url = url;
        }

        if let Some(key) = get("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            self.llm.base_url = url;
        }

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }

        if let Some(secs) = get("HTTP_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(s) => self.http_timeout_secs = s,
                Err(_) => tracing::warn!("Ignoring invalid HTTP_TIMEOUT_SECS value: {}", secs),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.facebook.verify_token.is_empty() {
            return Err(Error::Config("verify token must not be empty".to_string()));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Whether a Gemini API key is configured
    pub fn llm_enabled(&self) -> bool {
        self.llm.api_key.is_some()
    }

    /// Outbound request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Listener address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Replace `${VAR_NAME}` with the value from `lookup`, or nothing when the
/// variable is unset. An unterminated `${` is kept verbatim.
fn expand_env_vars<F>(value: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() {
                    if let Some(v) = lookup(name) {
                        result.push_str(&v);
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}

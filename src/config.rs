use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::browser::BrowserSettings;
use crate::extraction::SchemaSpec;
use crate::filter::{DEFAULT_MARKETPLACE_TOKENS, RelevanceMode};
use crate::service::Limits;

pub const DEFAULT_SEARCH_URL_TEMPLATE: &str = "https://www.google.com/search?q={query}+buy+book";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub search_url_template: String,
    pub extraction_schemas: Vec<SchemaSpec>,
    pub relevance_mode: RelevanceMode,
    pub marketplace_tokens: Vec<String>,
    pub navigation_timeout: Duration,
    pub max_concurrent_sessions: usize,
    pub session_queue_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0:3000".to_string(),
            search_url_template: DEFAULT_SEARCH_URL_TEMPLATE.to_string(),
            extraction_schemas: vec![SchemaSpec::google()],
            relevance_mode: RelevanceMode::default(),
            marketplace_tokens: DEFAULT_MARKETPLACE_TOKENS.map(String::from).to_vec(),
            navigation_timeout: Duration::from_secs(20),
            max_concurrent_sessions: 4,
            session_queue_timeout: Duration::from_secs(5),
            chrome_executable: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = get("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(v) = get("SEARCH_URL_TEMPLATE") {
            config.search_url_template = v;
        }
        if let Some(v) = get("EXTRACTION_SCHEMAS") {
            config.extraction_schemas =
                serde_json::from_str(&v).context("EXTRACTION_SCHEMAS is not a valid JSON list")?;
        }
        if let Some(v) = get("RELEVANCE_MODE") {
            config.relevance_mode = RelevanceMode::from_str(&v).map_err(|e| anyhow!(e))?;
        }
        if let Some(v) = get("MARKETPLACE_TOKENS") {
            config.marketplace_tokens = v
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if let Some(v) = get("NAVIGATION_TIMEOUT_SECS") {
            config.navigation_timeout = Duration::from_secs(parse("NAVIGATION_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("MAX_CONCURRENT_SESSIONS") {
            config.max_concurrent_sessions = parse("MAX_CONCURRENT_SESSIONS", &v)?;
        }
        if let Some(v) = get("SESSION_QUEUE_TIMEOUT_SECS") {
            config.session_queue_timeout =
                Duration::from_secs(parse("SESSION_QUEUE_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("CHROME_EXECUTABLE") {
            config.chrome_executable = Some(PathBuf::from(v));
        }
        if let Some(v) = get("STATIC_DIR") {
            config.static_dir = PathBuf::from(v);
        }

        Ok(config)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            navigation_timeout: self.navigation_timeout,
            max_sessions: self.max_concurrent_sessions,
            queue_timeout: self.session_queue_timeout,
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            chrome_executable: self.chrome_executable.clone(),
            request_timeout: self.navigation_timeout,
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
}

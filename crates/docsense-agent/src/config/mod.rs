//! Configuration loading.
//!
//! Two layers, following the original deployment surface:
//!   - `docsense.toml` (optional) carries the ambient knobs: bind address,
//!     temp store, router threshold, history limits. Path from
//!     `DOCSENSE_CONFIG`, else the working directory.
//!   - Environment variables carry the model endpoint and the local-agent
//!     switch: `ARK_API_KEY`, `ARK_BASE_URL`, `ARK_MODEL`,
//!     `USE_LOCAL_AGENT`, `ROUTER_MODEL_PATH`. A `.env` file is honoured.
//!
//! Env always wins over file values.

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use docsense_common::{DocsenseError, Result};
use docsense_llm::router::PipelineTable;

pub const DEFAULT_ROUTER_MODEL: &str = "Qwen/Qwen2.5-7B-Instruct";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Shape of `docsense.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub temp: TempConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7861".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempConfig {
    #[serde(default = "default_temp_root")]
    pub root: String,
    #[serde(default = "default_temp_max_mb")]
    pub max_mb: u64,
    #[serde(default = "default_temp_ttl")]
    pub ttl_secs: u64,
}

fn default_temp_root() -> String {
    "temp".to_string()
}
fn default_temp_max_mb() -> u64 {
    300
}
fn default_temp_ttl() -> u64 {
    3600
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            root: default_temp_root(),
            max_mb: default_temp_max_mb(),
            ttl_secs: default_temp_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_router_url")]
    pub base_url: String,
    #[serde(default = "default_pipelines_path")]
    pub pipelines_path: String,
}

fn default_threshold() -> f32 {
    docsense_llm::router::DEFAULT_THRESHOLD
}
fn default_router_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_pipelines_path() -> String {
    "pipelines.json".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            base_url: default_router_url(),
            pipelines_path: default_pipelines_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Conversation rounds retained after trimming.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    /// Questions fed to the router as context.
    #[serde(default = "default_recent_questions")]
    pub recent_questions: usize,
}

fn default_max_rounds() -> usize {
    20
}
fn default_recent_questions() -> usize {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            recent_questions: default_recent_questions(),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug)]
pub struct Config {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub use_local_agent: bool,
    pub router_model: String,
    pub web: WebConfig,
    pub temp: TempConfig,
    pub router: RouterConfig,
    pub session: SessionConfig,
}

impl Config {
    /// Load `.env`, `docsense.toml` and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var("DOCSENSE_CONFIG").unwrap_or_else(|_| "docsense.toml".to_string());
        let file = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content)
                .map_err(|e| DocsenseError::Config(format!("invalid {path}: {e}")))?
        } else {
            FileConfig::default()
        };

        Self::resolve(file, &|key| std::env::var(key).ok())
    }

    /// Merge file values with an environment lookup. Separated from
    /// [`Config::load`] so tests can drive it without touching process env.
    pub fn resolve(file: FileConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = env("ARK_API_KEY")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                DocsenseError::Config(
                    "ARK_API_KEY is not set. Configure it in the environment or a .env file."
                        .to_string(),
                )
            })?;

        let model = env("ARK_MODEL").filter(|m| !m.is_empty()).ok_or_else(|| {
            DocsenseError::Config("ARK_MODEL is not set.".to_string())
        })?;

        let base_url = env("ARK_BASE_URL")
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let use_local_agent = env("USE_LOCAL_AGENT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let router_model = env("ROUTER_MODEL_PATH")
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ROUTER_MODEL.to_string());

        let mut router = file.router;
        if let Some(url) = env("DOCSENSE_ROUTER_URL").filter(|u| !u.is_empty()) {
            router.base_url = url;
        }

        let mut web = file.web;
        if let Some(bind) = env("DOCSENSE_BIND").filter(|b| !b.is_empty()) {
            web.bind = bind;
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            use_local_agent,
            router_model,
            web,
            temp: file.temp,
            router,
            session: file.session,
        })
    }
}

/// Load `pipelines.json`: pipeline name → { desc, tools }.
pub fn load_pipelines(path: &Path) -> Result<PipelineTable> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests;

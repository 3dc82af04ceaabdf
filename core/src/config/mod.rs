use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const EVREN_DIR: &str = ".evren";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.
You have access to a filesystem via tools.
IMPORTANT: When using 'list_directory' or 'read_file', you MUST provide the 'path' argument.
The current directory is denoted by '.'
Start by listing the files in '.' to orient yourself.";

/// How to launch the external tool process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: Option<HashMap<String, String>>,
    pub request_timeout_secs: u64,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            args: vec![
                "-y".to_string(),
                "@modelcontextprotocol/server-filesystem".to_string(),
                "./".to_string(),
            ],
            env: None,
            request_timeout_secs: 60,
        }
    }
}

impl McpServerConfig {
    /// Identifier shown on the dashboard.
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_iterations: usize,
    pub system_prompt: String,
    pub service_name: String,
    pub mcp: McpServerConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            max_iterations: 25,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            service_name: "mcp-langgraph-agent".to_string(),
            mcp: McpServerConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn get_evren_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(EVREN_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_evren_dir().join("config.toml")
}

impl Config {
    /// Loads the file at `path` (or the default location) and applies
    /// environment overrides. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
        let mut config = if path.exists() {
            load_config_from(&path)?
        } else {
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `lookup` is injected so tests don't have to touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("EVREN_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
        if let Some(command) = lookup("EVREN_MCP_COMMAND").filter(|v| !v.trim().is_empty()) {
            self.mcp.command = command;
        }
        if let Some(args) = lookup("EVREN_MCP_ARGS") {
            self.mcp.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(host) = lookup("EVREN_HOST").filter(|v| !v.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("EVREN_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid EVREN_PORT value: {}", port))?;
        }
        Ok(())
    }

    /// Credential lookup order: `OPENAI_API_KEY`, `EVREN_API_KEY`, then the file.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_api_key_with_fallback(&["OPENAI_API_KEY", "EVREN_API_KEY"], &self.api_key)
    }
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))
}

pub fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = std::env::var(var_name)
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found. Set {} or api_key in {}",
            env_vars.join(" / "),
            get_config_path().display()
        ))
    }
}

//! Application configuration module / 应用配置模块
//!
//! Loads the binary's configuration from config.json (current directory) or
//! an explicit path. Unlike the adapter itself, nothing here is global.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::drivers::cos::types::MAX_KEYS;
use crate::drivers::cos::CosConfig;

/// Default config file name / 默认配置文件名
pub const CONFIG_FILE: &str = "config.json";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// COS driver configuration / COS驱动配置
    pub cos: CosConfig,
    /// Keys per listing request / 每页条目数
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    MAX_KEYS
}

impl AppConfig {
    /// Parse and validate a JSON document / 解析并校验配置
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;
        config.cos.validate()?;
        if config.page_size == 0 || config.page_size > MAX_KEYS {
            return Err(anyhow!("page_size must be between 1 and {}", MAX_KEYS));
        }
        Ok(config)
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE)
}

/// Load configuration from `path`, or config.json in the working directory / 加载配置文件
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
    if !config_path.exists() {
        return Err(anyhow!("Config file not found: {:?}", config_path));
    }

    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {:?}", config_path))?;
    let config = AppConfig::from_json(&content)?;

    tracing::info!("Loaded configuration from {:?}", config_path);
    Ok(config)
}

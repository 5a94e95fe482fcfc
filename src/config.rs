//! 应用配置模块

use crate::error::{Result, SyncError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// 读取 config.json 中的某一节，文件或键不存在时返回 None
pub(crate) fn read_section<T: DeserializeOwned>(config_dir: &Path, key: &str) -> Result<Option<T>> {
    let config_file = config_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&config_file)?;
    let config: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| SyncError::Config(format!("{}: {}", config_file.display(), e)))?;

    match config.get(key) {
        Some(section) => serde_json::from_value::<T>(section.clone())
            .map(Some)
            .map_err(|e| SyncError::Config(format!("{} \"{}\": {}", config_file.display(), key, e))),
        None => Ok(None),
    }
}

/// 同步运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// 单次后端操作超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300 // 默认 5 分钟，拉取大收藏夹时较慢
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SyncSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Last.fm 凭据与参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastfmConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// 已授权的会话 key，写入 loved 时需要
    pub session_key: Option<String>,
    /// 每首歌搜索返回的最大条数
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    /// 两次请求之间的最小间隔（毫秒）
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_search_limit() -> u32 {
    30
}

fn default_request_delay_ms() -> u64 {
    200
}

impl Default for LastfmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            session_key: None,
            search_limit: default_search_limit(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

/// Subsonic 服务器配置，用户名取自端点的 owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicConfig {
    pub endpoint: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_search_count")]
    pub search_count: u32,
}

fn default_search_count() -> u32 {
    20
}

impl Default for SubsonicConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            password: None,
            search_count: default_search_count(),
        }
    }
}

/// CSV 文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvConfig {
    #[serde(default = "default_column_separator")]
    pub column_separator: char,
}

fn default_column_separator() -> char {
    ','
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            column_separator: default_column_separator(),
        }
    }
}

/// 各后端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesConfig {
    #[serde(default)]
    pub lastfm: LastfmConfig,
    #[serde(default)]
    pub subsonic: SubsonicConfig,
    #[serde(default)]
    pub csv: CsvConfig,
}

/// 应用配置
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub sync: SyncSettings,
    pub services: ServicesConfig,
}

impl AppConfig {
    /// 从配置目录加载，并应用环境变量覆盖
    pub fn load(config_dir: &Path) -> Result<Self> {
        let mut config = Self {
            sync: read_section(config_dir, "sync")?.unwrap_or_default(),
            services: read_section(config_dir, "services")?.unwrap_or_default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// 环境变量优先于配置文件
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        let lastfm = &mut self.services.lastfm;
        let subsonic = &mut self.services.subsonic;
        let overrides: [(&str, &mut Option<String>); 5] = [
            ("SYNCSONGS_LASTFM_API_KEY", &mut lastfm.api_key),
            ("SYNCSONGS_LASTFM_API_SECRET", &mut lastfm.api_secret),
            ("SYNCSONGS_LASTFM_SESSION_KEY", &mut lastfm.session_key),
            ("SYNCSONGS_SUBSONIC_ENDPOINT", &mut subsonic.endpoint),
            ("SYNCSONGS_SUBSONIC_PASSWORD", &mut subsonic.password),
        ];

        for (name, slot) in overrides {
            if let Some(value) = var(name).filter(|v| !v.trim().is_empty()) {
                tracing::debug!("使用环境变量 {}", name);
                *slot = Some(value);
            }
        }
    }
}

use std::path::PathBuf;

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod services;
pub mod ui;

pub use self::core::{DiffReport, SyncEngine, SyncOptions, SyncReport};
pub use error::{Result, ServiceError, SyncError};

/// 应用目录名
pub const APP_NAME: &str = "syncsongs";

/// 解析数据目录（配置和日志）
///
/// 优先使用命令行指定的目录；否则使用平台配置目录，
/// 其中 config.json 的 `data_path` 可以把数据目录重定向到别处。
pub fn resolve_data_dir(custom: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = custom {
        return dir;
    }

    let default_dir = dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".syncsongs"));

    std::fs::read_to_string(default_dir.join(config::CONFIG_FILE))
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|config| config.get("data_path")?.as_str().map(PathBuf::from))
        .filter(|p| p.is_dir())
        .unwrap_or(default_dir)
}

pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".config"))
                })
        }
    }
}

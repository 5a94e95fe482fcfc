//! 错误类型与退出码

use crate::core::endpoint::EndpointKey;
use crate::core::song::SongError;
use std::fmt;
use thiserror::Error;

/// 进程退出码
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// 用户输入错误（端点格式、端点数量、配置）
    pub const INPUT: i32 = 2;
    /// 不支持的服务 / 类型 / 动作
    pub const UNSUPPORTED: i32 = 3;
    /// 后端或网络失败
    pub const BACKEND: i32 = 4;
    /// 用户主动退出
    pub const QUIT: i32 = 5;
}

/// 后端适配器返回的错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl ServiceError {
    pub fn unavailable(msg: impl fmt::Display) -> Self {
        Self::BackendUnavailable(msg.to_string())
    }

    pub fn auth(msg: impl fmt::Display) -> Self {
        Self::AuthenticationFailed(msg.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::BackendUnavailable(format!("request timed out: {}", e))
        } else {
            Self::BackendUnavailable(e.to_string())
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AuthenticationFailed(e.to_string()),
            _ => Self::BackendUnavailable(e.to_string()),
        }
    }
}

/// 后端操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Search,
    Add,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Fetch => write!(f, "fetch"),
            Operation::Search => write!(f, "search"),
            Operation::Add => write!(f, "add"),
        }
    }
}

/// 编排器错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidSong(#[from] SongError),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("you must supply at least two distinct endpoints (got {0})")]
    InsufficientEndpoints(usize),

    #[error("{0} is not supported")]
    UnsupportedService(String),

    #[error("{collection} for {service} is not supported")]
    UnsupportedType { service: String, collection: String },

    #[error("{action} to {collection} for {service} is not supported")]
    UnsupportedAction {
        service: String,
        collection: String,
        action: crate::core::direction::Action,
    },

    #[error("failed to initialize {endpoint}: {source}")]
    ServiceInitializationFailed {
        endpoint: EndpointKey,
        #[source]
        source: ServiceError,
    },

    #[error("failed to {operation} {endpoint}: {source}")]
    Backend {
        endpoint: EndpointKey,
        operation: Operation,
        #[source]
        source: ServiceError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("quit")]
    Quit,
}

impl SyncError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::InvalidSong(_)
            | SyncError::MalformedInput(_)
            | SyncError::InsufficientEndpoints(_)
            | SyncError::Config(_) => exit_code::INPUT,
            SyncError::UnsupportedService(_)
            | SyncError::UnsupportedType { .. }
            | SyncError::UnsupportedAction { .. } => exit_code::UNSUPPORTED,
            SyncError::ServiceInitializationFailed { .. }
            | SyncError::Backend { .. }
            | SyncError::Io(_)
            | SyncError::Worker(_) => exit_code::BACKEND,
            SyncError::Quit => exit_code::QUIT,
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

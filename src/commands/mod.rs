//! 命令行入口

pub mod diff;
pub mod services;
pub mod sync;

use crate::config::AppConfig;
use crate::error::Result;
use crate::services::{DefaultServiceFactory, ServiceFactory};
use std::sync::Arc;

pub use diff::run_diff;
pub use services::run_services;
pub use sync::run_sync;

/// 根据配置创建内置后端工厂
pub fn default_factory(config: AppConfig) -> Result<Arc<dyn ServiceFactory>> {
    Ok(Arc::new(DefaultServiceFactory::new(config)?))
}

use crate::core::{SyncEngine, SyncOptions};
use crate::error::Result;
use crate::services::ServiceFactory;
use std::sync::Arc;

/// 对比端点，返回每个端点缺少的歌曲
pub async fn run_diff(
    factory: Arc<dyn ServiceFactory>,
    endpoints: &[String],
    options: SyncOptions,
    verbose: bool,
) -> Result<String> {
    let engine = SyncEngine::new(factory, options);
    let report = engine.diff(endpoints).await?;
    Ok(report.render(verbose))
}

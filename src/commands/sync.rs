use crate::core::{SyncEngine, SyncOptions};
use crate::error::Result;
use crate::services::ServiceFactory;
use crate::ui::Ui;
use std::sync::Arc;

/// 同步端点，返回报告文本
pub async fn run_sync(
    factory: Arc<dyn ServiceFactory>,
    endpoints: &[String],
    options: SyncOptions,
    verbose: bool,
    ui: &mut dyn Ui,
) -> Result<String> {
    let engine = SyncEngine::new(factory, options);
    let report = engine.sync(endpoints, ui).await?;
    Ok(report.render(verbose))
}

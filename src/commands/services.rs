use crate::services::ServiceFactory;

/// 列出支持的服务、集合类型和动作
pub fn run_services(factory: &dyn ServiceFactory) -> String {
    factory.supported_services().to_string()
}

pub mod csv;
pub mod lastfm;
pub mod subsonic;

use crate::config::AppConfig;
use crate::core::direction::Action;
use crate::core::endpoint::EndpointKey;
use crate::core::song::Song;
use crate::core::song_set::SongSet;
use crate::error::{Result, ServiceError, SyncError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use self::csv::CsvService;
pub use lastfm::LastfmService;
pub use subsonic::SubsonicService;

/// 歌曲集合后端接口
///
/// 编排器只通过这个接口访问后端，新增后端不需要改动编排器。
#[async_trait]
pub trait SongService: Send + Sync {
    /// 拉取指定类型的集合
    async fn fetch(&self, collection: &str) -> Result<SongSet, ServiceError>;

    /// 在后端曲库中查找候选歌曲，返回后端自己的条目（带后端元数据和 id）
    ///
    /// strict 为 true 时只保留同一首歌，否则保留相似的歌。
    async fn search(&self, candidates: &SongSet, strict: bool) -> Result<SongSet, ServiceError>;

    /// 添加歌曲，返回后端确认添加成功的部分
    async fn add(&self, collection: &str, songs: &SongSet) -> Result<SongSet, ServiceError>;

    /// 获取后端名称（用于日志）
    fn name(&self) -> &str;
}

/// 按搜索模式过滤曲库条目：严格模式只要同一首歌，否则要相似的歌
///
/// 同一首歌排在相似结果之前，使集合保留的代表条目来自严格匹配。
pub fn filter_matches<I>(candidate: &Song, hits: I, strict: bool) -> Vec<Song>
where
    I: IntoIterator<Item = Song>,
{
    let (mut exact, similar): (Vec<_>, Vec<_>) = hits
        .into_iter()
        .filter(|hit| candidate.similar(hit))
        .partition(|hit| hit == candidate);

    if !strict {
        exact.extend(similar);
    }
    exact
}

/// 后端支持矩阵：service -> (collection -> action)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupportMatrix {
    services: BTreeMap<String, BTreeMap<String, Action>>,
}

impl SupportMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, service: &str, collection: &str, action: Action) {
        self.services
            .entry(service.to_lowercase())
            .or_default()
            .insert(collection.to_lowercase(), action);
    }

    /// 端点对应后端声明的动作
    pub fn declared(&self, key: &EndpointKey) -> Result<Action> {
        let types = self
            .services
            .get(&key.service_name())
            .ok_or_else(|| SyncError::UnsupportedService(key.service.clone()))?;

        types
            .get(&key.collection_name())
            .copied()
            .ok_or_else(|| SyncError::UnsupportedType {
                service: key.service.clone(),
                collection: key.collection.clone(),
            })
    }

    /// 检查后端是否支持端点所需的访问模式
    pub fn check(&self, key: &EndpointKey, required: Action) -> Result<()> {
        if self.declared(key)?.permits(required) {
            Ok(())
        } else {
            Err(SyncError::UnsupportedAction {
                service: key.service.clone(),
                collection: key.collection.clone(),
                action: required,
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, Action>)> {
        self.services.iter()
    }
}

impl fmt::Display for SupportMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (service, types) in &self.services {
            let types: Vec<String> = types
                .iter()
                .map(|(collection, action)| format!("{} {}", collection, action))
                .collect();
            writeln!(f, "{}: {}", service, types.join(", "))?;
        }
        Ok(())
    }
}

/// 内置后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Csv,
    Lastfm,
    Subsonic,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Csv, ServiceKind::Lastfm, ServiceKind::Subsonic];

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Csv => "csv",
            ServiceKind::Lastfm => "lastfm",
            ServiceKind::Subsonic => "subsonic",
        }
    }

    /// 静态声明的集合类型和支持的动作
    pub fn supported_types(self) -> &'static [(&'static str, Action)] {
        match self {
            ServiceKind::Csv => &[("library", Action::ReadWrite)],
            ServiceKind::Lastfm => &[("loved", Action::ReadWrite), ("favorites", Action::ReadWrite)],
            ServiceKind::Subsonic => &[("favorites", Action::ReadWrite)],
        }
    }

    /// 所有内置后端的支持矩阵
    pub fn support_matrix() -> SupportMatrix {
        let mut matrix = SupportMatrix::new();
        for kind in Self::ALL {
            for (collection, action) in kind.supported_types() {
                matrix.declare(kind.name(), collection, *action);
            }
        }
        matrix
    }
}

impl FromStr for ServiceKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SyncError::UnsupportedService(s.to_string()))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 后端工厂，编排器通过它解析端点对应的后端实例
#[async_trait]
pub trait ServiceFactory: Send + Sync {
    fn supported_services(&self) -> SupportMatrix;

    /// 根据端点和所需访问模式创建后端并完成登录
    async fn create(
        &self,
        endpoint: &EndpointKey,
        access: Action,
    ) -> Result<Arc<dyn SongService>, ServiceError>;
}

/// 根据配置创建内置后端
pub struct DefaultServiceFactory {
    config: AppConfig,
    http: reqwest::Client,
}

impl DefaultServiceFactory {
    pub fn new(config: AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("syncsongs/", env!("CARGO_PKG_VERSION")))
            .timeout(config.sync.timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl ServiceFactory for DefaultServiceFactory {
    fn supported_services(&self) -> SupportMatrix {
        ServiceKind::support_matrix()
    }

    async fn create(
        &self,
        endpoint: &EndpointKey,
        access: Action,
    ) -> Result<Arc<dyn SongService>, ServiceError> {
        let kind = ServiceKind::from_str(&endpoint.service)
            .map_err(|e| ServiceError::unavailable(e.to_string()))?;

        match kind {
            ServiceKind::Csv => {
                tracing::info!("初始化 CSV 文件: {}", endpoint.owner);
                Ok(Arc::new(CsvService::new(
                    &endpoint.owner,
                    self.config.services.csv.column_separator,
                )) as Arc<dyn SongService>)
            }
            ServiceKind::Lastfm => {
                tracing::info!("初始化 Last.fm: user={}", endpoint.owner);
                Ok(Arc::new(LastfmService::connect(
                    self.http.clone(),
                    &endpoint.owner,
                    &self.config.services.lastfm,
                    access,
                )?) as Arc<dyn SongService>)
            }
            ServiceKind::Subsonic => {
                tracing::info!("初始化 Subsonic: user={}", endpoint.owner);
                Ok(Arc::new(
                    SubsonicService::connect(
                        self.http.clone(),
                        &endpoint.owner,
                        &self.config.services.subsonic,
                    )
                    .await?,
                ) as Arc<dyn SongService>)
            }
        }
    }
}

use crate::core::direction::{derive_access, Action, Direction, DirectionEdge};
use crate::core::endpoint::EndpointTable;
use crate::core::report::{DiffReport, SyncReport};
use crate::core::song_set::SongSet;
use crate::error::{Operation, Result, ServiceError, SyncError};
use crate::services::{ServiceFactory, SongService, SupportMatrix};
use crate::ui::{AddAnswer, Ui};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 单次后端操作超时
    pub timeout: Duration,
    /// 预设的方向，每对端点一个字符
    pub directions: Option<String>,
    /// 不询问偏好，全部自动添加
    pub batch: bool,
    /// 使用相似匹配代替严格匹配
    pub wide_search: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            directions: None,
            batch: false,
            wide_search: false,
        }
    }
}

type Services = Vec<Arc<dyn SongService>>;

/// 给后端调用加超时
async fn with_timeout<T, F>(timeout: Duration, fut: F) -> std::result::Result<T, ServiceError>
where
    F: Future<Output = std::result::Result<T, ServiceError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::unavailable(format!(
            "timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// 等待一个阶段的所有任务完成
///
/// 按完成顺序取第一个错误，其余任务仍然等待结束，结果丢弃。
async fn join_phase<T: Send + 'static>(
    phase: &str,
    mut workers: JoinSet<Result<T>>,
) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(workers.len());
    let mut first_error: Option<SyncError> = None;

    while let Some(joined) = workers.join_next().await {
        let outcome = joined.map_err(SyncError::from).and_then(|r| r);
        match outcome {
            Ok(value) => results.push(value),
            Err(e) if first_error.is_none() => {
                error!("{}阶段失败: {}", phase, e);
                first_error = Some(e);
            }
            Err(e) => debug!("{}阶段的后续错误被忽略: {}", phase, e),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

/// 同步引擎
pub struct SyncEngine {
    factory: Arc<dyn ServiceFactory>,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(factory: Arc<dyn ServiceFactory>, options: SyncOptions) -> Self {
        Self { factory, options }
    }

    /// 运行同步
    pub async fn sync<S: AsRef<str>>(&self, specs: &[S], ui: &mut dyn Ui) -> Result<SyncReport> {
        let started_at = chrono::Utc::now();
        let mut table = EndpointTable::from_specs(specs)?;
        info!("开始同步: {} 个端点", table.len());

        let matrix = self.factory.supported_services();
        let declared = Self::declared_actions(&table, &matrix)?;
        let edges = self.elicit_directions(&table, &declared, ui)?;

        for (i, access) in derive_access(table.len(), &edges).into_iter().enumerate() {
            table[i].access = access;
        }
        Self::validate_access(&table, &matrix)?;

        let services = self.instantiate(&table).await?;
        self.collect_preferences(&mut table, ui)?;
        self.fetch_all(&mut table, &services).await?;
        self.search_all(&mut table, &services, &edges).await?;
        Self::select(&mut table, ui)?;
        self.add_all(&mut table, &services).await?;

        let report = SyncReport::from_table(started_at, &table);
        info!("同步完成: 共添加 {} 首歌", report.total_added());
        Ok(report)
    }

    /// 只读对比，报告每个端点缺少的歌曲
    pub async fn diff<S: AsRef<str>>(&self, specs: &[S]) -> Result<DiffReport> {
        let started_at = chrono::Utc::now();
        let mut table = EndpointTable::from_specs(specs)?;
        info!("开始对比: {} 个端点", table.len());

        let matrix = self.factory.supported_services();
        Self::declared_actions(&table, &matrix)?;
        for endpoint in table.iter_mut() {
            endpoint.access = Some(Action::Read);
            endpoint.strict_search = !self.options.wide_search;
        }
        Self::validate_access(&table, &matrix)?;

        let edges = table
            .pairs()
            .into_iter()
            .map(|(l, r)| DirectionEdge::new(l, r, Direction::Both))
            .collect::<Result<Vec<_>>>()?;

        let services = self.instantiate(&table).await?;
        self.fetch_all(&mut table, &services).await?;
        self.search_all(&mut table, &services, &edges).await?;

        let report = DiffReport::from_table(started_at, &table);
        info!("对比完成: {}", if report.in_sync() { "一致" } else { "有差异" });
        Ok(report)
    }

    /// 检查服务和类型，返回后端声明的动作
    fn declared_actions(table: &EndpointTable, matrix: &SupportMatrix) -> Result<Vec<Action>> {
        table.iter().map(|e| matrix.declared(&e.key)).collect()
    }

    fn validate_access(table: &EndpointTable, matrix: &SupportMatrix) -> Result<()> {
        for endpoint in table.iter() {
            if let Some(access) = endpoint.access {
                matrix.check(&endpoint.key, access)?;
            }
        }
        Ok(())
    }

    /// 每对端点确定一个方向，优先使用预设
    fn elicit_directions(
        &self,
        table: &EndpointTable,
        declared: &[Action],
        ui: &mut dyn Ui,
    ) -> Result<Vec<DirectionEdge>> {
        let pairs = table.pairs();
        let preset: Option<Vec<char>> = self
            .options
            .directions
            .as_ref()
            .map(|d| d.chars().filter(|c| !c.is_whitespace()).collect());

        if let Some(preset) = &preset {
            if preset.len() != pairs.len() {
                return Err(SyncError::MalformedInput(format!(
                    "{} endpoints need {} directions, got {}",
                    table.len(),
                    pairs.len(),
                    preset.len()
                )));
            }
        }

        let mut edges = Vec::with_capacity(pairs.len());
        for (n, (l, r)) in pairs.into_iter().enumerate() {
            let (left, right) = (&table[l].key, &table[r].key);
            let enabled = Direction::enabled(declared[l], declared[r]);
            if enabled.is_empty() {
                return Err(Self::no_direction(table, declared, l, r));
            }

            let direction = match preset.as_ref().map(|p| p[n]) {
                Some(c) => Direction::from_symbol(c)
                    .filter(|d| enabled.contains(d))
                    .ok_or_else(|| {
                        SyncError::MalformedInput(format!(
                            "direction {:?} is not possible between {} and {}",
                            c, left, right
                        ))
                    })?,
                None => ui.ask_direction(left, right, &enabled)?,
            };

            debug!("方向: {} {} {}", left, direction, right);
            edges.push(DirectionEdge::new(l, r, direction)?);
        }
        Ok(edges)
    }

    /// 两端都不可写时缺少写入，否则缺少读取
    fn no_direction(table: &EndpointTable, declared: &[Action], l: usize, r: usize) -> SyncError {
        let action = if declared[l].can_write() || declared[r].can_write() {
            Action::Read
        } else {
            Action::Write
        };
        let lacks = |i: usize| !declared[i].permits(action);
        let blamed = if lacks(r) || !lacks(l) { r } else { l };
        let key = &table[blamed].key;
        SyncError::UnsupportedAction {
            service: key.service.clone(),
            collection: key.collection.clone(),
            action,
        }
    }

    /// 创建所有后端，失败时不运行任何端点
    async fn instantiate(&self, table: &EndpointTable) -> Result<Services> {
        let mut workers: JoinSet<Result<(usize, Arc<dyn SongService>)>> = JoinSet::new();
        for (i, endpoint) in table.iter().enumerate() {
            let factory = self.factory.clone();
            let key = endpoint.key.clone();
            let access = endpoint.access.unwrap_or(Action::Read);
            let timeout = self.options.timeout;

            workers.spawn(async move {
                let service = with_timeout(timeout, factory.create(&key, access))
                    .await
                    .map_err(|source| SyncError::ServiceInitializationFailed {
                        endpoint: key.clone(),
                        source,
                    })?;
                debug!("后端就绪: {} ({})", service.name(), access);
                Ok((i, service))
            });
        }

        let mut created = join_phase("初始化", workers).await?;
        created.sort_by_key(|(i, _)| *i);
        Ok(created.into_iter().map(|(_, service)| service).collect())
    }

    fn collect_preferences(&self, table: &mut EndpointTable, ui: &mut dyn Ui) -> Result<()> {
        for endpoint in table.iter_mut().filter(|e| e.can_write()) {
            if self.options.batch {
                endpoint.strict_search = !self.options.wide_search;
                endpoint.interactive = false;
            } else {
                endpoint.strict_search = ui.ask_strict_search(&endpoint.key)?;
                endpoint.interactive = ui.ask_interactive(&endpoint.key)?;
            }
        }
        Ok(())
    }

    /// 并发拉取所有端点
    async fn fetch_all(&self, table: &mut EndpointTable, services: &Services) -> Result<()> {
        let mut workers: JoinSet<Result<(usize, SongSet)>> = JoinSet::new();
        for (i, endpoint) in table.iter().enumerate() {
            let service = services[i].clone();
            let key = endpoint.key.clone();
            let timeout = self.options.timeout;

            workers.spawn(async move {
                let songs = with_timeout(timeout, service.fetch(&key.collection_name()))
                    .await
                    .map_err(|source| SyncError::Backend {
                        endpoint: key.clone(),
                        operation: Operation::Fetch,
                        source,
                    })?;
                info!("拉取 {}: {} 首", key, songs.len());
                Ok((i, songs))
            });
        }

        for (i, songs) in join_phase("拉取", workers).await? {
            table[i].current = songs;
        }
        Ok(())
    }

    /// 每条边的每个写入方各一个任务，在写入方的曲库中查找对方独有的歌曲
    async fn search_all(
        &self,
        table: &mut EndpointTable,
        services: &Services,
        edges: &[DirectionEdge],
    ) -> Result<()> {
        let merged = Arc::new(Mutex::new(vec![SongSet::new(); table.len()]));
        let mut workers: JoinSet<Result<()>> = JoinSet::new();

        for edge in edges {
            let sides = [
                (edge.direction.writes_left(), edge.left, edge.right),
                (edge.direction.writes_right(), edge.right, edge.left),
            ];
            for (writes, target, source) in sides {
                if !writes {
                    continue;
                }
                let candidates = table[target].current.exclusive_to(&table[source].current);
                let key = table[target].key.clone();
                if candidates.is_empty() {
                    debug!("{} 没有需要查找的歌曲 (来自 {})", key, table[source].key);
                    continue;
                }

                let service = services[target].clone();
                let strict = table[target].strict_search;
                let merged = merged.clone();
                let timeout = self.options.timeout;

                workers.spawn(async move {
                    let found = with_timeout(timeout, service.search(&candidates, strict))
                        .await
                        .map_err(|source| SyncError::Backend {
                            endpoint: key.clone(),
                            operation: Operation::Search,
                            source,
                        })?;
                    debug!(
                        "查找 {}: {} 个候选, 找到 {} 首",
                        key,
                        candidates.len(),
                        found.len()
                    );
                    merged.lock().await[target].merge(found);
                    Ok(())
                });
            }
        }

        join_phase("查找", workers).await?;

        let results = std::mem::take(&mut *merged.lock().await);
        for (endpoint, found) in table.iter_mut().zip(results) {
            endpoint.search_result = found;
        }
        Ok(())
    }

    /// 决定每个可写端点要添加的歌曲
    fn select(table: &mut EndpointTable, ui: &mut dyn Ui) -> Result<()> {
        for endpoint in table.iter_mut().filter(|e| e.can_write()) {
            if !endpoint.interactive {
                endpoint.to_add = endpoint.search_result.clone();
                continue;
            }
            if endpoint.search_result.is_empty() {
                ui.message(&format!("{}: no songs to add", endpoint.key));
                continue;
            }

            let mut chosen = SongSet::new();
            for song in endpoint.search_result.iter() {
                match ui.ask_add_song(&endpoint.key, song)? {
                    AddAnswer::Yes => {
                        chosen.insert(song.clone());
                    }
                    AddAnswer::No => {}
                    AddAnswer::Quit => {
                        debug!("{} 停止确认, 保留 {} 首", endpoint.key, chosen.len());
                        break;
                    }
                }
            }
            endpoint.to_add = chosen;
        }
        Ok(())
    }

    /// 并发添加，已添加的歌曲不会回滚
    async fn add_all(&self, table: &mut EndpointTable, services: &Services) -> Result<()> {
        let mut workers: JoinSet<Result<(usize, SongSet)>> = JoinSet::new();
        for (i, endpoint) in table.iter().enumerate() {
            if !endpoint.can_write() || endpoint.to_add.is_empty() {
                continue;
            }
            let service = services[i].clone();
            let key = endpoint.key.clone();
            let songs = endpoint.to_add.clone();
            let timeout = self.options.timeout;

            workers.spawn(async move {
                let added = with_timeout(timeout, service.add(&key.collection_name(), &songs))
                    .await
                    .map_err(|source| SyncError::Backend {
                        endpoint: key.clone(),
                        operation: Operation::Add,
                        source,
                    })?;
                if added.len() < songs.len() {
                    warn!("{}: {} 首中只添加了 {} 首", key, songs.len(), added.len());
                } else {
                    info!("添加到 {}: {} 首", key, added.len());
                }
                Ok((i, added))
            });
        }

        for (i, added) in join_phase("添加", workers).await? {
            table[i].added = added;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::endpoint::EndpointKey;
    use crate::core::song::Song;
    use crate::core::testing::{FakeFactory, MemoryService, ScriptedUi};
    use pretty_assertions::assert_eq;

    fn song(name: &str, artist: &str) -> Song {
        Song::new(name, artist).unwrap()
    }

    fn batch() -> SyncOptions {
        SyncOptions {
            batch: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_two_way_batch_sync_adds_on_both_sides() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[song("Heroes", "David Bowie")]))
            .with(MemoryService::open("bob", &[song("Changes", "David Bowie")]));
        let calls = factory.calls();
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let mut ui = ScriptedUi::new().directions(&[Direction::Both]);
        let report = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap();

        let alice = report.summary(&EndpointKey::new("alice", "memory", "favorites")).unwrap();
        assert_eq!(alice.songs, vec![song("Changes", "David Bowie")]);
        let bob = report.summary(&EndpointKey::new("bob", "memory", "favorites")).unwrap();
        assert_eq!(bob.songs, vec![song("Heroes", "David Bowie")]);
        assert_eq!(calls.count("add"), 2);
        assert_eq!(ui.asked_preferences(), 0);
    }

    #[tokio::test]
    async fn test_one_way_sync_only_writes_target() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[song("Heroes", "David Bowie")]))
            .with(MemoryService::open("bob", &[song("Changes", "David Bowie")]));
        let calls = factory.calls();
        let options = SyncOptions {
            directions: Some(">".to_string()),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);

        let report = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ScriptedUi::new())
            .await
            .unwrap();

        assert_eq!(report.total_added(), 1);
        assert_eq!(calls.matching("add"), vec!["add bob 1".to_string()]);
        assert_eq!(calls.matching("search"), vec!["search bob 1".to_string()]);
    }

    #[tokio::test]
    async fn test_unsupported_type_fails_before_fetch() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]));
        let calls = factory.calls();
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let err = engine
            .sync(&["alice:memory:favorites", "bob:memory:playlists"], &mut ScriptedUi::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::UnsupportedType { .. }));
        assert!(calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_identical_diff_reports_nothing_missing() {
        let songs = [song("Heroes", "David Bowie"), song("Changes", "David Bowie")];
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &songs))
            .with(MemoryService::open("bob", &songs));
        let calls = factory.calls();
        let engine = SyncEngine::new(Arc::new(factory), SyncOptions::default());

        let report = engine
            .diff(&["alice:memory:favorites", "bob:memory:favorites"])
            .await
            .unwrap();

        assert!(report.in_sync());
        assert_eq!(calls.count("search"), 0);
        assert_eq!(calls.count("add"), 0);
        assert_eq!(calls.matching("create"), vec!["create alice r", "create bob r"]);
    }

    #[tokio::test]
    async fn test_diff_reports_missing_per_endpoint() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[song("Heroes", "David Bowie")]))
            .with(MemoryService::open("bob", &[]));
        let engine = SyncEngine::new(Arc::new(factory), SyncOptions::default());

        let report = engine
            .diff(&["alice:memory:favorites", "bob:memory:favorites"])
            .await
            .unwrap();

        let bob = report.summary(&EndpointKey::new("bob", "memory", "favorites")).unwrap();
        assert_eq!(bob.songs, vec![song("Heroes", "David Bowie")]);
        assert!(report
            .summary(&EndpointKey::new("alice", "memory", "favorites"))
            .unwrap()
            .songs
            .is_empty());
    }

    #[tokio::test]
    async fn test_interactive_all_no_adds_nothing() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open(
                "bob",
                &[song("Heroes", "David Bowie"), song("Changes", "David Bowie")],
            ));
        let calls = factory.calls();
        let engine = SyncEngine::new(Arc::new(factory), SyncOptions::default());

        let mut ui = ScriptedUi::new()
            .directions(&[Direction::RightToLeft])
            .interactive(true)
            .answers(&[AddAnswer::No, AddAnswer::No]);
        let report = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap();

        assert_eq!(calls.count("add"), 0);
        assert_eq!(report.total_added(), 0);
        assert!(report.render(false).contains("alice memory favorites: nothing done"));
    }

    #[tokio::test]
    async fn test_interactive_quit_keeps_confirmed_prefix() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open(
                "bob",
                &[
                    song("A Song", "Artist"),
                    song("B Song", "Artist"),
                    song("C Song", "Artist"),
                ],
            ));
        let engine = SyncEngine::new(Arc::new(factory), SyncOptions::default());

        let mut ui = ScriptedUi::new()
            .directions(&[Direction::RightToLeft])
            .interactive(true)
            .answers(&[AddAnswer::Yes, AddAnswer::Quit, AddAnswer::Yes]);
        let report = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap();

        let alice = report.summary(&EndpointKey::new("alice", "memory", "favorites")).unwrap();
        assert_eq!(alice.songs, vec![song("A Song", "Artist")]);
        assert_eq!(ui.remaining_answers(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_names_endpoint_and_skips_add() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[song("Heroes", "David Bowie")]))
            .with(MemoryService::open("bob", &[]).failing_fetch(ServiceError::unavailable("down")));
        let calls = factory.calls();
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let mut ui = ScriptedUi::new().directions(&[Direction::Both]);
        let err = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap_err();

        match err {
            SyncError::Backend {
                endpoint,
                operation,
                ..
            } => {
                assert_eq!(endpoint, EndpointKey::new("bob", "memory", "favorites"));
                assert_eq!(operation, Operation::Fetch);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(calls.count("search"), 0);
        assert_eq!(calls.count("add"), 0);
    }

    #[tokio::test]
    async fn test_initialization_failure_wraps_cause() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]).failing_create(ServiceError::auth("bad token")));
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let mut ui = ScriptedUi::new().directions(&[Direction::Both]);
        let err = engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::ServiceInitializationFailed {
                source: ServiceError::AuthenticationFailed(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_preset_direction_must_be_enabled() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]))
            .declare("memory", "history", Action::Read);
        let calls = factory.calls();

        let options = SyncOptions {
            directions: Some("<".to_string()),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        let err = engine
            .sync(&["alice:memory:history", "bob:memory:favorites"], &mut ScriptedUi::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedInput(_)));
        assert!(calls.all().is_empty());
    }

    #[tokio::test]
    async fn test_preset_direction_count_must_match_pairs() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("a", &[]))
            .with(MemoryService::open("b", &[]))
            .with(MemoryService::open("c", &[]));
        let options = SyncOptions {
            directions: Some("==".to_string()),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        let err = engine
            .sync(
                &["a:memory:favorites", "b:memory:favorites", "c:memory:favorites"],
                &mut ScriptedUi::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_strict_search_skips_similar_catalog_entries() {
        let factory = FakeFactory::new()
            .with(MemoryService::catalog(
                "alice",
                &[],
                &[song("Heroes (Live)", "David Bowie")],
            ))
            .with(MemoryService::open("bob", &[song("Heroes", "David Bowie")]));
        let engine = SyncEngine::new(Arc::new(factory), batch());
        let report = engine
            .sync(
                &["alice:memory:favorites", "bob:memory:favorites"],
                &mut ScriptedUi::new().directions(&[Direction::RightToLeft]),
            )
            .await
            .unwrap();
        assert_eq!(report.total_added(), 0);

        let factory = FakeFactory::new()
            .with(MemoryService::catalog(
                "alice",
                &[],
                &[song("Heroes (Live)", "David Bowie")],
            ))
            .with(MemoryService::open("bob", &[song("Heroes", "David Bowie")]));
        let options = SyncOptions {
            wide_search: true,
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        let report = engine
            .sync(
                &["alice:memory:favorites", "bob:memory:favorites"],
                &mut ScriptedUi::new().directions(&[Direction::RightToLeft]),
            )
            .await
            .unwrap();
        let alice = report.summary(&EndpointKey::new("alice", "memory", "favorites")).unwrap();
        assert_eq!(alice.songs, vec![song("Heroes (Live)", "David Bowie")]);
    }

    #[tokio::test]
    async fn test_access_modes_from_mixed_edges() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("a", &[]))
            .with(MemoryService::open("b", &[]))
            .with(MemoryService::open("c", &[]));
        let calls = factory.calls();
        let options = SyncOptions {
            directions: Some("<>=".to_string()),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        engine
            .sync(
                &["a:memory:favorites", "b:memory:favorites", "c:memory:favorites"],
                &mut ScriptedUi::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            calls.matching("create"),
            vec!["create a rw", "create b rw", "create c rw"]
        );
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]).delayed(Duration::from_secs(5)));
        let options = SyncOptions {
            timeout: Duration::from_millis(50),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        let err = engine
            .sync(
                &["alice:memory:favorites", "bob:memory:favorites"],
                &mut ScriptedUi::new().directions(&[Direction::Both]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Backend {
                operation: Operation::Fetch,
                source: ServiceError::BackendUnavailable(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_one_endpoint_collects_from_two_peers() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("a", &[]))
            .with(MemoryService::open("b", &[song("Heroes", "David Bowie")]))
            .with(MemoryService::open("c", &[song("Roxanne", "The Police")]));
        let calls = factory.calls();
        let options = SyncOptions {
            directions: Some("<<=".to_string()),
            ..batch()
        };
        let engine = SyncEngine::new(Arc::new(factory), options);
        let report = engine
            .sync(
                &["a:memory:favorites", "b:memory:favorites", "c:memory:favorites"],
                &mut ScriptedUi::new(),
            )
            .await
            .unwrap();

        let a = report.summary(&EndpointKey::new("a", "memory", "favorites")).unwrap();
        assert_eq!(
            a.songs,
            vec![song("Heroes", "David Bowie"), song("Roxanne", "The Police")]
        );
        assert_eq!(calls.matching("add a"), vec!["add a 2".to_string()]);
        assert_eq!(report.total_added(), 4);
    }

    #[tokio::test]
    async fn test_write_only_pair_reports_missing_read() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]))
            .declare("memory", "inbox", Action::Write)
            .declare("memory", "outbox", Action::Write);
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let err = engine
            .sync(&["alice:memory:inbox", "bob:memory:outbox"], &mut ScriptedUi::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnsupportedAction { ref collection, action: Action::Read, .. }
                if collection == "outbox"
        ));
    }

    #[tokio::test]
    async fn test_read_only_pair_reports_missing_write() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]))
            .declare("memory", "history", Action::Read);
        let engine = SyncEngine::new(Arc::new(factory), batch());

        let err = engine
            .sync(&["alice:memory:history", "bob:memory:history"], &mut ScriptedUi::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnsupportedAction { action: Action::Write, .. }
        ));
    }

    #[tokio::test]
    async fn test_interactive_empty_result_tells_user() {
        let factory = FakeFactory::new()
            .with(MemoryService::open("alice", &[]))
            .with(MemoryService::open("bob", &[]));
        let engine = SyncEngine::new(Arc::new(factory), SyncOptions::default());

        let mut ui = ScriptedUi::new()
            .directions(&[Direction::RightToLeft])
            .interactive(true);
        engine
            .sync(&["alice:memory:favorites", "bob:memory:favorites"], &mut ui)
            .await
            .unwrap();

        assert_eq!(ui.messages, vec!["alice memory favorites: no songs to add".to_string()]);
    }
}

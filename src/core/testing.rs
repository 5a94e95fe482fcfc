//! 编排器测试用的内存后端、工厂和脚本化交互

use crate::core::direction::{Action, Direction};
use crate::core::endpoint::EndpointKey;
use crate::core::song::Song;
use crate::core::song_set::SongSet;
use crate::error::{Result, ServiceError, SyncError};
use crate::services::{filter_matches, ServiceFactory, SongService, SupportMatrix};
use crate::ui::{AddAnswer, Ui};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 记录后端调用，如 `fetch alice`、`add bob 2`
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn record(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// 以 prefix 开头的调用，排序后返回（任务完成顺序不固定）
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        let mut calls: Vec<String> = self
            .all()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect();
        calls.sort();
        calls
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }
}

pub struct MemoryService {
    owner: String,
    songs: Mutex<SongSet>,
    /// None 表示可以存任何歌曲
    catalog: Option<SongSet>,
    fail_fetch: Option<ServiceError>,
    fail_create: Option<ServiceError>,
    delay: Option<Duration>,
    log: CallLog,
}

impl MemoryService {
    pub fn open(owner: &str, songs: &[Song]) -> Self {
        Self {
            owner: owner.to_string(),
            songs: Mutex::new(songs.iter().cloned().collect()),
            catalog: None,
            fail_fetch: None,
            fail_create: None,
            delay: None,
            log: CallLog::default(),
        }
    }

    pub fn catalog(owner: &str, songs: &[Song], catalog: &[Song]) -> Self {
        Self {
            catalog: Some(catalog.iter().cloned().collect()),
            ..Self::open(owner, songs)
        }
    }

    pub fn failing_fetch(mut self, error: ServiceError) -> Self {
        self.fail_fetch = Some(error);
        self
    }

    pub fn failing_create(mut self, error: ServiceError) -> Self {
        self.fail_create = Some(error);
        self
    }

    /// 拉取前等待
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SongService for MemoryService {
    async fn fetch(&self, _collection: &str) -> Result<SongSet, ServiceError> {
        self.log.record(format!("fetch {}", self.owner));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = &self.fail_fetch {
            return Err(e.clone());
        }
        Ok(self.songs.lock().unwrap().clone())
    }

    async fn search(&self, candidates: &SongSet, strict: bool) -> Result<SongSet, ServiceError> {
        self.log
            .record(format!("search {} {}", self.owner, candidates.len()));
        let Some(catalog) = &self.catalog else {
            return Ok(candidates.clone());
        };
        Ok(candidates
            .iter()
            .flat_map(|c| filter_matches(c, catalog.iter().cloned(), strict))
            .collect())
    }

    async fn add(&self, _collection: &str, songs: &SongSet) -> Result<SongSet, ServiceError> {
        self.log.record(format!("add {} {}", self.owner, songs.len()));
        self.songs.lock().unwrap().extend(songs.iter().cloned());
        Ok(songs.clone())
    }

    fn name(&self) -> &str {
        &self.owner
    }
}

/// 按 owner 返回预先注册的内存后端，默认支持 `memory favorites rw`
pub struct FakeFactory {
    matrix: SupportMatrix,
    services: HashMap<String, Arc<MemoryService>>,
    log: CallLog,
}

impl FakeFactory {
    pub fn new() -> Self {
        let mut matrix = SupportMatrix::new();
        matrix.declare("memory", "favorites", Action::ReadWrite);
        Self {
            matrix,
            services: HashMap::new(),
            log: CallLog::default(),
        }
    }

    pub fn with(mut self, mut service: MemoryService) -> Self {
        service.log = self.log.clone();
        self.services
            .insert(service.owner.to_lowercase(), Arc::new(service));
        self
    }

    pub fn declare(mut self, service: &str, collection: &str, action: Action) -> Self {
        self.matrix.declare(service, collection, action);
        self
    }

    pub fn calls(&self) -> CallLog {
        self.log.clone()
    }
}

#[async_trait]
impl ServiceFactory for FakeFactory {
    fn supported_services(&self) -> SupportMatrix {
        self.matrix.clone()
    }

    async fn create(
        &self,
        endpoint: &EndpointKey,
        access: Action,
    ) -> Result<Arc<dyn SongService>, ServiceError> {
        self.log.record(format!("create {} {}", endpoint.owner, access));
        let service = self
            .services
            .get(&endpoint.owner.to_lowercase())
            .ok_or_else(|| ServiceError::unavailable(format!("no such user {}", endpoint.owner)))?;
        if let Some(e) = &service.fail_create {
            return Err(e.clone());
        }
        Ok(service.clone() as Arc<dyn SongService>)
    }
}

/// 按脚本回答的交互
#[derive(Debug, Default)]
pub struct ScriptedUi {
    directions: VecDeque<Direction>,
    strict: bool,
    interactive: bool,
    answers: VecDeque<AddAnswer>,
    preferences_asked: usize,
    pub messages: Vec<String>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    pub fn directions(mut self, directions: &[Direction]) -> Self {
        self.directions.extend(directions.iter().copied());
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn answers(mut self, answers: &[AddAnswer]) -> Self {
        self.answers.extend(answers.iter().copied());
        self
    }

    pub fn asked_preferences(&self) -> usize {
        self.preferences_asked
    }

    pub fn remaining_answers(&self) -> usize {
        self.answers.len()
    }
}

impl Ui for ScriptedUi {
    fn ask_direction(
        &mut self,
        _left: &EndpointKey,
        _right: &EndpointKey,
        enabled: &[Direction],
    ) -> Result<Direction> {
        match self.directions.pop_front() {
            Some(direction) if enabled.contains(&direction) => Ok(direction),
            Some(direction) => Err(SyncError::MalformedInput(format!(
                "scripted direction {} is not enabled",
                direction
            ))),
            None => Err(SyncError::Quit),
        }
    }

    fn ask_strict_search(&mut self, _endpoint: &EndpointKey) -> Result<bool> {
        self.preferences_asked += 1;
        Ok(self.strict)
    }

    fn ask_interactive(&mut self, _endpoint: &EndpointKey) -> Result<bool> {
        self.preferences_asked += 1;
        Ok(self.interactive)
    }

    fn ask_add_song(&mut self, _endpoint: &EndpointKey, _song: &Song) -> Result<AddAnswer> {
        Ok(self.answers.pop_front().unwrap_or(AddAnswer::Quit))
    }

    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }
}

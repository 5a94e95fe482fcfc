use super::direction::Action;
use super::song_set::SongSet;
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// 端点标识：(owner, service, collection)
#[derive(Debug, Clone, Serialize)]
pub struct EndpointKey {
    /// 用户名或文件路径
    pub owner: String,
    pub service: String,
    pub collection: String,
}

impl EndpointKey {
    pub fn new(owner: &str, service: &str, collection: &str) -> Self {
        Self {
            owner: owner.to_string(),
            service: service.to_string(),
            collection: collection.to_string(),
        }
    }

    /// 解析 `owner:service:type`，owner 中的冒号写作 `\:`
    pub fn parse(input: &str) -> Result<Self> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&':') => {
                    chars.next();
                    current.push(':');
                }
                ':' => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        fields.push(current);

        if fields.len() != 3 {
            return Err(SyncError::MalformedInput(format!(
                "{:?} must be of the form owner:service:type (found {} fields)",
                input,
                fields.len()
            )));
        }

        let fields: Vec<&str> = fields.iter().map(|f| f.trim()).collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(SyncError::MalformedInput(format!(
                "{:?} has an empty field",
                input
            )));
        }

        Ok(Self::new(fields[0], fields[1], fields[2]))
    }

    /// 忽略大小写的比较键
    pub fn normalized(&self) -> (String, String, String) {
        (
            self.owner.to_lowercase(),
            self.service.to_lowercase(),
            self.collection.to_lowercase(),
        )
    }

    pub fn service_name(&self) -> String {
        self.service.to_lowercase()
    }

    pub fn collection_name(&self) -> String {
        self.collection.to_lowercase()
    }
}

impl PartialEq for EndpointKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for EndpointKey {}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.owner, self.service, self.collection)
    }
}

/// 一次运行中的端点状态
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub key: EndpointKey,
    /// 由方向图推导，从不由用户直接指定
    pub access: Option<Action>,
    pub strict_search: bool,
    pub interactive: bool,
    /// 拉取到的当前集合
    pub current: SongSet,
    /// 搜索得到的候选
    pub search_result: SongSet,
    /// 实际决定添加的歌曲
    pub to_add: SongSet,
    /// 后端确认已添加的歌曲
    pub added: SongSet,
}

impl Endpoint {
    pub fn new(key: EndpointKey) -> Self {
        Self {
            key,
            access: None,
            strict_search: true,
            interactive: false,
            current: SongSet::new(),
            search_result: SongSet::new(),
            to_add: SongSet::new(),
            added: SongSet::new(),
        }
    }

    pub fn can_write(&self) -> bool {
        self.access.is_some_and(Action::can_write)
    }
}

/// 端点表，键为规范化后的三元组，保持首次出现的顺序
#[derive(Debug, Default)]
pub struct EndpointTable {
    endpoints: Vec<Endpoint>,
    index: HashMap<(String, String, String), usize>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从命令行输入构建端点表，重复声明合并为同一个端点
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut table = Self::new();
        for spec in specs {
            table.insert(EndpointKey::parse(spec.as_ref())?);
        }

        if table.len() < 2 {
            return Err(SyncError::InsufficientEndpoints(table.len()));
        }

        Ok(table)
    }

    /// 插入端点，返回其下标（已存在则返回原下标）
    pub fn insert(&mut self, key: EndpointKey) -> usize {
        let normalized = key.normalized();
        if let Some(&i) = self.index.get(&normalized) {
            return i;
        }
        self.endpoints.push(Endpoint::new(key));
        let i = self.endpoints.len() - 1;
        self.index.insert(normalized, i);
        i
    }

    pub fn position(&self, key: &EndpointKey) -> Option<usize> {
        self.index.get(&key.normalized()).copied()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// 所有无序端点对，按 (0,1), (0,2), ..., (1,2) 顺序
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let n = self.endpoints.len();
        (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Endpoint> {
        self.endpoints.iter_mut()
    }
}

impl std::ops::Index<usize> for EndpointTable {
    type Output = Endpoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.endpoints[index]
    }
}

impl std::ops::IndexMut<usize> for EndpointTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.endpoints[index]
    }
}

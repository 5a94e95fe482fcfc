//! Subsonic / OpenSubsonic 收藏（starred）
//!
//! 使用 token 认证：`t = md5(password + salt)`，每个请求一个新 salt。

use super::{filter_matches, SongService};
use crate::config::SubsonicConfig;
use crate::core::song::Song;
use crate::core::song_set::SongSet;
use crate::error::ServiceError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

const API_VERSION: &str = "1.16.1";
const CLIENT_ID: &str = "syncsongs";
/// 认证相关错误码：用户名或密码错误、不支持 token 认证、未授权
const AUTH_ERROR_CODES: [i64; 3] = [40, 41, 50];
/// star 请求的最大并发数
const STAR_CONCURRENCY: usize = 4;

pub struct SubsonicService {
    http: reqwest::Client,
    base: String,
    user: String,
    password: String,
    search_count: u32,
    name: String,
}

impl SubsonicService {
    /// 创建并 ping 服务器验证凭据
    pub async fn connect(
        http: reqwest::Client,
        user: &str,
        config: &SubsonicConfig,
    ) -> Result<Self, ServiceError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::unavailable("no Subsonic server configured (services.subsonic.endpoint)"))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| ServiceError::auth("Subsonic requires a password (services.subsonic.password)"))?;

        let service = Self {
            http,
            base: endpoint.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password,
            search_count: config.search_count.max(1),
            name: format!("subsonic:{}", user),
        };

        service.request("ping", &[]).await?;
        debug!("Subsonic 连接成功: {}", service.base);
        Ok(service)
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let token = format!("{:x}", md5::compute(format!("{}{}", self.password, salt)));
        vec![
            ("u", self.user.clone()),
            ("t", token),
            ("s", salt),
            ("f", "json".to_string()),
            ("v", API_VERSION.to_string()),
            ("c", CLIENT_ID.to_string()),
        ]
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/rest/{}.view", self.base, method)
    }

    /// 认证参数在前，方法参数在后
    fn query_params(&self, params: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut query = self.auth_params();
        query.extend(params.iter().cloned());
        query
    }

    fn build_request(
        &self,
        method: &str,
        params: &[(&'static str, String)],
    ) -> reqwest::RequestBuilder {
        self.http
            .get(self.method_url(method))
            .query(&self.query_params(params))
    }

    /// 检查 subsonic-response 的状态，返回响应体
    fn check_status(payload: Value) -> Result<Value, ServiceError> {
        let response = payload
            .get("subsonic-response")
            .ok_or_else(|| ServiceError::unavailable("Subsonic response missing subsonic-response"))?;

        if response.get("status").and_then(Value::as_str) == Some("ok") {
            return Ok(response.clone());
        }

        let error = response.get("error");
        let code = error.and_then(|e| e.get("code")).and_then(Value::as_i64);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Subsonic returned an error");

        match code {
            Some(code) if AUTH_ERROR_CODES.contains(&code) => Err(ServiceError::AuthenticationFailed(
                format!("Subsonic error {}: {}", code, message),
            )),
            Some(code) => Err(ServiceError::BackendUnavailable(format!(
                "Subsonic error {}: {}",
                code, message
            ))),
            None => Err(ServiceError::unavailable(message)),
        }
    }

    async fn request(
        &self,
        method: &str,
        params: &[(&'static str, String)],
    ) -> Result<Value, ServiceError> {
        debug!("Subsonic 请求: {}", method);
        let payload: Value = self
            .build_request(method, params)
            .send()
            .await?
            .json()
            .await?;
        Self::check_status(payload)
    }

    fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
        match value {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        }
    }

    fn parse_song(song: &Value) -> Option<Song> {
        let title = song.get("title")?.as_str()?;
        let artist = song.get("artist")?.as_str()?;
        let id = song
            .get("id")
            .and_then(|v| v.as_str().map(ToOwned::to_owned).or_else(|| v.as_i64().map(|n| n.to_string())));
        let duration = song.get("duration").and_then(Value::as_u64).map(|d| d as u32);

        match Song::new(title, artist) {
            Ok(parsed) => Some(
                parsed
                    .with_album(song.get("album").and_then(Value::as_str))
                    .with_duration(duration)
                    .with_external_id(id.as_deref()),
            ),
            Err(e) => {
                warn!("跳过无效的 Subsonic 曲目: {}", e);
                None
            }
        }
    }

    /// 没有 id 的歌曲无法收藏，返回 None
    async fn star(&self, song: Song) -> Result<Option<Song>, ServiceError> {
        let Some(id) = song.external_id().map(ToOwned::to_owned) else {
            debug!("没有 id，跳过: {}", song);
            return Ok(None);
        };

        self.request("star", &[("id", id)])
            .await
            .inspect_err(|e| warn!("Subsonic 收藏失败 {}: {}", song, e))?;
        Ok(Some(song))
    }
}

#[async_trait]
impl SongService for SubsonicService {
    async fn fetch(&self, _collection: &str) -> Result<SongSet, ServiceError> {
        let response = self.request("getStarred2", &[]).await?;
        let songs: SongSet = Self::array_or_single(
            response.get("starred2").and_then(|s| s.get("song")),
        )
        .into_iter()
        .filter_map(Self::parse_song)
        .collect();

        debug!("Subsonic {} 共 {} 首收藏", self.user, songs.len());
        Ok(songs)
    }

    async fn search(&self, candidates: &SongSet, strict: bool) -> Result<SongSet, ServiceError> {
        let mut result = SongSet::new();

        for candidate in candidates {
            let response = self
                .request(
                    "search3",
                    &[
                        ("query", candidate.search_term()),
                        ("songCount", self.search_count.to_string()),
                        ("albumCount", "0".to_string()),
                        ("artistCount", "0".to_string()),
                    ],
                )
                .await?;

            let hits = Self::array_or_single(
                response.get("searchResult3").and_then(|s| s.get("song")),
            )
            .into_iter()
            .filter_map(Self::parse_song)
            .filter(|song| song.external_id().is_some());

            result.extend(filter_matches(candidate, hits, strict));
        }

        Ok(result)
    }

    async fn add(&self, _collection: &str, songs: &SongSet) -> Result<SongSet, ServiceError> {
        let results: Vec<Result<Option<Song>, ServiceError>> = stream::iter(songs.iter().cloned())
            .map(|song| async move { self.star(song).await })
            .buffer_unordered(STAR_CONCURRENCY)
            .collect()
            .await;

        let mut added = SongSet::new();
        for result in results {
            if let Some(song) = result? {
                added.insert(song);
            }
        }
        Ok(added)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

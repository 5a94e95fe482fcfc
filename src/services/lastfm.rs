//! Last.fm loved tracks
//!
//! - 读取：`user.getLovedTracks`（分页）
//! - 搜索：`track.search`
//! - 写入：`track.love`，需要签名和已授权的会话 key
//!
//! 会话 key 通过 Last.fm 的网页授权流程获得后写入配置。

use super::{filter_matches, SongService};
use crate::config::LastfmConfig;
use crate::core::direction::Action;
use crate::core::song::Song;
use crate::core::song_set::SongSet;
use crate::error::ServiceError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
/// getLovedTracks 单页上限
const PAGE_SIZE: u32 = 200;
/// 认证相关错误码：无效 token、无效会话、无效 API key、未授权 token、API key 被停用
const AUTH_ERROR_CODES: [i64; 5] = [4, 9, 10, 14, 26];

/// 保证两次请求之间的最小间隔
struct RateLimiter {
    last_request: Option<Instant>,
    min_delay: Duration,
}

impl RateLimiter {
    fn new(delay_ms: u64) -> Self {
        Self {
            last_request: None,
            min_delay: Duration::from_millis(delay_ms),
        }
    }

    async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// 写入所需的签名凭据
struct Session {
    api_secret: String,
    session_key: String,
}

pub struct LastfmService {
    http: reqwest::Client,
    base_url: String,
    user: String,
    api_key: String,
    session: Option<Session>,
    search_limit: u32,
    rate_limiter: Mutex<RateLimiter>,
    name: String,
}

impl LastfmService {
    /// 检查凭据；需要写入时必须提供 API secret 和会话 key
    pub fn connect(
        http: reqwest::Client,
        user: &str,
        config: &LastfmConfig,
        access: Action,
    ) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ServiceError::auth("Last.fm requires an API key (services.lastfm.apiKey)"))?;

        let session = match (&config.api_secret, &config.session_key) {
            (Some(secret), Some(key)) => Some(Session {
                api_secret: secret.clone(),
                session_key: key.clone(),
            }),
            _ => None,
        };

        if access.can_write() && session.is_none() {
            return Err(ServiceError::auth(
                "adding loved tracks requires services.lastfm.apiSecret and an authorized sessionKey",
            ));
        }

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            user: user.to_string(),
            api_key,
            session,
            search_limit: config.search_limit.max(1),
            rate_limiter: Mutex::new(RateLimiter::new(config.request_delay_ms)),
            name: format!("lastfm:{}", user),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// 计算 api_sig：按参数名排序后拼接 name+value，再拼接 secret 取 md5
    fn sign(params: &BTreeMap<&str, String>, secret: &str) -> String {
        let mut raw: String = params
            .iter()
            .filter(|(k, _)| **k != "format" && **k != "callback")
            .map(|(k, v)| format!("{}{}", k, v))
            .collect();
        raw.push_str(secret);
        format!("{:x}", md5::compute(raw))
    }

    /// 检查响应中的 Last.fm 错误
    fn check_error(payload: Value) -> Result<Value, ServiceError> {
        let Some(code) = payload.get("error").and_then(Value::as_i64) else {
            return Ok(payload);
        };
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Last.fm returned an error")
            .trim()
            .to_string();

        if AUTH_ERROR_CODES.contains(&code) {
            Err(ServiceError::AuthenticationFailed(format!("Last.fm error {}: {}", code, message)))
        } else {
            Err(ServiceError::BackendUnavailable(format!("Last.fm error {}: {}", code, message)))
        }
    }

    async fn get(&self, method: &str, params: &[(&str, String)]) -> Result<Value, ServiceError> {
        self.rate_limiter.lock().await.wait_if_needed().await;

        let mut query = vec![
            ("method", method.to_string()),
            ("api_key", self.api_key.clone()),
            ("format", "json".to_string()),
        ];
        query.extend(params.iter().cloned());

        debug!("Last.fm 请求: {}", method);
        let payload: Value = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await?
            .json()
            .await?;
        Self::check_error(payload)
    }

    async fn post_signed(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<Value, ServiceError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ServiceError::auth("Last.fm session is not authorized"))?;

        self.rate_limiter.lock().await.wait_if_needed().await;

        let mut form: BTreeMap<&str, String> = params.iter().cloned().collect();
        form.insert("method", method.to_string());
        form.insert("api_key", self.api_key.clone());
        form.insert("sk", session.session_key.clone());
        let signature = Self::sign(&form, &session.api_secret);
        form.insert("api_sig", signature);
        form.insert("format", "json".to_string());

        debug!("Last.fm 签名请求: {}", method);
        let payload: Value = self
            .http
            .post(&self.base_url)
            .form(&form)
            .send()
            .await?
            .json()
            .await?;
        Self::check_error(payload)
    }

    /// 对象或数组统一为数组（单条结果时 Last.fm 直接返回对象）
    fn array_or_single(value: Option<&Value>) -> Vec<&Value> {
        match value {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => Vec::new(),
        }
    }

    /// 解析曲目，artist 可能是字符串或 {"name": ...}
    fn parse_track(track: &Value) -> Option<Song> {
        let name = track.get("name")?.as_str()?;
        let artist = match track.get("artist")? {
            Value::String(s) => s.as_str(),
            other => other.get("name").or_else(|| other.get("#text"))?.as_str()?,
        };
        let mbid = track.get("mbid").and_then(Value::as_str);
        let duration = track
            .get("duration")
            .and_then(|d| d.as_str().and_then(|s| s.parse::<u32>().ok()).or_else(|| d.as_u64().map(|n| n as u32)));

        match Song::new(name, artist) {
            Ok(song) => Some(song.with_external_id(mbid).with_duration(duration)),
            Err(e) => {
                warn!("跳过无效的 Last.fm 曲目: {}", e);
                None
            }
        }
    }

    fn total_pages(attr: Option<&Value>) -> u32 {
        attr.and_then(|a| a.get("totalPages"))
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_u64().map(|n| n as u32)))
            .unwrap_or(1)
    }
}

#[async_trait]
impl SongService for LastfmService {
    async fn fetch(&self, _collection: &str) -> Result<SongSet, ServiceError> {
        let mut songs = SongSet::new();
        let mut page = 1;

        loop {
            let payload = self
                .get(
                    "user.getLovedTracks",
                    &[
                        ("user", self.user.clone()),
                        ("limit", PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;

            let loved = payload
                .get("lovedtracks")
                .ok_or_else(|| ServiceError::unavailable("Last.fm response missing lovedtracks"))?;
            songs.extend(
                Self::array_or_single(loved.get("track"))
                    .into_iter()
                    .filter_map(Self::parse_track),
            );

            if page >= Self::total_pages(loved.get("@attr")) {
                break;
            }
            page += 1;
        }

        debug!("Last.fm {} 共 {} 首 loved", self.user, songs.len());
        Ok(songs)
    }

    async fn search(&self, candidates: &SongSet, strict: bool) -> Result<SongSet, ServiceError> {
        let mut result = SongSet::new();

        for candidate in candidates {
            let payload = self
                .get(
                    "track.search",
                    &[
                        ("track", candidate.search_term()),
                        ("limit", self.search_limit.to_string()),
                    ],
                )
                .await?;

            let hits = Self::array_or_single(
                payload
                    .get("results")
                    .and_then(|r| r.get("trackmatches"))
                    .and_then(|t| t.get("track")),
            )
            .into_iter()
            .filter_map(Self::parse_track);

            result.extend(filter_matches(candidate, hits, strict));
        }

        Ok(result)
    }

    async fn add(&self, _collection: &str, songs: &SongSet) -> Result<SongSet, ServiceError> {
        let mut added = SongSet::new();

        for song in songs {
            self.post_signed(
                "track.love",
                &[
                    ("track", song.name().to_string()),
                    ("artist", song.artist().to_string()),
                ],
            )
            .await
            .inspect_err(|e| warn!("Last.fm 添加失败 {}: {}（已添加 {} 首）", song, e, added.len()))?;
            added.insert(song.clone());
        }

        Ok(added)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

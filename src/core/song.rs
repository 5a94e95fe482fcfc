use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// 歌曲名或艺术家为空
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("songs must have a non-empty name and artist (name={name:?}, artist={artist:?})")]
pub struct SongError {
    pub name: String,
    pub artist: String,
}

/// 歌曲
///
/// 同一性只由歌曲名和艺术家决定（忽略大小写），专辑、时长、id 不参与比较。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    name: String,
    artist: String,
    album: Option<String>,
    /// 时长（秒）
    duration: Option<u32>,
    /// 后端内部 id（如 Subsonic song id）
    external_id: Option<String>,
}

impl Song {
    /// 创建歌曲，去掉首尾空白
    pub fn new(name: &str, artist: &str) -> Result<Self, SongError> {
        let name = name.trim();
        let artist = artist.trim();

        if name.is_empty() || artist.is_empty() {
            return Err(SongError {
                name: name.to_string(),
                artist: artist.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            artist: artist.to_string(),
            album: None,
            duration: None,
            external_id: None,
        })
    }

    pub fn with_album(mut self, album: Option<&str>) -> Self {
        self.album = album
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    /// 0 秒视为未知时长
    pub fn with_duration(mut self, seconds: Option<u32>) -> Self {
        self.duration = seconds.filter(|s| *s > 0);
        self
    }

    pub fn with_external_id(mut self, id: Option<&str>) -> Self {
        self.external_id = id
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(ToOwned::to_owned);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn duration(&self) -> Option<u32> {
        self.duration
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// 同一性键：小写的 (歌曲名, 艺术家)
    pub fn key(&self) -> (String, String) {
        (self.name.to_lowercase(), self.artist.to_lowercase())
    }

    /// 按歌曲名、艺术家排序，两边都有专辑时再比较专辑
    pub fn compare(&self, other: &Song) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.artist.to_lowercase().cmp(&other.artist.to_lowercase()))
            .then_with(|| match (&self.album, &other.album) {
                (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
                _ => Ordering::Equal,
            })
    }

    /// other 的歌曲名和艺术家都是本歌曲对应字段的子串（忽略大小写）
    pub fn includes(&self, other: &Song) -> bool {
        self.name.to_lowercase().contains(&other.name.to_lowercase())
            && self
                .artist
                .to_lowercase()
                .contains(&other.artist.to_lowercase())
    }

    /// 任一方向包含即视为相似
    pub fn similar(&self, other: &Song) -> bool {
        other.includes(self) || self.includes(other)
    }

    /// 远程搜索关键词："artist name"
    pub fn search_term(&self) -> String {
        format!("{} {}", self.artist, self.name)
    }

    /// 时长格式化为 HH:MM:SS
    pub fn formatted_duration(&self) -> Option<String> {
        self.duration.map(|d| {
            format!("{:02}:{:02}:{:02}", d / 3600, (d % 3600) / 60, d % 60)
        })
    }
}

impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Song {}

impl Hash for Song {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.name)?;
        if let Some(album) = &self.album {
            write!(f, " - {}", album)?;
        }
        if let Some(duration) = self.formatted_duration() {
            write!(f, " - {}", duration)?;
        }
        Ok(())
    }
}

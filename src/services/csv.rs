use super::SongService;
use crate::core::song::Song;
use crate::core::song_set::SongSet;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// 分隔符文本文件中的歌曲库
///
/// 每行一首歌：`name,artist,album,duration,id`，后三列可为空。
pub struct CsvService {
    path: PathBuf,
    separator: char,
    name: String,
}

impl CsvService {
    pub fn new(path: &str, separator: char) -> Self {
        Self {
            path: PathBuf::from(path),
            separator,
            name: format!("csv:{}", path),
        }
    }

    /// 拆分一行，支持双引号字段和 "" 转义
    fn split_row(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut quoted = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if quoted {
                match c {
                    '"' if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    '"' => quoted = false,
                    _ => field.push(c),
                }
            } else if c == '"' && field.is_empty() {
                quoted = true;
            } else if c == self.separator {
                fields.push(std::mem::take(&mut field));
            } else {
                field.push(c);
            }
        }
        fields.push(field);
        fields
    }

    fn quote(&self, field: &str) -> String {
        if field.contains(self.separator) || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }

    fn to_row(&self, song: &Song) -> String {
        let duration = song.duration().map(|d| d.to_string()).unwrap_or_default();
        [
            song.name(),
            song.artist(),
            song.album().unwrap_or_default(),
            duration.as_str(),
            song.external_id().unwrap_or_default(),
        ]
        .iter()
        .map(|f| self.quote(f))
        .collect::<Vec<_>>()
        .join(&self.separator.to_string())
    }

    /// 解析一行为歌曲，时长可以是秒数或 H:MM:SS
    fn parse_row(&self, line_no: usize, line: &str) -> Result<Song, ServiceError> {
        let fields = self.split_row(line);
        let field = |i: usize| fields.get(i).map(String::as_str);

        let song = Song::new(field(0).unwrap_or_default(), field(1).unwrap_or_default())
            .map_err(|e| {
                ServiceError::unavailable(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    line_no,
                    e
                ))
            })?;

        Ok(song
            .with_album(field(2))
            .with_duration(field(3).and_then(parse_duration))
            .with_external_id(field(4)))
    }

    /// 与目标文件同目录、名字唯一的临时文件
    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "songs".to_string());
        self.path.with_file_name(format!(
            ".{}.{}.tmp",
            file_name,
            uuid::Uuid::new_v4().simple()
        ))
    }
}

fn parse_duration(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(seconds) = value.parse::<f64>() {
        return (seconds >= 0.0).then(|| seconds.round() as u32);
    }
    value.split(':').try_fold(0u32, |acc, part| {
        part.trim()
            .parse::<u32>()
            .ok()
            .and_then(|n| acc.checked_mul(60)?.checked_add(n))
    })
}

#[async_trait]
impl SongService for CsvService {
    async fn fetch(&self, _collection: &str) -> Result<SongSet, ServiceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            // 新文件视为空歌曲库
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("文件不存在，视为空: {}", self.path.display());
                return Ok(SongSet::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut songs = SongSet::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            songs.insert(self.parse_row(i + 1, line)?);
        }

        tracing::debug!("从 {} 读取 {} 首歌", self.path.display(), songs.len());
        Ok(songs)
    }

    /// 文件可以存任何歌曲，直接返回候选
    async fn search(&self, candidates: &SongSet, _strict: bool) -> Result<SongSet, ServiceError> {
        Ok(candidates.clone())
    }

    async fn add(&self, _collection: &str, songs: &SongSet) -> Result<SongSet, ServiceError> {
        if songs.is_empty() {
            return Ok(SongSet::new());
        }

        let mut content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for song in songs {
            content.push_str(&self.to_row(song));
            content.push('\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let temp_path = self.temp_path();
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;

        tracing::debug!("向 {} 写入 {} 首歌", self.path.display(), songs.len());
        Ok(songs.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

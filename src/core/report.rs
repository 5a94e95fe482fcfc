use super::direction::Action;
use super::endpoint::{EndpointKey, EndpointTable};
use super::song::Song;
use super::song_set::SongSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// 单个端点的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub endpoint: EndpointKey,
    pub access: Option<Action>,
    /// 同步时为已添加的歌曲，对比时为缺少的歌曲
    pub songs: Vec<Song>,
}

impl EndpointSummary {
    fn new(endpoint: &EndpointKey, access: Option<Action>, songs: &SongSet) -> Self {
        Self {
            endpoint: endpoint.clone(),
            access,
            songs: songs.sorted().into_iter().cloned().collect(),
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "song"
    } else {
        "songs"
    }
}

fn push_songs(out: &mut String, marker: char, songs: &[Song]) {
    for song in songs {
        let _ = writeln!(out, "  {} {}", marker, song);
    }
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub endpoints: Vec<EndpointSummary>,
}

impl SyncReport {
    pub fn from_table(started_at: DateTime<Utc>, table: &EndpointTable) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            endpoints: table
                .iter()
                .map(|e| EndpointSummary::new(&e.key, e.access, &e.added))
                .collect(),
        }
    }

    pub fn total_added(&self) -> usize {
        self.endpoints.iter().map(|e| e.songs.len()).sum()
    }

    pub fn summary(&self, endpoint: &EndpointKey) -> Option<&EndpointSummary> {
        self.endpoints.iter().find(|e| &e.endpoint == endpoint)
    }

    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for summary in &self.endpoints {
            let count = summary.songs.len();
            if count == 0 {
                let _ = writeln!(out, "{}: nothing done", summary.endpoint);
                continue;
            }
            let _ = writeln!(out, "{}: added {} {}", summary.endpoint, count, plural(count));
            if verbose {
                push_songs(&mut out, '+', &summary.songs);
            }
        }
        if verbose {
            let elapsed = self.finished_at - self.started_at;
            let _ = writeln!(out, "finished in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
        }
        out
    }
}

/// 对比报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub endpoints: Vec<EndpointSummary>,
}

impl DiffReport {
    pub fn from_table(started_at: DateTime<Utc>, table: &EndpointTable) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            endpoints: table
                .iter()
                .map(|e| EndpointSummary::new(&e.key, e.access, &e.search_result))
                .collect(),
        }
    }

    pub fn in_sync(&self) -> bool {
        self.endpoints.iter().all(|e| e.songs.is_empty())
    }

    pub fn summary(&self, endpoint: &EndpointKey) -> Option<&EndpointSummary> {
        self.endpoints.iter().find(|e| &e.endpoint == endpoint)
    }

    /// 缺少的歌曲总是列出，verbose 时附加耗时
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        for summary in &self.endpoints {
            let count = summary.songs.len();
            if count == 0 {
                let _ = writeln!(out, "{}: in sync", summary.endpoint);
                continue;
            }
            let _ = writeln!(out, "{}: missing {} {}", summary.endpoint, count, plural(count));
            push_songs(&mut out, '-', &summary.songs);
        }
        if verbose {
            let elapsed = self.finished_at - self.started_at;
            let _ = writeln!(out, "finished in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
        }
        out
    }
}

use super::song::Song;
use std::collections::BTreeMap;

/// 歌曲集合，按同一性去重，按 (歌曲名, 艺术家) 顺序迭代
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongSet {
    songs: BTreeMap<(String, String), Song>,
}

impl SongSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入歌曲，已存在同一首歌时保留先插入的那个，返回是否新增
    pub fn insert(&mut self, song: Song) -> bool {
        match self.songs.entry(song.key()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(song);
                true
            }
        }
    }

    pub fn contains(&self, song: &Song) -> bool {
        self.songs.contains_key(&song.key())
    }

    pub fn get(&self, song: &Song) -> Option<&Song> {
        self.songs.get(&song.key())
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.values()
    }

    /// 并集（原地）
    pub fn merge(&mut self, other: SongSet) {
        for song in other {
            self.insert(song);
        }
    }

    pub fn union(&self, other: &SongSet) -> SongSet {
        let mut result = self.clone();
        result.extend(other.iter().cloned());
        result
    }

    /// self - other
    pub fn difference(&self, other: &SongSet) -> SongSet {
        self.iter()
            .filter(|song| !other.contains(song))
            .cloned()
            .collect()
    }

    /// other 有而 self 没有的歌曲，即同步候选
    pub fn exclusive_to(&self, other: &SongSet) -> SongSet {
        other.difference(self)
    }

    /// 按完整顺序（含专辑）排序的列表，用于输出
    pub fn sorted(&self) -> Vec<&Song> {
        let mut songs: Vec<_> = self.iter().collect();
        songs.sort_by(|a, b| a.compare(b));
        songs
    }
}

impl Extend<Song> for SongSet {
    fn extend<T: IntoIterator<Item = Song>>(&mut self, iter: T) {
        for song in iter {
            self.insert(song);
        }
    }
}

impl FromIterator<Song> for SongSet {
    fn from_iter<T: IntoIterator<Item = Song>>(iter: T) -> Self {
        let mut set = SongSet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for SongSet {
    type Item = Song;
    type IntoIter = std::collections::btree_map::IntoValues<(String, String), Song>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.into_values()
    }
}

impl<'a> IntoIterator for &'a SongSet {
    type Item = &'a Song;
    type IntoIter = std::collections::btree_map::Values<'a, (String, String), Song>;

    fn into_iter(self) -> Self::IntoIter {
        self.songs.values()
    }
}

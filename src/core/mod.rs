pub mod direction;
pub mod endpoint;
pub mod engine;
pub mod report;
pub mod song;
pub mod song_set;

#[cfg(test)]
pub(crate) mod testing;

pub use direction::{derive_access, Action, Direction, DirectionEdge};
pub use endpoint::{Endpoint, EndpointKey, EndpointTable};
pub use engine::{SyncEngine, SyncOptions};
pub use report::{DiffReport, EndpointSummary, SyncReport};
pub use song::{Song, SongError};
pub use song_set::SongSet;

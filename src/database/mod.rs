// Database module
// Dual storage: LanceDB for chunk vectors, SQLite for conversation sessions

pub mod lancedb;
pub mod sqlite;

pub use lancedb::{ChunkPayload, IndexPoint, ScoredPayload, VectorIndex};
pub use sqlite::{SessionDatabase, SessionMessage};

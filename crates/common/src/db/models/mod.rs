//! SeaORM entity models
//!
//! Database entities for the ClaimSight chunk store

mod chunk;

pub use chunk::{
    Entity as ChunkEntity,
    Model as ChunkRecord,
    ActiveModel as ChunkActiveModel,
    Column as ChunkColumn,
};

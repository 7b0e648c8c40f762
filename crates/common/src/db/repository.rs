//! Repository pattern for database operations
//!
//! Provides a clean interface for chunk-store access with proper error
//! handling. Retrieval only ever reads; index population is an offline
//! concern handled outside this service.

use crate::db::models::*;
use crate::db::{ChunkTextStore, DbPool};
use crate::errors::Result;
use crate::types::Level;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stored chunk, as returned by batch hydration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub chunk_id: String,
    pub patent_id: String,
    pub level: Option<Level>,
    pub title: Option<String>,
    pub claim_no: Option<i32>,
    pub text: String,
}

impl From<ChunkRecord> for ChunkDocument {
    fn from(record: ChunkRecord) -> Self {
        Self {
            chunk_id: record.id,
            patent_id: record.patent_id,
            level: Level::parse(&record.level),
            title: record.title,
            claim_no: record.claim_no,
            text: record.text,
        }
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Find a single chunk by its id
    pub async fn find_chunk_by_id(&self, id: &str) -> Result<Option<ChunkDocument>> {
        let record = ChunkEntity::find_by_id(id).one(self.read_conn()).await?;
        Ok(record.map(ChunkDocument::from))
    }

    /// Batch-fetch chunks by id in a single query
    pub async fn find_chunks_by_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ChunkDocument>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let records = ChunkEntity::find()
            .filter(ChunkColumn::Id.is_in(ids.iter().map(String::as_str)))
            .all(self.read_conn())
            .await?;

        let found = records.len();
        let map: HashMap<String, ChunkDocument> = records
            .into_iter()
            .map(|r| (r.id.clone(), ChunkDocument::from(r)))
            .collect();

        if found < ids.len() {
            tracing::warn!(
                requested = ids.len(),
                found,
                "Some chunk ids were not present in the store"
            );
        }

        Ok(map)
    }
}

#[async_trait]
impl ChunkTextStore for Repository {
    async fn get_chunks_by_ids(&self, ids: &[String]) -> Result<HashMap<String, ChunkDocument>> {
        self.find_chunks_by_ids(ids).await
    }
}

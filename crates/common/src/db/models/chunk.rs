//! Patent chunk entity
//!
//! One row per indexed chunk; the primary key is the chunk id the vector
//! index uses (e.g. `US20210123456A1::claim::0003`), so retrieval hits can
//! be hydrated with canonical text by id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "patent_chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub patent_id: String,

    /// Hierarchy level: patent | claim | limitation
    pub level: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,

    pub claim_no: Option<i32>,

    /// Canonical chunk text
    #[sea_orm(column_type = "Text")]
    pub text: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! Core retrieval types shared by the index clients and the pipeline
//!
//! `ScoredMatch` is the unified hit format produced by every retrieval
//! source and by rank fusion. `SearchFilter` is the typed metadata filter
//! each backend client translates into its own query language.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Corpus granularity.
///
/// The hierarchy has exactly two searchable levels (patent, claim);
/// `Limitation` appears only as a provenance label on stored chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Patent,
    Claim,
    Limitation,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Patent => "patent",
            Level::Claim => "claim",
            Level::Limitation => "limitation",
        }
    }

    /// Parse a level from a stored metadata string
    pub fn parse(s: &str) -> Option<Level> {
        match s {
            "patent" => Some(Level::Patent),
            "claim" => Some(Level::Claim),
            "limitation" => Some(Level::Limitation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single retrieval hit in the unified result format.
///
/// Produced by the vector index, the lexical index, and rank fusion.
/// Immutable value object; `metadata` carries at minimum `patent_id`
/// and `level` for indexed chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ScoredMatch {
    pub fn new(id: impl Into<String>, score: f64, metadata: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            score,
            metadata,
        }
    }

    /// String-valued metadata field, if present
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The patent this hit belongs to, when the source recorded it
    pub fn patent_id(&self) -> Option<&str> {
        self.meta_str("patent_id")
    }
}

/// Typed metadata filter shared by both index backends.
///
/// Replaces free-form filter dictionaries with explicit fields; each index
/// client translates these into its backend's query language. The `extra`
/// map accepts raw operator-shaped clauses (`{"$in": [...]}`,
/// `{"$gte": v}`, plain equality values) for forward compatibility;
/// clauses a backend does not recognize are skipped, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    pub level: Option<Level>,
    pub patent_id_in: Option<Vec<String>>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub cpc_in: Option<Vec<String>>,
    pub assignee_in: Option<Vec<String>>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_patent_ids(mut self, ids: Vec<String>) -> Self {
        self.patent_id_in = Some(ids);
        self
    }

    pub fn with_year_range(mut self, from: Option<i32>, to: Option<i32>) -> Self {
        self.year_from = from;
        self.year_to = to;
        self
    }

    pub fn with_cpc(mut self, prefixes: Vec<String>) -> Self {
        self.cpc_in = Some(prefixes);
        self
    }

    pub fn with_assignees(mut self, assignees: Vec<String>) -> Self {
        self.assignee_in = Some(assignees);
        self
    }
}

//! Entities that cross tier boundaries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction of a `query_links` traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A content row in the vector tier, with an optional embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: i64,
    pub content: String,
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<Vec<u8>>,
    pub embedding_model_id: Option<String>,
    pub embedding_dim: Option<i64>,
    pub embedding_task: Option<String>,
    pub content_hash: Option<String>,
}

/// A directed, weighted edge in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeLink {
    pub entity_a: String,
    pub relation: String,
    pub entity_b: String,
    pub weight: f64,
    pub metadata: HashMap<String, Value>,
}

impl KnowledgeLink {
    /// Validate the invariant from the data model: no empty endpoints or
    /// relation, and a finite weight.
    pub fn validate(&self) -> Result<(), crate::MemoryError> {
        if self.entity_a.is_empty() || self.entity_b.is_empty() || self.relation.is_empty() {
            return Err(crate::MemoryError::InvalidArgument(
                "knowledge link requires non-empty entity_a, relation, entity_b".into(),
            ));
        }
        if !self.weight.is_finite() {
            return Err(crate::MemoryError::InvalidArgument(format!(
                "knowledge link weight must be finite, got {}",
                self.weight
            )));
        }
        Ok(())
    }
}

/// A durable fact in the cold tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFact {
    pub id: i64,
    pub predicate: String,
    pub args: Vec<Value>,
    pub fact_type: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
}

/// A fact that has been moved out of the hot cold-tier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedFact {
    pub predicate: String,
    pub args: Vec<Value>,
    pub fact_type: String,
    pub archived_at: DateTime<Utc>,
}

/// One turn of a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub session_id: String,
    pub turn_number: i64,
    pub user_input: String,
    pub intent: Value,
    pub response: String,
    pub atoms: Value,
    pub created_at: DateTime<Utc>,
}

/// A short-lived activation record used for recency-ranked fact recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationEntry {
    pub fact_id: i64,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// The most recent compressed representation of a session's running state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedState {
    pub session_id: String,
    pub turn_number: i64,
    pub state: Value,
    pub compression_ratio: f64,
}

/// A single reasoning episode, with the bookkeeping reflection needs to
/// decide whether its descriptor/embedding is stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub id: String,
    pub shard_id: String,
    pub shard_type: String,
    pub shard_category: String,
    pub session_id: String,
    pub task_context: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub response: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub quality_score: f64,
    pub learning_notes: Vec<String>,
    pub duration_ms: i64,
    pub tokens_used: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub summary_descriptor: Option<String>,
    pub descriptor_version: i64,
    pub descriptor_hash: Option<String>,
    pub embedding: Option<Vec<u8>>,
    pub embedding_model_id: Option<String>,
    pub embedding_dim: Option<i64>,
    pub embedding_task: Option<String>,
}

/// A learned fact scoped to one agent-kind shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: i64,
    pub shard_type: String,
    pub fact_predicate: String,
    pub fact_args: Vec<Value>,
    pub confidence: f64,
    pub learned_at: DateTime<Utc>,
    pub campaign: Option<String>,
    pub semantic_handle: Option<String>,
    pub handle_version: i64,
    pub handle_hash: Option<String>,
    pub embedding: Option<Vec<u8>>,
    pub embedding_model_id: Option<String>,
    pub embedding_dim: Option<i64>,
    pub embedding_task: Option<String>,
}

/// Outcome of one `run_migrations` call.
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: u32,
}

/// Counts produced by one `maintenance_cleanup` sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaintenanceStats {
    pub facts_archived: i64,
    pub facts_purged: i64,
    pub activations_pruned: i64,
    pub vacuumed: bool,
}

/// Summary of one reflection cycle, emitted as a single log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectionCycleStats {
    pub candidates_scanned: usize,
    pub reembedded: usize,
    pub failed: usize,
    pub skipped_backlog: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(entity_a: &str, relation: &str, entity_b: &str, weight: f64) -> KnowledgeLink {
        KnowledgeLink {
            entity_a: entity_a.to_string(),
            relation: relation.to_string(),
            entity_b: entity_b.to_string(),
            weight,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn rejects_empty_endpoints_and_relation() {
        assert!(link("", "rel", "b", 1.0).validate().is_err());
        assert!(link("a", "", "b", 1.0).validate().is_err());
        assert!(link("a", "rel", "", 1.0).validate().is_err());
    }

    #[test]
    fn rejects_non_finite_weight() {
        assert!(link("a", "rel", "b", f64::NAN).validate().is_err());
        assert!(link("a", "rel", "b", f64::INFINITY).validate().is_err());
    }

    #[test]
    fn accepts_well_formed_link() {
        assert!(link("a", "rel", "b", 0.5).validate().is_ok());
    }
}

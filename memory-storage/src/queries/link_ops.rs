//! Knowledge-graph tier: typed weighted edges, directional queries, and
//! bounded breadth-first path search.
//!
//! `traverse_path` must not re-enter the engine's read lock once it already
//! holds it — doing so (acquiring it again from within `query_links`)
//! deadlocks whenever a writer is queued behind the current shared holders.
//! So the public, locked entry points (`query_links`, `traverse_path`) each
//! take the lock exactly once and call the `_locked` inner helpers, which
//! assume it is already held and never acquire it themselves.

use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use memory_core::{Direction, KnowledgeLink, MemoryError, MemoryResult};

use crate::engine::StorageEngine;

const DEFAULT_MAX_DEPTH: usize = 5;

/// Upsert a link, replacing any existing row with the same
/// `(entity_a, relation, entity_b)` key.
pub fn store_link(engine: &StorageEngine, link: &KnowledgeLink) -> MemoryResult<()> {
    link.validate()?;
    let _guard = engine.write();
    engine.pool().with_writer(|conn| store_link_locked(conn, link))
}

fn store_link_locked(conn: &Connection, link: &KnowledgeLink) -> MemoryResult<()> {
    conn.execute(
        "INSERT INTO knowledge_links (entity_a, relation, entity_b, weight, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(entity_a, relation, entity_b) DO UPDATE SET
            weight = excluded.weight,
            metadata = excluded.metadata",
        params![
            link.entity_a,
            link.relation,
            link.entity_b,
            link.weight,
            serde_json::to_string(&link.metadata)?
        ],
    )?;
    Ok(())
}

/// Locked public entry point: all edges touching `entity` in the given
/// direction.
pub fn query_links(
    engine: &StorageEngine,
    entity: &str,
    direction: Direction,
) -> MemoryResult<Vec<KnowledgeLink>> {
    let _guard = engine.read();
    engine
        .pool()
        .with_reader(|conn| query_links_locked(conn, entity, direction))
}

/// Unlocked inner helper. Callers must already hold the engine's gate.
pub fn query_links_locked(
    conn: &Connection,
    entity: &str,
    direction: Direction,
) -> MemoryResult<Vec<KnowledgeLink>> {
    let sql = match direction {
        Direction::Outgoing => {
            "SELECT entity_a, relation, entity_b, weight, metadata FROM knowledge_links WHERE entity_a = ?1"
        }
        Direction::Incoming => {
            "SELECT entity_a, relation, entity_b, weight, metadata FROM knowledge_links WHERE entity_b = ?1"
        }
        Direction::Both => {
            "SELECT entity_a, relation, entity_b, weight, metadata FROM knowledge_links
             WHERE entity_a = ?1 OR entity_b = ?1"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![entity], row_to_link)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeLink> {
    let entity_a: String = row.get(0)?;
    let relation: String = row.get(1)?;
    let entity_b: String = row.get(2)?;
    let metadata_json: String = row.get(4)?;
    let metadata = serde_json::from_str(&metadata_json).unwrap_or_else(|e| {
        warn!(entity_a, relation, entity_b, error = %e, "malformed knowledge_links metadata, treating row as having none");
        HashMap::new()
    });
    Ok(KnowledgeLink {
        entity_a,
        relation,
        entity_b,
        weight: row.get(3)?,
        metadata,
    })
}

/// Breadth-first shortest path search over outgoing edges. `max_depth <= 0`
/// defaults to [`DEFAULT_MAX_DEPTH`]. Returns `not-found` when no path
/// exists within the depth bound. Acquires the read lock exactly once.
pub fn traverse_path(
    engine: &StorageEngine,
    from: &str,
    to: &str,
    max_depth: usize,
) -> MemoryResult<Vec<KnowledgeLink>> {
    let _guard = engine.read();
    engine
        .pool()
        .with_reader(|conn| traverse_path_locked(conn, from, to, max_depth))
}

fn traverse_path_locked(
    conn: &Connection,
    from: &str,
    to: &str,
    max_depth: usize,
) -> MemoryResult<Vec<KnowledgeLink>> {
    if from == to {
        return Ok(Vec::new());
    }
    let max_depth = if max_depth == 0 { DEFAULT_MAX_DEPTH } else { max_depth };

    // predecessor map keeps memory O(|visited|) rather than copying a path
    // per frontier element.
    let mut predecessor: HashMap<String, (String, KnowledgeLink)> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
    visited.insert(from.to_string());
    frontier.push_back((from.to_string(), 0));

    while let Some((current, depth)) = frontier.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let edges = query_links_locked(conn, &current, Direction::Outgoing)?;
        for edge in edges {
            if visited.contains(&edge.entity_b) {
                continue;
            }
            visited.insert(edge.entity_b.clone());
            predecessor.insert(edge.entity_b.clone(), (current.clone(), edge.clone()));
            if edge.entity_b == to {
                return Ok(reconstruct_path(&predecessor, to));
            }
            frontier.push_back((edge.entity_b.clone(), depth + 1));
        }
    }

    Err(MemoryError::NotFound(format!("no path from {from} to {to}")))
}

fn reconstruct_path(
    predecessor: &HashMap<String, (String, KnowledgeLink)>,
    target: &str,
) -> Vec<KnowledgeLink> {
    let mut path = Vec::new();
    let mut node = target.to_string();
    while let Some((prev, link)) = predecessor.get(&node) {
        path.push(link.clone());
        node = prev.clone();
    }
    path.reverse();
    path
}

/// Stream edges in descending weight, asserting each into the caller's
/// rule engine as `assert("knowledge_link", [entity_a, relation, entity_b])`.
/// Rows with malformed metadata are skipped and counted rather than
/// aborting the hydration. Returns the number of edges asserted.
pub fn hydrate_knowledge_graph(
    engine: &StorageEngine,
    assert: &mut memory_core::AssertFn<'_>,
) -> MemoryResult<usize> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(
            "SELECT entity_a, relation, entity_b, weight, metadata FROM knowledge_links
             ORDER BY weight DESC",
        )?;
        let rows = stmt.query_map([], row_to_link)?;
        let mut asserted = 0;
        let mut skipped = 0;
        for row in rows {
            let link: KnowledgeLink = match row {
                Ok(l) => l,
                Err(e) => {
                    warn!(error = %e, "malformed knowledge_links row, skipping");
                    skipped += 1;
                    continue;
                }
            };
            assert(
                "knowledge_link",
                &[link.entity_a.clone(), link.relation.clone(), link.entity_b.clone()],
            )?;
            asserted += 1;
        }
        if skipped > 0 {
            warn!(skipped, asserted, "hydration skipped malformed rows");
        }
        Ok(asserted)
    })
}

/// Metadata helper so tests and `store_link` callers can build a default
/// empty map without importing `serde_json` directly.
pub fn empty_metadata() -> std::collections::HashMap<String, Value> {
    std::collections::HashMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StorageEngine;

    fn link(a: &str, r: &str, b: &str, w: f64) -> KnowledgeLink {
        KnowledgeLink {
            entity_a: a.to_string(),
            relation: r.to_string(),
            entity_b: b.to_string(),
            weight: w,
            metadata: empty_metadata(),
        }
    }

    #[test]
    fn rejects_non_finite_weight() {
        let bad = link("a", "rel", "b", f64::NAN);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_empty_endpoint() {
        let bad = link("", "rel", "b", 1.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn query_links_both_directions() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_link(&engine, &link("A", "relates", "B", 1.0)).unwrap();

        let out = query_links(&engine, "B", Direction::Incoming).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_a, "A");

        let out = query_links(&engine, "A", Direction::Outgoing).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_b, "B");
    }

    #[test]
    fn traverse_path_finds_multi_hop_route() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_link(&engine, &link("A", "relates", "B", 1.0)).unwrap();
        store_link(&engine, &link("B", "relates", "C", 1.0)).unwrap();

        let path = traverse_path(&engine, "A", "C", 5).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].entity_a, "A");
        assert_eq!(path[1].entity_b, "C");
    }

    #[test]
    fn traverse_path_same_node_is_empty() {
        let engine = StorageEngine::open_in_memory().unwrap();
        let path = traverse_path(&engine, "A", "A", 5).unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn traverse_path_no_route_is_not_found() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_link(&engine, &link("A", "relates", "B", 1.0)).unwrap();
        let err = traverse_path(&engine, "A", "Z", 5);
        assert!(matches!(err, Err(MemoryError::NotFound(_))));
    }

    #[test]
    fn traverse_path_handles_cycles() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_link(&engine, &link("A", "relates", "B", 1.0)).unwrap();
        store_link(&engine, &link("B", "relates", "A", 1.0)).unwrap();
        store_link(&engine, &link("B", "relates", "C", 1.0)).unwrap();

        let path = traverse_path(&engine, "A", "C", 5).unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn hydrate_visits_in_descending_weight_order() {
        let engine = StorageEngine::open_in_memory().unwrap();
        store_link(&engine, &link("X", "is_a", "Y", 1.0)).unwrap();
        store_link(&engine, &link("Y", "is_a", "Z", 0.5)).unwrap();

        let mut seen = Vec::new();
        let mut assert_fn = |predicate: &str, args: &[String]| -> MemoryResult<()> {
            seen.push((predicate.to_string(), args.to_vec()));
            Ok(())
        };
        let count = hydrate_knowledge_graph(&engine, &mut assert_fn).unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen[0].1[0], "X");
        assert_eq!(seen[1].1[0], "Y");
    }
}

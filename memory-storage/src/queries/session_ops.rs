//! Session tier: idempotent turn log, activation score log, latest
//! compressed-state cache.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tracing::warn;

use memory_core::{ActivationEntry, CompressedState, MemoryResult, SessionTurn};

use crate::engine::StorageEngine;

/// Insert-or-ignore: replaying the same `(session_id, turn_number)` twice
/// leaves exactly one row, equal to the first call's values.
pub fn store_session_turn(
    engine: &StorageEngine,
    session_id: &str,
    turn_number: i64,
    user_input: &str,
    intent: &Value,
    response: &str,
    atoms: &Value,
) -> MemoryResult<()> {
    if session_id.is_empty() {
        return Err(memory_core::MemoryError::InvalidArgument(
            "session_id must not be empty".into(),
        ));
    }
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO session_turns
                (session_id, turn_number, user_input, intent_json, response, atoms_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                turn_number,
                user_input,
                serde_json::to_string(intent)?,
                response,
                serde_json::to_string(atoms)?
            ],
        )?;
        Ok(())
    })
}

pub fn get_session_history(
    engine: &StorageEngine,
    session_id: &str,
    limit: usize,
) -> MemoryResult<Vec<SessionTurn>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(
            "SELECT session_id, turn_number, user_input, intent_json, response, atoms_json, created_at
             FROM session_turns WHERE session_id = ?1 ORDER BY turn_number DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id, limit as i64], |row| {
            let session_id: String = row.get(0)?;
            let turn_number: i64 = row.get(1)?;
            let intent_json: String = row.get(3)?;
            let atoms_json: String = row.get(5)?;
            let created_at: String = row.get(6)?;
            let intent = serde_json::from_str(&intent_json).unwrap_or_else(|e| {
                warn!(session_id, turn_number, error = %e, "malformed session_turns intent, treating as null");
                Value::Null
            });
            let atoms = serde_json::from_str(&atoms_json).unwrap_or_else(|e| {
                warn!(session_id, turn_number, error = %e, "malformed session_turns atoms, treating as null");
                Value::Null
            });
            Ok(SessionTurn {
                session_id,
                turn_number,
                user_input: row.get(2)?,
                intent,
                response: row.get(4)?,
                atoms,
                created_at: parse_dt(&created_at),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

pub fn log_activation(engine: &StorageEngine, fact_id: i64, score: f64) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "INSERT INTO activation_log (fact_id, score) VALUES (?1, ?2)",
            params![fact_id, score],
        )?;
        Ok(())
    })
}

/// Per `fact_id`, the maximum score logged in the last hour, filtered by
/// `min_score`, descending.
pub fn get_recent_activations(
    engine: &StorageEngine,
    limit: usize,
    min_score: f64,
) -> MemoryResult<Vec<ActivationEntry>> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let mut stmt = conn.prepare(
            "SELECT fact_id, MAX(score) as score, MAX(timestamp) as timestamp
             FROM activation_log
             WHERE timestamp >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', '-1 hours')
             GROUP BY fact_id
             HAVING score >= ?1
             ORDER BY score DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![min_score, limit as i64], |row| {
            let timestamp: String = row.get(2)?;
            Ok(ActivationEntry {
                fact_id: row.get(0)?,
                score: row.get(1)?,
                timestamp: parse_dt(&timestamp),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    })
}

pub fn store_compressed_state(
    engine: &StorageEngine,
    session_id: &str,
    turn_number: i64,
    state: &Value,
    compression_ratio: f64,
) -> MemoryResult<()> {
    let _guard = engine.write();
    engine.pool().with_writer(|conn| {
        conn.execute(
            "INSERT INTO compressed_states (session_id, turn_number, state_json, compression_ratio)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, turn_number) DO UPDATE SET
                state_json = excluded.state_json,
                compression_ratio = excluded.compression_ratio",
            params![session_id, turn_number, serde_json::to_string(state)?, compression_ratio],
        )?;
        Ok(())
    })
}

/// Highest-turn entry for `session_id`, or `("", 0, 1.0)` if none exists.
pub fn load_latest_compressed_state(
    engine: &StorageEngine,
    session_id: &str,
) -> MemoryResult<CompressedState> {
    let _guard = engine.read();
    engine.pool().with_reader(|conn| {
        let row: Option<(i64, String, f64)> = conn
            .query_row(
                "SELECT turn_number, state_json, compression_ratio FROM compressed_states
                 WHERE session_id = ?1 ORDER BY turn_number DESC LIMIT 1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        Ok(match row {
            Some((turn_number, state_json, compression_ratio)) => CompressedState {
                session_id: session_id.to_string(),
                turn_number,
                state: serde_json::from_str(&state_json).unwrap_or_else(|e| {
                    warn!(session_id, turn_number, error = %e, "malformed compressed_states state, treating as null");
                    Value::Null
                }),
                compression_ratio,
            },
            None => CompressedState {
                session_id: session_id.to_string(),
                turn_number: 0,
                state: Value::String(String::new()),
                compression_ratio: 1.0,
            },
        })
    })
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

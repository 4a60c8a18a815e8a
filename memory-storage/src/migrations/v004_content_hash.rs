//! v004: content-hash dedup column plus descriptor/handle versioning, with
//! a backfill of hashes for rows inserted before this migration ran.

use rusqlite::Connection;

use memory_core::MemoryResult;

pub fn migrate(conn: &Connection) -> MemoryResult<()> {
    conn.execute_batch(
        "
        ALTER TABLE vector_entries ADD COLUMN content_hash TEXT;

        ALTER TABLE reasoning_traces ADD COLUMN summary_descriptor TEXT;
        ALTER TABLE reasoning_traces ADD COLUMN descriptor_version INTEGER NOT NULL DEFAULT 0;
        ALTER TABLE reasoning_traces ADD COLUMN descriptor_hash TEXT;

        CREATE INDEX IF NOT EXISTS idx_vector_entries_content_hash ON vector_entries(content_hash);
        ",
    )?;

    let mut stmt = conn.prepare("SELECT id, content FROM vector_entries WHERE content_hash IS NULL")?;
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    drop(stmt);

    for (id, content) in rows {
        let hash = crate::codec::content_hash(&content);
        conn.execute(
            "UPDATE vector_entries SET content_hash = ?1 WHERE id = ?2",
            rusqlite::params![hash, id],
        )?;
    }

    Ok(())
}

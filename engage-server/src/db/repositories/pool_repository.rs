use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use engage_types::{Candidate, PostPoolEntry};

use crate::db::{from_db_time, to_db_time, DbPool};

#[derive(Clone)]
pub struct PoolRepository {
    pool: DbPool,
}

impl PoolRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a pool entry.
    ///
    /// `last_seen_at` only moves forward. `created_at` is written once, the
    /// first time a refresh knows it.
    pub fn upsert(&self, entry: &PostPoolEntry) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO post_pool (social_id, target_identifier, text, created_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(social_id) DO UPDATE SET
                target_identifier = excluded.target_identifier,
                text = excluded.text,
                created_at = COALESCE(post_pool.created_at, excluded.created_at),
                last_seen_at = MAX(post_pool.last_seen_at, excluded.last_seen_at)",
            rusqlite::params![
                entry.social_id,
                entry.target_identifier,
                entry.text,
                entry.created_at.as_ref().map(to_db_time),
                to_db_time(&entry.last_seen_at),
            ],
        )
        .context("Failed to upsert pool entry")?;
        Ok(())
    }

    pub fn get(&self, social_id: &str) -> Result<Option<PostPoolEntry>> {
        let conn = self.pool.get()?;
        let entry = conn
            .query_row(
                "SELECT social_id, target_identifier, text, created_at, last_seen_at
                 FROM post_pool WHERE social_id = ?1",
                [social_id],
                row_to_entry,
            )
            .optional()
            .context("Failed to load pool entry")?;
        Ok(entry)
    }

    /// Pool entries with no comment, pending review or handled record,
    /// joined with the owning target's display name
    pub fn unhandled(&self) -> Result<Vec<Candidate>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.social_id, p.target_identifier, p.text, p.created_at, p.last_seen_at,
                    COALESCE(
                        (SELECT t.display_name FROM targets t
                         WHERE t.resolved_identifier = p.target_identifier
                         ORDER BY t.rowid LIMIT 1),
                        'Unknown'
                    ) AS author_name
             FROM post_pool p
             WHERE NOT EXISTS (SELECT 1 FROM comments c WHERE c.social_id = p.social_id)
               AND NOT EXISTS (SELECT 1 FROM pending_reviews r WHERE r.social_id = p.social_id)
               AND NOT EXISTS (SELECT 1 FROM handled_posts h WHERE h.social_id = p.social_id)
             ORDER BY p.rowid",
        )?;

        let candidates = stmt
            .query_map([], |row| {
                Ok(Candidate {
                    entry: row_to_entry(row)?,
                    author_name: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query eligible pool entries")?;

        Ok(candidates)
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM post_pool", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostPoolEntry> {
    let created_at: Option<String> = row.get(3)?;
    let last_seen_at: String = row.get(4)?;
    Ok(PostPoolEntry {
        social_id: row.get(0)?,
        target_identifier: row.get(1)?,
        text: row.get(2)?,
        created_at: created_at
            .map(|text| from_db_time(3, &text))
            .transpose()?,
        last_seen_at: from_db_time(4, &last_seen_at)?,
    })
}

/// Convenience constructor used by the refresher and tests
pub fn pool_entry(
    social_id: impl Into<String>,
    target_identifier: impl Into<String>,
    text: impl Into<String>,
    created_at: Option<DateTime<Utc>>,
    seen_at: DateTime<Utc>,
) -> PostPoolEntry {
    PostPoolEntry {
        social_id: social_id.into(),
        target_identifier: target_identifier.into(),
        text: text.into(),
        created_at,
        last_seen_at: seen_at,
    }
}

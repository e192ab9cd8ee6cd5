use anyhow::{Context, Result};
use rusqlite::OptionalExtension;

use engage_types::{Target, TargetUpsert};

use crate::db::DbPool;

/// Name stored when a target is first seen without one
const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone)]
pub struct TargetRepository {
    pool: DbPool,
}

impl TargetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Merge a target into the registry.
    ///
    /// Absent fields never clear stored ones. The resolved identifier is
    /// sticky: once stored it is kept even if a later sync resolves another.
    pub fn upsert(&self, target: &TargetUpsert) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO targets (canonical_url, raw_lead_reference, resolved_identifier, display_name)
             VALUES (?1, ?2, ?3, COALESCE(?4, ?5))
             ON CONFLICT(canonical_url) DO UPDATE SET
                raw_lead_reference = COALESCE(excluded.raw_lead_reference, targets.raw_lead_reference),
                resolved_identifier = COALESCE(targets.resolved_identifier, excluded.resolved_identifier),
                display_name = COALESCE(?4, targets.display_name)",
            rusqlite::params![
                target.canonical_url,
                target.raw_lead_reference,
                target.resolved_identifier,
                target.display_name,
                UNKNOWN_NAME,
            ],
        )
        .context("Failed to upsert target")?;
        Ok(())
    }

    /// Get a single target by canonical URL
    pub fn get(&self, canonical_url: &str) -> Result<Option<Target>> {
        let conn = self.pool.get()?;
        let target = conn
            .query_row(
                "SELECT canonical_url, raw_lead_reference, resolved_identifier, display_name
                 FROM targets WHERE canonical_url = ?1",
                [canonical_url],
                row_to_target,
            )
            .optional()
            .context("Failed to load target")?;
        Ok(target)
    }

    /// All targets, in insertion order
    pub fn list_all(&self) -> Result<Vec<Target>> {
        self.query_targets(
            "SELECT canonical_url, raw_lead_reference, resolved_identifier, display_name
             FROM targets ORDER BY rowid",
        )
    }

    /// Targets whose posts can be queried
    pub fn list_resolved(&self) -> Result<Vec<Target>> {
        self.query_targets(
            "SELECT canonical_url, raw_lead_reference, resolved_identifier, display_name
             FROM targets WHERE resolved_identifier IS NOT NULL ORDER BY rowid",
        )
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM targets", [], |row| row.get(0))?;
        Ok(count)
    }

    fn query_targets(&self, sql: &str) -> Result<Vec<Target>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let targets = stmt
            .query_map([], row_to_target)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list targets")?;
        Ok(targets)
    }
}

fn row_to_target(row: &rusqlite::Row<'_>) -> rusqlite::Result<Target> {
    Ok(Target {
        canonical_url: row.get(0)?,
        raw_lead_reference: row.get(1)?,
        resolved_identifier: row.get(2)?,
        display_name: row.get(3)?,
    })
}

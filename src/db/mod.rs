pub mod queries;

use crate::tracker::VisitEvent;
use crate::tracker::score::apply_visit;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

const SETTING_MERGE_TO_ROOT: &str = "mergeToRoot";
const SETTING_IGNORED_DOMAINS: &str = "ignoredDomains";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStatRow {
    pub domain: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub title_is_custom: bool,
    pub visit_count: i64,
    pub last_seen: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MinuteBucketRow {
    pub minute: u32,
    pub visit_count: i64,
}

/// Ranking settings, read fresh for every ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub merge_to_root: bool,
    pub ignored_domains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub merge_to_root: Option<bool>,
    pub ignored_domains: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSiteRow {
    pub domain: String,
    pub title: Option<String>,
    pub visit_count: i64,
    pub last_seen: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCountRow {
    pub day: u32,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCountRow {
    pub hour: u32,
    pub count: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite DB")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })?;

        queries::ADDED_COLUMNS
            .iter()
            .try_for_each(|(table, column, definition)| {
                self.ensure_column(table, column, definition)
            })?;

        self.conn
            .execute(queries::BACKFILL_MINUTE_OF_DAY, [])
            .context("Failed to backfill visit minute_of_day")?;

        self.migrate_hour_buckets()?;

        Ok(())
    }

    fn migrate_hour_buckets(&self) -> Result<()> {
        let has_legacy_table = self
            .conn
            .query_row(queries::HAS_LEGACY_HOUR_TABLE, [], |row| row.get::<_, bool>(0))
            .context("Failed to inspect legacy hour buckets")?;

        if !has_legacy_table {
            return Ok(());
        }

        let transaction = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;
        let migrated = transaction
            .execute(queries::MIGRATE_HOURS_TO_MINUTES, [])
            .context("Failed to migrate hour buckets to minute buckets")?;
        transaction
            .execute(queries::DROP_LEGACY_HOUR_TABLE, [])
            .context("Failed to drop legacy hour buckets")?;
        transaction
            .commit()
            .context("Failed to commit hour bucket migration")?;

        info!(buckets = migrated, "migrated legacy hour buckets to minute buckets");
        Ok(())
    }

    fn ensure_column(&self, table: &str, column: &str, definition: &str) -> Result<()> {
        let mut statement = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .with_context(|| format!("Failed to inspect table: {table}"))?;

        let exists = statement
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read columns of table: {table}"))?
            .iter()
            .any(|name| name == column);

        if !exists {
            self.conn
                .execute(
                    &format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"),
                    [],
                )
                .with_context(|| format!("Failed to add column {table}.{column}"))?;
        }

        Ok(())
    }

    pub fn settings(&self) -> Result<Settings> {
        let merge_to_root = self
            .setting_value(SETTING_MERGE_TO_ROOT)?
            .map(|raw| serde_json::from_str::<bool>(&raw))
            .transpose()
            .context("Failed to parse mergeToRoot setting")?
            .unwrap_or(false);

        let ignored_domains = self
            .setting_value(SETTING_IGNORED_DOMAINS)?
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .context("Failed to parse ignoredDomains setting")?
            .unwrap_or_default();

        Ok(Settings {
            merge_to_root,
            ignored_domains,
        })
    }

    pub fn save_settings(&mut self, update: &SettingsUpdate) -> Result<Settings> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        if let Some(merge_to_root) = update.merge_to_root {
            transaction
                .execute(
                    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                    params![SETTING_MERGE_TO_ROOT, serde_json::to_string(&merge_to_root)?],
                )
                .context("Failed to save mergeToRoot setting")?;
        }

        if let Some(ignored_domains) = &update.ignored_domains {
            transaction
                .execute(
                    "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                    params![SETTING_IGNORED_DOMAINS, serde_json::to_string(ignored_domains)?],
                )
                .context("Failed to save ignoredDomains setting")?;
        }

        transaction
            .commit()
            .context("Failed to commit settings")?;

        self.settings()
    }

    fn setting_value(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .with_context(|| format!("Failed to read setting: {key}"))
            .map(Option::flatten)
    }

    /// Appends the visit to the log, bumps its minute bucket and rewrites the
    /// domain's stat row, all in one transaction.
    pub fn ingest_visit(
        &mut self,
        visit: &VisitEvent,
        merge_to_root: bool,
    ) -> Result<DomainStatRow> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        append_visit_log(&transaction, visit)?;
        record_minute(&transaction, &visit.domain, visit.minute_of_day)?;
        let updated = record_domain_visit(&transaction, visit, merge_to_root)?;

        transaction
            .commit()
            .context("Failed to commit visit")?;

        Ok(updated)
    }

    pub fn domain_stat(&self, domain: &str) -> Result<Option<DomainStatRow>> {
        select_domain_stat(&self.conn, domain)
    }

    /// Highest cached scores first; equal scores fall back to domain order.
    pub fn top_domain_stats(&self, limit: usize) -> Result<Vec<DomainStatRow>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {}
             FROM domain_stats
             ORDER BY score DESC, domain ASC
             LIMIT ?1",
            queries::DOMAIN_STAT_COLUMNS
        ))?;

        let rows = statement
            .query_map(params![limit as i64], domain_stat_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query domain stats")?;

        Ok(rows)
    }

    pub fn minute_buckets(&self, domain: &str) -> Result<Vec<MinuteBucketRow>> {
        let mut statement = self.conn.prepare(
            "SELECT minute, visit_count
             FROM domain_minutes
             WHERE domain = ?1
             ORDER BY minute ASC",
        )?;

        let rows = statement
            .query_map(params![domain], |row| {
                Ok(MinuteBucketRow {
                    minute: row.get(0)?,
                    visit_count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query minute buckets")?;

        Ok(rows)
    }

    /// Sets the display URL and title, and freezes the title against later visits.
    /// Returns `false` when the domain has no stat row.
    pub fn update_bookmark(
        &self,
        domain: &str,
        url: Option<&str>,
        title: Option<&str>,
    ) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                "UPDATE domain_stats
                 SET url = COALESCE(?2, url),
                     title = COALESCE(?3, title),
                     title_is_custom = CASE WHEN ?3 IS NULL THEN title_is_custom ELSE 1 END
                 WHERE domain = ?1",
                params![domain, url, title],
            )
            .context("Failed to update bookmark")?;

        Ok(updated > 0)
    }

    /// Removes the domain from all three tables. Returns the number of deleted rows.
    pub fn delete_bookmark(&mut self, domain: &str) -> Result<usize> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let deleted = [
            "DELETE FROM domain_stats WHERE domain = ?1",
            "DELETE FROM domain_minutes WHERE domain = ?1",
            "DELETE FROM visits WHERE domain = ?1",
        ]
        .iter()
        .map(|statement| {
            transaction
                .execute(statement, params![domain])
                .context("Failed to delete bookmark rows")
        })
        .sum::<Result<usize>>()?;

        transaction
            .commit()
            .context("Failed to commit bookmark deletion")?;

        Ok(deleted)
    }

    pub fn visit_log_count(&self, domain: &str) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM visits WHERE domain = ?1",
                params![domain],
                |row| row.get(0),
            )
            .context("Failed to count visits")
    }

    pub fn domain_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM domain_stats", [], |row| row.get(0))
            .context("Failed to count domains")
    }

    pub fn latest_visit_timestamp(&self) -> Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT timestamp FROM visits ORDER BY timestamp DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read latest visit")
    }

    pub fn top_sites(&self, limit: usize) -> Result<Vec<TopSiteRow>> {
        let mut statement = self.conn.prepare(
            "SELECT domain, title, visit_count, last_seen
             FROM domain_stats
             ORDER BY visit_count DESC, domain ASC
             LIMIT ?1",
        )?;

        let rows = statement
            .query_map(params![limit as i64], |row| {
                Ok(TopSiteRow {
                    domain: row.get(0)?,
                    title: row.get(1)?,
                    visit_count: row.get(2)?,
                    last_seen: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query top sites")?;

        Ok(rows)
    }

    /// Visit counts per local weekday, 0 = Sunday.
    pub fn visits_by_weekday(&self) -> Result<Vec<DayCountRow>> {
        let mut statement = self.conn.prepare(
            "SELECT CAST(strftime('%w', timestamp / 1000, 'unixepoch', 'localtime') AS INTEGER) AS day,
                    COUNT(*) AS count
             FROM visits
             GROUP BY day
             ORDER BY day",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok(DayCountRow {
                    day: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query visits by weekday")?;

        Ok(rows)
    }

    pub fn visits_by_hour(&self) -> Result<Vec<HourCountRow>> {
        let mut statement = self.conn.prepare(
            "SELECT (minute_of_day / 60) AS hour,
                    COUNT(*) AS count
             FROM visits
             WHERE minute_of_day IS NOT NULL
             GROUP BY hour
             ORDER BY hour",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok(HourCountRow {
                    hour: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query visits by hour")?;

        Ok(rows)
    }
}

fn append_visit_log(conn: &Connection, visit: &VisitEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO visits (url, domain, title, timestamp, minute_of_day) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            &visit.url,
            &visit.domain,
            visit.title.as_deref().unwrap_or_default(),
            visit.timestamp_ms,
            visit.minute_of_day
        ],
    )
    .context("Failed to insert visit")?;

    Ok(())
}

fn record_minute(conn: &Connection, domain: &str, minute_of_day: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO domain_minutes (domain, minute, visit_count)
         VALUES (?1, ?2, 1)
         ON CONFLICT(domain, minute) DO UPDATE SET visit_count = visit_count + 1",
        params![domain, minute_of_day],
    )
    .context("Failed to update minute bucket")?;

    Ok(())
}

fn record_domain_visit(
    conn: &Connection,
    visit: &VisitEvent,
    merge_to_root: bool,
) -> Result<DomainStatRow> {
    let existing = select_domain_stat(conn, &visit.domain)?;
    let updated = apply_visit(existing, visit, merge_to_root);

    conn.execute(
        "INSERT INTO domain_stats (domain, url, title, title_is_custom, visit_count, last_seen, score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(domain)
         DO UPDATE SET url=excluded.url, title=excluded.title, title_is_custom=excluded.title_is_custom,
                       visit_count=excluded.visit_count, last_seen=excluded.last_seen, score=excluded.score",
        params![
            &updated.domain,
            &updated.url,
            &updated.title,
            updated.title_is_custom,
            updated.visit_count,
            updated.last_seen,
            updated.score
        ],
    )
    .context("Failed to upsert domain stats")?;

    Ok(updated)
}

fn select_domain_stat(conn: &Connection, domain: &str) -> Result<Option<DomainStatRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM domain_stats WHERE domain = ?1",
            queries::DOMAIN_STAT_COLUMNS
        ),
        params![domain],
        domain_stat_from_row,
    )
    .optional()
    .with_context(|| format!("Failed to read domain stats: {domain}"))
}

fn domain_stat_from_row(row: &Row<'_>) -> rusqlite::Result<DomainStatRow> {
    Ok(DomainStatRow {
        domain: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        title_is_custom: row.get(3)?,
        visit_count: row.get(4)?,
        last_seen: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        score: row.get(6)?,
    })
}

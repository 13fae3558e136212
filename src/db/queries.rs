pub const CREATE_VISITS: &str = r#"
CREATE TABLE IF NOT EXISTS visits (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  url           TEXT NOT NULL,
  domain        TEXT NOT NULL,
  title         TEXT,
  timestamp     INTEGER NOT NULL,
  minute_of_day INTEGER
);
"#;

pub const CREATE_DOMAIN_STATS: &str = r#"
CREATE TABLE IF NOT EXISTS domain_stats (
  domain          TEXT PRIMARY KEY,
  url             TEXT,
  title           TEXT,
  title_is_custom INTEGER NOT NULL DEFAULT 0,
  visit_count     INTEGER NOT NULL DEFAULT 0,
  last_seen       INTEGER,
  score           REAL NOT NULL DEFAULT 0
);
"#;

pub const CREATE_DOMAIN_MINUTES: &str = r#"
CREATE TABLE IF NOT EXISTS domain_minutes (
  domain      TEXT NOT NULL,
  minute      INTEGER NOT NULL,
  visit_count INTEGER NOT NULL DEFAULT 0,
  PRIMARY KEY (domain, minute)
);
"#;

pub const CREATE_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
  key   TEXT PRIMARY KEY,
  value TEXT
);
"#;

pub const INDEX_VISITS_DOMAIN: &str =
    "CREATE INDEX IF NOT EXISTS idx_visits_domain ON visits(domain);";

pub const INDEX_VISITS_TIMESTAMP: &str =
    "CREATE INDEX IF NOT EXISTS idx_visits_timestamp ON visits(timestamp);";

pub const INDEX_VISITS_MINUTE: &str =
    "CREATE INDEX IF NOT EXISTS idx_visits_minute ON visits(minute_of_day);";

pub const INDEX_DOMAIN_STATS_SCORE: &str =
    "CREATE INDEX IF NOT EXISTS idx_domain_stats_score ON domain_stats(score DESC);";

/// Columns added after the first release, as `(table, column, definition)`.
pub const ADDED_COLUMNS: [(&str, &str, &str); 3] = [
    ("domain_stats", "url", "TEXT"),
    (
        "domain_stats",
        "title_is_custom",
        "INTEGER NOT NULL DEFAULT 0",
    ),
    ("visits", "minute_of_day", "INTEGER"),
];

pub const BACKFILL_MINUTE_OF_DAY: &str = r#"
UPDATE visits
SET minute_of_day = (
  CAST(strftime('%H', timestamp / 1000, 'unixepoch', 'localtime') AS INTEGER) * 60 +
  CAST(strftime('%M', timestamp / 1000, 'unixepoch', 'localtime') AS INTEGER)
)
WHERE minute_of_day IS NULL
"#;

pub const HAS_LEGACY_HOUR_TABLE: &str =
    "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'domain_hours')";

/// Hour buckets land on the middle minute of their hour.
pub const MIGRATE_HOURS_TO_MINUTES: &str = r#"
INSERT OR IGNORE INTO domain_minutes (domain, minute, visit_count)
SELECT domain, hour * 60 + 30, visit_count FROM domain_hours
"#;

pub const DROP_LEGACY_HOUR_TABLE: &str = "DROP TABLE domain_hours";

pub const DOMAIN_STAT_COLUMNS: &str =
    "domain, url, title, title_is_custom, visit_count, last_seen, score";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_VISITS,
        CREATE_DOMAIN_STATS,
        CREATE_DOMAIN_MINUTES,
        CREATE_SETTINGS,
        INDEX_VISITS_DOMAIN,
        INDEX_VISITS_TIMESTAMP,
        INDEX_VISITS_MINUTE,
        INDEX_DOMAIN_STATS_SCORE,
    ]
}

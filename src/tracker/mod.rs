pub mod domain;
pub mod minutes;
pub mod ranker;
pub mod score;

use crate::db::{Database, Settings};
use crate::tracker::domain::{extract_domain, is_ignored};
use crate::tracker::minutes::minute_of_day;
use crate::tracker::ranker::BookmarkEntry;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("bookmark not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

/// A visit as reported by the browser extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub timestamp: Option<i64>,
}

/// A validated visit, ready to be folded into the store.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub url: String,
    pub domain: String,
    pub title: Option<String>,
    pub timestamp_ms: i64,
    pub minute_of_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackOutcome {
    pub ignored: bool,
}

/// Validates and records one visit. The minute of day is taken from `tz`.
/// Ignored domains are a successful no-op.
pub fn record_visit<Tz: TimeZone>(
    database: &mut Database,
    settings: &Settings,
    request: VisitRequest,
    tz: &Tz,
) -> TrackerResult<TrackOutcome> {
    let url = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or(TrackerError::MissingUrl)?;
    let domain = extract_domain(&url).ok_or_else(|| TrackerError::InvalidUrl(url.clone()))?;

    if is_ignored(&domain, &settings.ignored_domains) {
        debug!(domain = %domain, "visit to ignored domain skipped");
        return Ok(TrackOutcome { ignored: true });
    }

    // A zero timestamp means the client had no clock reading.
    let timestamp_ms = request
        .timestamp
        .filter(|timestamp| *timestamp != 0)
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    let minute_of_day =
        minute_of_day(timestamp_ms, tz).ok_or(TrackerError::InvalidTimestamp(timestamp_ms))?;

    let visit = VisitEvent {
        url,
        domain,
        title: request.title,
        timestamp_ms,
        minute_of_day,
    };

    let stat = database.ingest_visit(&visit, settings.merge_to_root)?;
    debug!(
        domain = %stat.domain,
        visits = stat.visit_count,
        minute = visit.minute_of_day,
        "visit recorded"
    );

    Ok(TrackOutcome { ignored: false })
}

pub fn list_bookmarks(
    database: &Database,
    limit: usize,
    current_minute: u32,
) -> TrackerResult<Vec<BookmarkEntry>> {
    Ok(ranker::rank(database, limit, current_minute)?)
}

pub fn update_bookmark(
    database: &Database,
    domain: &str,
    url: Option<&str>,
    title: Option<&str>,
) -> TrackerResult<()> {
    if database.update_bookmark(domain, url, title)? {
        info!(domain, "bookmark updated");
        Ok(())
    } else {
        Err(TrackerError::NotFound(domain.to_string()))
    }
}

/// Deleting a domain that was never recorded is not an error.
pub fn delete_bookmark(database: &mut Database, domain: &str) -> TrackerResult<()> {
    let deleted = database.delete_bookmark(domain)?;
    info!(domain, rows = deleted, "bookmark deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        TrackerError, VisitRequest, delete_bookmark, list_bookmarks, record_visit, update_bookmark,
    };
    use crate::db::{Database, Settings};
    use chrono::{TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> i64 {
        Utc.with_ymd_and_hms(2026, 10, 18, hour, minute, 0)
            .single()
            .expect("valid time")
            .timestamp_millis()
    }

    fn request(url: &str, timestamp: i64) -> VisitRequest {
        VisitRequest {
            url: Some(url.to_string()),
            title: None,
            timestamp: Some(timestamp),
        }
    }

    #[test]
    fn rejects_missing_and_unparsable_urls() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings::default();

        let missing = record_visit(&mut database, &settings, VisitRequest::default(), &Utc);
        assert!(matches!(missing, Err(TrackerError::MissingUrl)));

        let invalid = record_visit(&mut database, &settings, request("not a url", at(9, 0)), &Utc);
        assert!(matches!(invalid, Err(TrackerError::InvalidUrl(_))));

        assert_eq!(database.domain_count().expect("count"), 0);
    }

    #[test]
    fn zero_timestamp_is_recorded_as_now() {
        let mut database = Database::open_in_memory().expect("db");
        let before = Utc::now().timestamp_millis();

        record_visit(&mut database, &Settings::default(), request("http://a.com", 0), &Utc)
            .expect("record");

        let stat = database.domain_stat("a.com").expect("query").expect("row");
        assert!(stat.last_seen >= before);
        assert_eq!(stat.score, 1.0);
    }

    #[test]
    fn ignored_domain_leaves_no_rows() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings {
            merge_to_root: false,
            ignored_domains: vec!["example.com".to_string()],
        };

        let outcome = record_visit(
            &mut database,
            &settings,
            request("http://ads.example.com/x", at(9, 0)),
            &Utc,
        )
        .expect("record");

        assert!(outcome.ignored);
        assert!(database.domain_stat("ads.example.com").expect("query").is_none());
        assert!(database.minute_buckets("ads.example.com").expect("buckets").is_empty());
        assert_eq!(database.visit_log_count("ads.example.com").expect("count"), 0);
    }

    #[test]
    fn bucket_sum_matches_visit_count() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings::default();

        for (hour, minute) in [(9, 0), (9, 0), (12, 15), (23, 59), (0, 0), (9, 1)] {
            let visit = request("http://a.com/x", at(hour, minute));
            record_visit(&mut database, &settings, visit, &Utc).expect("record");
        }

        let stat = database.domain_stat("a.com").expect("query").expect("row");
        let buckets = database.minute_buckets("a.com").expect("buckets");

        assert_eq!(stat.visit_count, 6);
        assert_eq!(buckets.iter().map(|bucket| bucket.visit_count).sum::<i64>(), 6);
        assert!(buckets.iter().any(|bucket| bucket.minute == 540 && bucket.visit_count == 2));
        assert!(buckets.iter().any(|bucket| bucket.minute == 1439));
    }

    #[test]
    fn more_visits_rank_higher_at_same_minute() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings::default();

        for _ in 0..3 {
            record_visit(&mut database, &settings, request("http://a.com", at(9, 0)), &Utc)
                .expect("record");
        }
        record_visit(&mut database, &settings, request("http://b.com", at(9, 0)), &Utc)
            .expect("record");

        let entries = list_bookmarks(&database, 2, 540).expect("rank");
        let domains = entries.iter().map(|entry| entry.domain.as_str()).collect::<Vec<_>>();

        assert_eq!(domains, vec!["a.com", "b.com"]);
        assert_eq!(entries[0].score, 4.5);
        assert_eq!(entries[1].score, 1.5);
        assert_eq!(entries[0].visits, 3);
    }

    #[test]
    fn merge_to_root_collapses_paths() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings {
            merge_to_root: true,
            ignored_domains: Vec::new(),
        };

        record_visit(&mut database, &settings, request("http://a.com/path1", at(9, 0)), &Utc)
            .expect("record");
        record_visit(&mut database, &settings, request("http://a.com/path2", at(9, 5)), &Utc)
            .expect("record");

        assert_eq!(database.domain_count().expect("count"), 1);
        let stat = database.domain_stat("a.com").expect("query").expect("row");
        assert_eq!(stat.url.as_deref(), Some("http://a.com"));
        assert_eq!(stat.visit_count, 2);
    }

    #[test]
    fn update_requires_existing_domain() {
        let mut database = Database::open_in_memory().expect("db");

        let missing = update_bookmark(&database, "a.com", Some("https://a.com"), Some("A"));
        assert!(matches!(missing, Err(TrackerError::NotFound(_))));
        assert_eq!(
            missing.expect_err("missing").to_string(),
            "bookmark not found: a.com"
        );

        record_visit(
            &mut database,
            &Settings::default(),
            VisitRequest {
                url: Some("https://a.com/inbox".to_string()),
                title: Some("Inbox (1)".to_string()),
                timestamp: Some(at(9, 0)),
            },
            &Utc,
        )
        .expect("record");
        update_bookmark(&database, "a.com", Some("https://a.com"), Some("Mail")).expect("update");

        record_visit(
            &mut database,
            &Settings::default(),
            VisitRequest {
                url: Some("https://a.com/inbox".to_string()),
                title: Some("Inbox (2)".to_string()),
                timestamp: Some(at(9, 1)),
            },
            &Utc,
        )
        .expect("record");

        let entries = list_bookmarks(&database, 1, 540).expect("rank");
        assert_eq!(entries[0].title, "Mail");
        assert_eq!(entries[0].url, "https://a.com");
    }

    #[test]
    fn delete_is_idempotent() {
        let mut database = Database::open_in_memory().expect("db");
        let settings = Settings::default();
        record_visit(&mut database, &settings, request("http://a.com", at(9, 0)), &Utc)
            .expect("record");

        delete_bookmark(&mut database, "a.com").expect("first delete");
        delete_bookmark(&mut database, "a.com").expect("second delete");

        assert_eq!(database.domain_count().expect("count"), 0);
        assert!(list_bookmarks(&database, 20, 540).expect("rank").is_empty());
    }
}

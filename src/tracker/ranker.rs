use crate::db::{Database, DomainStatRow};
use crate::tracker::minutes::{TIME_WINDOW, boost_from_counts, window_minutes};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Candidates fetched per requested entry, so time boosts can reorder a wider pool.
pub const OVERSAMPLE_FACTOR: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkEntry {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub visits: i64,
    pub last_seen: i64,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub stat: DomainStatRow,
    pub time_boost: f64,
    pub adjusted_score: f64,
}

/// Ranks the top `limit` domains for the given local minute of day.
pub fn rank(database: &Database, limit: usize, current_minute: u32) -> Result<Vec<BookmarkEntry>> {
    let candidates = collect_candidates(database, limit)?;
    let scored = score_candidates(database, candidates, current_minute)?;

    Ok(truncate(scored, limit))
}

pub fn collect_candidates(database: &Database, limit: usize) -> Result<Vec<DomainStatRow>> {
    database.top_domain_stats(limit.saturating_mul(OVERSAMPLE_FACTOR))
}

/// Applies each candidate's time boost and sorts by adjusted score, highest
/// first. Equal scores are ordered by domain.
pub fn score_candidates(
    database: &Database,
    candidates: Vec<DomainStatRow>,
    current_minute: u32,
) -> Result<Vec<ScoredCandidate>> {
    let mut scored = candidates
        .into_iter()
        .map(|stat| {
            let time_boost = time_boost(database, &stat.domain, current_minute)?;
            Ok(ScoredCandidate {
                adjusted_score: stat.score * time_boost,
                time_boost,
                stat,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(|left, right| {
        right
            .adjusted_score
            .total_cmp(&left.adjusted_score)
            .then_with(|| left.stat.domain.cmp(&right.stat.domain))
    });

    Ok(scored)
}

pub fn truncate(scored: Vec<ScoredCandidate>, limit: usize) -> Vec<BookmarkEntry> {
    scored
        .into_iter()
        .take(limit)
        .map(|candidate| {
            let ScoredCandidate {
                stat,
                time_boost,
                adjusted_score,
            } = candidate;
            debug!(
                domain = %stat.domain,
                score = stat.score,
                time_boost,
                adjusted_score,
                "ranked bookmark"
            );

            BookmarkEntry {
                url: stat
                    .url
                    .filter(|url| !url.is_empty())
                    .unwrap_or_else(|| format!("https://{}", stat.domain)),
                title: stat
                    .title
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| stat.domain.clone()),
                domain: stat.domain,
                visits: stat.visit_count,
                last_seen: stat.last_seen,
                score: round_two_places(adjusted_score),
            }
        })
        .collect()
}

/// Share of the domain's visits that fall within the ±30 minute window, mapped to `[0.5, 1.5]`.
/// Domains without history get a neutral `1.0`.
pub fn time_boost(database: &Database, domain: &str, current_minute: u32) -> Result<f64> {
    let window = window_minutes(current_minute, TIME_WINDOW)
        .into_iter()
        .collect::<HashSet<_>>();
    let buckets = database.minute_buckets(domain)?;

    let total = buckets.iter().map(|bucket| bucket.visit_count).sum::<i64>();
    let nearby = buckets
        .iter()
        .filter(|bucket| window.contains(&bucket.minute))
        .map(|bucket| bucket.visit_count)
        .sum::<i64>();

    Ok(boost_from_counts(nearby, total))
}

fn round_two_places(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{rank, round_two_places, time_boost};
    use crate::db::Database;
    use crate::tracker::VisitEvent;

    fn ingest_at(database: &mut Database, domain: &str, minute_of_day: u32, count: usize) {
        for index in 0..count {
            database
                .ingest_visit(
                    &VisitEvent {
                        url: format!("http://{domain}"),
                        domain: domain.to_string(),
                        title: None,
                        timestamp_ms: 1_000 + index as i64,
                        minute_of_day,
                    },
                    false,
                )
                .expect("ingest");
        }
    }

    #[test]
    fn unvisited_domain_gets_neutral_boost() {
        let database = Database::open_in_memory().expect("db");
        assert_eq!(time_boost(&database, "never.com", 540).expect("boost"), 1.0);
    }

    #[test]
    fn boost_reaches_both_bounds() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "inside.com", 530, 60);
        ingest_at(&mut database, "inside.com", 565, 40);
        ingest_at(&mut database, "outside.com", 700, 100);

        assert_eq!(time_boost(&database, "inside.com", 540).expect("boost"), 1.5);
        assert_eq!(time_boost(&database, "outside.com", 540).expect("boost"), 0.5);
    }

    #[test]
    fn boost_window_wraps_midnight() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "late.com", 1430, 1);
        ingest_at(&mut database, "late.com", 20, 1);

        assert_eq!(time_boost(&database, "late.com", 5).expect("boost"), 1.5);
    }

    #[test]
    fn boost_stays_in_bounds_for_mixed_history() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "mixed.com", 100, 3);
        ingest_at(&mut database, "mixed.com", 900, 5);

        for minute in (0..1440).step_by(37) {
            let boost = time_boost(&database, "mixed.com", minute).expect("boost");
            assert!((0.5..=1.5).contains(&boost));
        }
    }

    #[test]
    fn time_of_day_reorders_within_oversampled_pool() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "news.com", 720, 4);
        ingest_at(&mut database, "mail.com", 540, 3);

        let morning = rank(&database, 1, 540).expect("rank");
        assert_eq!(morning.len(), 1);
        assert_eq!(morning[0].domain, "mail.com");
        assert_eq!(morning[0].score, 4.5);

        let lunch = rank(&database, 1, 720).expect("rank");
        assert_eq!(lunch[0].domain, "news.com");
        assert_eq!(lunch[0].score, 6.0);
    }

    #[test]
    fn equal_scores_fall_back_to_domain_order() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "zeta.com", 540, 1);
        ingest_at(&mut database, "alpha.com", 540, 1);
        ingest_at(&mut database, "mid.com", 540, 1);

        let domains = rank(&database, 3, 540)
            .expect("rank")
            .into_iter()
            .map(|entry| entry.domain)
            .collect::<Vec<_>>();

        assert_eq!(domains, vec!["alpha.com", "mid.com", "zeta.com"]);
    }

    #[test]
    fn entries_fall_back_to_domain_for_url_and_title() {
        let mut database = Database::open_in_memory().expect("db");
        ingest_at(&mut database, "a.com", 540, 1);
        database
            .update_bookmark("a.com", Some(""), Some(""))
            .expect("update");

        let entries = rank(&database, 5, 540).expect("rank");
        assert_eq!(entries[0].url, "https://a.com");
        assert_eq!(entries[0].title, "a.com");
        assert_eq!(entries[0].visits, 1);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round_two_places(1.23456), 1.23);
        assert_eq!(round_two_places(4.499), 4.5);
    }
}

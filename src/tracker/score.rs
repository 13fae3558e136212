use crate::db::DomainStatRow;
use crate::tracker::VisitEvent;
use crate::tracker::domain::root_url;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;
/// One week, in hours.
pub const DECAY_HOURS: f64 = 168.0;

/// `visit_count * exp(-age_hours / 168)`, where age is measured from `last_seen_ms` to `as_of_ms`.
pub fn decay_score(visit_count: i64, as_of_ms: i64, last_seen_ms: i64) -> f64 {
    let age_hours = (as_of_ms - last_seen_ms) as f64 / MILLIS_PER_HOUR;
    visit_count as f64 * (-age_hours / DECAY_HOURS).exp()
}

/// Folds one visit into the domain's stat row. The score is always computed
/// with the visit's own timestamp as "now", so it never decays between visits.
pub fn apply_visit(
    existing: Option<DomainStatRow>,
    visit: &VisitEvent,
    merge_to_root: bool,
) -> DomainStatRow {
    let store_url = if merge_to_root {
        root_url(&visit.url)
    } else {
        visit.url.clone()
    };
    let title = visit.title.clone().filter(|value| !value.trim().is_empty());

    match existing {
        None => DomainStatRow {
            domain: visit.domain.clone(),
            url: Some(store_url),
            title: Some(title.unwrap_or_default()),
            title_is_custom: false,
            visit_count: 1,
            last_seen: visit.timestamp_ms,
            score: decay_score(1, visit.timestamp_ms, visit.timestamp_ms),
        },
        Some(row) => {
            let visit_count = row.visit_count + 1;
            let url = if merge_to_root {
                Some(store_url)
            } else {
                row.url.filter(|value| !value.is_empty()).or(Some(store_url))
            };
            let title = if row.title_is_custom {
                row.title
            } else {
                title.or(row.title)
            };

            DomainStatRow {
                domain: row.domain,
                url,
                title,
                title_is_custom: row.title_is_custom,
                visit_count,
                last_seen: visit.timestamp_ms,
                score: decay_score(visit_count, visit.timestamp_ms, visit.timestamp_ms),
            }
        }
    }
}

use crate::models::{
    DashboardStats, MonthlyCount, NamedCount, Staleness, StalenessStatus,
};
use crate::store::StoredRecord;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;

/// Parses a sheet-style date cell. The table accumulates values written by
/// several producers, so RFC 3339 and the two date-only forms all occur.
pub fn parse_sheet_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y/%m/%d", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&midnight));
        }
    }

    None
}

/// Classifies one record's contact recency.
///
/// Unknown when the last-contact cell is absent or unparsable. Otherwise
/// `elapsed_days = floor((now - last) / one day)` and the record is dormant
/// once the threshold is reached.
pub fn classify(last_contact: &str, threshold_days: i64, now: DateTime<Utc>) -> Staleness {
    match parse_sheet_date(last_contact) {
        None => Staleness {
            status: StalenessStatus::Unknown,
            elapsed_days: None,
        },
        Some(last) => {
            let elapsed_days = (now - last).num_days();
            let status = if elapsed_days >= threshold_days {
                StalenessStatus::Dormant
            } else {
                StalenessStatus::Active
            };
            Staleness {
                status,
                elapsed_days: Some(elapsed_days),
            }
        }
    }
}

/// Pure reduction over all records for the dashboard.
///
/// No external calls; malformed per-record dates are skipped for the field
/// they affect and never abort the pass.
pub fn dashboard_stats(
    records: &[StoredRecord],
    threshold_days: i64,
    now: DateTime<Utc>,
) -> DashboardStats {
    let mut active_count = 0;
    let mut dormant_count = 0;
    let mut no_contact_count = 0;
    let mut monthly_map: HashMap<String, usize> = HashMap::new();
    let mut industry_map: HashMap<String, usize> = HashMap::new();
    let mut staff_map: HashMap<String, usize> = HashMap::new();

    for stored in records {
        let record = &stored.record;

        match classify(&record.last_contact, threshold_days, now).status {
            StalenessStatus::Active => active_count += 1,
            StalenessStatus::Dormant => dormant_count += 1,
            StalenessStatus::Unknown => no_contact_count += 1,
        }

        if let Some(registered) = parse_sheet_date(&record.registered_date) {
            let key = format!("{}-{:02}", registered.year(), registered.month());
            *monthly_map.entry(key).or_insert(0) += 1;
        }

        if !record.industry.trim().is_empty() {
            *industry_map.entry(record.industry.trim().to_string()).or_insert(0) += 1;
        }

        if !record.staff_name.trim().is_empty() {
            *staff_map.entry(record.staff_name.trim().to_string()).or_insert(0) += 1;
        }
    }

    // Trailing 12 months, oldest first
    let months_since_epoch = now.year() * 12 + now.month0() as i32;
    let monthly = (0..12)
        .rev()
        .map(|back| {
            let total = months_since_epoch - back;
            let key = format!("{}-{:02}", total.div_euclid(12), total.rem_euclid(12) + 1);
            let count = monthly_map.get(&key).copied().unwrap_or(0);
            MonthlyCount { month: key, count }
        })
        .collect();

    let mut industries: Vec<NamedCount> = industry_map
        .into_iter()
        .map(|(name, count)| NamedCount { name, count })
        .collect();
    industries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    industries.truncate(10);

    let mut staff_ranking: Vec<NamedCount> = staff_map
        .into_iter()
        .map(|(name, count)| NamedCount { name, count })
        .collect();
    staff_ranking.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    DashboardStats {
        total_customers: records.len(),
        active_count,
        dormant_count,
        no_contact_count,
        monthly,
        industries,
        staff_ranking,
    }
}

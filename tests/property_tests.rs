/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use chrono::{Duration, TimeZone, Utc};
use meishi_sfa_api::gemini::parse_lenient_json;
use meishi_sfa_api::matching::find_matches;
use meishi_sfa_api::models::{CustomerRecord, StalenessStatus};
use meishi_sfa_api::staleness::classify;
use meishi_sfa_api::store::StoredRecord;
use proptest::prelude::*;

fn stored(row: usize, company: &str, name: &str) -> StoredRecord {
    StoredRecord {
        row,
        record: CustomerRecord {
            company_name: company.to_string(),
            full_name: name.to_string(),
            ..CustomerRecord::default()
        },
    }
}

// Property: lenient parsing should never panic
proptest! {
    #[test]
    fn lenient_parse_never_panics(text in "\\PC*") {
        let _ = parse_lenient_json(&text);
    }

    #[test]
    fn parse_error_excerpt_is_bounded(text in "[^\\[\\]{}0-9]*") {
        if let Err(err) = parse_lenient_json(&text) {
            if let meishi_sfa_api::errors::AppError::Parse { excerpt, .. } = err {
                prop_assert!(excerpt.chars().count() <= 200);
            }
        }
    }
}

// Property: fencing a JSON document never changes what is recovered
proptest! {
    #[test]
    fn fenced_and_bare_json_parse_identically(
        entries in proptest::collection::vec(("[a-z]{1,8}", -1000i64..1000i64), 1..6)
    ) {
        let mut object = serde_json::Map::new();
        for (key, value) in &entries {
            object.insert(key.clone(), serde_json::json!(value));
        }
        let bare = serde_json::Value::Object(object).to_string();
        let fenced = format!("```json\n{}\n```", bare);

        let from_bare = parse_lenient_json(&bare).unwrap();
        let from_fenced = parse_lenient_json(&fenced).unwrap();
        prop_assert_eq!(from_bare, from_fenced);
    }

    #[test]
    fn prose_wrapped_json_recovers_the_document(
        entries in proptest::collection::vec(("[a-z]{1,8}", -1000i64..1000i64), 1..6),
        prefix in "[ぁ-んa-z ]{0,20}",
        suffix in "[ぁ-んa-z ]{0,20}"
    ) {
        let mut object = serde_json::Map::new();
        for (key, value) in &entries {
            object.insert(key.clone(), serde_json::json!(value));
        }
        let document = serde_json::Value::Object(object);
        let wrapped = format!("{}{}{}", prefix, document, suffix);

        let recovered = parse_lenient_json(&wrapped).unwrap();
        prop_assert_eq!(recovered, document);
    }
}

// Property: matching is case-insensitive and order-preserving
proptest! {
    #[test]
    fn matching_ignores_query_case(company in "[a-zA-Z]{1,12}") {
        let pool = vec![
            stored(2, &company, ""),
            stored(3, "unrelated-xyz-0", ""),
        ];

        let lower = find_matches(&company.to_lowercase(), "", &pool);
        let upper = find_matches(&company.to_uppercase(), "", &pool);

        let lower_rows: Vec<usize> = lower.iter().map(|m| m.row).collect();
        let upper_rows: Vec<usize> = upper.iter().map(|m| m.row).collect();
        prop_assert_eq!(lower_rows, upper_rows);
        prop_assert!(lower.iter().any(|m| m.row == 2));
    }

    #[test]
    fn person_match_never_fires_on_substrings(name in "[a-z]{4,12}") {
        let partial = &name[..name.len() - 1];
        let pool = vec![stored(2, "", &name)];
        prop_assert!(find_matches("", partial, &pool).is_empty());
    }

    #[test]
    fn match_rows_follow_pool_order(rows in proptest::collection::vec(2usize..100, 1..8)) {
        let pool: Vec<StoredRecord> = rows
            .iter()
            .map(|r| stored(*r, "acme", ""))
            .collect();
        let matched: Vec<usize> = find_matches("acme", "", &pool).iter().map(|m| m.row).collect();
        prop_assert_eq!(matched, rows);
    }
}

// Property: staleness arithmetic
proptest! {
    #[test]
    fn elapsed_days_equal_the_gap(days in 0i64..5000, threshold in 1i64..400) {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let last = (now - Duration::days(days)).to_rfc3339();
        let result = classify(&last, threshold, now);

        prop_assert_eq!(result.elapsed_days, Some(days));
        let expected = if days >= threshold {
            StalenessStatus::Dormant
        } else {
            StalenessStatus::Active
        };
        prop_assert_eq!(result.status, expected);
    }

    #[test]
    fn garbage_dates_always_classify_unknown(garbage in "[^0-9]{1,20}") {
        let now = Utc::now();
        let result = classify(&garbage, 180, now);
        prop_assert_eq!(result.status, StalenessStatus::Unknown);
        prop_assert_eq!(result.elapsed_days, None);
    }
}

use crate::staleness::parse_sheet_date;
use crate::store::StoredRecord;

/// An existing record considered a duplicate of an incoming card.
/// Carries what the alert message needs: who owns the contact and when it
/// last happened.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub row: usize,
    pub company_name: String,
    pub full_name: String,
    pub staff_name: String,
    pub last_contact: String,
}

/// Finds existing records matching a new (company, person) identity pair.
///
/// Company names match on case-insensitive, trimmed containment in either
/// direction - abbreviated and full legal names must find each other.
/// Person names match only on case-insensitive, trimmed exact equality;
/// partial person matches produce too many false positives.
///
/// Result order equals pool order; no dedup within matches.
pub fn find_matches(
    company_name: &str,
    full_name: &str,
    pool: &[StoredRecord],
) -> Vec<MatchCandidate> {
    let company_query = company_name.trim().to_lowercase();
    let name_query = full_name.trim().to_lowercase();

    if company_query.is_empty() && name_query.is_empty() {
        return Vec::new();
    }

    pool.iter()
        .filter(|stored| {
            let candidate_company = stored.record.company_name.trim().to_lowercase();
            let candidate_name = stored.record.full_name.trim().to_lowercase();

            let company_hit = !company_query.is_empty()
                && !candidate_company.is_empty()
                && (candidate_company.contains(&company_query)
                    || company_query.contains(&candidate_company));
            let name_hit = !name_query.is_empty()
                && !candidate_name.is_empty()
                && candidate_name == name_query;

            company_hit || name_hit
        })
        .map(|stored| MatchCandidate {
            row: stored.row,
            company_name: stored.record.company_name.clone(),
            full_name: stored.record.full_name.clone(),
            staff_name: stored.record.staff_name.clone(),
            last_contact: stored.record.last_contact.clone(),
        })
        .collect()
}

/// Renders the duplicate alert pushed to chat channels and written to the
/// record's alert column. One line per match, newest pool order preserved.
pub fn build_duplicate_alert(matches: &[MatchCandidate]) -> String {
    let lines: Vec<String> = matches
        .iter()
        .map(|m| {
            let staff = if m.staff_name.trim().is_empty() {
                "不明"
            } else {
                m.staff_name.trim()
            };
            let date = parse_sheet_date(&m.last_contact)
                .map(|d| d.format("%Y/%m/%d").to_string())
                .unwrap_or_else(|| "日付不明".to_string());
            format!(
                "{} の {} さんは、{} が {} に接触済みです",
                m.company_name, m.full_name, staff, date
            )
        })
        .collect();

    format!("【重複検知】\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomerRecord;

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

    #[test]
    fn company_containment_matches_both_directions() {
        let pool = vec![
            stored(2, "株式会社アクメ商事", "佐藤 一郎"),
            stored(3, "アクメ", "鈴木 花子"),
            stored(4, "別会社", "田中 次郎"),
        ];

        let matches = find_matches("アクメ商事", "", &pool);
        // Row 2 contains the query; the query contains row 3's name.
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].row, 2);
        assert_eq!(matches[1].row, 3);
    }

    #[test]
    fn company_matching_is_case_insensitive_and_trimmed() {
        let pool = vec![stored(2, "  Acme Inc.  ", "Jane Doe")];
        let matches = find_matches("acme", "", &pool);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn person_requires_exact_equality() {
        let pool = vec![
            stored(2, "", "山田 太郎"),
            stored(3, "", "山田 太"),
        ];

        let matches = find_matches("", "山田 太郎", &pool);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].row, 2);

        // Case-insensitive for Latin names
        let pool = vec![stored(2, "", "Jane Doe")];
        assert_eq!(find_matches("", "JANE DOE", &pool).len(), 1);
        assert_eq!(find_matches("", "Jane", &pool).len(), 0);
    }

    #[test]
    fn both_empty_inputs_short_circuit() {
        let pool = vec![stored(2, "アクメ", "山田 太郎")];
        assert!(find_matches("", "  ", &pool).is_empty());
    }

    #[test]
    fn result_order_follows_pool_order() {
        let pool = vec![
            stored(5, "アクメ東京", ""),
            stored(2, "アクメ大阪", ""),
            stored(9, "アクメ名古屋", ""),
        ];
        let rows: Vec<usize> = find_matches("アクメ", "", &pool)
            .iter()
            .map(|m| m.row)
            .collect();
        assert_eq!(rows, vec![5, 2, 9]);
    }

    #[test]
    fn alert_message_names_owner_and_date() {
        let matches = vec![MatchCandidate {
            row: 2,
            company_name: "アクメ商事".to_string(),
            full_name: "佐藤 一郎".to_string(),
            staff_name: "高橋".to_string(),
            last_contact: "2026-03-01T10:00:00+09:00".to_string(),
        }];
        let alert = build_duplicate_alert(&matches);
        assert!(alert.starts_with("【重複検知】"));
        assert!(alert.contains("アクメ商事 の 佐藤 一郎 さんは、高橋 が 2026/03/01 に接触済みです"));
    }

    #[test]
    fn alert_falls_back_for_missing_owner_and_date() {
        let matches = vec![MatchCandidate {
            row: 2,
            company_name: "アクメ商事".to_string(),
            full_name: "佐藤 一郎".to_string(),
            staff_name: "".to_string(),
            last_contact: "not-a-date".to_string(),
        }];
        let alert = build_duplicate_alert(&matches);
        assert!(alert.contains("不明 が 日付不明 に"));
    }
}

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One customer row in the record table.
///
/// Dates are kept as sheet-style strings (RFC 3339 or `yyyy/MM/dd`) and parsed
/// on use; an empty `last_contact` means "never contacted". The enrichment
/// columns are filled by the pipeline, everything else comes from the card.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomerRecord {
    pub registered_date: String,
    pub company_name: String,
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub website: String,
    pub last_contact: String,
    pub staff_name: String,
    pub image_url: String,
    pub x_url: String,
    pub facebook_url: String,
    pub instagram_url: String,
    pub youtube_url: String,
    pub tiktok_url: String,
    pub company_site: String,
    pub industry: String,
    pub trends: String,
    pub challenges: String,
    pub similar: String,
    pub dup_alert: String,
    pub notes: String,
}

/// Card fields as submitted by the upload client or extracted by OCR.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardInput {
    pub company_name: String,
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub website: String,
}

impl CardInput {
    /// A card with neither a company nor a person cannot be enriched or
    /// matched and is rejected at intake.
    pub fn has_identity(&self) -> bool {
        !self.company_name.trim().is_empty() || !self.full_name.trim().is_empty()
    }
}

/// One base64-encoded card image for the OCR intake path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardImage {
    pub mime_type: String,
    /// Base64 payload, passed through to the model untouched.
    pub data: String,
}

/// One web-search result from the search-augmentation service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Social-profile search URLs generated for one record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnsLinks {
    pub x_url: String,
    pub facebook_url: String,
    pub instagram_url: String,
    pub youtube_url: String,
    pub tiktok_url: String,
}

/// Structured output of the industry-analysis stage. The list fields are
/// already rendered as numbered text for the record table.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryInsights {
    pub industry: String,
    pub trends: String,
    pub challenges: String,
    pub sales_tip: String,
}

/// Sales priority of a suggested similar company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_ja(&self) -> &'static str {
        match self {
            Priority::High => "高",
            Priority::Medium => "中",
            Priority::Low => "低",
        }
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ja())
    }
}

impl<'de> Deserialize<'de> for Priority {
    /// The model is asked for 高/中/低 but occasionally answers in English;
    /// anything unrecognized degrades to Medium rather than failing the row.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.trim() {
            "高" | "high" | "High" | "HIGH" => Priority::High,
            "低" | "low" | "Low" | "LOW" => Priority::Low,
            _ => Priority::Medium,
        })
    }
}

/// One suggested related company from the discovery stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimilarCompany {
    pub name: String,
    pub industry: String,
    pub reason: String,
    pub priority: Priority,
    pub estimated_url: String,
}

/// Ephemeral summary of one batch run. Never persisted beyond a log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchRun {
    pub processed: usize,
    pub errors: usize,
    pub total: usize,
}

/// Dormancy classification of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessStatus {
    Active,
    Dormant,
    Unknown,
}

/// Result of classifying a record against the dormancy threshold.
/// `elapsed_days` is absent when the last-contact date is missing or
/// unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Staleness {
    pub status: StalenessStatus,
    pub elapsed_days: Option<i64>,
}

/// A dormant customer selected for the revival batch.
#[derive(Debug, Clone)]
pub struct DormantCustomer {
    pub row: usize,
    pub company_name: String,
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub last_contact: String,
    pub staff_name: String,
    pub industry: String,
    pub dormant_days: i64,
}

/// A generated re-contact email draft, persisted for review before sending.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDraft {
    pub generated_at: String,
    pub company_name: String,
    pub full_name: String,
    pub email: String,
    pub last_contact: String,
    pub dormant_days: i64,
    pub news: String,
    pub subject: String,
    pub body: String,
    pub status: String,
}

/// One alert recorded in the notification log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLogEntry {
    pub at: String,
    pub kind: String,
    pub company_name: String,
    pub full_name: String,
    pub message: String,
    pub targets: String,
}

/// Count of records per categorical bucket (industry, staff).
#[derive(Debug, Clone, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

/// Registrations in one calendar month, keyed `YYYY-MM`.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub count: usize,
}

/// Aggregated dashboard statistics over all records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_customers: usize,
    pub active_count: usize,
    pub dormant_count: usize,
    pub no_contact_count: usize,
    pub monthly: Vec<MonthlyCount>,
    pub industries: Vec<NamedCount>,
    pub staff_ranking: Vec<NamedCount>,
}

/// Result of registering and enriching one card.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCard {
    pub row: usize,
    pub duplicate_found: bool,
    pub record: CustomerRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_tolerates_english_and_defaults_to_medium() {
        let p: Priority = serde_json::from_str("\"高\"").unwrap();
        assert_eq!(p, Priority::High);
        let p: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(p, Priority::Low);
        let p: Priority = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }

    #[test]
    fn similar_company_deserializes_with_missing_fields() {
        let c: SimilarCompany =
            serde_json::from_str(r#"{"name": "株式会社テスト", "priority": "高"}"#).unwrap();
        assert_eq!(c.name, "株式会社テスト");
        assert_eq!(c.priority, Priority::High);
        assert!(c.estimated_url.is_empty());
    }

    #[test]
    fn card_identity_requires_company_or_person() {
        let mut card = CardInput::default();
        assert!(!card.has_identity());
        card.full_name = "山田 太郎".to_string();
        assert!(card.has_identity());
    }
}

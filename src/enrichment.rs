//! Per-record enrichment orchestration.
//!
//! One registration runs several independent stages: duplicate check,
//! social-profile links, canonical site resolution, industry analysis, and
//! similar-company discovery. Each stage's failure is caught at the stage
//! boundary and degraded to a fallback value, so a registration always
//! produces a complete row - stage errors are visible in the row's sentinel
//! text and in the logs, never as a failed request.

use crate::errors::AppError;
use crate::gemini::GeminiClient;
use crate::industry::IndustryAnalyzer;
use crate::matching;
use crate::models::{
    CardImage, CardInput, CustomerRecord, EnrichedCard, NotificationLogEntry,
};
use crate::notify::Notifier;
use crate::similar::SimilarCompanyFinder;
use crate::sns;
use crate::store::RecordStore;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

const MERGE_PROMPT: &str = "あなたは名刺OCRの専門AIです。\n\
提供された画像は、同一人物の1枚の名刺の「表面」と「裏面」です。\n\
両面の情報を統合し、最も正確な1つのJSONデータを作成してください。\n\n\
【重要：氏名の抽出ルール】\n\
1. 名刺の中で「最も大きく記載されている人物名」を \"fullName\" としてください。\n\
2. 会社名や役職と混同しないように注意してください。\n\
3. 漢字とローマ字がある場合は、漢字を優先してください。\n\
4. 氏名が見つからない場合は空文字にしてください。\n\n\
出力フォーマット（JSON）:\n\
{\n\
  \"companyName\": \"会社名\",\n\
  \"fullName\": \"氏名（姓 名）\",\n\
  \"title\": \"役職\",\n\
  \"email\": \"メールアドレス\",\n\
  \"phone\": \"電話番号（ハイフン付き）\",\n\
  \"address\": \"住所\",\n\
  \"website\": \"URL（https://を含む）\"\n\
}";

const MULTI_PROMPT: &str = "あなたは名刺OCRの専門AIです。\n\
画像内の【全ての名刺】を検出し、それぞれの情報を抽出してください。\n\n\
【重要：氏名の抽出ルール】\n\
1. 各名刺の中で「最も大きく記載されている人物名」を必ず抽出してください。\n\
2. \"fullName\" というキーを必ず使用してください。\n\n\
出力フォーマット（JSON配列）:\n\
[\n\
  {\n\
    \"companyName\": \"会社名\",\n\
    \"fullName\": \"氏名（姓 名）\",\n\
    \"title\": \"役職\",\n\
    \"email\": \"メールアドレス\",\n\
    \"phone\": \"電話番号（ハイフン付き）\",\n\
    \"address\": \"住所\",\n\
    \"website\": \"URL（https://を含む）\"\n\
  }\n\
]";

/// How card images should be interpreted by OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// All images are the front/back of one card.
    Merge,
    /// Each image may contain several distinct cards.
    Multi,
}

/// The enrichment orchestrator. Stateless beyond its injected collaborators;
/// construct one per request from shared state.
pub struct Enricher {
    client: Arc<GeminiClient>,
    store: Arc<dyn RecordStore>,
    notifier: Notifier,
    analyzer: IndustryAnalyzer,
    finder: SimilarCompanyFinder,
}

impl Enricher {
    pub fn new(
        client: Arc<GeminiClient>,
        store: Arc<dyn RecordStore>,
        notifier: Notifier,
        analyzer: IndustryAnalyzer,
        finder: SimilarCompanyFinder,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            analyzer,
            finder,
        }
    }

    /// Extracts card fields from uploaded images via OCR.
    pub async fn extract_cards(
        &self,
        images: &[CardImage],
        mode: ScanMode,
    ) -> Result<Vec<CardInput>, AppError> {
        if images.is_empty() {
            return Err(AppError::BadRequest("No images supplied".to_string()));
        }

        let prompt = match mode {
            ScanMode::Merge => MERGE_PROMPT,
            ScanMode::Multi => MULTI_PROMPT,
        };

        let mut parts = vec![json!({ "text": prompt })];
        for image in images {
            parts.push(json!({
                "inline_data": { "mime_type": image.mime_type, "data": image.data }
            }));
        }

        let result = self.client.call_with_parts(parts).await?;
        let raw_cards = match result {
            Value::Array(items) => items,
            single => vec![single],
        };

        Ok(raw_cards.iter().map(card_from_value).collect())
    }

    /// Enriches one card and appends it to the record table.
    ///
    /// The duplicate check runs against the pool snapshot taken before the
    /// append, and its alert text is written as part of the same row. Only a
    /// store failure on the final append can fail this call; every
    /// enrichment stage degrades in place.
    pub async fn enrich_and_register(
        &self,
        card: &CardInput,
        staff_name: &str,
    ) -> Result<EnrichedCard, AppError> {
        let company = card.company_name.trim();
        let person = card.full_name.trim();
        let now = Utc::now();

        // --- Stage: duplicate check (before the write) ---
        let dup_alert = match self.check_duplicates(company, person).await {
            Ok(alert) => alert,
            Err(e) => {
                tracing::warn!("[duplicate-check] {}: {}", company, e);
                String::new()
            }
        };

        // --- Stage: social-profile links ---
        // Template-only apart from the best-effort category keyword, which
        // already degrades to None inside.
        let keyword = sns::infer_category_keyword(&self.client, company).await;
        let links = sns::search_links(company, person, keyword.as_deref());

        // --- Stage: canonical site resolution (never leaves the field empty) ---
        let company_site =
            sns::resolve_company_site(&self.client, company, person, &card.website).await;

        // --- Stage: industry analysis ---
        let insights = self.analyzer.analyze(company, &card.title).await;

        // --- Stage: similar-company discovery ---
        let similar = self.finder.find(company, &insights.industry).await;

        let timestamp = now.to_rfc3339();
        let record = CustomerRecord {
            registered_date: timestamp.clone(),
            company_name: card.company_name.clone(),
            full_name: card.full_name.clone(),
            title: card.title.clone(),
            email: card.email.clone(),
            phone: card.phone.clone(),
            address: card.address.clone(),
            website: card.website.clone(),
            // First contact is the registration itself
            last_contact: timestamp.clone(),
            staff_name: staff_name.to_string(),
            image_url: String::new(),
            x_url: links.x_url,
            facebook_url: links.facebook_url,
            instagram_url: links.instagram_url,
            youtube_url: links.youtube_url,
            tiktok_url: links.tiktok_url,
            company_site,
            industry: insights.industry,
            trends: insights.trends,
            challenges: insights.challenges,
            similar: similar.summary.clone(),
            dup_alert: dup_alert.clone(),
            notes: insights.sales_tip,
        };

        let row = self.store.append(record.clone())?;

        if !similar.companies.is_empty() {
            if let Err(e) = self
                .store
                .append_similar(&record.company_name, &timestamp, &similar.companies)
            {
                tracing::warn!("[similar-companies] {}: {}", company, e);
            }
        }

        tracing::info!(
            "Registered {} {} at row {} (duplicate: {})",
            record.company_name,
            record.full_name,
            row,
            !dup_alert.is_empty()
        );

        Ok(EnrichedCard {
            row,
            duplicate_found: !dup_alert.is_empty(),
            record,
        })
    }

    /// Matches the incoming identity against the current pool and, on a hit,
    /// pushes the alert and records it in the notification log.
    async fn check_duplicates(&self, company: &str, person: &str) -> Result<String, AppError> {
        let pool = self.store.all()?;
        let matches = matching::find_matches(company, person, &pool);
        if matches.is_empty() {
            return Ok(String::new());
        }

        let alert = matching::build_duplicate_alert(&matches);
        let targets = self.notifier.notify(&alert).await;
        let targets = if targets.is_empty() {
            "ログのみ".to_string()
        } else {
            targets.join(", ")
        };

        if let Err(e) = self.store.log_notification(NotificationLogEntry {
            at: Utc::now().to_rfc3339(),
            kind: "重複検知".to_string(),
            company_name: company.to_string(),
            full_name: person.to_string(),
            message: alert.clone(),
            targets,
        }) {
            tracing::warn!("Failed to record notification log: {}", e);
        }

        Ok(alert)
    }
}

/// Maps one OCR answer object to card fields. Key fallbacks cover the
/// model's habit of answering `name`/`personName` despite the prompt.
fn card_from_value(value: &Value) -> CardInput {
    let field = |keys: &[&str]| -> String {
        keys.iter()
            .filter_map(|k| value[k].as_str())
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .to_string()
    };

    CardInput {
        company_name: field(&["companyName"]),
        full_name: field(&["fullName", "name", "personName"]),
        title: field(&["title"]),
        email: field(&["email"]),
        phone: field(&["phone"]),
        address: field(&["address"]),
        website: field(&["website"]),
    }
}

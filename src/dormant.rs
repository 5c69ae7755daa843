use crate::batch::run_batch;
use crate::config::Config;
use crate::errors::AppError;
use crate::gemini::GeminiClient;
use crate::industry::IndustryAnalyzer;
use crate::models::{BatchRun, DormantCustomer, EmailDraft, StalenessStatus};
use crate::staleness;
use crate::store::RecordStore;
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

const EMAIL_SYSTEM_PROMPT: &str = "あなたは、日本のBtoB営業のプロフェッショナルです。\n\
休眠顧客（しばらく連絡していなかった取引先）に対して、\n\
「ご無沙汰しております」から始まる自然な再接触メールを作成してください。\n\n\
【メール作成のルール】\n\
1. 冒頭は「ご無沙汰しております。〇〇（担当者名）でございます。」から始める\n\
2. 業界の最新ニュースやトレンドを自然なフックとして織り込む\n\
3. 押し付けがましくない、あくまで情報提供や近況確認のトーン\n\
4. 「もしよろしければ、近況をお聞かせいただけますと幸いです」程度の軟らかいCTA\n\
5. 署名は含めない（送信時に自動付与を想定）\n\
6. 全体で200〜400文字程度\n\
7. ビジネスメールとして適切な敬語を使用する";

/// Dormant-customer revival: finds records past the contact threshold,
/// refreshes industry news for each, and drafts a re-contact email for the
/// sales owner to review.
pub struct DormantReviver {
    client: Arc<GeminiClient>,
    analyzer: IndustryAnalyzer,
    store: Arc<dyn RecordStore>,
    threshold_days: i64,
    max_count: usize,
    delay: Duration,
}

impl DormantReviver {
    pub fn new(
        config: &Config,
        client: Arc<GeminiClient>,
        analyzer: IndustryAnalyzer,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            client,
            analyzer,
            store,
            threshold_days: config.dormant_threshold_days,
            max_count: config.max_batch_size,
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }

    /// One revival pass. Eligibility is recomputed from the current table
    /// every run, so records a previous run didn't reach are retried.
    pub async fn process_all(&self) -> Result<BatchRun, AppError> {
        let now = Utc::now();
        let dormants: Vec<DormantCustomer> = self
            .store
            .all()?
            .into_iter()
            .filter_map(|stored| {
                let result =
                    staleness::classify(&stored.record.last_contact, self.threshold_days, now);
                if result.status != StalenessStatus::Dormant {
                    return None;
                }
                Some(DormantCustomer {
                    row: stored.row,
                    company_name: stored.record.company_name,
                    full_name: stored.record.full_name,
                    title: stored.record.title,
                    email: stored.record.email,
                    last_contact: stored.record.last_contact,
                    staff_name: stored.record.staff_name,
                    industry: stored.record.industry,
                    dormant_days: result.elapsed_days.unwrap_or(self.threshold_days),
                })
            })
            .collect();

        if dormants.is_empty() {
            tracing::info!("No dormant customers found");
            return Ok(BatchRun::default());
        }

        tracing::info!("Found {} dormant customers", dormants.len());

        let run = run_batch(dormants, self.max_count, self.delay, |customer| {
            self.process_one(customer)
        })
        .await;

        tracing::info!(
            "Dormant revival finished: {}/{} processed, {} errors",
            run.processed,
            run.total,
            run.errors
        );
        Ok(run)
    }

    async fn process_one(&self, customer: DormantCustomer) -> Result<(), AppError> {
        let news = self
            .analyzer
            .refresh_news(&customer.company_name, &customer.industry)
            .await;

        let (subject, body) = self.generate_email_draft(&customer, &news).await;

        let status = if is_valid_email(&customer.email) {
            "下書き"
        } else {
            // No deliverable address; the draft still goes in for manual follow-up
            "メール不明"
        };

        self.store.append_draft(EmailDraft {
            generated_at: Utc::now().to_rfc3339(),
            company_name: customer.company_name.clone(),
            full_name: customer.full_name.clone(),
            email: customer.email.clone(),
            last_contact: customer.last_contact.clone(),
            dormant_days: customer.dormant_days,
            news,
            subject,
            body,
            status: status.to_string(),
        })?;

        tracing::info!(
            "Drafted revival email for {} {} ({} days dormant)",
            customer.company_name,
            customer.full_name,
            customer.dormant_days
        );
        Ok(())
    }

    /// Generates the draft via the model; any failure falls back to the
    /// fixed template so every dormant customer still gets a reviewable row.
    async fn generate_email_draft(
        &self,
        customer: &DormantCustomer,
        news: &str,
    ) -> (String, String) {
        let user_prompt = format!(
            "以下の情報を元に、休眠顧客への再接触メールを作成してください。\n\n\
             【顧客情報】\n\
             - 会社名: {}\n\
             - 氏名: {} 様\n\
             - 役職: {}\n\
             - 最終接触日: {}\n\
             - 経過日数: {}日\n\
             - 担当者名: {}\n\n\
             【業界の最新ニュース/トレンド】\n\
             {}\n\n\
             以下のJSON形式で出力してください:\n\
             {{\n\
               \"subject\": \"メール件名（30文字以内）\",\n\
               \"body\": \"メール本文（200〜400文字）\"\n\
             }}",
            customer.company_name,
            customer.full_name,
            if customer.title.trim().is_empty() {
                "不明"
            } else {
                customer.title.trim()
            },
            staleness::parse_sheet_date(&customer.last_contact)
                .map(|d| d.format("%Y年%m月%d日").to_string())
                .unwrap_or_else(|| "不明".to_string()),
            customer.dormant_days,
            if customer.staff_name.trim().is_empty() {
                "（担当者名）"
            } else {
                customer.staff_name.trim()
            },
            if news.trim().is_empty() { "特になし" } else { news },
        );

        match self.client.generate_json(EMAIL_SYSTEM_PROMPT, &user_prompt).await {
            Ok(value) => {
                let subject = value["subject"]
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| fallback_subject(customer));
                let body = value["body"]
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| fallback_body(customer));
                (subject, body)
            }
            Err(e) => {
                tracing::warn!(
                    "Email draft generation failed for {}, using fallback: {}",
                    customer.company_name,
                    e
                );
                (fallback_subject(customer), fallback_body(customer))
            }
        }
    }
}

fn fallback_subject(customer: &DormantCustomer) -> String {
    format!(
        "{} {}様 ご無沙汰しております",
        customer.company_name, customer.full_name
    )
}

fn fallback_body(customer: &DormantCustomer) -> String {
    let staff_name = if customer.staff_name.trim().is_empty() {
        "（担当者名）"
    } else {
        customer.staff_name.trim()
    };
    format!(
        "{} 様\n\n\
         ご無沙汰しております。{}でございます。\n\n\
         以前はお忙しい中お時間をいただき、誠にありがとうございました。\n\
         その後、御社のご状況はいかがでしょうか。\n\n\
         もしよろしければ、改めてお話をお伺いする機会をいただけますと幸いです。\n\
         ご都合の良いタイミングがございましたら、お気軽にご連絡くださいませ。\n\n\
         何卒よろしくお願いいたします。",
        customer.full_name, staff_name
    )
}

/// Minimal address check before a draft is marked ready: enough structure to
/// be deliverable, nothing stricter.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap();

    email_regex.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> DormantCustomer {
        DormantCustomer {
            row: 2,
            company_name: "アクメ商事".to_string(),
            full_name: "佐藤 一郎".to_string(),
            title: "部長".to_string(),
            email: "sato@acme.example.co.jp".to_string(),
            last_contact: "2026/01/10".to_string(),
            staff_name: "高橋".to_string(),
            industry: "商社".to_string(),
            dormant_days: 200,
        }
    }

    #[test]
    fn fallback_draft_opens_with_the_standard_greeting() {
        let c = customer();
        assert_eq!(fallback_subject(&c), "アクメ商事 佐藤 一郎様 ご無沙汰しております");
        let body = fallback_body(&c);
        assert!(body.starts_with("佐藤 一郎 様"));
        assert!(body.contains("ご無沙汰しております。高橋でございます。"));
    }

    #[test]
    fn fallback_body_handles_missing_staff_name() {
        let mut c = customer();
        c.staff_name = String::new();
        assert!(fallback_body(&c).contains("（担当者名）でございます"));
    }

    #[test]
    fn email_validation_accepts_plausible_and_rejects_malformed() {
        assert!(is_valid_email("sato@acme.example.co.jp"));
        assert!(is_valid_email("user+tag@example.com"));
        assert!(!is_valid_email("not_an_email"));
        assert!(!is_valid_email("missing@domain"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email(""));
    }
}

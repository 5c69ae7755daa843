use crate::batch::run_batch;
use crate::errors::AppError;
use crate::gemini::GeminiClient;
use crate::models::{BatchRun, SimilarCompany};
use crate::store::{RecordField, RecordStore, StoredRecord};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Sentinel summary when discovery ran and failed.
pub const DISCOVERY_FAILED: &str = "APIエラーにより取得できませんでした";

/// The model's rationale is asked for in 50 characters; anything longer is
/// clamped so one verbose answer cannot blow up a table cell.
const MAX_REASON_CHARS: usize = 50;

const SYSTEM_PROMPT: &str = "あなたは日本のBtoB市場に精通したマーケットリサーチャーです。\n\
営業チームが次のターゲットを見つけるための情報を提供してください。\n\n\
【あなたの役割】\n\
- 指定された企業と「類似したビジネスモデル」を持つ企業を提案する\n\
- 競合他社だけでなく、同じ業種・規模・課題を持つ類似企業も含める\n\
- 各企業について、なぜターゲット候補として適切なのか理由を付記する\n\
- 営業優先度（高/中/低）を判定する\n\n\
【判定基準】\n\
- 高: 同じ業種・同規模で、類似の課題を抱える可能性が高い\n\
- 中: 関連業種で、一部の課題が共通する可能性がある\n\
- 低: 業種は異なるが、同様のビジネスモデルを持つ";

/// Outcome of one discovery call.
#[derive(Debug, Clone, Default)]
pub struct SimilarResult {
    pub summary: String,
    pub companies: Vec<SimilarCompany>,
}

/// Related-entity discovery: suggests similar companies as next sales
/// targets, conditioned on the base company and (when known) its industry.
pub struct SimilarCompanyFinder {
    client: Arc<GeminiClient>,
    count: usize,
}

impl SimilarCompanyFinder {
    pub fn new(client: Arc<GeminiClient>, count: usize) -> Self {
        Self { client, count }
    }

    /// Suggests similar companies. Failure degrades to an empty set with a
    /// sentinel summary; the caller can always persist the result.
    pub async fn find(&self, company_name: &str, industry: &str) -> SimilarResult {
        let company = company_name.trim();
        if company.is_empty() {
            return SimilarResult::default();
        }

        let user_prompt = format!(
            "以下の企業の情報を元に、類似企業・競合他社を{}社提案してください。\n\n\
             【基準企業】\n\
             - 企業名: {}\n\
             - 業種: {}\n\n\
             以下のJSON形式で回答してください:\n\
             {{\n\
               \"companies\": [\n\
                 {{\n\
                   \"name\": \"企業名\",\n\
                   \"industry\": \"業種\",\n\
                   \"reason\": \"類似理由（50文字以内）\",\n\
                   \"priority\": \"高\" | \"中\" | \"低\",\n\
                   \"estimatedUrl\": \"推定される公式サイトURL\"\n\
                 }}\n\
               ],\n\
               \"summary\": \"ターゲット候補の概要（100文字以内の要約）\"\n\
             }}",
            self.count,
            company,
            if industry.trim().is_empty() {
                "不明（推定してください）"
            } else {
                industry.trim()
            }
        );

        match self.client.generate_json(SYSTEM_PROMPT, &user_prompt).await {
            Ok(value) => {
                let companies = value["companies"]
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|item| {
                                serde_json::from_value::<SimilarCompany>(item.clone()).ok()
                            })
                            .filter(|c| !c.name.trim().is_empty())
                            .map(clamp_reason)
                            .collect()
                    })
                    .unwrap_or_default();
                SimilarResult {
                    summary: value["summary"].as_str().unwrap_or("").to_string(),
                    companies,
                }
            }
            Err(e) => {
                tracing::error!("Similar-company discovery failed for {}: {}", company, e);
                SimilarResult {
                    summary: DISCOVERY_FAILED.to_string(),
                    companies: Vec::new(),
                }
            }
        }
    }

    /// Bulk pass over records whose similar-company column is still empty.
    ///
    /// Touches at most `max_count` records sequentially with `delay` between
    /// them; a failed record is counted and skipped, never aborts the run.
    pub async fn batch_analyze(
        &self,
        store: &dyn RecordStore,
        max_count: usize,
        delay: Duration,
    ) -> Result<BatchRun, AppError> {
        let targets: Vec<StoredRecord> = store
            .all()?
            .into_iter()
            .filter(|stored| {
                !stored.record.company_name.trim().is_empty()
                    && stored.record.similar.trim().is_empty()
            })
            .collect();

        tracing::info!("Similar-company batch: {} eligible records", targets.len());

        let run = run_batch(targets, max_count, delay, |stored| {
            self.process_one(store, stored)
        })
        .await;

        tracing::info!(
            "Similar-company batch finished: {}/{} processed, {} errors",
            run.processed,
            run.total,
            run.errors
        );
        Ok(run)
    }

    async fn process_one(
        &self,
        store: &dyn RecordStore,
        stored: StoredRecord,
    ) -> Result<(), AppError> {
        let result = self
            .find(&stored.record.company_name, &stored.record.industry)
            .await;

        if !result.summary.is_empty() {
            store.update_field(stored.row, RecordField::Similar, &result.summary)?;
        }
        if !result.companies.is_empty() {
            store.append_similar(
                &stored.record.company_name,
                &Utc::now().to_rfc3339(),
                &result.companies,
            )?;
        }
        Ok(())
    }
}

fn clamp_reason(mut company: SimilarCompany) -> SimilarCompany {
    if company.reason.chars().count() > MAX_REASON_CHARS {
        company.reason = company.reason.chars().take(MAX_REASON_CHARS).collect();
    }
    company
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlong_reasons_are_clamped() {
        let clamped = clamp_reason(SimilarCompany {
            name: "A社".to_string(),
            reason: "理".repeat(80),
            ..SimilarCompany::default()
        });
        assert_eq!(clamped.reason.chars().count(), MAX_REASON_CHARS);
    }
}

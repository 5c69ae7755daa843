use crate::gemini::GeminiClient;
use crate::models::{IndustryInsights, SearchHit};
use moka::future::Cache;
use serde_json::Value;
use std::sync::Arc;

/// Sentinel written when the analysis ran and failed. Distinct from the
/// blank fields of a record the stage never attempted.
pub const ANALYSIS_FAILED: &str = "分析失敗";
const LIST_FAILED: &str = "APIエラーにより取得できませんでした";
const NEWS_FAILED: &str = "最新ニュースの取得に失敗しました";

/// Cache of successful analyses, keyed by company name. Built once in main
/// and shared through `AppState`.
pub type IndustryInsightsCache = Cache<String, IndustryInsights>;

const SYSTEM_PROMPT: &str = "あなたは日本市場に精通したビジネスアナリスト兼コンサルタントです。\n\
営業担当者が初回商談の準備をする際に役立つ情報を提供してください。\n\n\
【あなたの役割】\n\
- 企業名と役職から、その企業の業種を正確に推定する\n\
- その業種の最新トレンド・ニュース（直近6ヶ月以内）を3〜5件リストアップ\n\
- その企業が直面していそうなビジネス課題の仮説を3〜5つ提示\n\
- 営業アプローチに活用できる具体的な洞察を含める\n\n\
【注意事項】\n\
- 推測の場合は「推定」と明記する\n\
- 具体的な数値やソース名がある場合は含める\n\
- 日本語で回答する";

/// Industry analysis stage: search-augmented company/industry research.
///
/// Successful analyses are cached by company name; batch passes revisit the
/// same companies and the model answer is expensive. Failures are never
/// cached.
#[derive(Clone)]
pub struct IndustryAnalyzer {
    client: Arc<GeminiClient>,
    cache: Cache<String, IndustryInsights>,
}

impl IndustryAnalyzer {
    pub fn new(client: Arc<GeminiClient>, cache: Cache<String, IndustryInsights>) -> Self {
        Self { client, cache }
    }

    /// Analyzes one company. Returns blank insights when no company name is
    /// available (stage not attempted) and the failure sentinel when the
    /// analysis itself fails.
    pub async fn analyze(&self, company_name: &str, job_title: &str) -> IndustryInsights {
        let company = company_name.trim();
        if company.is_empty() {
            return IndustryInsights::default();
        }

        if let Some(cached) = self.cache.get(company).await {
            tracing::debug!("Industry analysis cache hit: {}", company);
            return cached;
        }

        // Best-effort real-time context; empty when search is unconfigured
        let hits = self
            .client
            .custom_search(&format!("{} ニュース 最新", company), 3)
            .await;
        let search_context = render_search_context(&hits);

        let user_prompt = format!(
            "以下の企業について分析してください。\n\n\
             企業名: {}\n\
             名刺上の役職: {}\n\
             {}\n\n\
             以下のJSON形式で回答してください:\n\
             {{\n\
               \"industry\": \"推定される業種（例：IT・通信、製造業、不動産、コンサルティングなど）\",\n\
               \"industryTrends\": [\"トレンド1: 具体的な説明\", \"トレンド2: 具体的な説明\", \"トレンド3: 具体的な説明\"],\n\
               \"estimatedChallenges\": [\"課題1: 具体的な仮説\", \"課題2: 具体的な仮説\", \"課題3: 具体的な仮説\"],\n\
               \"salesTip\": \"この企業への営業アプローチで活用できる一言アドバイス\"\n\
             }}",
            company,
            if job_title.trim().is_empty() {
                "不明"
            } else {
                job_title.trim()
            },
            search_context
        );

        match self.client.generate_json(SYSTEM_PROMPT, &user_prompt).await {
            Ok(value) => {
                let insights = IndustryInsights {
                    industry: value["industry"]
                        .as_str()
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or("不明")
                        .to_string(),
                    trends: format_list(&value["industryTrends"], "トレンド"),
                    challenges: format_list(&value["estimatedChallenges"], "課題"),
                    sales_tip: value["salesTip"].as_str().unwrap_or("").to_string(),
                };
                self.cache.insert(company.to_string(), insights.clone()).await;
                insights
            }
            Err(e) => {
                tracing::error!("Industry analysis failed for {}: {}", company, e);
                IndustryInsights {
                    industry: ANALYSIS_FAILED.to_string(),
                    trends: LIST_FAILED.to_string(),
                    challenges: LIST_FAILED.to_string(),
                    sales_tip: String::new(),
                }
            }
        }
    }

    /// Re-queries recent industry news as hook material for dormant-revival
    /// emails. Falls back to a sentinel line on failure.
    pub async fn refresh_news(&self, company_name: &str, industry: &str) -> String {
        let company = company_name.trim();
        if company.is_empty() {
            return String::new();
        }

        let query = if industry.trim().is_empty() {
            format!("{} 業界 最新ニュース", company)
        } else {
            format!("{} 最新ニュース トレンド", industry.trim())
        };
        let hits = self.client.custom_search(&query, 5).await;
        let search_context = render_search_context(&hits);

        let user_prompt = format!(
            "以下の企業/業界の最新ニュースやトレンドを3つ簡潔にまとめてください。\n\
             営業メールのフックとして使えるような切り口でお願いします。\n\n\
             企業名: {}\n\
             業種: {}\n\
             {}\n\n\
             箇条書きで3つ、各50文字以内でまとめてください。",
            company,
            if industry.trim().is_empty() {
                "不明"
            } else {
                industry.trim()
            },
            search_context
        );

        match self
            .client
            .generate_text(
                "あなたはビジネスニュースのキュレーターです。営業活動に役立つ簡潔な情報を提供してください。",
                &user_prompt,
            )
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("News refresh failed for {}: {}", company, e);
                NEWS_FAILED.to_string()
            }
        }
    }
}

fn render_search_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = hits
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("{}. {}\n   {}\n   {}", i + 1, hit.title, hit.snippet, hit.link))
        .collect();
    format!("\n【参考: Web検索結果】\n{}", lines.join("\n"))
}

/// Renders a model list answer as numbered cell text.
fn format_list(items: &Value, label: &str) -> String {
    let lines: Vec<String> = items
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.as_str())
                .filter(|s| !s.trim().is_empty())
                .enumerate()
                .map(|(i, item)| format!("{}. {}", i + 1, item.trim()))
                .collect()
        })
        .unwrap_or_default();

    if lines.is_empty() {
        format!("{}情報なし", label)
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lists_render_numbered() {
        let rendered = format_list(&json!(["生成AIの普及", "人手不足"]), "トレンド");
        assert_eq!(rendered, "1. 生成AIの普及\n2. 人手不足");
    }

    #[test]
    fn missing_or_empty_lists_render_placeholder() {
        assert_eq!(format_list(&json!(null), "トレンド"), "トレンド情報なし");
        assert_eq!(format_list(&json!([]), "課題"), "課題情報なし");
        assert_eq!(format_list(&json!(["", "  "]), "課題"), "課題情報なし");
    }

    #[test]
    fn search_context_lists_hits() {
        let hits = vec![SearchHit {
            title: "業界ニュース".to_string(),
            link: "https://example.com/news".to_string(),
            snippet: "概要".to_string(),
        }];
        let context = render_search_context(&hits);
        assert!(context.contains("【参考: Web検索結果】"));
        assert!(context.contains("1. 業界ニュース"));
        assert!(render_search_context(&[]).is_empty());
    }
}

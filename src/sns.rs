use crate::gemini::GeminiClient;
use crate::models::SnsLinks;
use url::form_urlencoded;

fn encode(query: &str) -> String {
    form_urlencoded::byte_serialize(query.as_bytes()).collect()
}

/// Search query for the profile lookups: the company name, or the person
/// name when no company is known. Never both - combining them dilutes the
/// query enough to bury the actual profile.
fn profile_query<'a>(company_name: &'a str, full_name: &'a str) -> &'a str {
    let company = company_name.trim();
    if company.is_empty() {
        full_name.trim()
    } else {
        company
    }
}

/// Builds the social-profile search URLs for one record. Pure templates, no
/// external calls. `category_keyword` sharpens the Instagram site-search,
/// which otherwise drowns in unrelated accounts.
pub fn search_links(
    company_name: &str,
    full_name: &str,
    category_keyword: Option<&str>,
) -> SnsLinks {
    let query = profile_query(company_name, full_name);
    if query.is_empty() {
        return SnsLinks::default();
    }

    let instagram_query = match category_keyword {
        Some(keyword) if !keyword.trim().is_empty() => format!("{} {}", query, keyword.trim()),
        _ => query.to_string(),
    };

    SnsLinks {
        x_url: format!(
            "https://x.com/search?q={}&src=typed_query&f=user",
            encode(query)
        ),
        facebook_url: format!(
            "https://www.facebook.com/search/people/?q={}",
            encode(query)
        ),
        // Instagram's own web search is too restricted; go through Google
        instagram_url: format!(
            "https://www.google.com/search?q=site:instagram.com+{}",
            encode(&instagram_query)
        ),
        youtube_url: format!(
            "https://www.youtube.com/results?search_query={}&sp=EgIQAg%253D%253D",
            encode(query)
        ),
        tiktok_url: format!("https://www.tiktok.com/search/user?q={}", encode(query)),
    }
}

/// Asks the model for a 2-6 character business-category keyword for the
/// company. Best-effort: any failure, or an answer outside the requested
/// length, simply omits the keyword.
pub async fn infer_category_keyword(client: &GeminiClient, company_name: &str) -> Option<String> {
    let company = company_name.trim();
    if company.is_empty() {
        return None;
    }

    let system = "あなたは日本企業のデータベースに精通したアシスタントです。\n\
                  企業名からその企業の業種を表す短いキーワードを推定してください。";
    let user = format!(
        "以下の企業の業種キーワードを2〜6文字でJSON形式で回答してください。\n\n\
         企業名: {}\n\n\
         出力形式:\n{{\n  \"keyword\": \"不動産\"\n}}",
        company
    );

    match client.generate_json(system, &user).await {
        Ok(value) => {
            let keyword = value["keyword"].as_str().unwrap_or("").trim().to_string();
            let len = keyword.chars().count();
            if (2..=6).contains(&len) {
                Some(keyword)
            } else {
                tracing::debug!(
                    "Category keyword for {} outside 2-6 chars, omitting: {:?}",
                    company,
                    keyword
                );
                None
            }
        }
        Err(e) => {
            tracing::warn!("Category keyword inference failed for {}: {}", company, e);
            None
        }
    }
}

/// Fallback company-site value: a search-engine query URL. Used whenever
/// inference is unavailable so the field is never left unset.
pub fn fallback_site_url(company_name: &str, full_name: &str) -> String {
    let base = profile_query(company_name, full_name);
    format!(
        "https://www.google.com/search?q={}",
        encode(&format!("{} 公式サイト", base))
    )
}

/// Resolves the record's canonical site URL.
///
/// A website already captured from the card short-circuits. Otherwise the
/// model is asked to infer the official site with a confidence tag; a low
/// confidence answer, a malformed URL, or any error falls back to the
/// constructed search URL. The return value is never empty.
pub async fn resolve_company_site(
    client: &GeminiClient,
    company_name: &str,
    full_name: &str,
    known_website: &str,
) -> String {
    if !known_website.trim().is_empty() {
        return known_website.trim().to_string();
    }

    let company = company_name.trim();
    if company.is_empty() {
        return fallback_site_url(company_name, full_name);
    }

    let system = "あなたは日本企業のデータベースに精通したアシスタントです。\n\
                  企業名から公式Webサイトの URL を推定してください。\n\
                  確信が持てない場合は confidence を low にしてください。";
    let user = format!(
        "以下の企業の公式WebサイトURLをJSON形式で回答してください。\n\n\
         企業名: {}\n\n\
         出力形式:\n{{\n  \"url\": \"https://example.co.jp\",\n  \"confidence\": \"high\" | \"medium\" | \"low\"\n}}",
        company
    );

    match client.generate_json(system, &user).await {
        Ok(value) => {
            let url = value["url"].as_str().unwrap_or("").trim().to_string();
            let confidence = value["confidence"].as_str().unwrap_or("low");
            if !url.starts_with("http") || confidence == "low" {
                return fallback_site_url(company_name, full_name);
            }
            url
        }
        Err(e) => {
            tracing::warn!("Company site inference failed for {}: {}", company, e);
            fallback_site_url(company_name, full_name)
        }
    }
}

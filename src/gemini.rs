use crate::config::Config;
use crate::errors::AppError;
use crate::models::SearchHit;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the Gemini generative-language API.
///
/// One instance is shared by every enrichment stage. Each call is a single
/// logical request with bounded retries; no state is shared between calls, so
/// independent requests are safe to issue concurrently.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_retries: u32,
    retry_base_delay: Duration,
    search_api_key: Option<String>,
    search_cx: Option<String>,
    search_base_url: String,
}

impl GeminiClient {
    /// Creates a new `GeminiClient` from configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create Gemini client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_model.clone(),
            temperature: config.gemini_temperature,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            search_api_key: config.custom_search_api_key.clone(),
            search_cx: config.custom_search_cx.clone(),
            search_base_url: config.custom_search_base_url.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// System/user instruction pair, JSON response expected.
    ///
    /// The model is asked for `application/json` but routinely wraps the
    /// document in prose or code fences anyway, so the response goes through
    /// the lenient parser.
    pub async fn generate_json(&self, system: &str, user: &str) -> Result<Value, AppError> {
        let payload = json!({
            "system_instruction": { "parts": [{ "text": system }] },
            "contents": [{ "parts": [{ "text": user }] }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "temperature": self.temperature,
            },
        });

        let text = self.send_request(&payload).await?;
        parse_lenient_json(&text)
    }

    /// System/user instruction pair, plain-text response.
    pub async fn generate_text(&self, system: &str, user: &str) -> Result<String, AppError> {
        let payload = json!({
            "system_instruction": { "parts": [{ "text": system }] },
            "contents": [{ "parts": [{ "text": user }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        self.send_request(&payload).await
    }

    /// Free-form parts call (card OCR: prompt text plus inline images).
    /// Uses a low temperature because extraction should be deterministic.
    pub async fn call_with_parts(&self, parts: Vec<Value>) -> Result<Value, AppError> {
        let payload = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "temperature": 0.1,
            },
        });

        let text = self.send_request(&payload).await?;
        parse_lenient_json(&text)
    }

    /// Sends one logical request with the retry policy.
    ///
    /// 429/503 sleep `base × attempt` and retry; other non-success statuses
    /// fail immediately with a truncated body excerpt; transport errors retry
    /// with the same backoff except on the final attempt. A response whose
    /// extracted text is empty is fatal.
    async fn send_request(&self, payload: &Value) -> Result<String, AppError> {
        let url = self.endpoint();

        for attempt in 1..=self.max_retries {
            match self.client.post(&url).json(payload).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: Value = response.json().await.map_err(|e| {
                            AppError::FatalApi {
                                status: Some(status.as_u16()),
                                message: format!("Failed to parse Gemini envelope: {}", e),
                            }
                        })?;

                        let text = body["candidates"][0]["content"]["parts"][0]["text"]
                            .as_str()
                            .unwrap_or("");
                        if text.trim().is_empty() {
                            return Err(AppError::FatalApi {
                                status: Some(status.as_u16()),
                                message: "Gemini response contained no text".to_string(),
                            });
                        }
                        return Ok(text.to_string());
                    }

                    // 429 (rate limit) and 503 (unavailable) are worth retrying
                    if status.as_u16() == 429 || status.as_u16() == 503 {
                        if attempt == self.max_retries {
                            return Err(AppError::TransientApi {
                                status: Some(status.as_u16()),
                                message: format!(
                                    "Gemini still unavailable after {} attempts",
                                    self.max_retries
                                ),
                            });
                        }
                        tracing::warn!(
                            "Gemini HTTP {} - retry {}/{}",
                            status,
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(self.retry_base_delay * attempt).await;
                        continue;
                    }

                    // Everything else is not expected to resolve on retry
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    return Err(AppError::FatalApi {
                        status: Some(status.as_u16()),
                        message: format!(
                            "Gemini returned {}: {}",
                            status,
                            truncate_chars(&body, 300)
                        ),
                    });
                }
                Err(e) => {
                    let err: AppError = e.into();
                    if attempt == self.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        "Gemini request failed ({}), retry {}/{}",
                        err,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_base_delay * attempt).await;
                }
            }
        }

        Err(AppError::FatalApi {
            status: None,
            message: "Gemini retry attempts exhausted".to_string(),
        })
    }

    /// Queries the Custom Search API for context snippets.
    ///
    /// Soft-fail contract: search augmentation is best-effort context, never
    /// required for correctness, so missing configuration and terminal errors
    /// both yield an empty result set. Transient statuses are retried with
    /// the same backoff as the main client.
    pub async fn custom_search(&self, query: &str, num: usize) -> Vec<SearchHit> {
        let (api_key, cx) = match (&self.search_api_key, &self.search_cx) {
            (Some(k), Some(c)) => (k, c),
            _ => {
                tracing::debug!("Custom Search not configured - skipping");
                return Vec::new();
            }
        };

        let url = format!("{}/customsearch/v1", self.search_base_url);
        let num_param = num.to_string();

        for attempt in 1..=self.max_retries {
            let result = self
                .client
                .get(&url)
                .query(&[
                    ("key", api_key.as_str()),
                    ("cx", cx.as_str()),
                    ("q", query),
                    ("num", num_param.as_str()),
                ])
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let data: Value = match response.json().await {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!("Custom Search returned malformed body: {}", e);
                                return Vec::new();
                            }
                        };
                        return data["items"]
                            .as_array()
                            .map(|items| {
                                items
                                    .iter()
                                    .map(|item| SearchHit {
                                        title: item["title"].as_str().unwrap_or("").to_string(),
                                        link: item["link"].as_str().unwrap_or("").to_string(),
                                        snippet: item["snippet"]
                                            .as_str()
                                            .unwrap_or("")
                                            .to_string(),
                                    })
                                    .collect()
                            })
                            .unwrap_or_default();
                    }

                    if (status.as_u16() == 429 || status.as_u16() == 503)
                        && attempt < self.max_retries
                    {
                        tokio::time::sleep(self.retry_base_delay * attempt).await;
                        continue;
                    }

                    tracing::warn!("Custom Search HTTP {} - returning no results", status);
                    return Vec::new();
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_base_delay * attempt).await;
                        continue;
                    }
                    tracing::warn!("Custom Search failed: {}", e);
                    return Vec::new();
                }
            }
        }

        Vec::new()
    }
}

/// Recovers a JSON document from model output that may be fenced or wrapped
/// in prose.
///
/// Strategy: strip code-fence markers and whitespace, try a direct parse,
/// then fall back to the first balanced top-level `{...}`/`[...]` span.
/// Required because the upstream model reliably wraps JSON despite being
/// asked not to.
pub fn parse_lenient_json(text: &str) -> Result<Value, AppError> {
    let fence_open = Regex::new(r"(?i)^```json\s*").unwrap();
    let fence_bare = Regex::new(r"^```\s*").unwrap();
    let fence_close = Regex::new(r"\s*```$").unwrap();

    let cleaned = fence_open.replace(text.trim(), "");
    let cleaned = fence_bare.replace(&cleaned, "");
    let cleaned = fence_close.replace(&cleaned, "");
    let cleaned = cleaned.trim();

    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(direct_err) => {
            if let Some(span) = balanced_json_span(cleaned) {
                if let Ok(value) = serde_json::from_str(span) {
                    return Ok(value);
                }
            }
            Err(AppError::Parse {
                message: direct_err.to_string(),
                excerpt: truncate_chars(text, 200),
            })
        }
    }
}

/// Finds the first balanced top-level `{...}` or `[...]` span, honoring
/// string literals and escapes so braces inside values don't break the scan.
fn balanced_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Truncates to at most `limit` characters (not bytes - excerpts may contain
/// multibyte Japanese text).
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

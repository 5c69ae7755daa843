/// Runtime configuration, loaded from environment variables.
///
/// All pipeline knobs live here so components can be constructed with
/// fabricated settings in tests (zero delays, a single retry, wiremock base
/// URLs) without touching process environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key (required).
    pub gemini_api_key: String,
    /// Model identifier, e.g. `gemini-2.5-flash`.
    pub gemini_model: String,
    /// Base URL of the generative-language endpoint, overridable for tests.
    pub gemini_base_url: String,
    /// Sampling temperature for analysis prompts.
    pub gemini_temperature: f64,
    /// Total attempts per logical call, including the first.
    pub max_retries: u32,
    /// Backoff base; attempt n sleeps `base × n` before retrying.
    pub retry_base_delay_ms: u64,

    /// Custom Search credentials. Search augmentation is best-effort and is
    /// skipped entirely when either value is absent.
    pub custom_search_api_key: Option<String>,
    pub custom_search_cx: Option<String>,
    pub custom_search_base_url: String,

    /// Slack Incoming Webhook URL for duplicate alerts (optional).
    pub slack_webhook_url: Option<String>,
    /// Chatwork credentials for duplicate alerts (optional).
    pub chatwork_api_token: Option<String>,
    pub chatwork_room_id: Option<String>,
    pub chatwork_base_url: String,

    /// Days without contact before a customer counts as dormant.
    pub dormant_threshold_days: i64,
    /// How many related companies to request per base record.
    pub similar_company_count: usize,
    /// Upper bound of records touched by one batch run.
    pub max_batch_size: usize,
    /// Pause between records in a batch run (external rate-limit pacing).
    pub batch_delay_ms: u64,

    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GEMINI_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| {
                    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
                })
                .trim_end_matches('/')
                .to_string(),
            gemini_temperature: std::env::var("GEMINI_TEMPERATURE")
                .unwrap_or_else(|_| "0.3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEMINI_TEMPERATURE must be a number"))
                .and_then(|t: f64| {
                    if !(0.0..=2.0).contains(&t) {
                        anyhow::bail!("GEMINI_TEMPERATURE must be between 0.0 and 2.0");
                    }
                    Ok(t)
                })?,
            max_retries: std::env::var("GEMINI_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEMINI_MAX_RETRIES must be a positive number"))
                .and_then(|n: u32| {
                    if n == 0 {
                        anyhow::bail!("GEMINI_MAX_RETRIES must be at least 1");
                    }
                    Ok(n)
                })?,
            retry_base_delay_ms: std::env::var("GEMINI_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("GEMINI_RETRY_DELAY_MS must be a number"))?,
            custom_search_api_key: std::env::var("CUSTOM_SEARCH_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            custom_search_cx: std::env::var("CUSTOM_SEARCH_CX")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            custom_search_base_url: std::env::var("CUSTOM_SEARCH_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://www.googleapis.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            chatwork_api_token: std::env::var("CHATWORK_API_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            chatwork_room_id: std::env::var("CHATWORK_ROOM_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            chatwork_base_url: std::env::var("CHATWORK_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://api.chatwork.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            dormant_threshold_days: std::env::var("DORMANT_THRESHOLD_DAYS")
                .unwrap_or_else(|_| "180".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DORMANT_THRESHOLD_DAYS must be a number"))
                .and_then(|d: i64| {
                    if d <= 0 {
                        anyhow::bail!("DORMANT_THRESHOLD_DAYS must be positive");
                    }
                    Ok(d)
                })?,
            similar_company_count: std::env::var("SIMILAR_COMPANY_COUNT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SIMILAR_COMPANY_COUNT must be a number"))
                .and_then(|n: usize| {
                    if !(1..=10).contains(&n) {
                        anyhow::bail!("SIMILAR_COMPANY_COUNT must be between 1 and 10");
                    }
                    Ok(n)
                })?,
            max_batch_size: std::env::var("MAX_BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_BATCH_SIZE must be a number"))
                .and_then(|n: usize| {
                    if n == 0 {
                        anyhow::bail!("MAX_BATCH_SIZE must be at least 1");
                    }
                    Ok(n)
                })?,
            batch_delay_ms: std::env::var("BATCH_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BATCH_DELAY_MS must be a number"))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Gemini model: {}", config.gemini_model);
        tracing::debug!("Gemini base URL: {}", config.gemini_base_url);
        if config.custom_search_api_key.is_some() && config.custom_search_cx.is_some() {
            tracing::info!("Custom Search configured");
        } else {
            tracing::info!("Custom Search not configured - search augmentation disabled");
        }
        if config.slack_webhook_url.is_some() {
            tracing::info!("Slack notifications configured");
        }
        if config.chatwork_api_token.is_some() && config.chatwork_room_id.is_some() {
            tracing::info!("Chatwork notifications configured");
        }
        tracing::debug!(
            "Batch: max {} records, {} ms between records",
            config.max_batch_size,
            config.batch_delay_ms
        );
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }
}

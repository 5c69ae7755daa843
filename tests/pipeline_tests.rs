/// Integration tests for the enrichment orchestrator
/// Verifies per-stage failure isolation and the end-to-end registration
/// scenario against a mocked Gemini upstream.
use meishi_sfa_api::config::Config;
use meishi_sfa_api::enrichment::Enricher;
use meishi_sfa_api::gemini::GeminiClient;
use meishi_sfa_api::industry::{IndustryAnalyzer, ANALYSIS_FAILED};
use meishi_sfa_api::models::{CardInput, CustomerRecord};
use meishi_sfa_api::notify::Notifier;
use meishi_sfa_api::similar::SimilarCompanyFinder;
use meishi_sfa_api::store::{MemoryStore, RecordStore};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config pointing at a mock server
fn create_test_config(gemini_base_url: String) -> Config {
    Config {
        gemini_api_key: "test-key".to_string(),
        gemini_model: "test-model".to_string(),
        gemini_base_url,
        gemini_temperature: 0.3,
        max_retries: 1,
        retry_base_delay_ms: 0,
        custom_search_api_key: None,
        custom_search_cx: None,
        custom_search_base_url: "http://127.0.0.1:1".to_string(),
        slack_webhook_url: None,
        chatwork_api_token: None,
        chatwork_room_id: None,
        chatwork_base_url: "http://127.0.0.1:1".to_string(),
        dormant_threshold_days: 180,
        similar_company_count: 5,
        max_batch_size: 20,
        batch_delay_ms: 0,
        port: 3000,
    }
}

fn build_enricher(config: &Config, store: Arc<MemoryStore>) -> Enricher {
    let client = Arc::new(GeminiClient::new(config).unwrap());
    let analyzer = IndustryAnalyzer::new(client.clone(), Cache::builder().build());
    let finder = SimilarCompanyFinder::new(client.clone(), config.similar_company_count);
    Enricher::new(
        client,
        store,
        Notifier::new(config).unwrap(),
        analyzer,
        finder,
    )
}

fn gemini_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
}

#[tokio::test]
async fn test_enrichment_survives_total_model_failure() {
    let mock_server = MockServer::start().await;

    // Every model call fails hard; no stage may escalate it
    Mock::given(method("POST"))
        .and(path("/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let enricher = build_enricher(&config, store.clone());

    let card = CardInput {
        company_name: "Acme Inc.".to_string(),
        full_name: "Jane Doe".to_string(),
        ..CardInput::default()
    };

    let enriched = enricher.enrich_and_register(&card, "高橋").await.unwrap();

    // Social URLs are pure templates and must survive
    assert!(!enriched.record.x_url.is_empty());
    assert!(!enriched.record.facebook_url.is_empty());
    // Site resolution fell back to a constructed search URL
    assert!(enriched
        .record
        .company_site
        .starts_with("https://www.google.com/search?q="));
    // Analysis ran and failed: sentinel, not blank
    assert_eq!(enriched.record.industry, ANALYSIS_FAILED);
    assert!(!enriched.record.trends.is_empty());
    // Empty pool: no duplicate
    assert!(!enriched.duplicate_found);
    assert!(enriched.record.dup_alert.is_empty());
    // The row was still written
    assert_eq!(store.all().unwrap().len(), 1);
    assert_eq!(enriched.row, 2);
}

#[tokio::test]
async fn test_known_website_short_circuits_site_resolution() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let enricher = build_enricher(&config, store);

    let card = CardInput {
        company_name: "アクメ商事".to_string(),
        website: "https://acme.example.co.jp".to_string(),
        ..CardInput::default()
    };

    let enriched = enricher.enrich_and_register(&card, "").await.unwrap();
    assert_eq!(enriched.record.company_site, "https://acme.example.co.jp");
}

#[tokio::test]
async fn test_successful_stages_fill_all_enrichment_columns() {
    let mock_server = MockServer::start().await;

    // Each stage is recognized by a distinctive phrase in its prompt
    Mock::given(method("POST"))
        .and(body_string_contains("業種キーワード"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body("{\"keyword\": \"商社\"}")))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("公式WebサイトURL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            "{\"url\": \"https://acme.example.co.jp\", \"confidence\": \"high\"}",
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("について分析してください"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            "```json\n{\"industry\": \"商社\", \"industryTrends\": [\"トレンド1\", \"トレンド2\"], \"estimatedChallenges\": [\"課題1\"], \"salesTip\": \"まず電話\"}\n```",
        )))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("類似企業・競合他社"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
            "{\"companies\": [{\"name\": \"ベータ商事\", \"industry\": \"商社\", \"reason\": \"同業\", \"priority\": \"高\", \"estimatedUrl\": \"https://beta.example.co.jp\"}], \"summary\": \"同業1社\"}",
        )))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let enricher = build_enricher(&config, store.clone());

    let card = CardInput {
        company_name: "アクメ商事".to_string(),
        full_name: "佐藤 一郎".to_string(),
        title: "部長".to_string(),
        ..CardInput::default()
    };

    let enriched = enricher.enrich_and_register(&card, "高橋").await.unwrap();

    assert_eq!(enriched.record.company_site, "https://acme.example.co.jp");
    assert_eq!(enriched.record.industry, "商社");
    assert_eq!(enriched.record.trends, "1. トレンド1\n2. トレンド2");
    assert_eq!(enriched.record.challenges, "1. 課題1");
    assert_eq!(enriched.record.similar, "同業1社");
    assert_eq!(enriched.record.notes, "まず電話");
    // Category keyword sharpened the Instagram search
    assert!(enriched.record.instagram_url.contains("instagram.com"));

    // Detail rows landed in the similar-company table
    let rows = store.similar_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].base_company, "アクメ商事");
    assert_eq!(rows[0].company.name, "ベータ商事");
}

#[tokio::test]
async fn test_duplicate_detection_alerts_and_logs() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-model:generateContent"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let slack_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slack-hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&slack_server)
        .await;

    let mut config = create_test_config(mock_server.uri());
    config.slack_webhook_url = Some(format!("{}/slack-hook", slack_server.uri()));

    let store = Arc::new(MemoryStore::with_records(vec![CustomerRecord {
        company_name: "株式会社アクメ商事".to_string(),
        full_name: "佐藤 一郎".to_string(),
        staff_name: "高橋".to_string(),
        last_contact: "2026/03/01".to_string(),
        ..CustomerRecord::default()
    }]));
    let enricher = build_enricher(&config, store.clone());

    let card = CardInput {
        company_name: "アクメ商事".to_string(),
        full_name: "別の 人".to_string(),
        ..CardInput::default()
    };

    let enriched = enricher.enrich_and_register(&card, "田中").await.unwrap();

    assert!(enriched.duplicate_found);
    assert!(enriched.record.dup_alert.starts_with("【重複検知】"));
    assert!(enriched
        .record
        .dup_alert
        .contains("株式会社アクメ商事 の 佐藤 一郎 さんは、高橋 が 2026/03/01 に接触済みです"));

    let logs = store.notifications();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, "重複検知");
    assert_eq!(logs[0].targets, "Slack");
}

#[tokio::test]
async fn test_duplicate_check_uses_pool_before_the_append() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let enricher = build_enricher(&config, store.clone());

    // A record never matches itself within one registration
    let card = CardInput {
        company_name: "アクメ商事".to_string(),
        full_name: "佐藤 一郎".to_string(),
        ..CardInput::default()
    };
    let first = enricher.enrich_and_register(&card, "").await.unwrap();
    assert!(!first.duplicate_found);

    // The second registration of the same identity does match
    let second = enricher.enrich_and_register(&card, "").await.unwrap();
    assert!(second.duplicate_found);
}

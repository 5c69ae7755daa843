use crate::config::Config;
use crate::dormant::DormantReviver;
use crate::enrichment::{Enricher, ScanMode};
use crate::errors::{AppError, ResultExt};
use crate::gemini::GeminiClient;
use crate::industry::{IndustryAnalyzer, IndustryInsightsCache};
use crate::models::{CardImage, CardInput, EnrichedCard};
use crate::notify::Notifier;
use crate::similar::SimilarCompanyFinder;
use crate::staleness;
use crate::store::{RecordField, RecordStore};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Shared application state, cloned into every handler.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RecordStore>,
    pub gemini: Arc<GeminiClient>,
    pub notifier: Notifier,
    pub analysis_cache: IndustryInsightsCache,
}

impl AppState {
    fn analyzer(&self) -> IndustryAnalyzer {
        IndustryAnalyzer::new(self.gemini.clone(), self.analysis_cache.clone())
    }

    fn enricher(&self) -> Enricher {
        Enricher::new(
            self.gemini.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.analyzer(),
            SimilarCompanyFinder::new(self.gemini.clone(), self.config.similar_company_count),
        )
    }
}

/// Health check endpoint.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Card registration payload: either already-parsed fields or images for the
/// OCR path. `mode` only matters for images.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCardsRequest {
    #[serde(default)]
    pub staff_name: String,
    #[serde(default)]
    pub cards: Vec<CardInput>,
    #[serde(default)]
    pub images: Vec<CardImage>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterCardsResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<EnrichedCard>,
}

/// Registers one or more cards, running the full enrichment pipeline per
/// card. Cards are processed strictly sequentially with the configured
/// pacing delay - a multi-card upload is a small batch against the same
/// rate-limited upstream.
pub async fn register_cards(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterCardsRequest>,
) -> Result<Json<RegisterCardsResponse>, AppError> {
    let enricher = state.enricher();

    let mut cards = payload.cards;
    if !payload.images.is_empty() {
        let mode = match payload.mode.as_deref() {
            Some("multi") => ScanMode::Multi,
            _ => ScanMode::Merge,
        };
        let extracted = enricher
            .extract_cards(&payload.images, mode)
            .await
            .context("card OCR")?;
        cards.extend(extracted);
    }

    cards.retain(|card| {
        let keep = card.has_identity();
        if !keep {
            tracing::warn!("Skipping card with no company or person name");
        }
        keep
    });
    if cards.is_empty() {
        return Err(AppError::BadRequest(
            "No card with a company or person name was supplied".to_string(),
        ));
    }

    let delay = Duration::from_millis(state.config.batch_delay_ms);
    let mut enriched = Vec::new();
    for (i, card) in cards.iter().enumerate() {
        enriched.push(
            enricher
                .enrich_and_register(card, &payload.staff_name)
                .await?,
        );
        if i + 1 < cards.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Ok(Json(RegisterCardsResponse {
        success: true,
        count: enriched.len(),
        data: enriched,
    }))
}

/// Lists all customer records with their row positions.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let records = state.store.all().context("reading records")?;
    let rows: Vec<Value> = records
        .iter()
        .map(|stored| {
            let mut value = serde_json::to_value(&stored.record).unwrap_or(Value::Null);
            if let Some(map) = value.as_object_mut() {
                map.insert("row".to_string(), json!(stored.row));
            }
            value
        })
        .collect();
    Ok(Json(json!({ "count": rows.len(), "records": rows })))
}

/// Updates individual fields of one record, addressed by row position.
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path(row): Path<usize>,
    Json(updates): Json<serde_json::Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    if updates.is_empty() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    for (key, value) in &updates {
        let field = RecordField::from_key(key)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown field: {}", key)))?;
        let text = value
            .as_str()
            .ok_or_else(|| AppError::BadRequest(format!("Field {} must be a string", key)))?;
        state
            .store
            .update_field(row, field, text)
            .context(format!("updating row {}", row))?;
    }

    Ok(Json(json!({ "success": true })))
}

/// Dashboard statistics over the whole table.
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let records = state.store.all().context("reading records")?;
    let stats = staleness::dashboard_stats(
        &records,
        state.config.dormant_threshold_days,
        Utc::now(),
    );
    Ok(Json(serde_json::to_value(stats).unwrap_or(Value::Null)))
}

/// Triggers one dormant-revival batch pass and reports its summary.
pub async fn run_dormant_batch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let reviver = DormantReviver::new(
        &state.config,
        state.gemini.clone(),
        state.analyzer(),
        state.store.clone(),
    );
    let run = reviver.process_all().await?;

    let summary = format!(
        "休眠顧客チェック完了: {}/{} 件処理 (エラー {} 件)",
        run.processed, run.total, run.errors
    );
    state.notifier.notify(&summary).await;

    Ok(Json(json!({
        "processed": run.processed,
        "errors": run.errors,
        "total": run.total,
    })))
}

/// Triggers one similar-company batch pass over records still missing
/// suggestions.
pub async fn run_similar_batch(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let finder = SimilarCompanyFinder::new(
        state.gemini.clone(),
        state.config.similar_company_count,
    );
    let run = finder
        .batch_analyze(
            state.store.as_ref(),
            state.config.max_batch_size,
            Duration::from_millis(state.config.batch_delay_ms),
        )
        .await?;

    Ok(Json(json!({
        "processed": run.processed,
        "errors": run.errors,
        "total": run.total,
    })))
}

//! Business-card SFA enrichment service.
//!
//! Contact records arrive as parsed card fields or card images (OCR), run
//! through a multi-stage enrichment pipeline against the Gemini API, and are
//! persisted to a flat, row-positional record table. Scheduled batch passes
//! revive dormant customers and expand sales targets.
//!
//! # Modules
//!
//! - `batch`: bounded sequential batch executor with rate-limit pacing.
//! - `config`: environment configuration.
//! - `dormant`: dormant-customer revival batch.
//! - `enrichment`: per-record enrichment orchestration and card OCR intake.
//! - `errors`: error handling types.
//! - `gemini`: resilient Gemini API client and lenient JSON recovery.
//! - `handlers`: HTTP request handlers.
//! - `industry`: industry/trend analysis stage.
//! - `matching`: duplicate-contact matching and alert text.
//! - `models`: core data models.
//! - `notify`: Slack/Chatwork alert delivery.
//! - `similar`: similar-company discovery stage and bulk pass.
//! - `sns`: social-profile URL generation and site resolution.
//! - `staleness`: contact-recency classification and dashboard stats.
//! - `store`: record-store collaborator interface and memory implementation.

pub mod batch;
pub mod config;
pub mod dormant;
pub mod enrichment;
pub mod errors;
pub mod gemini;
pub mod handlers;
pub mod industry;
pub mod matching;
pub mod models;
pub mod notify;
pub mod similar;
pub mod sns;
pub mod staleness;
pub mod store;

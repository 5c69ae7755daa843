use crate::config::Config;
use crate::errors::AppError;
use serde_json::json;
use std::time::Duration;

/// Duplicate-alert delivery over the configured chat channels.
///
/// Every channel is optional: missing configuration means the channel is
/// skipped, and a delivery failure is logged but never raised - an alert
/// that cannot be posted must not fail the record registration that
/// triggered it.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    slack_webhook_url: Option<String>,
    chatwork_api_token: Option<String>,
    chatwork_room_id: Option<String>,
    chatwork_base_url: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create notifier client: {}", e)))?;

        Ok(Self {
            client,
            slack_webhook_url: config.slack_webhook_url.clone(),
            chatwork_api_token: config.chatwork_api_token.clone(),
            chatwork_room_id: config.chatwork_room_id.clone(),
            chatwork_base_url: config.chatwork_base_url.clone(),
        })
    }

    /// Posts a plain-text alert to every configured channel and returns the
    /// channel names actually attempted. An empty result means log-only.
    pub async fn notify(&self, message: &str) -> Vec<&'static str> {
        tracing::info!("Alert: {}", message);
        let mut targets = Vec::new();

        if let Err(e) = self.send_slack(message).await {
            match e {
                AppError::Configuration(_) => {}
                other => tracing::warn!("Slack notification failed: {}", other),
            }
        } else {
            targets.push("Slack");
        }

        if let Err(e) = self.send_chatwork(message).await {
            match e {
                AppError::Configuration(_) => {}
                other => tracing::warn!("Chatwork notification failed: {}", other),
            }
        } else {
            targets.push("Chatwork");
        }

        targets
    }

    async fn send_slack(&self, message: &str) -> Result<(), AppError> {
        let webhook_url = self
            .slack_webhook_url
            .as_ref()
            .ok_or_else(|| AppError::Configuration("SLACK_WEBHOOK_URL".to_string()))?;

        let payload = json!({
            "text": message,
            "username": "名刺SFA Bot",
            "icon_emoji": ":card_index:",
        });

        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::FatalApi {
                status: Some(response.status().as_u16()),
                message: "Slack webhook rejected the alert".to_string(),
            });
        }

        tracing::debug!("Slack alert delivered");
        Ok(())
    }

    async fn send_chatwork(&self, message: &str) -> Result<(), AppError> {
        let token = self
            .chatwork_api_token
            .as_ref()
            .ok_or_else(|| AppError::Configuration("CHATWORK_API_TOKEN".to_string()))?;
        let room_id = self
            .chatwork_room_id
            .as_ref()
            .ok_or_else(|| AppError::Configuration("CHATWORK_ROOM_ID".to_string()))?;

        let url = format!("{}/v2/rooms/{}/messages", self.chatwork_base_url, room_id);
        let body = format!("[info][title]名刺SFA 重複検知[/title]{}[/info]", message);

        let response = self
            .client
            .post(&url)
            .header("X-ChatWorkToken", token)
            .form(&[("body", body.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::FatalApi {
                status: Some(response.status().as_u16()),
                message: "Chatwork rejected the alert".to_string(),
            });
        }

        tracing::debug!("Chatwork alert delivered");
        Ok(())
    }
}

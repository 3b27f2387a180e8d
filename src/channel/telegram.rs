// src/channel/telegram.rs

//! Telegram Bot API channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;

use super::MessageChannel;

const PARSE_MODE: &str = "HTML";

/// Longest `retry_after` honored before giving up on a rate-limited send.
const MAX_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

pub struct TelegramChannel {
    http: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramChannel {
    pub fn new(http: Client, api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    /// Build from configuration; the bot token is required.
    pub fn from_config(config: &TelegramConfig, http: Client) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::config("telegram.bot_token is not set (TELEGRAM_BOT_TOKEN)"))?;

        Ok(Self::new(http, config.api_base.clone(), token))
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }

    /// Call a Bot API method, waiting out one rate-limit response.
    async fn call<T: Serialize + Sync>(
        &self,
        method: &str,
        destination: &str,
        payload: &T,
    ) -> Result<()> {
        let url = self.method_url(method);
        let mut waited = false;

        loop {
            let response = self
                .http
                .post(&url)
                .json(payload)
                .send()
                .await
                // The URL carries the bot token
                .map_err(|e| AppError::dispatch(destination, e.without_url()))?;

            let status = response.status();
            let body: ApiResponse = response
                .json()
                .await
                .map_err(|e| AppError::dispatch(destination, format!("HTTP {status}: {}", e.without_url())))?;

            if body.ok {
                return Ok(());
            }

            let retry_after = body.parameters.as_ref().and_then(|p| p.retry_after);
            if let (StatusCode::TOO_MANY_REQUESTS, Some(secs), false) = (status, retry_after, waited) {
                if secs <= MAX_RETRY_AFTER_SECS {
                    log::warn!("Telegram rate limit for {destination}, retrying in {secs}s");
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    waited = true;
                    continue;
                }
            }

            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AppError::dispatch(destination, format!("{method}: {description}")));
        }
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        let payload = SendMessageRequest {
            chat_id: destination,
            text,
            parse_mode: PARSE_MODE,
            disable_web_page_preview: false,
        };
        self.call("sendMessage", destination, &payload).await
    }

    async fn send_photo(&self, destination: &str, photo_url: &str, caption: &str) -> Result<()> {
        let payload = SendPhotoRequest {
            chat_id: destination,
            photo: photo_url,
            caption,
            parse_mode: PARSE_MODE,
        };
        self.call("sendPhoto", destination, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_requires_token() {
        let config = TelegramConfig {
            bot_token: Some("  ".into()),
            ..TelegramConfig::default()
        };
        assert!(matches!(
            TelegramChannel::from_config(&config, Client::new()),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_method_url() {
        let channel = TelegramChannel::new(Client::new(), "https://api.telegram.org/", "123:abc");
        assert_eq!(
            channel.method_url("sendPhoto"),
            "https://api.telegram.org/bot123:abc/sendPhoto"
        );
    }

    #[test]
    fn test_payload_shape() {
        let payload = SendPhotoRequest {
            chat_id: "-100",
            photo: "https://img.test/a.jpg",
            caption: "<b>x</b>",
            parse_mode: PARSE_MODE,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["chat_id"], "-100");
        assert_eq!(json["parse_mode"], "HTML");
    }

    #[tokio::test]
    async fn test_network_error_does_not_leak_token() {
        let channel = TelegramChannel::new(Client::new(), "http://127.0.0.1:9", "123:secret-token");
        let err = channel.send_text("-100", "oi").await.unwrap_err();

        assert!(matches!(err, AppError::Dispatch { .. }));
        assert!(!err.to_string().contains("secret-token"));
    }
}

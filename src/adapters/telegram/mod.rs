//! Telegram Bot API client: `getUpdates` long polling and `sendMessage`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::chat::{ChatTransport, IncomingMessage},
};

/// Slack on top of the long-poll window before a request counts as hung.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// `<api>/bot<token>/`. Never log it.
    base: Url,
}

impl TelegramClient {
    pub fn new(
        api_url: &Url,
        bot_token: &SecretString,
        connect_timeout: Duration,
        long_poll_secs: u64,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(Duration::from_secs(long_poll_secs) + POLL_GRACE)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build chat client: {e}")))?;
        let base = api_url
            .join(&format!("./bot{}/", bot_token.expose_secret()))
            .map_err(|e| AppError::Internal(format!("invalid chat api url: {e}")))?;
        Ok(Self { client, base })
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> AppResult<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> AppResult<T> {
        let url = self
            .base
            .join(method)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        // without_url keeps the token out of error messages
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.without_url().to_string()))?;
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.without_url().to_string()))?;
        parsed.into_result()
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> AppResult<()> {
        let _: serde_json::Value = self
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> AppResult<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AppError::Upstream(
                self.description
                    .unwrap_or_else(|| "chat api returned no result".into()),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Update {
    /// Text messages with a sender. Everything else is ignored.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        Some(IncomingMessage {
            user_id: from.id,
            chat_id: message.chat.id,
            username: from.username,
            first_name: from.first_name,
            text,
        })
    }
}

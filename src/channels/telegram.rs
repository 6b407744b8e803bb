//! Telegram Channel
//!
//! Bot API client over HTTPS: long polling for updates plus the handful of
//! outbound methods the bot needs. Every call is a JSON `POST`; API failures
//! are mapped onto [`ChannelError`] here and nowhere else.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    Channel, ChannelError, ChannelResult, ChatId, Keyboard, MessageId, SendOptions, UserId,
};
use crate::security::logging::sanitize_error_message;

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    /// Bot token from BotFather
    pub bot_token: String,
    /// Bot API base URL
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout_secs: u64,
    /// Pause between two `getUpdates` calls
    pub poll_interval_ms: u64,
    /// HTTP request timeout; must exceed the long-poll timeout
    pub request_timeout_secs: u64,
    /// Skip updates queued while the bot was offline
    pub drop_pending_updates: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 35,
            poll_interval_ms: 400,
            request_timeout_secs: 45,
            drop_pending_updates: true,
        }
    }
}

/// Telegram Bot API channel
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: AtomicI64,
}

impl TelegramChannel {
    /// Create a new Telegram channel
    pub fn new(config: TelegramConfig) -> ChannelResult<Self> {
        if config.bot_token.is_empty() {
            return Err(ChannelError::InvalidConfig(
                "Bot token is required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChannelError::InvalidConfig(sanitize_error_message(&e)))?;
        Ok(Self {
            config,
            client,
            last_update_id: AtomicI64::new(0),
        })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> ChannelResult<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Request(sanitize_error_message(&e)))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::Request(sanitize_error_message(&e)))?;

        body.into_result(method)
    }

    /// Verify the token and return the bot account
    pub async fn get_me(&self) -> ChannelResult<User> {
        self.call("getMe", json!({})).await
    }

    /// Switch to long polling, optionally discarding the backlog
    pub async fn prepare_polling(&self) -> ChannelResult<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                json!({ "drop_pending_updates": self.config.drop_pending_updates }),
            )
            .await?;
        Ok(())
    }

    /// Fetch the next batch of updates, advancing the offset
    pub async fn get_updates(&self) -> ChannelResult<Vec<Update>> {
        let offset = self.last_update_id.load(Ordering::Relaxed) + 1;
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.config.poll_timeout_secs,
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;
        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::Relaxed);
        }
        Ok(updates)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ChannelResult<MessageId> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_notification": options.silent,
        });
        if options.html {
            body["parse_mode"] = json!("HTML");
        }
        if let Some(keyboard) = &options.keyboard {
            body["reply_markup"] = json!(keyboard);
        }
        tracing::debug!(chat_id, "sending Telegram message");
        let message: Message = self.call("sendMessage", body).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> ChannelResult<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = json!(keyboard);
        }
        // Returns the edited Message, or `true` for inline messages
        let _: Value = self.call("editMessageText", body).await?;
        Ok(())
    }

    async fn pin_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        silent: bool,
    ) -> ChannelResult<()> {
        let _: bool = self
            .call(
                "pinChatMessage",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "disable_notification": silent,
                }),
            )
            .await?;
        Ok(())
    }

    async fn unpin_message(&self, chat_id: ChatId, message_id: MessageId) -> ChannelResult<()> {
        let _: bool = self
            .call(
                "unpinChatMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ChannelResult<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> ChannelResult<T> {
        if self.ok {
            return self.result.ok_or_else(|| ChannelError::Api {
                code: 0,
                description: format!("{method}: empty result"),
            });
        }
        let retry_after = self.parameters.and_then(|p| p.retry_after);
        Err(classify_api_error(
            self.error_code.unwrap_or(0),
            self.description.unwrap_or_default(),
            retry_after,
        ))
    }
}

/// Map a Bot API failure onto the typed error set
pub fn classify_api_error(code: i64, description: String, retry_after: Option<u64>) -> ChannelError {
    match code {
        429 => ChannelError::RateLimited(retry_after.unwrap_or(1)),
        401 => ChannelError::Unauthorized(description),
        400 if description.contains("message is not modified") => ChannelError::NotModified,
        _ => ChannelError::Api { code, description },
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// First and last name joined
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Message {
    /// Bot command name if the text starts with one, without the `@botname` suffix
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.trim_start();
        let word = text.strip_prefix('/')?.split_whitespace().next()?;
        Some(word.split('@').next().unwrap_or(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "123456:test_token".to_string(),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = TelegramChannel::new(TelegramConfig::default());
        assert!(matches!(result, Err(ChannelError::InvalidConfig(_))));
    }

    #[test]
    fn test_api_url() {
        let mut config = create_test_config();
        config.api_url = "http://localhost:8081/".to_string();
        let channel = TelegramChannel::new(config).unwrap();
        assert_eq!(
            channel.api_url("getMe"),
            "http://localhost:8081/bot123456:test_token/getMe"
        );
    }

    #[test]
    fn test_classify_api_errors() {
        assert_eq!(
            classify_api_error(429, "Too Many Requests: retry after 7".into(), Some(7)),
            ChannelError::RateLimited(7)
        );
        assert_eq!(
            classify_api_error(
                400,
                "Bad Request: message is not modified: specified new message content and reply markup are exactly the same".into(),
                None
            ),
            ChannelError::NotModified
        );
        assert!(matches!(
            classify_api_error(401, "Unauthorized".into(), None),
            ChannelError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_api_error(400, "Bad Request: chat not found".into(), None),
            ChannelError::Api { code: 400, .. }
        ));
    }

    #[test]
    fn test_error_response_parsing() {
        let raw = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 3","parameters":{"retry_after":3}}"#;
        let resp: ApiResponse<Message> = serde_json::from_str(raw).unwrap();
        assert_eq!(
            resp.into_result("sendMessage").unwrap_err(),
            ChannelError::RateLimited(3)
        );
    }

    #[test]
    fn test_update_parsing() {
        let raw = r#"{
            "update_id": 10,
            "callback_query": {
                "id": "cb1",
                "from": {"id": 7, "is_bot": false, "first_name": "Anna", "username": "anna_k"},
                "message": {"message_id": 55, "chat": {"id": -100, "type": "supergroup", "title": "9Б"}},
                "data": "stol_eat"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let cb = update.callback_query.unwrap();
        assert_eq!(cb.data.as_deref(), Some("stol_eat"));
        assert_eq!(cb.message.unwrap().chat.title.as_deref(), Some("9Б"));
        assert_eq!(cb.from.username.as_deref(), Some("anna_k"));
    }

    #[test]
    fn test_command_parsing() {
        let msg: Message = serde_json::from_str(
            r#"{"message_id": 1, "chat": {"id": 1, "type": "group"}, "text": "/start@class_bot now"}"#,
        )
        .unwrap();
        assert_eq!(msg.command(), Some("start"));

        let plain: Message = serde_json::from_str(
            r#"{"message_id": 2, "chat": {"id": 1, "type": "group"}, "text": "hello"}"#,
        )
        .unwrap();
        assert_eq!(plain.command(), None);
    }

    #[test]
    fn test_full_name() {
        let user = User {
            id: 1,
            is_bot: false,
            first_name: "Anna".into(),
            last_name: Some("K".into()),
            username: None,
        };
        assert_eq!(user.full_name(), "Anna K");
    }
}

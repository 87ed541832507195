//! Telegram Bot API adapter.
//!
//! Inbound: webhook [`Update`]s decoded into [`Incoming`]. Outbound:
//! [`TelegramClient`] implements [`Notifier`] over `sendMessage` / `sendPhoto`
//! and the [`BotApi`] calls the webhook needs (photo download, callback
//! acknowledgement).

use crate::command::{Callback, Inbound, SlashCommand};
use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::{Keyboard, MessageBody, Notifier, OutboundMessage, PortFuture};
use boxoffice_core::types::ChatId;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Inbound payloads
// ============================================================================

/// Webhook update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update id
    pub update_id: i64,
    /// New message
    #[serde(default)]
    pub message: Option<Message>,
    /// Inline button press
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// Chat message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Chat the message belongs to
    pub chat: Chat,
    /// Sender
    #[serde(default)]
    pub from: Option<User>,
    /// Text body
    #[serde(default)]
    pub text: Option<String>,
    /// Photo sizes, smallest first
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

/// Chat reference
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat id
    pub id: i64,
}

/// Telegram user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// User id (equals the private chat id)
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub first_name: String,
}

/// One resolution of a photo
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    /// Id for `getFile`
    pub file_id: String,
    /// Pixels
    pub width: u32,
    /// Pixels
    pub height: u32,
}

/// Inline button press
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Id for `answerCallbackQuery`
    pub id: String,
    /// Who pressed
    pub from: User,
    /// Button payload
    #[serde(default)]
    pub data: Option<String>,
}

/// What an update carries, before any I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Ready for the dispatcher
    Ready(Inbound),
    /// Photo still to be downloaded and decoded
    Photo {
        /// Largest size's file id
        file_id: String,
    },
    /// Nothing the desk acts on
    Unsupported(&'static str),
}

/// A decoded update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    /// Sender chat
    pub from: ChatId,
    /// Sender's display name
    pub first_name: String,
    /// Callback query to acknowledge, if any
    pub callback_id: Option<String>,
    /// Payload
    pub content: Content,
}

impl Update {
    /// Decodes the update. `None` for update kinds the desk never handles.
    #[must_use]
    pub fn incoming(self) -> Option<Incoming> {
        if let Some(query) = self.callback_query {
            let content = match query.data.as_deref().and_then(Callback::decode) {
                Some(callback) => Content::Ready(Inbound::Callback(callback)),
                None => Content::Unsupported("unknown callback payload"),
            };
            return Some(Incoming {
                from: ChatId::new(query.from.id),
                first_name: query.from.first_name,
                callback_id: Some(query.id),
                content,
            });
        }

        let message = self.message?;
        let first_name = message.from.map(|user| user.first_name).unwrap_or_default();
        let content = if let Some(text) = message.text {
            if text.trim_start().starts_with('/') {
                SlashCommand::parse(&text).map_or(Content::Unsupported("unknown command"), |command| {
                    Content::Ready(Inbound::Command(command))
                })
            } else {
                Content::Ready(Inbound::Text(text))
            }
        } else if let Some(largest) = message
            .photo
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
        {
            Content::Photo {
                file_id: largest.file_id,
            }
        } else {
            Content::Unsupported("message without text or photo")
        };

        Some(Incoming {
            from: ChatId::new(message.chat.id),
            first_name,
            callback_id: None,
            content,
        })
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Bot API calls the webhook needs besides sending messages
pub trait BotApi: Send + Sync {
    /// Downloads a file by id
    fn download(&self, file_id: String) -> PortFuture<Vec<u8>>;

    /// Stops the button's loading indicator
    fn answer_callback(&self, callback_id: String) -> PortFuture<()>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct BotCommand {
    command: &'static str,
    description: &'static str,
}

/// Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    api_url: String,
}

impl TelegramClient {
    /// Creates a client for `token` against `api_url`
    ///
    /// # Errors
    ///
    /// [`DeskError::Delivery`] when the HTTP client cannot be built.
    pub fn new(token: String, api_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeskError::Delivery(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            token,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_url, self.token)
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, method: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| DeskError::Delivery(format!("{method}: {e}")))?;
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| DeskError::Delivery(format!("{method}: unreadable response ({status}): {e}")))?;

        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(DeskError::Delivery(format!(
                "{method} failed ({status}): {}",
                description.unwrap_or_default()
            ))),
        }
    }

    /// Registers the command menu shown by Telegram clients.
    ///
    /// # Errors
    ///
    /// [`DeskError::Delivery`] when the call fails.
    pub async fn set_my_commands(&self) -> Result<()> {
        let commands: Vec<BotCommand> = SlashCommand::MENU
            .iter()
            .map(|(command, description)| BotCommand {
                command: command.name(),
                description: *description,
            })
            .collect();
        let request = self
            .client
            .post(self.method_url("setMyCommands"))
            .json(&json!({ "commands": commands }));
        let _: bool = self.call(request, "setMyCommands").await?;
        Ok(())
    }

    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let markup = reply_markup(&message.keyboard);
        let chat_id = message.to.get();
        match message.body {
            MessageBody::Text(text) => {
                let mut payload = json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                });
                if let Some(markup) = markup {
                    payload["reply_markup"] = markup;
                }
                let request = self.client.post(self.method_url("sendMessage")).json(&payload);
                let _: serde_json::Value = self.call(request, "sendMessage").await?;
            },
            MessageBody::Photo { png, caption } => {
                let photo = Part::bytes(png)
                    .file_name("ticket.png")
                    .mime_str("image/png")
                    .map_err(|e| DeskError::Delivery(format!("sendPhoto: {e}")))?;
                let mut form = Form::new()
                    .text("chat_id", chat_id.to_string())
                    .text("caption", caption)
                    .text("parse_mode", "HTML")
                    .part("photo", photo);
                if let Some(markup) = markup {
                    form = form.text("reply_markup", markup.to_string());
                }
                let request = self.client.post(self.method_url("sendPhoto")).multipart(form);
                let _: serde_json::Value = self.call(request, "sendPhoto").await?;
            },
        }
        Ok(())
    }
}

/// Inline keyboard with one button per row
fn reply_markup(keyboard: &Keyboard) -> Option<serde_json::Value> {
    if keyboard.is_empty() {
        return None;
    }
    let rows: Vec<_> = keyboard
        .iter()
        .map(|button| json!([{ "text": button.label, "callback_data": button.payload }]))
        .collect();
    Some(json!({ "inline_keyboard": rows }))
}

impl Notifier for TelegramClient {
    fn deliver(&self, message: OutboundMessage) -> PortFuture<()> {
        let client = self.clone();
        Box::pin(async move { client.send(message).await })
    }
}

impl BotApi for TelegramClient {
    fn download(&self, file_id: String) -> PortFuture<Vec<u8>> {
        let client = self.clone();
        Box::pin(async move {
            let request = client
                .client
                .post(client.method_url("getFile"))
                .json(&json!({ "file_id": file_id }));
            let file: File = client.call(request, "getFile").await?;
            let path = file
                .file_path
                .ok_or_else(|| DeskError::NotFound(format!("file {file_id} has no path")))?;

            let url = format!("{}/file/bot{}/{path}", client.api_url, client.token);
            let response = client
                .client
                .get(url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| DeskError::Delivery(format!("file download: {e}")))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| DeskError::Delivery(format!("file download: {e}")))?;
            Ok(bytes.to_vec())
        })
    }

    fn answer_callback(&self, callback_id: String) -> PortFuture<()> {
        let client = self.clone();
        Box::pin(async move {
            let request = client
                .client
                .post(client.method_url("answerCallbackQuery"))
                .json(&json!({ "callback_query_id": callback_id }));
            let _: bool = client.call(request, "answerCallbackQuery").await?;
            Ok(())
        })
    }
}

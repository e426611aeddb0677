// src/models/api.rs

use super::{ChatRef, MediaItem, MediaKind, Message, MessageId};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

// --- 网关响应结构体 ---

#[derive(Deserialize, Debug, Clone)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<ApiMessage>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiMessage {
    pub id: MessageId,
    pub chat_id: Option<ChatRef>,
    pub date: Option<DateTime<FixedOffset>>,
    pub media: Option<ApiMedia>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiMedia {
    pub kind: MediaKind,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MeResponse {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

impl ApiMessage {
    /// 转换为领域模型；网关省略 chat_id 时使用请求的会话
    pub fn into_message(self, requested_chat: &ChatRef) -> Message {
        let date = self.date;
        Message {
            id: self.id,
            chat: self.chat_id.unwrap_or_else(|| requested_chat.clone()),
            date,
            media: self.media.map(|m| MediaItem {
                kind: m.kind,
                file_size: m.file_size.unwrap_or(0),
                mime_type: m.mime_type,
                file_name: m.file_name.filter(|n| !n.trim().is_empty()),
                date: m.date.or(date),
            }),
        }
    }
}

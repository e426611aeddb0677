// src/models/mod.rs

pub mod api;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt,
    path::PathBuf,
    str::FromStr,
};

pub type MessageId = i64;

// 1. 会话标识：数字 ID 或 @用户名
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{}", id),
            ChatRef::Username(name) => write!(f, "{}", name),
        }
    }
}

// 2. 媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Document,
    Photo,
    Video,
    Voice,
    VideoNote,
    Sticker,
    Animation,
}

impl MediaKind {
    pub const ALL: [MediaKind; 8] = [
        MediaKind::Audio,
        MediaKind::Document,
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::Voice,
        MediaKind::VideoNote,
        MediaKind::Sticker,
        MediaKind::Animation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Voice => "voice",
            MediaKind::VideoNote => "video_note",
            MediaKind::Sticker => "sticker",
            MediaKind::Animation => "animation",
        }
    }

    /// 是否按格式白名单过滤 (audio / document / video)
    pub fn has_format_filter(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Document | MediaKind::Video)
    }

    /// 没有自带文件名、需要按类型和时间生成文件名的媒体
    pub fn is_nameless(&self) -> bool {
        matches!(self, MediaKind::Voice | MediaKind::VideoNote)
    }

    /// MIME 缺失时使用的扩展名
    pub fn default_extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Sticker => "webp",
            MediaKind::Animation | MediaKind::Video | MediaKind::VideoNote => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Voice => "ogg",
            MediaKind::Document => "bin",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("未知的媒体类型 '{}'", s))
    }
}

// 3. 消息中的媒体附件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub kind: MediaKind,
    /// 服务端声明的大小，0 表示未知
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
}

impl MediaItem {
    /// MIME 子类型，例如 "video/mp4" -> "mp4"
    pub fn format(&self) -> Option<String> {
        self.mime_type
            .as_deref()
            .and_then(|mime| mime.rsplit('/').next())
            .map(str::trim)
            .filter(|sub| !sub.is_empty())
            .map(str::to_string)
    }
}

// 4. 来自服务端的消息 (只读)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat: ChatRef,
    pub date: Option<DateTime<FixedOffset>>,
    pub media: Option<MediaItem>,
}

// 5. 单条消息的处理结果
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DownloadStatus {
    Success,
    /// 已在跳过列表中
    Skipped,
    /// 无媒体、类型未请求或格式被过滤
    NotApplicable,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub message_id: MessageId,
    pub path: Option<PathBuf>,
    pub status: DownloadStatus,
}

impl DownloadRecord {
    pub fn new(message_id: MessageId, status: DownloadStatus) -> Self {
        Self {
            message_id,
            path: None,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, DownloadStatus::Success | DownloadStatus::Skipped)
    }
}

// 6. 跨运行持久化的进度状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub last_read_message_id: MessageId,
    pub ids_to_retry: BTreeSet<MessageId>,
    pub ids_to_skip: BTreeSet<MessageId>,
}

impl RunState {
    /// 水位线只前进不后退
    pub fn advance_watermark(&mut self, page_max: MessageId) {
        self.last_read_message_id = self.last_read_message_id.max(page_max);
    }

    /// 将本次运行的累计结果合并进持久状态。
    /// 合并后 `ids_to_retry` 与 `ids_to_skip` 不相交。
    pub fn absorb(
        &mut self,
        downloaded: &BTreeSet<MessageId>,
        failed: &BTreeSet<MessageId>,
        settled: &BTreeSet<MessageId>,
    ) {
        self.ids_to_skip.extend(downloaded.iter().copied());
        self.ids_to_retry
            .retain(|id| !downloaded.contains(id) && !settled.contains(id));
        self.ids_to_retry.extend(failed.iter().copied());
        self.ids_to_retry.retain(|id| !self.ids_to_skip.contains(id));
    }
}

// tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};
use tg_media_dl::{
    client::MessagingClient,
    error::{AppError, AppResult},
    models::{ChatRef, MediaItem, MediaKind, Message, MessageId},
};

/// 单次 download_media 调用的行为
#[derive(Debug, Clone)]
pub enum Behavior {
    Write(Vec<u8>),
    Expired,
    Timeout,
    Fail,
}

/// 按脚本响应的内存客户端，记录所有调用
#[derive(Default)]
pub struct FakeClient {
    history: Vec<Message>,
    server: HashMap<MessageId, Message>,
    scripts: Mutex<HashMap<MessageId, VecDeque<Behavior>>>,
    history_error_after: Option<usize>,
    lookup_error: bool,
    watch_config: Option<PathBuf>,
    pub downloads: Mutex<Vec<(MessageId, PathBuf)>>,
    pub lookups: Mutex<Vec<Vec<MessageId>>>,
    /// (消息 ID, 下载时配置文件中的水位线)
    pub observed_watermarks: Mutex<Vec<(MessageId, i64)>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 会话历史中的消息，同时可被 get_messages 查到
    pub fn with_history(mut self, messages: Vec<Message>) -> Self {
        for m in &messages {
            self.server.insert(m.id, m.clone());
        }
        self.history = messages;
        self
    }

    /// 只能通过 get_messages 查到的消息
    pub fn with_server_message(mut self, message: Message) -> Self {
        self.server.insert(message.id, message);
        self
    }

    pub fn with_script(self, id: MessageId, behaviors: Vec<Behavior>) -> Self {
        self.scripts.lock().unwrap().insert(id, behaviors.into());
        self
    }

    /// 历史遍历在产出 n 条消息后返回错误
    pub fn with_history_error_after(mut self, n: usize) -> Self {
        self.history_error_after = Some(n);
        self
    }

    /// get_messages 总是返回错误
    pub fn with_lookup_error(mut self) -> Self {
        self.lookup_error = true;
        self
    }

    pub fn watching_config(mut self, path: &Path) -> Self {
        self.watch_config = Some(path.to_path_buf());
        self
    }

    pub fn download_ids(&self) -> Vec<MessageId> {
        self.downloads.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    fn observe_watermark(&self, id: MessageId) {
        let Some(path) = &self.watch_config else {
            return;
        };
        let raw = fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let watermark = value["last_read_message_id"].as_i64().unwrap_or(0);
        self.observed_watermarks.lock().unwrap().push((id, watermark));
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn start(&self) -> AppResult<()> {
        Ok(())
    }

    async fn stop(&self) -> AppResult<()> {
        Ok(())
    }

    fn get_chat_history<'a>(
        &'a self,
        _chat: &'a ChatRef,
        offset_id: MessageId,
        reverse: bool,
    ) -> BoxStream<'a, AppResult<Message>> {
        let mut items: Vec<AppResult<Message>> = self
            .history
            .iter()
            .filter(|m| !reverse || m.id > offset_id)
            .cloned()
            .map(Ok)
            .collect();
        if let Some(n) = self.history_error_after {
            items.truncate(n);
            items.push(Err(AppError::Api {
                status: 500,
                message: "history unavailable".to_string(),
            }));
        }
        stream::iter(items).boxed()
    }

    async fn get_messages(&self, _chat: &ChatRef, ids: &[MessageId]) -> AppResult<Vec<Message>> {
        self.lookups.lock().unwrap().push(ids.to_vec());
        if self.lookup_error {
            return Err(AppError::Api {
                status: 503,
                message: "lookup unavailable".to_string(),
            });
        }
        Ok(ids.iter().filter_map(|id| self.server.get(id).cloned()).collect())
    }

    async fn download_media(&self, message: &Message, destination: &Path) -> AppResult<PathBuf> {
        self.downloads
            .lock()
            .unwrap()
            .push((message.id, destination.to_path_buf()));
        self.observe_watermark(message.id);

        let behavior = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&message.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Behavior::Write(format!("media-{}", message.id).into_bytes()));

        match behavior {
            Behavior::Write(bytes) => {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(destination, bytes)?;
                Ok(destination.to_path_buf())
            }
            Behavior::Expired => Err(AppError::FileReferenceExpired(message.id)),
            Behavior::Timeout => Err(AppError::Timeout("simulated".to_string())),
            Behavior::Fail => Err(AppError::Api {
                status: 500,
                message: "internal error".to_string(),
            }),
        }
    }
}

pub fn media_message(
    id: MessageId,
    kind: MediaKind,
    file_name: Option<&str>,
    mime_type: Option<&str>,
    file_size: u64,
) -> Message {
    Message {
        id,
        chat: ChatRef::Id(42),
        date: None,
        media: Some(MediaItem {
            kind,
            file_size,
            mime_type: mime_type.map(str::to_string),
            file_name: file_name.map(str::to_string),
            date: None,
        }),
    }
}

pub fn document(id: MessageId) -> Message {
    media_message(
        id,
        MediaKind::Document,
        Some(&format!("file{}.pdf", id)),
        Some("application/pdf"),
        0,
    )
}

pub fn text_message(id: MessageId) -> Message {
    Message {
        id,
        chat: ChatRef::Id(42),
        date: None,
        media: None,
    }
}

/// 所有文件的相对路径 (递归)
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    out.sort();
    out
}

// src/client.rs

pub mod gateway;

pub use gateway::GatewayClient;

use crate::{
    error::AppResult,
    models::{ChatRef, Message, MessageId},
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::{Path, PathBuf};

/// 消息服务客户端需要提供的能力。
///
/// 文件引用过期须以 `AppError::FileReferenceExpired` 返回，超时以 `AppError::Timeout`
/// (或 reqwest 的超时错误) 返回，下载器据此决定是否重试。
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn start(&self) -> AppResult<()>;

    async fn stop(&self) -> AppResult<()>;

    /// 惰性遍历会话历史。`reverse` 为 true 时按 ID 升序返回严格大于 `offset_id` 的消息。
    fn get_chat_history<'a>(
        &'a self,
        chat: &'a ChatRef,
        offset_id: MessageId,
        reverse: bool,
    ) -> BoxStream<'a, AppResult<Message>>;

    /// 按 ID 批量获取消息，服务端已不存在的消息不会出现在结果中
    async fn get_messages(&self, chat: &ChatRef, ids: &[MessageId]) -> AppResult<Vec<Message>>;

    /// 将消息的媒体写入 `destination`，返回最终的文件路径
    async fn download_media(&self, message: &Message, destination: &Path) -> AppResult<PathBuf>;
}

// src/downloader/batch.rs

use super::{DownloadExecutor, RunContext};
use crate::{
    client::MessagingClient,
    models::{DownloadStatus, Message, MessageId},
};
use log::debug;

/// 按顺序处理一页消息，返回本页中最大的消息 ID。
///
/// 每条消息无论成功与否都计入最大值，调用方据此推进水位线。
pub async fn process_messages<C: MessagingClient + ?Sized>(
    executor: &DownloadExecutor<'_, C>,
    messages: Vec<Message>,
    ctx: &mut RunContext,
) -> Option<MessageId> {
    let total = messages.len();
    let mut max_id: Option<MessageId> = None;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for message in messages {
        let record = executor.download(message, ctx).await;
        ctx.progress.inc(1);
        match record.status {
            DownloadStatus::Failed => failed += 1,
            _ if record.is_success() => succeeded += 1,
            _ => {}
        }
        max_id = Some(max_id.map_or(record.message_id, |m| m.max(record.message_id)));
    }

    debug!(
        "本页处理完毕: 共 {} 条，成功 {}，失败 {}，最大 ID {:?}",
        total, succeeded, failed, max_id
    );
    max_id
}

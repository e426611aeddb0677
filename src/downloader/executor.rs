// src/downloader/executor.rs

use super::{
    dedup, filter, naming,
    retry::{AttemptState, FailureClass, RetryMachine},
    RunContext,
};
use crate::{
    client::MessagingClient,
    config::AppConfig,
    error::{AppError, AppResult},
    models::{DownloadRecord, DownloadStatus, Message, MessageId},
    symbols, utils,
};
use colored::*;
use log::{debug, error, info, warn};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// 单次尝试的结果
#[derive(Debug)]
enum AttemptOutcome {
    Downloaded(PathBuf),
    /// 无需下载，附带原因
    NotApplicable(String),
}

/// `DownloadExecutor` 负责单条消息的下载：跳过检查、限速、带重试的下载和结果校验。
pub struct DownloadExecutor<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    config: &'a AppConfig,
    root: PathBuf,
}

impl<'a, C: MessagingClient + ?Sized> DownloadExecutor<'a, C> {
    /// `root` 为已存在的下载根目录
    pub fn new(client: &'a C, config: &'a AppConfig, root: PathBuf) -> Self {
        Self { client, config, root }
    }

    /// 处理单条消息。任何失败都记录在 `ctx` 中，不会向上传播。
    pub async fn download(&self, message: Message, ctx: &mut RunContext) -> DownloadRecord {
        let id = message.id;
        if ctx.is_skipped(id) {
            debug!("消息 {} 在跳过列表中", id);
            ctx.record_skip_hit(id);
            return DownloadRecord::new(id, DownloadStatus::Skipped);
        }

        if !self.config.rate_limit_delay.is_zero() {
            tokio::time::sleep(self.config.rate_limit_delay).await;
        }

        let mut message = message;
        let mut machine = RetryMachine::new(self.config.max_attempts);
        loop {
            let err = match self.attempt(&message).await {
                Ok(AttemptOutcome::Downloaded(path)) => {
                    machine.succeed();
                    ctx.record_downloaded(id);
                    info!("消息 {} 的媒体已保存到 {}", id, path.display());
                    ctx.progress
                        .suspend(|| println!("{} [{}] {}", *symbols::OK, id, path.display()));
                    return DownloadRecord {
                        message_id: id,
                        path: Some(path),
                        status: DownloadStatus::Success,
                    };
                }
                Ok(AttemptOutcome::NotApplicable(reason)) => {
                    machine.succeed();
                    debug!("消息 {} 无需下载: {}", id, reason);
                    ctx.record_settled(id);
                    return DownloadRecord::new(id, DownloadStatus::NotApplicable);
                }
                Err(e) => e,
            };

            let state = machine.fail(FailureClass::from(&err));
            if let AttemptState::RetryableFailure { attempt, reason } = state {
                warn!(
                    "消息 {} 第 {}/{} 次下载失败 ({:?}): {}",
                    id, attempt, self.config.max_attempts, reason, err
                );
                match self.prepare_retry(&mut message, reason, &err).await {
                    Ok(()) => {
                        machine.retry();
                        continue;
                    }
                    Err(prep_err) => {
                        error!("消息 {} 无法重试: {}", id, prep_err);
                        return self.give_up(id, &prep_err, ctx);
                    }
                }
            }

            error!(
                "消息 {} 下载失败，共尝试 {} 次 ({:?}): {:?}",
                id,
                machine.attempts(),
                machine.state(),
                err
            );
            if let AppError::IncompleteDownload { path, .. } | AppError::EmptyDownload(path) = &err
                && let Err(e) = remove_partial(path)
            {
                warn!("无法删除不完整文件 {}: {}", path.display(), e);
            }
            return self.give_up(id, &err, ctx);
        }
    }

    fn give_up(&self, id: MessageId, err: &AppError, ctx: &mut RunContext) -> DownloadRecord {
        ctx.record_failed(id);
        ctx.progress
            .suspend(|| println!("{} [{}] {}", *symbols::ERROR, id, err.to_string().red()));
        DownloadRecord::new(id, DownloadStatus::Failed)
    }

    /// 重试前的准备动作
    async fn prepare_retry(
        &self,
        message: &mut Message,
        reason: FailureClass,
        err: &AppError,
    ) -> AppResult<()> {
        match reason {
            FailureClass::FileReferenceExpired => {
                debug!("重新获取消息 {} 以刷新文件引用", message.id);
                let fresh = self
                    .client
                    .get_messages(&message.chat, &[message.id])
                    .await?
                    .into_iter()
                    .find(|m| m.id == message.id);
                match fresh {
                    Some(fresh) => *message = fresh,
                    None => {
                        return Err(AppError::Api {
                            status: 404,
                            message: format!("消息 {} 已不存在", message.id),
                        });
                    }
                }
            }
            FailureClass::Timeout => {
                if !self.config.timeout_backoff.is_zero() {
                    tokio::time::sleep(self.config.timeout_backoff).await;
                }
            }
            FailureClass::Incomplete | FailureClass::Empty => {
                if let AppError::IncompleteDownload { path, .. } | AppError::EmptyDownload(path) =
                    err
                {
                    remove_partial(path)?;
                }
            }
            FailureClass::Fatal => {}
        }
        Ok(())
    }

    async fn attempt(&self, message: &Message) -> AppResult<AttemptOutcome> {
        let Some(media) = message.media.as_ref() else {
            return Ok(AttemptOutcome::NotApplicable("消息不含媒体".to_string()));
        };
        if !self.config.media_types.contains(&media.kind) {
            return Ok(AttemptOutcome::NotApplicable(format!(
                "未请求的媒体类型 {}",
                media.kind
            )));
        }

        let name = naming::resolve_media_name(media, message.date);
        debug!("消息 {} 的媒体解析为 {}", message.id, name.base_path().display());
        let allowed = self.config.formats_for(media.kind);
        if !filter::can_download(media.kind, allowed, name.format.as_deref()) {
            return Ok(AttemptOutcome::NotApplicable(format!(
                "格式 {} 不在 {} 的允许列表 [{}] 中",
                name.format.as_deref().unwrap_or("未知"),
                media.kind,
                allowed.join(", ")
            )));
        }

        let target = utils::secure_join_path(&self.root, &name.namespaced(message.id))?;
        let saved = if utils::is_regular_file(&target) {
            let copy = naming::next_available_name(&target);
            debug!("{} 已存在，下载到 {}", target.display(), copy.display());
            let downloaded = self.client.download_media(message, &copy).await?;
            dedup::manage_duplicate_file(&downloaded)?
        } else {
            self.client.download_media(message, &target).await?
        };

        verify_download(&saved, media.file_size)?;
        Ok(AttemptOutcome::Downloaded(saved))
    }
}

/// 声明大小为 0 表示未知，此时只检查文件非空
fn verify_download(path: &Path, declared_size: u64) -> AppResult<()> {
    let actual = fs::metadata(path)?.len();
    if declared_size != 0 && actual < declared_size {
        return Err(AppError::IncompleteDownload {
            path: path.to_path_buf(),
            expected: declared_size,
            actual,
        });
    }
    if actual == 0 {
        return Err(AppError::EmptyDownload(path.to_path_buf()));
    }
    Ok(())
}

fn remove_partial(path: &Path) -> AppResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("已删除不完整文件 {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_verify_download_checks_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"12345").unwrap();

        assert!(verify_download(&path, 5).is_ok());
        assert!(verify_download(&path, 0).is_ok());
        // 比声明大也算通过
        assert!(verify_download(&path, 3).is_ok());
        assert!(matches!(
            verify_download(&path, 10),
            Err(AppError::IncompleteDownload { expected: 10, actual: 5, .. })
        ));

        let empty = dir.path().join("empty.bin");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(verify_download(&empty, 0), Err(AppError::EmptyDownload(_))));
    }

    #[test]
    fn test_remove_partial_ignores_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.bin");
        assert!(remove_partial(&path).is_ok());
        fs::write(&path, b"x").unwrap();
        remove_partial(&path).unwrap();
        assert!(!path.exists());
    }
}

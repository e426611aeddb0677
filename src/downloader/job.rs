// src/downloader/job.rs

use super::{batch, DownloadExecutor, RunContext};
use crate::{
    client::MessagingClient,
    config::{store::ConfigStore, AppConfig},
    error::*,
    models::{Message, MessageId, RunState},
    symbols, ui,
};
use colored::*;
use futures::StreamExt;
use itertools::Itertools;
use log::{error, info, warn};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

/// 一次运行的结果汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub last_read_message_id: MessageId,
    pub pages: usize,
    pub downloaded: BTreeSet<MessageId>,
    pub failed: BTreeSet<MessageId>,
    pub settled: BTreeSet<MessageId>,
}

impl RunSummary {
    fn from_context(ctx: &RunContext, state: &RunState, pages: usize) -> Self {
        Self {
            last_read_message_id: state.last_read_message_id,
            pages,
            downloaded: ctx.downloaded_ids().clone(),
            failed: ctx.failed_ids().clone(),
            settled: ctx.settled_ids().clone(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn print_report(&self) {
        info!(
            "运行报告: 成功={}, 失败={}, 无需下载={}, 水位线={}",
            self.downloaded.len(),
            self.failed.len(),
            self.settled.len(),
            self.last_read_message_id
        );

        if !self.failed.is_empty() {
            ui::print_sub_header("下载详情报告");
            println!("\n{} 失败的消息 ({}个)，将在下次运行时重试:", *symbols::ERROR, self.failed.len());
            println!("  {}", self.failed.iter().join(", "));
        }

        ui::print_sub_header("任务总结");
        if self.downloaded.is_empty() && self.failed.is_empty() {
            println!("{} 没有新的媒体需要下载。", *symbols::OK);
        } else {
            let summary = format!(
                "{} | {} | {}",
                format!("成功: {}", self.downloaded.len()).green(),
                format!("失败: {}", self.failed.len()).red(),
                format!("无需下载: {}", self.settled.len()).yellow()
            );
            println!("{}", summary);
        }
        println!(
            "{} 已读取至消息 {}",
            *symbols::INFO,
            self.last_read_message_id.to_string().cyan()
        );
    }
}

/// `ImportJob` 驱动一次完整的导入：先重试上次失败的消息，再向前遍历会话历史，
/// 每凑满一页就处理并把进度写回配置文件。
pub struct ImportJob<'a, C: MessagingClient + ?Sized> {
    client: &'a C,
    config: &'a AppConfig,
    store: &'a mut ConfigStore,
}

impl<'a, C: MessagingClient + ?Sized> ImportJob<'a, C> {
    pub fn new(client: &'a C, config: &'a AppConfig, store: &'a mut ConfigStore) -> Self {
        Self { client, config, store }
    }

    pub async fn run(mut self) -> AppResult<RunSummary> {
        let root = prepare_download_root(&self.config.download_dir)?;
        info!("文件将保存到目录: \"{}\"", root.display());
        println!("\n{} 文件将保存到目录: \"{}\"", *symbols::INFO, root.display());

        self.client.start().await?;
        let result = self.import(root).await;
        if let Err(e) = self.client.stop().await {
            warn!("关闭客户端时出错: {}", e);
        }
        result
    }

    async fn import(&mut self, root: PathBuf) -> AppResult<RunSummary> {
        let client = self.client;
        let config = self.config;
        let limit = config.pagination_limit.max(1);

        let mut state = self.store.run_state();
        let mut ctx =
            RunContext::new(state.ids_to_skip.clone()).with_progress(ui::new_messages_spinner());
        let executor = DownloadExecutor::new(client, config, root);
        let mut page: Vec<Message> = Vec::with_capacity(limit);
        let mut pages = 0usize;

        // 1. 上次失败的消息计入第一页
        let backlog = self.fetch_backlog(&state, &mut ctx).await;
        for message in backlog {
            page.push(message);
            if page.len() >= limit {
                self.flush_page(&executor, &mut page, &mut ctx, &mut state).await?;
                pages += 1;
            }
        }

        // 2. 从水位线之后向前遍历
        let mut stream_error = None;
        {
            let mut history =
                client.get_chat_history(&config.chat, state.last_read_message_id, true);
            while let Some(item) = history.next().await {
                match item {
                    Ok(message) => {
                        page.push(message);
                        if page.len() >= limit {
                            self.flush_page(&executor, &mut page, &mut ctx, &mut state).await?;
                            pages += 1;
                        }
                    }
                    Err(e) => {
                        error!("遍历会话历史失败: {}", e);
                        stream_error = Some(e);
                        break;
                    }
                }
            }
        }

        if !page.is_empty() {
            self.flush_page(&executor, &mut page, &mut ctx, &mut state).await?;
            pages += 1;
        }
        // 没有处理任何页时，缺失的待重试消息也需要写回
        state.absorb(ctx.downloaded_ids(), ctx.failed_ids(), ctx.settled_ids());
        self.store.save_state(&state)?;
        ctx.progress.finish_and_clear();

        if let Some(e) = stream_error {
            return Err(e);
        }
        Ok(RunSummary::from_context(&ctx, &state, pages))
    }

    /// 获取待重试的消息。服务端已不存在的 ID 视为无需下载；请求失败时保留到下次运行。
    async fn fetch_backlog(&self, state: &RunState, ctx: &mut RunContext) -> Vec<Message> {
        if state.ids_to_retry.is_empty() {
            return Vec::new();
        }
        let ids: Vec<MessageId> = state.ids_to_retry.iter().copied().collect();
        info!("重新下载上次失败的 {} 条消息: {:?}", ids.len(), ids);
        ctx.progress.suspend(|| {
            println!("{} 重新下载上次失败的 {} 条消息...", *symbols::INFO, ids.len())
        });

        match self.client.get_messages(&self.config.chat, &ids).await {
            Ok(messages) => {
                let found: BTreeSet<MessageId> = messages.iter().map(|m| m.id).collect();
                for missing in ids.iter().filter(|id| !found.contains(id)) {
                    warn!("待重试的消息 {} 已不存在", missing);
                    ctx.record_settled(*missing);
                }
                messages
            }
            Err(e) => {
                warn!("获取待重试消息失败，保留到下次运行: {}", e);
                Vec::new()
            }
        }
    }

    async fn flush_page(
        &mut self,
        executor: &DownloadExecutor<'_, C>,
        page: &mut Vec<Message>,
        ctx: &mut RunContext,
        state: &mut RunState,
    ) -> AppResult<()> {
        let messages = std::mem::take(page);
        if let Some(max_id) = batch::process_messages(executor, messages, ctx).await {
            state.advance_watermark(max_id);
        }
        state.absorb(ctx.downloaded_ids(), ctx.failed_ids(), ctx.settled_ids());
        self.store.save_state(state)?;
        ctx.progress
            .set_message(format!("已处理至消息 {}", state.last_read_message_id));
        Ok(())
    }
}

fn prepare_download_root(dir: &Path) -> AppResult<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dunce::canonicalize(dir)?)
}

// src/downloader/mod.rs

// 1. 声明子模块
pub mod batch;
pub mod dedup;
pub mod executor;
pub mod filter;
pub mod job;
pub mod naming;
pub mod retry;

// 2. 从子模块中导出公共接口
pub use executor::DownloadExecutor;
pub use job::{ImportJob, RunSummary};

// 3. 单次运行的累计状态，由 ImportJob 持有并以引用传给批处理和下载器
use crate::models::MessageId;
use indicatif::ProgressBar;
use std::collections::BTreeSet;

pub struct RunContext {
    downloaded_ids: BTreeSet<MessageId>,
    failed_ids: BTreeSet<MessageId>,
    settled_ids: BTreeSet<MessageId>,
    skip_ids: BTreeSet<MessageId>,
    pub progress: ProgressBar,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(BTreeSet::new())
    }
}

impl RunContext {
    pub fn new(skip_ids: BTreeSet<MessageId>) -> Self {
        Self {
            downloaded_ids: BTreeSet::new(),
            failed_ids: BTreeSet::new(),
            settled_ids: BTreeSet::new(),
            skip_ids,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn is_skipped(&self, id: MessageId) -> bool {
        self.skip_ids.contains(&id)
    }

    /// 下载成功：同时加入跳过列表，本次运行内不会再次下载
    pub fn record_downloaded(&mut self, id: MessageId) {
        self.downloaded_ids.insert(id);
        self.skip_ids.insert(id);
        self.failed_ids.remove(&id);
    }

    /// 命中跳过列表
    pub fn record_skip_hit(&mut self, id: MessageId) {
        self.downloaded_ids.insert(id);
    }

    pub fn record_failed(&mut self, id: MessageId) {
        self.failed_ids.insert(id);
    }

    /// 无需下载 (无媒体、未请求的类型、格式被过滤或消息已不存在)
    pub fn record_settled(&mut self, id: MessageId) {
        self.settled_ids.insert(id);
    }

    pub fn downloaded_ids(&self) -> &BTreeSet<MessageId> {
        &self.downloaded_ids
    }

    pub fn failed_ids(&self) -> &BTreeSet<MessageId> {
        &self.failed_ids
    }

    pub fn settled_ids(&self) -> &BTreeSet<MessageId> {
        &self.settled_ids
    }

    pub fn skip_ids(&self) -> &BTreeSet<MessageId> {
        &self.skip_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_clears_earlier_failure_and_joins_skip_set() {
        let mut ctx = RunContext::new(BTreeSet::from([1]));
        assert!(ctx.is_skipped(1));
        assert!(!ctx.is_skipped(2));

        ctx.record_failed(2);
        ctx.record_downloaded(2);
        assert!(ctx.is_skipped(2));
        assert!(ctx.failed_ids().is_empty());
        assert_eq!(ctx.downloaded_ids(), &BTreeSet::from([2]));
    }

    #[test]
    fn test_skip_hit_counts_as_downloaded() {
        let mut ctx = RunContext::new(BTreeSet::from([9]));
        ctx.record_skip_hit(9);
        assert_eq!(ctx.downloaded_ids(), &BTreeSet::from([9]));
        assert_eq!(ctx.skip_ids(), &BTreeSet::from([9]));
    }
}

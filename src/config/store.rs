// src/config/store.rs

use crate::{
    config::ExternalConfig,
    error::{AppError, AppResult},
    models::RunState,
};
use anyhow::Context;
use log::{debug, info};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// 配置文件的读写入口。进度状态与配置保存在同一个文件中。
pub struct ConfigStore {
    path: PathBuf,
    config: ExternalConfig,
}

impl ConfigStore {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件 '{}' 失败", path.display()))?;
        let config: ExternalConfig = serde_json::from_str(&content)
            .with_context(|| format!("解析配置文件 '{}' 失败", path.display()))?;
        debug!("已加载配置文件: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ExternalConfig {
        &self.config
    }

    pub fn run_state(&self) -> RunState {
        RunState {
            last_read_message_id: self.config.last_read_message_id,
            ids_to_retry: self.config.ids_to_retry.iter().copied().collect(),
            ids_to_skip: self.config.ids_to_skip.iter().copied().collect(),
        }
    }

    /// 写回进度状态。先写入同目录临时文件再替换，避免中途崩溃留下半个配置文件。
    pub fn save_state(&mut self, state: &RunState) -> AppResult<()> {
        self.config.last_read_message_id = state.last_read_message_id;
        self.config.ids_to_retry = state.ids_to_retry.iter().copied().collect();
        self.config.ids_to_skip = state.ids_to_skip.iter().copied().collect();

        let json_content = serde_json::to_string_pretty(&self.config)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("无法在 '{}' 创建临时文件", dir.display()))?;
        tmp.write_all(json_content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(AppError::from)?;

        info!(
            "进度已写入配置文件: last_read_message_id={}, 待重试 {} 个, 已完成 {} 个",
            state.last_read_message_id,
            state.ids_to_retry.len(),
            state.ids_to_skip.len()
        );
        Ok(())
    }
}

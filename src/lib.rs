// src/lib.rs

pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod downloader;
pub mod error;
pub mod logger;
pub mod models;
pub mod symbols;
pub mod ui;
pub mod utils;

use crate::{
    cli::Cli,
    client::GatewayClient,
    config::{store::ConfigStore, AppConfig},
    downloader::{ImportJob, RunSummary},
    error::AppResult,
    models::RunState,
};
use colored::*;
use itertools::Itertools;
use log::{debug, info};
use std::sync::Arc;

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    let mut store = ConfigStore::load(&args.config)?;

    if args.status {
        print_status(&store);
        return Ok(());
    }

    let config = AppConfig::new(&args, store.config())?;
    debug!("加载的应用配置: {:?}", config);
    info!(
        "开始导入会话 {} 的媒体: 类型 [{}]",
        config.chat,
        config.media_types.iter().join(", ")
    );

    let client = GatewayClient::new(&config)?;
    ui::print_header(&format!("导入会话 {} 的媒体", config.chat));
    let summary: RunSummary = ImportJob::new(&client, &config, &mut store).run().await?;
    summary.print_report();
    if !summary.all_succeeded() {
        println!(
            "\n{} {}",
            *symbols::WARN,
            "部分消息下载失败，已记录到 ids_to_retry，下次运行时会自动重试。".yellow()
        );
    }
    Ok(())
}

fn print_status(store: &ConfigStore) {
    let RunState {
        last_read_message_id,
        ids_to_retry,
        ids_to_skip,
    } = store.run_state();
    let lines = [
        format!("配置文件: {}", store.path().display()),
        format!("会话: {}", store.config().chat_id),
        format!("已读取至消息: {}", last_read_message_id),
        format!("已完成: {} 条", ids_to_skip.len()),
        format!(
            "待重试: {} 条{}",
            ids_to_retry.len(),
            if ids_to_retry.is_empty() {
                String::new()
            } else {
                format!(" [{}]", ids_to_retry.iter().join(", "))
            }
        ),
    ];
    let content: Vec<&str> = lines.iter().map(String::as_str).collect();
    ui::box_message("下载进度", &content, |s| s.cyan());
}

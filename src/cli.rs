// src/cli.rs

use crate::constants;
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
)]
pub struct Cli {
    /// 配置文件路径 (进度状态也写回此文件)
    #[arg(short, long, value_name = "FILE", default_value_os_t = PathBuf::from(constants::DEFAULT_CONFIG_FILE), help_heading = "Options")]
    pub config: PathBuf,
    /// 设置媒体文件保存根目录，覆盖配置文件中的 download_dir
    #[arg(short, long, value_name = "DIR", help_heading = "Options")]
    pub output: Option<PathBuf>,
    /// 每批处理的消息数量，覆盖配置文件中的 pagination_limit
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub pagination_limit: Option<usize>,
    /// 显示已保存的下载进度后退出
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub status: bool,

    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true, hide = true)]
    pub log_level: LogLevel,
}

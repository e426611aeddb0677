// src/error.rs

use crate::models::MessageId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("消息 {0} 的文件引用已过期")]
    FileReferenceExpired(MessageId),
    #[error("请求超时: {0}")]
    Timeout(String),
    #[error("文件下载不完整 '{}' (预期: {expected} 字节, 实际: {actual} 字节)", .path.display())]
    IncompleteDownload {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("下载结果为空文件 (0字节): '{}'", .0.display())]
    EmptyDownload(PathBuf),
    #[error("网关返回错误 (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无法解析来自 '{url}' 的API响应: {source}")]
    ApiParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("安全错误: {0}")]
    Security(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

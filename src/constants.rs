// src/constants.rs

pub const UI_WIDTH: usize = 88;
pub const MAX_FILENAME_BYTES: usize = 200;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const LOG_FILE_NAME: &str = concat!(clap::crate_name!(), ".log");
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SAVE_DIR: &str = "downloads";
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8081";
pub const USER_AGENT: &str = concat!(clap::crate_name!(), "/", clap::crate_version!());

/// 每批处理的消息数量
pub const DEFAULT_PAGINATION_LIMIT: usize = 3;
/// 网关单次返回的历史消息条数
pub const HISTORY_PAGE_SIZE: usize = 100;

/// 每条消息开始下载前的等待 (对服务端的限流礼让)
pub const RATE_LIMIT_DELAY_SECS: u64 = 10;
/// 超时后的重试等待
pub const TIMEOUT_BACKOFF_SECS: u64 = 5;
pub const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

pub const HASH_CHUNK_SIZE: usize = 4096;
pub const COPY_SUFFIX: &str = "-copy";
pub const MESSAGE_ID_MARKER: &str = "##";
pub const FORMAT_WILDCARD: &str = "all";

pub mod api {
    pub const HEADER_API_ID: &str = "x-api-id";
    pub const HEADER_API_HASH: &str = "x-api-hash";
    pub const FILE_REFERENCE_ERROR: &str = "FILE_REFERENCE";
}

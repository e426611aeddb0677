// src/config.rs

pub mod store;

use crate::{
    cli::Cli,
    constants,
    error::{AppError, AppResult},
    models::{ChatRef, MediaKind, MessageId},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DownloadTuning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_delay_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_backoff_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// 某类媒体允许的格式：格式列表，或单独的通配符 "all"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatList {
    Single(String),
    Many(Vec<String>),
}

impl FormatList {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            FormatList::Single(s) => vec![s.clone()],
            FormatList::Many(v) => v.clone(),
        }
    }
}

/// 配置文件 (同时保存进度状态)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    pub api_id: i64,
    pub api_hash: String,
    pub chat_id: ChatRef,
    #[serde(default)]
    pub last_read_message_id: MessageId,
    #[serde(default)]
    pub ids_to_retry: Vec<MessageId>,
    #[serde(default)]
    pub ids_to_skip: Vec<MessageId>,
    pub media_types: Vec<MediaKind>,
    #[serde(default)]
    pub file_formats: BTreeMap<MediaKind, FormatList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination_limit: Option<usize>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub download: DownloadTuning,
    // 用户自定义的其它字段，回写时原样保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiCredentials {
    pub api_id: i64,
    pub api_hash: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chat: ChatRef,
    pub media_types: Vec<MediaKind>,
    pub file_formats: HashMap<MediaKind, Vec<String>>,
    pub download_dir: PathBuf,
    pub pagination_limit: usize,
    pub rate_limit_delay: Duration,
    pub timeout_backoff: Duration,
    pub max_attempts: u32,
    pub gateway_url: String,
    pub credentials: ApiCredentials,
    pub proxy: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AppConfig {
    pub fn new(args: &Cli, external: &ExternalConfig) -> AppResult<Self> {
        let pagination_limit = args
            .pagination_limit
            .or(external.pagination_limit)
            .unwrap_or(constants::DEFAULT_PAGINATION_LIMIT);
        if pagination_limit == 0 {
            return Err(AppError::Config("pagination_limit 必须大于 0".to_string()));
        }

        let max_attempts = external
            .download
            .max_attempts
            .unwrap_or(constants::MAX_DOWNLOAD_ATTEMPTS);
        if max_attempts == 0 {
            return Err(AppError::Config("download.max_attempts 必须大于 0".to_string()));
        }

        if external.media_types.is_empty() {
            return Err(AppError::Config("media_types 不能为空".to_string()));
        }

        let download_dir = args
            .output
            .clone()
            .or_else(|| external.download_dir.clone())
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_SAVE_DIR));

        Ok(Self {
            chat: external.chat_id.clone(),
            media_types: external.media_types.clone(),
            file_formats: external
                .file_formats
                .iter()
                .map(|(kind, formats)| (*kind, formats.to_vec()))
                .collect(),
            download_dir,
            pagination_limit,
            rate_limit_delay: Duration::from_secs(
                external
                    .download
                    .rate_limit_delay_secs
                    .unwrap_or(constants::RATE_LIMIT_DELAY_SECS),
            ),
            timeout_backoff: Duration::from_secs(
                external
                    .download
                    .timeout_backoff_secs
                    .unwrap_or(constants::TIMEOUT_BACKOFF_SECS),
            ),
            max_attempts,
            gateway_url: external
                .gateway_url
                .clone()
                .unwrap_or_else(|| constants::DEFAULT_GATEWAY_URL.to_string()),
            credentials: ApiCredentials {
                api_id: external.api_id,
                api_hash: external.api_hash.clone(),
            },
            proxy: external.proxy.clone(),
            user_agent: constants::USER_AGENT.into(),
            connect_timeout: Duration::from_secs(
                external.network.connect_timeout_secs.unwrap_or(10),
            ),
            timeout: Duration::from_secs(external.network.timeout_secs.unwrap_or(60)),
            max_retries: external.network.max_retries.unwrap_or(3),
        })
    }

    /// 某类媒体配置的格式白名单；未配置时为空 (不限制)
    pub fn formats_for(&self, kind: MediaKind) -> &[String] {
        self.file_formats
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat: ChatRef::Id(0),
            media_types: MediaKind::ALL.to_vec(),
            file_formats: HashMap::new(),
            download_dir: PathBuf::from(constants::DEFAULT_SAVE_DIR),
            pagination_limit: constants::DEFAULT_PAGINATION_LIMIT,
            rate_limit_delay: Duration::ZERO,
            timeout_backoff: Duration::ZERO,
            max_attempts: constants::MAX_DOWNLOAD_ATTEMPTS,
            gateway_url: constants::DEFAULT_GATEWAY_URL.to_string(),
            credentials: ApiCredentials::default(),
            proxy: None,
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 0,
        }
    }
}

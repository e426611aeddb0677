// src/client/gateway.rs

use super::MessagingClient;
use crate::{
    config::AppConfig,
    constants::{self, api},
    error::*,
    models::{
        ChatRef, Message, MessageId,
        api::{ApiErrorBody, MeResponse, MessagesResponse},
    },
};
use async_trait::async_trait;
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use itertools::Itertools;
use log::{debug, info, warn};
use reqwest::{
    Response, StatusCode,
    header::{HeaderMap, HeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use url::Url;

/// 通过本地 MTProto 网关服务 (JSON over HTTP) 访问消息服务。
///
/// 元数据请求走带指数退避重试的中间件客户端；媒体下载使用单独的客户端，
/// 不设整体超时、也不在 HTTP 层重试，重试次数完全由下载器的状态机控制。
#[derive(Clone)]
pub struct GatewayClient {
    pub client: ClientWithMiddleware,
    media_client: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.gateway_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "网关地址 '{}' 无效",
                config.gateway_url
            )));
        }

        let headers = credential_headers(config)?;
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let api_client = base_builder(config, headers.clone())?
            .timeout(config.timeout)
            .build()?;
        let client = ClientBuilder::new(api_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let media_client = base_builder(config, headers)?.build()?;

        Ok(Self {
            client,
            media_client,
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("网关地址 '{}' 无效", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> AppResult<T> {
        debug!("GET {}", url);
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(middleware_error)?;
        let res = check_response(res, None).await?;
        let body = res.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|source| AppError::ApiParseFailed {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_history_page(
        &self,
        chat: &ChatRef,
        offset_id: MessageId,
        reverse: bool,
    ) -> AppResult<Vec<Message>> {
        let mut url = self.endpoint(&["chats", &chat.to_string(), "history"])?;
        url.query_pairs_mut()
            .append_pair("offset_id", &offset_id.to_string())
            .append_pair("limit", &constants::HISTORY_PAGE_SIZE.to_string())
            .append_pair("reverse", if reverse { "true" } else { "false" });

        let page: MessagesResponse = self.get_json(url).await?;
        Ok(page
            .messages
            .into_iter()
            .map(|m| m.into_message(chat))
            .filter(|m| !reverse || m.id > offset_id)
            .collect())
    }
}

#[async_trait]
impl MessagingClient for GatewayClient {
    async fn start(&self) -> AppResult<()> {
        let me: MeResponse = self.get_json(self.endpoint(&["me"])?).await?;
        info!(
            "已连接网关 {}，账号: {} ({})",
            self.base_url,
            me.user_id,
            me.username.as_deref().unwrap_or("-")
        );
        Ok(())
    }

    async fn stop(&self) -> AppResult<()> {
        debug!("断开网关连接: {}", self.base_url);
        Ok(())
    }

    fn get_chat_history<'a>(
        &'a self,
        chat: &'a ChatRef,
        offset_id: MessageId,
        reverse: bool,
    ) -> BoxStream<'a, AppResult<Message>> {
        stream::unfold(Some(offset_id), move |cursor| async move {
            let offset = cursor?;
            match self.fetch_history_page(chat, offset, reverse).await {
                Ok(page) if page.is_empty() => None,
                Ok(page) => {
                    let next = page.last().map(|m| m.id);
                    let items: Vec<AppResult<Message>> = page.into_iter().map(Ok).collect();
                    Some((stream::iter(items), next))
                }
                // 出错后结束遍历
                Err(e) => Some((stream::iter(vec![Err(e)]), None)),
            }
        })
        .flatten()
        .boxed()
    }

    async fn get_messages(&self, chat: &ChatRef, ids: &[MessageId]) -> AppResult<Vec<Message>> {
        let mut messages = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(constants::HISTORY_PAGE_SIZE) {
            let mut url = self.endpoint(&["chats", &chat.to_string(), "messages"])?;
            url.query_pairs_mut()
                .append_pair("ids", &chunk.iter().join(","));
            let page: MessagesResponse = self.get_json(url).await?;
            messages.extend(page.messages.into_iter().map(|m| m.into_message(chat)));
        }
        Ok(messages)
    }

    async fn download_media(&self, message: &Message, destination: &Path) -> AppResult<PathBuf> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = self.endpoint(&[
            "chats",
            &message.chat.to_string(),
            "messages",
            &message.id.to_string(),
            "media",
        ])?;
        debug!("下载消息 {} 的媒体: {} -> {}", message.id, url, destination.display());

        let res = self
            .media_client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;
        let res = check_response(res, Some(message.id)).await?;

        let write_result: AppResult<()> = async {
            let mut file = tokio::fs::File::create(destination).await?;
            let mut stream = res.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(transport_error)?;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = write_result {
            warn!("消息 {} 的媒体写入中断，删除残留文件: {}", message.id, destination.display());
            let _ = tokio::fs::remove_file(destination).await;
            return Err(e);
        }
        Ok(destination.to_path_buf())
    }
}

fn base_builder(config: &AppConfig, headers: HeaderMap) -> AppResult<reqwest::ClientBuilder> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.connect_timeout)
        .default_headers(headers);
    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }
    Ok(builder)
}

fn credential_headers(config: &AppConfig) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        api::HEADER_API_ID,
        HeaderValue::from(config.credentials.api_id),
    );
    let hash = HeaderValue::from_str(&config.credentials.api_hash)
        .map_err(|_| AppError::Config("api_hash 包含非法字符".to_string()))?;
    headers.insert(api::HEADER_API_HASH, hash);
    Ok(headers)
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(err.to_string())
    } else {
        AppError::Network(err)
    }
}

fn middleware_error(err: reqwest_middleware::Error) -> AppError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => transport_error(e),
        other => AppError::NetworkMiddleware(other),
    }
}

/// 将网关的错误状态码映射为领域错误
async fn check_response(res: Response, message_id: Option<MessageId>) -> AppResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    if matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT) {
        return Err(AppError::Timeout(format!("网关返回 {}", status)));
    }

    let body = res.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<ApiErrorBody>(&body).ok();
    if status == StatusCode::BAD_REQUEST
        && let (Some(id), Some(err)) = (message_id, parsed.as_ref())
        && err.error.contains(api::FILE_REFERENCE_ERROR)
    {
        return Err(AppError::FileReferenceExpired(id));
    }

    let message = match parsed {
        Some(err) => err.message.unwrap_or(err.error),
        None => body,
    };
    Err(AppError::Api {
        status: status.as_u16(),
        message,
    })
}

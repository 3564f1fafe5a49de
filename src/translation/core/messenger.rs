//! 翻译后端通信
//!
//! 请求合并队列只通过 [`Messenger`] 与后端交互：发送一批原文，收到按下标
//! 对齐的译文数组。任何失败或格式不符都由队列回退为原文。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::translation::config::ApiConfig;
use crate::translation::error::{helpers::invalid_response, TranslationError, TranslationResult};

/// 发往后端的一批文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub texts: Vec<String>,
    pub source_lang: String,
    pub target_lang: String,
    pub engine: String,
}

/// 后端响应，`translations` 与请求的 `texts` 按下标对齐
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    #[serde(default)]
    pub translations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResponse {
    pub fn ok(translations: Vec<String>) -> Self {
        Self {
            success: true,
            translations,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            translations: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// 校验响应是否可用于给定请求
    pub fn validate_for(&self, request_len: usize) -> TranslationResult<()> {
        if !self.success {
            return Err(TranslationError::NetworkError(
                self.error.clone().unwrap_or_else(|| "后端返回失败".to_string()),
            ));
        }

        if self.translations.len() != request_len {
            return Err(invalid_response(format!(
                "译文数量 {} 与原文数量 {} 不一致",
                self.translations.len(),
                request_len
            )));
        }

        Ok(())
    }
}

/// 翻译后端通信接口
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_batch(&self, request: BatchRequest) -> TranslationResult<BatchResponse>;
}

/// 基于 HTTP JSON 的后端实现
pub struct HttpMessenger {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpMessenger {
    pub fn new(config: &ApiConfig) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn send_batch(&self, request: BatchRequest) -> TranslationResult<BatchResponse> {
        let mut builder = self.http.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::NetworkError(format!(
                "后端返回状态 {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: BatchResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(format!("无法解析响应: {}", e)))?;
        Ok(body)
    }
}

//! DeepSeek API 客户端
//!
//! 直接按 OpenAI 兼容的 chat/completions 线上格式发请求。
//! 标准端点用于常规对话补全；beta 端点支持在最后一条 assistant
//! 消息上带 `prefix: true`，用于修复流程的前缀续写。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::CompletionApi;
use crate::config::Config;
use crate::error::{ApiError, AppResult};
use crate::models::{Conversation, Role};

/// HTTP 客户端整体超时（秒）。长章节单次生成可能需要数分钟
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// 单次远程调用的结果
#[derive(Debug, Clone)]
pub struct CompletionReply {
    /// 生成的文本
    pub content: String,
    /// 停止原因
    pub stop_reason: StopReason,
}

impl CompletionReply {
    pub fn is_truncated(&self) -> bool {
        self.stop_reason == StopReason::LengthTruncated
    }
}

/// 服务停止生成的原因
///
/// 截断只信服务端返回的 `finish_reason` 信号，不从文本内容猜测
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 自然结束
    Completed,
    /// 达到输出长度上限被截断
    LengthTruncated,
}

impl StopReason {
    fn from_finish_reason(finish_reason: Option<&str>) -> Self {
        match finish_reason {
            Some("length") => StopReason::LengthTruncated,
            _ => StopReason::Completed,
        }
    }
}

// ========== 线上协议类型 ==========

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
    /// beta 端点的 Chat Prefix Completion 标记，只出现在最后一条 assistant 消息上
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<bool>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

// ========== 客户端 ==========

/// DeepSeek API 客户端
pub struct DeepSeekClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    beta_api_base_url: String,
    model_name: String,
    max_output_tokens: u32,
}

impl DeepSeekClient {
    /// 创建新的 DeepSeek 客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::RequestFailed {
                endpoint: config.api_base_url.clone(),
                source: Box::new(e),
            })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.clone(),
            beta_api_base_url: config.beta_api_base_url.clone(),
            model_name: config.model_name.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    /// 发送一次 chat/completions 请求并解析响应
    async fn send(
        &self,
        base_url: &str,
        messages: Vec<WireMessage<'_>>,
    ) -> AppResult<CompletionReply> {
        let endpoint = Self::endpoint(base_url);

        let request = ChatCompletionRequest {
            model: &self.model_name,
            messages,
            max_tokens: self.max_output_tokens,
            stream: false,
        };

        debug!("调用 DeepSeek API: {} (模型: {})", endpoint, self.model_name);

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed {
                endpoint: endpoint.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(self.map_error_status(&endpoint, status, response).await.into());
        }

        let body = response.text().await.map_err(|e| ApiError::RequestFailed {
            endpoint: endpoint.clone(),
            source: Box::new(e),
        })?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::JsonParseFailed {
                source: Box::new(e),
            })?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ApiError::EmptyChoices {
                model: self.model_name.clone(),
            }
        })?;

        let content = choice.message.content.ok_or_else(|| ApiError::EmptyContent {
            model: self.model_name.clone(),
        })?;

        let stop_reason = StopReason::from_finish_reason(choice.finish_reason.as_deref());

        debug!(
            "DeepSeek API 调用成功 ({} 字符, finish_reason: {:?})",
            content.len(),
            choice.finish_reason
        );

        Ok(CompletionReply {
            content,
            stop_reason,
        })
    }

    /// 把非 2xx 状态码映射为错误分类
    async fn map_error_status(
        &self,
        endpoint: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> ApiError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return ApiError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after,
            };
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ApiError::AuthFailed {
                endpoint: endpoint.to_string(),
            };
        }

        let message = response
            .text()
            .await
            .map(|body| body.chars().take(200).collect::<String>())
            .unwrap_or_else(|_| "<无法读取响应体>".to_string());

        if status.is_server_error() {
            ApiError::ServerError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            }
        } else {
            ApiError::BadRequest {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message,
            }
        }
    }
}

#[async_trait]
impl CompletionApi for DeepSeekClient {
    /// 发送完整对话到标准端点
    async fn complete(&self, conversation: &Conversation) -> AppResult<CompletionReply> {
        let messages = conversation
            .turns()
            .iter()
            .map(|turn| WireMessage {
                role: turn.role.as_str(),
                content: &turn.text,
                prefix: None,
            })
            .collect();

        self.send(&self.api_base_url, messages).await
    }

    /// Chat Prefix Completion：把已有文本作为 assistant 前缀，请 beta 端点接着写
    async fn complete_with_prefix(
        &self,
        prompt: &str,
        prefix: &str,
    ) -> AppResult<CompletionReply> {
        let messages = vec![
            WireMessage {
                role: Role::User.as_str(),
                content: prompt,
                prefix: None,
            },
            WireMessage {
                role: Role::Assistant.as_str(),
                content: prefix,
                prefix: Some(true),
            },
        ];

        self.send(&self.beta_api_base_url, messages).await
    }
}

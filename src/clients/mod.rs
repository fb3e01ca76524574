//! 客户端层
//!
//! 封装所有与 DeepSeek API 相关的调用逻辑。
//! `CompletionApi` 是远程边界的唯一接口，上层（续写引擎、修复流程）
//! 只依赖该 trait，测试时注入模拟客户端。

pub mod deepseek_client;

pub use deepseek_client::{CompletionReply, DeepSeekClient, StopReason};

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::Conversation;

/// 远程补全服务的边界接口
///
/// 两个能力：
/// - `complete`：发送完整对话，返回生成文本和停止原因
/// - `complete_with_prefix`：Chat Prefix Completion，把已有文本作为
///   assistant 前缀续写，返回的内容由调用方直接追加（不做合并去重）
#[async_trait]
pub trait CompletionApi: Send + Sync {
    async fn complete(&self, conversation: &Conversation) -> AppResult<CompletionReply>;

    async fn complete_with_prefix(&self, prompt: &str, prefix: &str)
        -> AppResult<CompletionReply>;
}

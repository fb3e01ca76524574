//! 续写引擎 - 业务能力层
//!
//! 只负责"把一个章节的对话推进到完整"能力，不关心批量流程。
//!
//! ## 状态机
//!
//! 每次调用检查停止原因：
//! - 自然结束 → 完成，拼接全部片段返回
//! - 长度截断 → 追加 assistant 轮和"请继续"用户轮，再次调用；
//!   续写次数达到上限时返回已有的部分文本（降级成功，不算失败）
//!
//! 截断判定只信服务端返回的 finish_reason，不从文本内容猜测。
//! 片段保存为有序列表，最终一次性拼接，避免重试过程中的意外共享。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::clients::{CompletionApi, StopReason};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::Conversation;
use crate::services::retry::RetryPolicy;

/// 续写指令，截断后作为新的用户轮追加
const CONTINUE_PROMPT: &str = "Please continue from where you left off.";

/// 引擎终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// 服务自然结束
    Completed,
    /// 续写次数耗尽，文本可能仍不完整
    LimitExceeded,
}

/// 一个章节的完整生成结果
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    /// 全部片段按轮次顺序拼接后的文本
    pub text: String,
    pub status: EngineStatus,
    /// 实际发生的续写次数
    pub continuations: u32,
}

/// 续写引擎
pub struct ContinuationEngine {
    client: Arc<dyn CompletionApi>,
    retry: RetryPolicy,
    max_continuations: u32,
    continuation_delay: Duration,
}

impl ContinuationEngine {
    /// 创建新的续写引擎
    pub fn new(config: &Config, client: Arc<dyn CompletionApi>) -> Self {
        Self {
            client,
            retry: RetryPolicy::new(config),
            max_continuations: config.max_continuations,
            continuation_delay: Duration::from_millis(config.continuation_delay_ms),
        }
    }

    /// 驱动一个提示词到完整响应
    ///
    /// 致命错误（重试耗尽或不可重试）向上传播；
    /// 截断上限不是错误，部分文本照常返回交给校验决定去留
    pub async fn run(&self, prompt: &str) -> AppResult<EngineOutcome> {
        let mut conversation = Conversation::from_prompt(prompt);
        let mut fragments: Vec<String> = Vec::new();
        let mut continuations: u32 = 0;

        loop {
            let reply = self
                .retry
                .run("chat/completions", || self.client.complete(&conversation))
                .await?;

            match reply.stop_reason {
                StopReason::Completed => {
                    fragments.push(reply.content);
                    if continuations > 0 {
                        info!("✓ 响应在 {} 次续写后完成", continuations);
                    }
                    return Ok(EngineOutcome {
                        text: fragments.concat(),
                        status: EngineStatus::Completed,
                        continuations,
                    });
                }
                StopReason::LengthTruncated => {
                    if continuations >= self.max_continuations {
                        warn!(
                            "⚠️ 达到最大续写次数 ({})，返回部分文本",
                            self.max_continuations
                        );
                        fragments.push(reply.content);
                        return Ok(EngineOutcome {
                            text: fragments.concat(),
                            status: EngineStatus::LimitExceeded,
                            continuations,
                        });
                    }

                    continuations += 1;
                    info!("🔄 检测到截断，开始第 {} 次续写", continuations);

                    conversation.push_assistant(reply.content.clone());
                    conversation.push_user(CONTINUE_PROMPT);
                    fragments.push(reply.content);

                    // 连续请求之间的礼貌延迟
                    sleep(self.continuation_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::CompletionReply;
    use crate::error::{ApiError, AppError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// 按脚本顺序返回预设响应的模拟客户端
    struct ScriptedClient {
        replies: Mutex<VecDeque<AppResult<CompletionReply>>>,
        calls: AtomicU32,
        conversation_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<AppResult<CompletionReply>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
                conversation_lens: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionApi for ScriptedClient {
        async fn complete(&self, conversation: &Conversation) -> AppResult<CompletionReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.conversation_lens
                .lock()
                .unwrap()
                .push(conversation.len());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("脚本响应已耗尽")
        }

        async fn complete_with_prefix(
            &self,
            _prompt: &str,
            _prefix: &str,
        ) -> AppResult<CompletionReply> {
            unreachable!("续写引擎不应调用 beta 端点")
        }
    }

    fn truncated(text: &str) -> AppResult<CompletionReply> {
        Ok(CompletionReply {
            content: text.to_string(),
            stop_reason: StopReason::LengthTruncated,
        })
    }

    fn completed(text: &str) -> AppResult<CompletionReply> {
        Ok(CompletionReply {
            content: text.to_string(),
            stop_reason: StopReason::Completed,
        })
    }

    fn engine_with(max_continuations: u32, client: Arc<ScriptedClient>) -> ContinuationEngine {
        let config = Config {
            max_continuations,
            retry_base_delay_secs: 1,
            continuation_delay_ms: 500,
            ..Config::default()
        };
        ContinuationEngine::new(&config, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_truncated_stops_at_limit() {
        // 永远截断的服务：应该恰好调用 max_continuations + 1 次
        let client = Arc::new(ScriptedClient::new(vec![
            truncated("一"),
            truncated("二"),
            truncated("三"),
            truncated("四"),
        ]));
        let engine = engine_with(3, client.clone());

        let outcome = engine.run("写第一章").await.unwrap();

        assert_eq!(client.calls(), 4);
        assert_eq!(outcome.status, EngineStatus::LimitExceeded);
        assert_eq!(outcome.continuations, 3);
        // 全部片段按顺序拼接，非空
        assert_eq!(outcome.text, "一二三四");
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncate_once_then_complete() {
        let client = Arc::new(ScriptedClient::new(vec![
            truncated("前半部分。"),
            completed("后半部分。"),
        ]));
        let engine = engine_with(5, client.clone());

        let outcome = engine.run("写第一章").await.unwrap();

        assert_eq!(client.calls(), 2);
        assert_eq!(outcome.status, EngineStatus::Completed);
        assert_eq!(outcome.continuations, 1);
        assert_eq!(outcome.text, "前半部分。后半部分。");

        // 第二次调用时对话应为 [用户, assistant, 用户] 三轮
        let lens = client.conversation_lens.lock().unwrap().clone();
        assert_eq!(lens, vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_first_call_without_continuation() {
        let client = Arc::new(ScriptedClient::new(vec![completed("完整的一章。")]));
        let engine = engine_with(5, client.clone());

        let outcome = engine.run("写第一章").await.unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(outcome.status, EngineStatus::Completed);
        assert_eq!(outcome.continuations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_propagates() {
        let client = Arc::new(ScriptedClient::new(vec![Err(AppError::Api(
            ApiError::AuthFailed {
                endpoint: "chat/completions".to_string(),
            },
        ))]));
        let engine = engine_with(5, client.clone());

        let result = engine.run("写第一章").await;

        assert!(result.is_err());
        assert_eq!(client.calls(), 1);
    }
}

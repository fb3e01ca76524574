//! 重试策略 - 业务能力层
//!
//! 只负责"包装单次远程调用"能力，不关心调用内容。
//! 瞬时错误（网络故障、限流、5xx）按线性退避重试，
//! 致命错误（认证失败、请求格式错误）立即向上传播。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::AppResult;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// 从配置创建重试策略
    pub fn new(config: &Config) -> Self {
        Self::with_params(
            config.max_retries,
            Duration::from_secs(config.retry_base_delay_secs),
        )
    }

    /// 使用自定义参数创建
    pub fn with_params(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            // 至少尝试一次
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// 执行一个远程调用，瞬时失败时重试
    ///
    /// 第 n 次失败后等待 `base_delay * n` 再做下一次尝试；
    /// 总尝试次数不超过 `max_retries`，耗尽后把最后一次错误向上传播
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let wait = self.base_delay * attempt;
                    warn!(
                        "API 调用失败 ({}，第 {}/{} 次): {}，{} 秒后重试...",
                        label,
                        attempt,
                        self.max_retries,
                        e,
                        wait.as_secs()
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        error!("API 调用在 {} 次尝试后仍然失败 ({}): {}", attempt, label, e);
                    } else {
                        error!("API 调用发生致命错误 ({}): {}", label, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

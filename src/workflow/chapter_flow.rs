//! 章节处理流程 - 流程层
//!
//! 核心职责：定义"一个章节"的完整处理流程
//!
//! 流程顺序：
//! 1. 输出已存在 → 直接跳过（幂等续跑）
//! 2. 读取提示词 → 续写引擎生成完整响应
//! 3. 校验 → 通过则落盘，不通过则隔离

use std::fs;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::clients::CompletionApi;
use crate::config::Config;
use crate::models::ChapterJob;
use crate::services::{
    ContinuationEngine, EngineStatus, ResponseSink, ResponseValidator, Verdict,
};
use crate::utils::logging::truncate_text;
use crate::workflow::chapter_ctx::ChapterCtx;

/// 章节处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    /// 输出已存在，未做任何远程调用
    Skipped,
    /// 响应已落盘
    Stored {
        status: EngineStatus,
        continuations: u32,
    },
    /// 校验失败，已隔离
    Rejected { reason: String },
    /// 处理失败（输入错误、远程致命错误、写盘失败）
    Failed { error: String },
}

/// 章节处理流程
///
/// - 编排单个章节的完整处理
/// - 不持有任何跨章节状态
/// - 只依赖业务能力（services）
pub struct ChapterFlow {
    engine: ContinuationEngine,
    validator: ResponseValidator,
    sink: ResponseSink,
    verbose_logging: bool,
}

impl ChapterFlow {
    /// 创建新的章节处理流程
    pub fn new(config: &Config, client: Arc<dyn CompletionApi>) -> Self {
        Self {
            engine: ContinuationEngine::new(config, client),
            validator: ResponseValidator::new(),
            sink: ResponseSink::new(config),
            verbose_logging: config.verbose_logging,
        }
    }

    pub async fn run(&self, job: &ChapterJob, ctx: &ChapterCtx) -> Result<ChapterOutcome> {
        // ========== 幂等检查：输出已存在则跳过全部远程工作 ==========
        if self.sink.exists(job) {
            info!("{} ⏭️ 响应已存在，跳过: {}", ctx, job.response_name);
            return Ok(ChapterOutcome::Skipped);
        }

        info!("{} 📄 开始处理: {}", ctx, job.prompt_name);

        // 读取提示词
        let prompt = fs::read_to_string(&job.prompt_path)
            .with_context(|| format!("读取提示词失败: {}", job.prompt_path.display()))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            bail!("提示词文件为空: {}", job.prompt_path.display());
        }

        // 详细日志（如果启用）
        if self.verbose_logging {
            info!("{} 提示词预览: {}", ctx, truncate_text(prompt, 80));
        }

        // 续写引擎驱动到完整响应
        let outcome = self
            .engine
            .run(prompt)
            .await
            .with_context(|| format!("章节 {} 生成失败", job.number))?;

        if outcome.status == EngineStatus::LimitExceeded {
            warn!(
                "{} ⚠️ 续写次数耗尽，保留部分文本 ({} 字符) 交给校验",
                ctx,
                outcome.text.chars().count()
            );
        }

        // 校验并落盘
        match self.validator.validate(&outcome.text) {
            Verdict::Accepted => {
                let path = self.sink.store(job, &outcome.text)?;
                info!("{} ✅ 已保存: {}", ctx, path.display());
                Ok(ChapterOutcome::Stored {
                    status: outcome.status,
                    continuations: outcome.continuations,
                })
            }
            Verdict::Rejected(reason) => {
                error!("{} ❌ 响应校验失败: {}", ctx, reason);
                let quarantine_path =
                    self.sink.quarantine(job, &outcome.text, &reason.to_string())?;
                warn!("{} 📁 已隔离至: {}", ctx, quarantine_path.display());
                Ok(ChapterOutcome::Rejected {
                    reason: reason.to_string(),
                })
            }
        }
    }
}

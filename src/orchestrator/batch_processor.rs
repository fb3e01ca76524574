//! 批量章节处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量章节的处理和并发控制。
//!
//! ## 核心功能
//!
//! 1. **任务枚举**：把章节号列表解析为任务列表，未匹配的记录警告
//! 2. **并发控制**：使用 Semaphore 限制同时在途的远程请求数
//! 3. **失败隔离**：单个章节的任何失败只记录，绝不中断整批
//! 4. **结果聚合**：每个任务完成时发出一个结果事件，
//!    聚合任务独占 `BatchReport`，没有共享计数器
//! 5. **全局统计**：总数/成功/失败/截断情况和耗时
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个章节的细节，向下委托 `ChapterFlow`
//! - **幂等续跑**：输出已存在的章节直接计入成功，不做远程调用

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use futures::future::join_all;
use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};

use crate::clients::{CompletionApi, DeepSeekClient};
use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::models::{resolve_chapter_jobs, ChapterJob};
use crate::orchestrator::repair_processor::{RepairProcessor, RepairReport};
use crate::services::EngineStatus;
use crate::workflow::{ChapterCtx, ChapterFlow, ChapterOutcome};

/// 单个任务的结果事件
#[derive(Debug)]
struct JobEvent {
    chapter: u32,
    outcome: ChapterOutcome,
}

/// 整批处理的汇总报告
#[derive(Debug, Default)]
pub struct BatchReport {
    /// 枚举到的任务总数
    pub total: usize,
    /// 成功数（含跳过）
    pub succeeded: usize,
    /// 其中因输出已存在而跳过的数量
    pub skipped: usize,
    /// 失败数（含校验拒绝）
    pub failed: usize,
    /// 发生过截断但最终自然完成并被接受的数量
    pub truncated_accepted: usize,
    /// 续写次数耗尽仍被接受的数量（降级成功，单独统计）
    pub limit_exceeded: usize,
    /// 校验拒绝列表：(章节号, 拒绝原因)
    pub rejections: Vec<(u32, String)>,
    /// 处理失败列表：(章节号, 错误描述)
    pub errors: Vec<(u32, String)>,
    /// 整批耗时
    pub elapsed: Duration,
}

impl BatchReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    fn record(&mut self, event: JobEvent) {
        match event.outcome {
            ChapterOutcome::Skipped => {
                self.succeeded += 1;
                self.skipped += 1;
            }
            ChapterOutcome::Stored {
                status,
                continuations,
            } => {
                self.succeeded += 1;
                match status {
                    EngineStatus::Completed if continuations > 0 => {
                        self.truncated_accepted += 1;
                    }
                    EngineStatus::LimitExceeded => {
                        self.limit_exceeded += 1;
                    }
                    EngineStatus::Completed => {}
                }
            }
            ChapterOutcome::Rejected { reason } => {
                self.failed += 1;
                self.rejections.push((event.chapter, reason));
            }
            ChapterOutcome::Failed { error } => {
                self.failed += 1;
                self.errors.push((event.chapter, error));
            }
        }
    }

    /// 平均单章耗时（秒）
    pub fn avg_secs_per_job(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.total.max(1) as f64
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    client: Arc<dyn CompletionApi>,
    flow: Arc<ChapterFlow>,
}

impl App {
    /// 初始化应用
    ///
    /// 校验 API 密钥并创建 DeepSeek 客户端
    pub fn initialize(config: Config) -> AppResult<Self> {
        if config.api_key.is_empty() {
            return Err(ConfigError::EnvVarNotFound {
                var_name: "DEEPSEEK_API_KEY".to_string(),
            }
            .into());
        }

        let client: Arc<dyn CompletionApi> = Arc::new(DeepSeekClient::new(&config)?);
        Ok(Self::with_client(config, client))
    }

    /// 使用指定客户端创建应用
    pub fn with_client(config: Config, client: Arc<dyn CompletionApi>) -> Self {
        let flow = Arc::new(ChapterFlow::new(&config, client.clone()));
        Self {
            config,
            client,
            flow,
        }
    }

    /// 批量处理指定章节
    pub async fn process_chapters(&self, chapters: &[u32]) -> Result<BatchReport> {
        log_startup(&self.config);

        let jobs = resolve_chapter_jobs(&self.config.prompts_dir, chapters);
        if jobs.is_empty() {
            warn!("⚠️ 没有找到匹配的提示词文件，程序结束");
            return Ok(BatchReport::new(0));
        }

        let total = jobs.len();
        log_jobs_loaded(total, self.config.max_concurrent_requests);

        let start = Instant::now();
        let mut report = self.run_pipelines(jobs, total).await?;
        report.elapsed = start.elapsed();

        print_final_stats(&report, &self.config);
        Ok(report)
    }

    /// 并发运行全部章节管线并聚合结果
    async fn run_pipelines(&self, jobs: Vec<ChapterJob>, total: usize) -> Result<BatchReport> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests));
        let (tx, mut rx) = mpsc::unbounded_channel::<JobEvent>();

        let mut handles = Vec::with_capacity(total);
        for (index, job) in jobs.into_iter().enumerate() {
            let flow = self.flow.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let ctx = ChapterCtx::new(job.number, index + 1, total);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Semaphore 在整批期间不会被关闭；防御性处理
                        let _ = tx.send(JobEvent {
                            chapter: ctx.chapter,
                            outcome: ChapterOutcome::Failed {
                                error: "并发闸门已关闭".to_string(),
                            },
                        });
                        return;
                    }
                };

                let outcome = match flow.run(&job, &ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("{} ❌ 处理过程中发生错误: {:#}", ctx, e);
                        ChapterOutcome::Failed {
                            error: format!("{:#}", e),
                        }
                    }
                };

                let _ = tx.send(JobEvent {
                    chapter: ctx.chapter,
                    outcome,
                });
            }));
        }
        drop(tx);

        // 聚合任务独占 BatchReport，事件流驱动，无共享计数器
        let aggregator = tokio::spawn(async move {
            let mut report = BatchReport::new(total);
            let mut completed = 0usize;
            while let Some(event) = rx.recv().await {
                completed += 1;
                info!("📊 进度: {}/{} (章节 {})", completed, total, event.chapter);
                report.record(event);
            }
            report
        });

        let join_results = join_all(handles).await;
        let panicked = join_results.iter().filter(|r| r.is_err()).count();
        if panicked > 0 {
            error!("❌ {} 个章节任务异常终止", panicked);
        }

        let mut report = aggregator
            .await
            .map_err(|e| anyhow!("聚合任务失败: {}", e))?;
        report.failed += panicked;

        Ok(report)
    }

    /// 修复疑似被截断的既有响应
    pub async fn repair_chapters(&self, chapters: Option<&[u32]>) -> Result<RepairReport> {
        let processor = RepairProcessor::new(&self.config, self.client.clone());
        processor.run(chapters).await
    }
}

// ========== 日志辅助函数 ==========

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发章节生成模式");
    info!("📊 最大并发数: {}", config.max_concurrent_requests);
    info!("🔁 最大重试次数: {} | 最大续写次数: {}", config.max_retries, config.max_continuations);
    info!("{}", "=".repeat(60));
}

fn log_jobs_loaded(total: usize, max_concurrent: usize) {
    info!("📂 找到 {} 个待处理的章节", total);
    info!("🔧 最大并发请求数: {}", max_concurrent);
    info!("🚀 开始并发处理...");
    info!("{}", "-".repeat(50));
}

fn print_final_stats(report: &BatchReport, config: &Config) {
    info!("{}", "-".repeat(50));
    info!("\n📊 处理结果汇总:");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 成功: {}/{} (其中跳过 {})", report.succeeded, report.total, report.skipped);
    info!("❌ 失败: {}", report.failed);
    info!("⚠️ 截断后续写完成: {}", report.truncated_accepted);
    info!("⚠️ 续写次数耗尽仍接受: {}", report.limit_exceeded);
    info!("⏱ 总耗时: {:.2} 秒", report.elapsed.as_secs_f64());
    info!("⚡ 平均单章耗时: {:.2} 秒", report.avg_secs_per_job());

    if !report.rejections.is_empty() {
        info!("\n❌ 校验失败列表:");
        for (chapter, reason) in &report.rejections {
            info!("  - 章节 {}: {}", chapter, reason);
        }
        info!("💡 被拒绝的响应保存在 '{}' 目录中", config.failed_dir);
    }

    if !report.errors.is_empty() {
        info!("\n❌ 处理失败列表:");
        for (chapter, error) in &report.errors {
            info!("  - 章节 {}: {}", chapter, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(chapter: u32, outcome: ChapterOutcome) -> JobEvent {
        JobEvent { chapter, outcome }
    }

    #[test]
    fn test_report_tallies_outcomes() {
        let mut report = BatchReport::new(5);

        report.record(event(1, ChapterOutcome::Skipped));
        report.record(event(
            2,
            ChapterOutcome::Stored {
                status: EngineStatus::Completed,
                continuations: 0,
            },
        ));
        report.record(event(
            3,
            ChapterOutcome::Stored {
                status: EngineStatus::Completed,
                continuations: 2,
            },
        ));
        report.record(event(
            4,
            ChapterOutcome::Stored {
                status: EngineStatus::LimitExceeded,
                continuations: 5,
            },
        ));
        report.record(event(
            5,
            ChapterOutcome::Rejected {
                reason: "响应过短 (10 字符)".to_string(),
            },
        ));

        assert_eq!(report.succeeded, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.truncated_accepted, 1);
        assert_eq!(report.limit_exceeded, 1);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].0, 5);
    }

    #[test]
    fn test_report_records_failures_with_context() {
        let mut report = BatchReport::new(1);
        report.record(event(
            9,
            ChapterOutcome::Failed {
                error: "读取提示词失败".to_string(),
            },
        ));

        assert_eq!(report.failed, 1);
        assert_eq!(report.errors, vec![(9, "读取提示词失败".to_string())]);
    }
}

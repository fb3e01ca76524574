//! 续写修复处理器 - 编排层
//!
//! ## 职责
//!
//! 扫描既有的响应文件，找出疑似被截断的，用 Chat Prefix Completion
//! 把它们补写完整。
//!
//! ## 核心功能
//!
//! 1. **启发式扫描**：既有文件没有 finish_reason 可查，
//!    只能用尽力而为的形态判定（`services::truncation`）
//! 2. **先备份再覆盖**：原内容复制到备份目录后才允许改写
//! 3. **前缀续写**：把已有文本作为 assistant 前缀发给 beta 端点，
//!    返回的内容直接追加，不做合并去重
//! 4. **只在有增量时落盘**：没有新内容就保持原文件不动
//!
//! 修复是顺序执行的，文件之间留有礼貌延迟，避免给服务端压力

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use regex::Regex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::clients::CompletionApi;
use crate::config::Config;
use crate::models::chapter::{chapter_number_of, prompt_name_for};
use crate::services::{is_likely_truncated, ResponseSink, RetryPolicy};

/// 续写内容短于该字符数时认为响应其实已经完整
const MIN_CONTINUATION_CHARS: usize = 10;
/// 顺序处理的文件之间的延迟
const INTER_FILE_DELAY: Duration = Duration::from_secs(1);

/// 修复流程的汇总报告
#[derive(Debug, Default)]
pub struct RepairReport {
    /// 扫描的响应文件总数
    pub scanned: usize,
    /// 疑似截断的文件数
    pub truncated_found: usize,
    /// 成功补写的文件数
    pub fixed: usize,
    /// 修复失败的文件数
    pub failed: usize,
    /// 整个修复流程耗时
    pub elapsed: Duration,
}

/// 续写修复处理器
pub struct RepairProcessor {
    client: Arc<dyn CompletionApi>,
    retry: RetryPolicy,
    sink: ResponseSink,
    prompts_dir: PathBuf,
    responses_dir: PathBuf,
    max_continuations: u32,
    continuation_delay: Duration,
}

impl RepairProcessor {
    /// 创建新的修复处理器
    pub fn new(config: &Config, client: Arc<dyn CompletionApi>) -> Self {
        Self {
            client,
            retry: RetryPolicy::new(config),
            sink: ResponseSink::new(config),
            prompts_dir: PathBuf::from(&config.prompts_dir),
            responses_dir: PathBuf::from(&config.responses_dir),
            max_continuations: config.max_continuations,
            continuation_delay: Duration::from_millis(config.continuation_delay_ms),
        }
    }

    /// 运行修复流程
    ///
    /// `chapters` 为 None 时处理全部疑似截断的文件
    pub async fn run(&self, chapters: Option<&[u32]>) -> Result<RepairReport> {
        let mut report = RepairReport::default();
        let start = Instant::now();

        let truncated_files = self.scan_truncated_files(chapters, &mut report)?;

        if truncated_files.is_empty() {
            info!("✅ 没有发现疑似截断的响应文件");
            report.elapsed = start.elapsed();
            return Ok(report);
        }

        log_repair_start(&truncated_files);

        for (index, path) in truncated_files.iter().enumerate() {
            match self.fix_single_file(path).await {
                Ok(true) => report.fixed += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    warn!("✗ 修复 {} 失败: {:#}", path.display(), e);
                    report.failed += 1;
                }
            }

            // 文件之间的礼貌延迟
            if index + 1 < truncated_files.len() {
                sleep(INTER_FILE_DELAY).await;
            }
        }

        report.elapsed = start.elapsed();
        log_repair_complete(&report);
        Ok(report)
    }

    /// 扫描疑似截断的响应文件
    fn scan_truncated_files(
        &self,
        chapters: Option<&[u32]>,
        report: &mut RepairReport,
    ) -> Result<Vec<PathBuf>> {
        info!("🔍 正在扫描疑似截断的响应...");

        if !self.responses_dir.exists() {
            warn!("⚠️ 响应目录不存在: {}", self.responses_dir.display());
            return Ok(Vec::new());
        }

        let name_pattern =
            Regex::new(r"^response_chapter_\d+\.md$").context("编译文件名模式失败")?;

        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.responses_dir)
            .with_context(|| format!("读取响应目录失败: {}", self.responses_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|n| name_pattern.is_match(&n.to_string_lossy()))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        let mut truncated = Vec::new();
        for path in candidates {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if let Some(filter) = chapters {
                match chapter_number_of(&file_name) {
                    Some(chapter) if filter.contains(&chapter) => {}
                    _ => continue,
                }
            }
            report.scanned += 1;

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("⚠️ 读取 {} 失败: {}", path.display(), e);
                    continue;
                }
            };

            if is_likely_truncated(&content) {
                info!("  📄 疑似截断: {}", file_name);
                truncated.push(path);
            }
        }

        report.truncated_found = truncated.len();
        Ok(truncated)
    }

    /// 修复单个截断的响应文件
    ///
    /// 返回是否实际补写了内容
    pub async fn fix_single_file(&self, response_path: &Path) -> Result<bool> {
        let file_name = response_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("🔧 修复: {}", file_name);

        let truncated = fs::read_to_string(response_path)
            .with_context(|| format!("读取响应文件失败: {}", response_path.display()))?;

        // 反向替换文件名找回原始提示词
        let prompt_path = self.prompts_dir.join(prompt_name_for(&file_name));
        let prompt = match fs::read_to_string(&prompt_path) {
            Ok(prompt) => prompt,
            Err(_) => {
                warn!("  ✗ 找不到原始提示词: {}", prompt_path.display());
                return Ok(false);
            }
        };

        // 改写之前先备份
        let backup_path = self.sink.backup(response_path)?;
        info!("  💾 已备份至: {}", backup_path.display());

        let complete = self.continue_response(prompt.trim(), &truncated).await;

        if complete.len() <= truncated.len() {
            warn!("  ⚠️ 没有生成新的内容");
            return Ok(false);
        }

        let added = complete.len() - truncated.len();
        self.sink.store_at(response_path, &complete)?;
        info!("  ✓ 修复完成，新增 {} 字节", added);
        Ok(true)
    }

    /// 用 Chat Prefix Completion 把截断的响应续写完整
    ///
    /// 续写失败时返回已有内容（保留原文，不算丢失）
    async fn continue_response(&self, prompt: &str, truncated: &str) -> String {
        let mut full = truncated.to_string();
        let mut count = 0;

        info!("  🔄 尝试续写截断的响应...");

        while count < self.max_continuations {
            let reply = match self
                .retry
                .run("beta/chat/completions", || {
                    self.client.complete_with_prefix(prompt, &full)
                })
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("  ✗ 续写调用失败: {}", e);
                    break;
                }
            };

            if reply.content.trim().chars().count() < MIN_CONTINUATION_CHARS {
                info!("  ✓ 响应似乎已完整（续写内容过短）");
                break;
            }

            full.push_str(&reply.content);
            count += 1;
            info!("  📄 已追加第 {} 段续写 ({} 字符)", count, reply.content.chars().count());

            if !reply.is_truncated() {
                info!("  ✓ 响应在 {} 段续写后完成", count);
                break;
            }

            sleep(self.continuation_delay).await;
        }

        if count >= self.max_continuations {
            warn!("  ⚠️ 达到最大续写次数 ({})，响应可能仍不完整", self.max_continuations);
        }

        full
    }
}

// ========== 日志辅助函数 ==========

fn log_repair_start(files: &[PathBuf]) {
    info!("🎯 找到 {} 个疑似截断的文件", files.len());
    for path in files {
        info!("  📄 {}", path.display());
    }
    info!("{}", "-".repeat(50));
}

fn log_repair_complete(report: &RepairReport) {
    info!("{}", "-".repeat(50));
    info!("🏁 修复流程完成!");
    info!("✓ 成功修复: {}", report.fixed);
    info!("✗ 修复失败: {}", report.failed);
    info!("⏱ 总耗时: {:.2} 秒", report.elapsed.as_secs_f64());
}

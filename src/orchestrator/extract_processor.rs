//! 正文提取处理器 - 编排层
//!
//! 从响应文件中提取 ```markdown 围栏块之间的正文，
//! 按重新编号规则保存到暂存目录。
//!
//! 命名规则：`response_chapter_03.md` → `004_chapter_03.md`
//! （前缀序号 = 章节号 + 1，补零到三位）

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::chapter::chapter_number_of;

/// 提取流程的汇总报告
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// 成功提取的文件数
    pub extracted: usize,
    /// 没有找到 markdown 围栏块的文件数
    pub no_block: usize,
    /// 读取或写入失败的文件数
    pub failed: usize,
}

/// 正文提取处理器
pub struct MarkdownExtractor {
    responses_dir: PathBuf,
    staging_dir: PathBuf,
}

impl MarkdownExtractor {
    /// 创建新的提取处理器
    pub fn new(config: &Config) -> Self {
        Self {
            responses_dir: PathBuf::from(&config.responses_dir),
            staging_dir: PathBuf::from(&config.staging_dir),
        }
    }

    /// 处理全部响应文件
    pub fn process_all(&self) -> Result<ExtractReport> {
        let mut report = ExtractReport::default();

        fs::create_dir_all(&self.staging_dir)
            .with_context(|| format!("创建暂存目录失败: {}", self.staging_dir.display()))?;

        let response_files = self.response_files()?;
        if response_files.is_empty() {
            warn!("⚠️ {} 中没有响应文件", self.responses_dir.display());
            return Ok(report);
        }

        info!("📂 找到 {} 个响应文件待提取", response_files.len());
        info!("📁 提取的正文将保存到: {}", self.staging_dir.display());
        info!("{}", "-".repeat(60));

        for path in &response_files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("处理: {}", file_name);

            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("✗ 读取 {} 失败: {}", file_name, e);
                    report.failed += 1;
                    continue;
                }
            };

            let chapter = match chapter_number_of(&file_name) {
                Some(chapter) => chapter,
                None => {
                    warn!("✗ 无法从 {} 中提取章节号", file_name);
                    report.failed += 1;
                    continue;
                }
            };

            let body = match extract_markdown_block(&content) {
                Some(body) => body,
                None => {
                    warn!("⚠ {} 中没有 markdown 围栏块", file_name);
                    report.no_block += 1;
                    continue;
                }
            };

            let output_name = staging_file_name(chapter);
            let output_path = self.staging_dir.join(&output_name);
            info!("  -> {}", output_name);

            match fs::write(&output_path, body) {
                Ok(()) => report.extracted += 1,
                Err(e) => {
                    warn!("✗ 写入 {} 失败: {}", output_path.display(), e);
                    report.failed += 1;
                }
            }
        }

        log_extract_complete(&report);
        Ok(report)
    }

    /// 按文件名排序的响应文件列表
    fn response_files(&self) -> Result<Vec<PathBuf>> {
        if !self.responses_dir.exists() {
            return Ok(Vec::new());
        }

        let name_pattern =
            Regex::new(r"^response_chapter_\d+\.md$").context("编译文件名模式失败")?;

        let mut files: Vec<PathBuf> = fs::read_dir(&self.responses_dir)
            .with_context(|| format!("读取响应目录失败: {}", self.responses_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|n| name_pattern.is_match(&n.to_string_lossy()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

/// 提取 ```markdown 和 ``` 之间的正文
///
/// 围栏块前后允许出现其他文字（模型常在正文前加一句说明）；
/// 没有围栏块时返回 None
pub fn extract_markdown_block(text: &str) -> Option<String> {
    let pattern = Regex::new(r"(?s)```markdown\s*\n(.*?)\n```").ok()?;
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// 生成暂存文件名：序号 = 章节号 + 1 补零到三位
pub fn staging_file_name(chapter: u32) -> String {
    format!("{:03}_chapter_{:02}.md", chapter + 1, chapter)
}

// ========== 日志辅助函数 ==========

fn log_extract_complete(report: &ExtractReport) {
    info!("{}", "-".repeat(60));
    info!("提取完成!");
    info!("✓ 成功提取: {}", report.extracted);
    info!("⚠ 没有围栏块: {}", report.no_block);
    info!("✗ 失败: {}", report.failed);

    if report.no_block > 0 {
        info!("注意: {} 个文件不含 ```markdown 块，建议手动检查", report.no_block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_block_with_surrounding_text() {
        let text = "好的，以下是第三章的润色稿：\n\n```markdown\n# 第三章\n\n正文内容。\n```\n\n希望你满意！";
        assert_eq!(
            extract_markdown_block(text).unwrap(),
            "# 第三章\n\n正文内容。"
        );
    }

    #[test]
    fn test_extract_block_spans_multiple_lines() {
        let text = "```markdown\n第一段。\n\n第二段。\n```";
        assert_eq!(
            extract_markdown_block(text).unwrap(),
            "第一段。\n\n第二段。"
        );
    }

    #[test]
    fn test_extract_returns_none_without_block() {
        assert_eq!(extract_markdown_block("没有任何围栏块的文本"), None);
        // 普通代码块不算 markdown 围栏块
        assert_eq!(extract_markdown_block("```\n普通代码\n```"), None);
    }

    #[test]
    fn test_staging_file_name_renumbering() {
        assert_eq!(staging_file_name(3), "004_chapter_03.md");
        assert_eq!(staging_file_name(21), "022_chapter_21.md");
        assert_eq!(staging_file_name(99), "100_chapter_99.md");
    }

    #[test]
    fn test_process_all_writes_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            responses_dir: dir.path().join("responses").display().to_string(),
            staging_dir: dir.path().join("staging").display().to_string(),
            ..Config::default()
        };
        std::fs::create_dir_all(&config.responses_dir).unwrap();

        std::fs::write(
            std::path::Path::new(&config.responses_dir).join("response_chapter_02.md"),
            "```markdown\n# 第二章\n正文。\n```",
        )
        .unwrap();
        std::fs::write(
            std::path::Path::new(&config.responses_dir).join("response_chapter_05.md"),
            "这个响应没有围栏块。",
        )
        .unwrap();

        let extractor = MarkdownExtractor::new(&config);
        let report = extractor.process_all().unwrap();

        assert_eq!(
            report,
            ExtractReport {
                extracted: 1,
                no_block: 1,
                failed: 0
            }
        );

        let staged = std::fs::read_to_string(
            std::path::Path::new(&config.staging_dir).join("003_chapter_02.md"),
        )
        .unwrap();
        assert_eq!(staged, "# 第二章\n正文。");
    }
}

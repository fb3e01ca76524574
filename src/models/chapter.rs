//! 章节任务模型与文件命名约定
//!
//! 命名约定（与提取/修复脚本共享）：
//! - 提示词文件：`prompt_chapter_{NN}.md`（章节号补零到两位）
//! - 响应文件：把前缀 `prompt_` 替换为 `response_`，章节号不变
//! - 修复流程反向替换 `response_` → `prompt_` 找回原始提示词

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::warn;

/// 提示词文件前缀
pub const PROMPT_PREFIX: &str = "prompt_";
/// 响应文件前缀
pub const RESPONSE_PREFIX: &str = "response_";

/// 一个章节任务
///
/// 批量枚举时创建，之后只读；每个任务恰好对应一个输出文件
#[derive(Debug, Clone)]
pub struct ChapterJob {
    /// 章节号（任务的稳定标识）
    pub number: u32,
    /// 提示词文件完整路径
    pub prompt_path: PathBuf,
    /// 提示词文件名，如 `prompt_chapter_03.md`
    pub prompt_name: String,
    /// 响应文件名，如 `response_chapter_03.md`
    pub response_name: String,
}

impl ChapterJob {
    pub fn new(number: u32, prompt_path: PathBuf) -> Self {
        let prompt_name = prompt_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let response_name = response_name_for(&prompt_name);
        Self {
            number,
            prompt_path,
            prompt_name,
            response_name,
        }
    }
}

/// 生成指定章节号的提示词文件名
pub fn prompt_file_name(chapter: u32) -> String {
    format!("prompt_chapter_{:02}.md", chapter)
}

/// 提示词文件名 → 响应文件名
pub fn response_name_for(prompt_name: &str) -> String {
    prompt_name.replacen(PROMPT_PREFIX, RESPONSE_PREFIX, 1)
}

/// 响应文件名 → 提示词文件名（修复流程用的反向替换）
pub fn prompt_name_for(response_name: &str) -> String {
    response_name.replacen(RESPONSE_PREFIX, PROMPT_PREFIX, 1)
}

/// 从文件名中提取章节号，如 `response_chapter_03.md` → 3
pub fn chapter_number_of(file_name: &str) -> Option<u32> {
    let re = regex::Regex::new(r"chapter_(\d+)").ok()?;
    re.captures(file_name)?.get(1)?.as_str().parse().ok()
}

/// 解析章节列表参数
///
/// 支持逗号分隔和区间两种写法，可以混用：
/// - `"2,4,8"` → [2, 4, 8]
/// - `"13-29"` → [13, 14, ..., 29]
/// - `"2,4,13-15"` → [2, 4, 13, 14, 15]
pub fn parse_chapter_list(input: &str) -> Result<Vec<u32>> {
    let mut chapters = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .with_context(|| format!("无法解析章节区间起点: '{}'", part))?;
            let end: u32 = end
                .trim()
                .parse()
                .with_context(|| format!("无法解析章节区间终点: '{}'", part))?;
            if start > end {
                bail!("章节区间起点大于终点: '{}'", part);
            }
            chapters.extend(start..=end);
        } else {
            let number: u32 = part
                .parse()
                .with_context(|| format!("无法解析章节号: '{}'", part))?;
            chapters.push(number);
        }
    }

    if chapters.is_empty() {
        bail!("章节列表为空: '{}'", input);
    }

    Ok(chapters)
}

/// 把章节号列表解析为任务列表
///
/// 每个章节号对应零或一个提示词文件；未匹配到的章节号记录警告后跳过
pub fn resolve_chapter_jobs(prompts_dir: impl AsRef<Path>, chapters: &[u32]) -> Vec<ChapterJob> {
    let prompts_dir = prompts_dir.as_ref();
    let mut jobs = Vec::new();

    for &chapter in chapters {
        let prompt_path = prompts_dir.join(prompt_file_name(chapter));
        if prompt_path.exists() {
            jobs.push(ChapterJob::new(chapter, prompt_path));
        } else {
            warn!(
                "⚠️ 章节 {} 没有对应的提示词文件: {}",
                chapter,
                prompt_path.display()
            );
        }
    }

    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_name_substitution_round_trip() {
        assert_eq!(
            response_name_for("prompt_chapter_03.md"),
            "response_chapter_03.md"
        );
        assert_eq!(
            prompt_name_for("response_chapter_03.md"),
            "prompt_chapter_03.md"
        );
        // 章节号必须原样保留
        assert_eq!(
            response_name_for("prompt_chapter_21.md"),
            "response_chapter_21.md"
        );
    }

    #[test]
    fn test_prompt_file_name_zero_padding() {
        assert_eq!(prompt_file_name(3), "prompt_chapter_03.md");
        assert_eq!(prompt_file_name(21), "prompt_chapter_21.md");
    }

    #[test]
    fn test_chapter_number_extraction() {
        assert_eq!(chapter_number_of("response_chapter_03.md"), Some(3));
        assert_eq!(chapter_number_of("prompt_chapter_17.md"), Some(17));
        assert_eq!(chapter_number_of("notes.md"), None);
    }

    #[test]
    fn test_parse_chapter_list_plain() {
        assert_eq!(parse_chapter_list("2,4,8").unwrap(), vec![2, 4, 8]);
    }

    #[test]
    fn test_parse_chapter_list_range() {
        assert_eq!(parse_chapter_list("13-16").unwrap(), vec![13, 14, 15, 16]);
    }

    #[test]
    fn test_parse_chapter_list_mixed() {
        assert_eq!(
            parse_chapter_list("2, 4, 13-15").unwrap(),
            vec![2, 4, 13, 14, 15]
        );
    }

    #[test]
    fn test_parse_chapter_list_invalid() {
        assert!(parse_chapter_list("abc").is_err());
        assert!(parse_chapter_list("9-3").is_err());
        assert!(parse_chapter_list("").is_err());
    }

    #[test]
    fn test_resolve_skips_unmatched_chapters() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prompt_chapter_02.md"), "写第二章").unwrap();
        fs::write(dir.path().join("prompt_chapter_04.md"), "写第四章").unwrap();

        let jobs = resolve_chapter_jobs(dir.path(), &[2, 3, 4]);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].number, 2);
        assert_eq!(jobs[0].response_name, "response_chapter_02.md");
        assert_eq!(jobs[1].number, 4);
    }
}

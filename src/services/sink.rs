//! 响应落盘服务 - 业务能力层
//!
//! 只负责"把结果写到磁盘"能力，不关心流程。
//!
//! ## 约定
//!
//! - 输出文件的存在与否是唯一的幂等标记，没有单独的"已完成"台账
//! - 正式写入走"临时文件 + 重命名"，崩溃不会留下残缺文件冒充完整结果
//! - 被拒绝的响应连同拒绝原因隔离保存，绝不静默覆盖已有的隔离条目
//! - 修复流程覆盖旧文件前先把原内容备份

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::ChapterJob;

/// 响应落盘服务
pub struct ResponseSink {
    responses_dir: PathBuf,
    failed_dir: PathBuf,
    backup_dir: PathBuf,
}

impl ResponseSink {
    /// 创建新的落盘服务
    pub fn new(config: &Config) -> Self {
        Self {
            responses_dir: PathBuf::from(&config.responses_dir),
            failed_dir: PathBuf::from(&config.failed_dir),
            backup_dir: PathBuf::from(&config.backup_dir),
        }
    }

    /// 任务对应的输出文件路径
    pub fn response_path(&self, job: &ChapterJob) -> PathBuf {
        self.responses_dir.join(&job.response_name)
    }

    /// 输出文件是否已存在（幂等跳过的依据）
    pub fn exists(&self, job: &ChapterJob) -> bool {
        self.response_path(job).exists()
    }

    /// 写入一个任务的最终响应
    pub fn store(&self, job: &ChapterJob, text: &str) -> AppResult<PathBuf> {
        let path = self.response_path(job);
        self.store_at(&path, text)?;
        Ok(path)
    }

    /// 原子写入：先写临时文件再重命名到目标路径
    pub fn store_at(&self, path: &Path, text: &str) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::file_write_failed(parent.display().to_string(), e))?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

        fs::write(&tmp_path, text)
            .map_err(|e| AppError::file_write_failed(tmp_path.display().to_string(), e))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        debug!("已写入: {} ({} 字节)", path.display(), text.len());
        Ok(())
    }

    /// 隔离一个被拒绝的响应
    ///
    /// 文件首行记录拒绝原因；如果同名隔离条目已存在，
    /// 追加递增序号而不是覆盖
    pub fn quarantine(&self, job: &ChapterJob, text: &str, reason: &str) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.failed_dir)
            .map_err(|e| AppError::file_write_failed(self.failed_dir.display().to_string(), e))?;

        let base = format!("failed_{}", job.response_name);
        let mut path = self.failed_dir.join(&base);
        let mut sequence = 1;
        while path.exists() {
            sequence += 1;
            path = self.failed_dir.join(versioned_name(&base, sequence));
        }
        if sequence > 1 {
            warn!(
                "⚠️ 章节 {} 已有隔离条目，本次保存为: {}",
                job.number,
                path.display()
            );
        }

        let body = format!("REASON: {}\n\n{}", reason, text);
        fs::write(&path, body)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        Ok(path)
    }

    /// 覆盖前备份：把现有文件复制到备份目录
    pub fn backup(&self, artifact_path: &Path) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| AppError::file_write_failed(self.backup_dir.display().to_string(), e))?;

        let file_name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let backup_path = self.backup_dir.join(format!("{}.backup", file_name));

        fs::copy(artifact_path, &backup_path)
            .map_err(|e| AppError::file_write_failed(backup_path.display().to_string(), e))?;

        debug!("已备份: {}", backup_path.display());
        Ok(backup_path)
    }
}

/// 在扩展名前插入序号，如 `failed_response_chapter_03.md` → `failed_response_chapter_03_2.md`
fn versioned_name(base: &str, sequence: u32) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, sequence, ext),
        None => format!("{}_{}", base, sequence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_in(dir: &Path) -> ResponseSink {
        ResponseSink {
            responses_dir: dir.join("responses_from_deepseek"),
            failed_dir: dir.join("failed_responses"),
            backup_dir: dir.join("responses_from_deepseek/backups"),
        }
    }

    fn job(number: u32, dir: &Path) -> ChapterJob {
        ChapterJob::new(
            number,
            dir.join(format!("prompt_chapter_{:02}.md", number)),
        )
    }

    #[test]
    fn test_store_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let job = job(3, dir.path());

        assert!(!sink.exists(&job));
        let path = sink.store(&job, "第三章正文").unwrap();
        assert!(sink.exists(&job));
        assert_eq!(fs::read_to_string(&path).unwrap(), "第三章正文");
        assert!(path.ends_with("responses_from_deepseek/response_chapter_03.md"));
    }

    #[test]
    fn test_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        sink.store(&job(1, dir.path()), "正文").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("responses_from_deepseek"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_quarantine_records_reason_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let job = job(5, dir.path());

        let first = sink.quarantine(&job, "第一次的坏响应", "响应过短 (12 字符)").unwrap();
        let second = sink.quarantine(&job, "第二次的坏响应", "响应为空").unwrap();

        assert_ne!(first, second);
        let first_body = fs::read_to_string(&first).unwrap();
        assert!(first_body.starts_with("REASON: 响应过短 (12 字符)\n\n"));
        assert!(first_body.ends_with("第一次的坏响应"));
        // 第一个条目原样保留
        assert!(first.exists());
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("failed_response_chapter_05_2"));
    }

    #[test]
    fn test_backup_copies_prior_content() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink_in(dir.path());
        let job = job(7, dir.path());

        let path = sink.store(&job, "修复前的内容").unwrap();
        let backup = sink.backup(&path).unwrap();

        assert_eq!(fs::read_to_string(&backup).unwrap(), "修复前的内容");
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("response_chapter_07.md.backup"));

        // 备份后覆盖原文件，备份不受影响
        sink.store_at(&path, "修复后的内容").unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "修复前的内容");
    }
}

//! 章节处理上下文
//!
//! 封装"我正在处理第几章、是本批的第几个任务"这一信息

use std::fmt::Display;

/// 章节处理上下文
#[derive(Debug, Clone)]
pub struct ChapterCtx {
    /// 章节号
    pub chapter: u32,

    /// 本批中的任务序号（仅用于日志显示，从1开始）
    pub job_index: usize,

    /// 本批任务总数
    pub total_jobs: usize,
}

impl ChapterCtx {
    /// 创建新的章节上下文
    pub fn new(chapter: u32, job_index: usize, total_jobs: usize) -> Self {
        Self {
            chapter,
            job_index,
            total_jobs,
        }
    }
}

impl Display for ChapterCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[章节 {} ({}/{})]",
            self.chapter, self.job_index, self.total_jobs
        )
    }
}

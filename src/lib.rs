//! # DeepSeek Batch Processor
//!
//! 一个用于批量生成长篇章节的 Rust 应用程序：
//! 把每个章节的提示词文件发给 DeepSeek，自动续写被截断的响应，
//! 校验后幂等落盘，支持中断后续跑。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 封装 DeepSeek API 的线上协议
//! - `CompletionApi` - 远程边界的唯一接口，测试时注入模拟客户端
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个章节
//! - `RetryPolicy` - 瞬时错误的线性退避重试能力
//! - `ContinuationEngine` - 截断续写能力
//! - `ResponseValidator` - 响应校验能力
//! - `ResponseSink` - 幂等落盘 / 隔离 / 备份能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个章节"的完整处理流程
//! - `ChapterCtx` - 上下文封装（章节号 + 任务序号）
//! - `ChapterFlow` - 流程编排（跳过检查 → 生成 → 校验 → 落盘）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量章节处理器，管理并发和统计
//! - `orchestrator/repair_processor` - 截断修复处理器（前缀续写）
//! - `orchestrator/extract_processor` - 正文提取处理器
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{CompletionApi, CompletionReply, DeepSeekClient, StopReason};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{parse_chapter_list, ChapterJob, Conversation};
pub use orchestrator::{App, BatchReport};
pub use workflow::{ChapterCtx, ChapterFlow, ChapterOutcome};

use anyhow::Result;
use clap::{Parser, Subcommand};

use deepseek_batch_processor::orchestrator::MarkdownExtractor;
use deepseek_batch_processor::utils::logging;
use deepseek_batch_processor::{parse_chapter_list, App, Config};

#[derive(Parser)]
#[command(name = "deepseek_batch_processor")]
#[command(about = "DeepSeek 并发批量章节生成器")]
struct Cli {
    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 批量生成章节响应
    Process {
        /// 章节列表，如 "2,4,8" 或 "13-29"，可混用
        chapters: String,

        /// 覆盖最大并发请求数
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// 修复疑似被截断的既有响应
    Repair {
        /// 只修复指定章节，如 "10,13,15"；缺省时扫描全部
        #[arg(long)]
        chapters: Option<String>,
    },

    /// 从响应中提取 markdown 正文到暂存目录
    Extract,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    logging::init(cli.verbose);

    // 加载配置
    let mut config = Config::from_env();
    if cli.verbose {
        config.verbose_logging = true;
    }

    match cli.command {
        Commands::Process {
            chapters,
            concurrency,
        } => {
            let chapter_numbers = parse_chapter_list(&chapters)?;
            if let Some(concurrency) = concurrency {
                config.max_concurrent_requests = concurrency;
            }

            let app = App::initialize(config)?;
            app.process_chapters(&chapter_numbers).await?;
        }

        Commands::Repair { chapters } => {
            let filter = chapters.as_deref().map(parse_chapter_list).transpose()?;

            let app = App::initialize(config)?;
            app.repair_chapters(filter.as_deref()).await?;
        }

        Commands::Extract => {
            // 提取流程不访问 API，不要求密钥
            let extractor = MarkdownExtractor::new(&config);
            extractor.process_all()?;
        }
    }

    Ok(())
}

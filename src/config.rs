/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的章节数量
    pub max_concurrent_requests: usize,
    /// 单次 API 调用最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（秒），第 n 次重试前等待 base * n 秒
    pub retry_base_delay_secs: u64,
    /// 单个章节最大续写次数
    pub max_continuations: u32,
    /// 单次调用的最大输出 token 数
    pub max_output_tokens: u32,
    /// 连续续写之间的礼貌延迟（毫秒）
    pub continuation_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- DeepSeek API 配置 ---
    pub api_key: String,
    pub api_base_url: String,
    /// Beta 端点（Chat Prefix Completion 续写用）
    pub beta_api_base_url: String,
    pub model_name: String,
    // --- 目录配置 ---
    /// 提示词文件目录
    pub prompts_dir: String,
    /// 响应输出目录
    pub responses_dir: String,
    /// 校验失败的响应存放目录
    pub failed_dir: String,
    /// 修复前的备份目录
    pub backup_dir: String,
    /// 提取后的正文暂存目录
    pub staging_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            max_retries: 3,
            retry_base_delay_secs: 5,
            max_continuations: 5,
            max_output_tokens: 8000,
            continuation_delay_ms: 500,
            verbose_logging: false,
            api_key: String::new(),
            api_base_url: "https://api.deepseek.com".to_string(),
            beta_api_base_url: "https://api.deepseek.com/beta".to_string(),
            model_name: "deepseek-chat".to_string(),
            prompts_dir: "prompts_for_raw_chapters".to_string(),
            responses_dir: "responses_from_deepseek".to_string(),
            failed_dir: "failed_responses".to_string(),
            backup_dir: "responses_from_deepseek/backups".to_string(),
            staging_dir: "properparts_staging".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 所有配置项均有默认值。`DEEPSEEK_API_KEY` 的存在性在
    /// `App::initialize` 中检查（提取流程不访问 API，不要求密钥）
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_concurrent_requests: std::env::var("MAX_CONCURRENT_REQUESTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_requests),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_base_delay_secs: std::env::var("RETRY_BASE_DELAY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_base_delay_secs),
            max_continuations: std::env::var("MAX_CONTINUATIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_continuations),
            max_output_tokens: std::env::var("MAX_OUTPUT_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_output_tokens),
            continuation_delay_ms: std::env::var("CONTINUATION_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.continuation_delay_ms),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            api_key: std::env::var("DEEPSEEK_API_KEY").unwrap_or(default.api_key),
            api_base_url: std::env::var("DEEPSEEK_API_BASE_URL").unwrap_or(default.api_base_url),
            beta_api_base_url: std::env::var("DEEPSEEK_BETA_API_BASE_URL").unwrap_or(default.beta_api_base_url),
            model_name: std::env::var("DEEPSEEK_MODEL_NAME").unwrap_or(default.model_name),
            prompts_dir: std::env::var("PROMPTS_DIR").unwrap_or(default.prompts_dir),
            responses_dir: std::env::var("RESPONSES_DIR").unwrap_or(default.responses_dir),
            failed_dir: std::env::var("FAILED_DIR").unwrap_or(default.failed_dir),
            backup_dir: std::env::var("BACKUP_DIR").unwrap_or(default.backup_dir),
            staging_dir: std::env::var("STAGING_DIR").unwrap_or(default.staging_dir),
        }
    }
}

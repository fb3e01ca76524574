use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// DeepSeek API 调用错误
    Api(ApiError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Api(e) => write!(f, "API错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Api(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

impl AppError {
    /// 判断该错误是否为瞬时错误（可重试）
    ///
    /// 只有 API 层的网络类错误可以重试，文件/配置错误重试没有意义
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Api(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// DeepSeek API 调用错误
#[derive(Debug)]
pub enum ApiError {
    /// 网络请求失败（连接失败、超时等）
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求频率限制（HTTP 429）
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// 服务端错误（HTTP 5xx）
    ServerError {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 认证失败（HTTP 401/403，API Key 无效）
    AuthFailed {
        endpoint: String,
    },
    /// 请求格式错误（其余 HTTP 4xx）
    BadRequest {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// API 返回空的 choices 列表
    EmptyChoices {
        model: String,
    },
    /// API 返回的消息内容为空
    EmptyContent {
        model: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    /// 瞬时错误判定：网络故障、限流、服务端 5xx 可以重试，
    /// 认证失败和请求格式错误重试注定还会失败
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RequestFailed { .. }
                | ApiError::RateLimited { .. }
                | ApiError::ServerError { .. }
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::RequestFailed { endpoint, source } => {
                write!(f, "API请求失败 ({}): {}", endpoint, source)
            }
            ApiError::RateLimited {
                endpoint,
                retry_after,
            } => {
                write!(
                    f,
                    "API请求频率限制 ({}), 建议等待: {:?}秒",
                    endpoint, retry_after
                )
            }
            ApiError::ServerError {
                endpoint,
                status,
                message,
            } => {
                write!(f, "API服务端错误 ({}): HTTP {} {}", endpoint, status, message)
            }
            ApiError::AuthFailed { endpoint } => {
                write!(f, "API认证失败 ({}): 请检查 DEEPSEEK_API_KEY", endpoint)
            }
            ApiError::BadRequest {
                endpoint,
                status,
                message,
            } => {
                write!(f, "API请求格式错误 ({}): HTTP {} {}", endpoint, status, message)
            }
            ApiError::EmptyChoices { model } => {
                write!(f, "API返回结果为空 (模型: {})", model)
            }
            ApiError::EmptyContent { model } => {
                write!(f, "API返回内容为空 (模型: {})", model)
            }
            ApiError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::RequestFailed { source, .. } | ApiError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 提示词文件内容为空
    EmptyPrompt {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::EmptyPrompt { path } => write!(f, "提示词文件为空: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. } | FileError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量不存在
    EnvVarNotFound {
        var_name: String,
    },
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarNotFound { var_name } => {
                write!(f, "环境变量 {} 不存在", var_name)
            }
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从子错误类型转换 ==========
// 让 `?` 可以把各层错误直接提升为 AppError

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::Api(err)
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        AppError::File(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ========== 从常见错误类型转换 ==========
// 注意：anyhow 已经为所有实现了 std::error::Error 的类型提供了自动转换

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate_limited = AppError::Api(ApiError::RateLimited {
            endpoint: "chat/completions".to_string(),
            retry_after: Some(5),
        });
        assert!(rate_limited.is_transient());

        let server_error = AppError::Api(ApiError::ServerError {
            endpoint: "chat/completions".to_string(),
            status: 503,
            message: "service unavailable".to_string(),
        });
        assert!(server_error.is_transient());

        let auth = AppError::Api(ApiError::AuthFailed {
            endpoint: "chat/completions".to_string(),
        });
        assert!(!auth.is_transient());

        let bad_request = AppError::Api(ApiError::BadRequest {
            endpoint: "chat/completions".to_string(),
            status: 400,
            message: "invalid messages".to_string(),
        });
        assert!(!bad_request.is_transient());

        // 文件错误永远不可重试
        let file = AppError::File(FileError::NotFound {
            path: "prompt_chapter_01.md".to_string(),
        });
        assert!(!file.is_transient());
    }
}

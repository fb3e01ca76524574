//! 响应校验 - 业务能力层
//!
//! 启发式把关，不做语义检查：只拦截空响应、过短响应和
//! 以拒绝/错误模式开头的响应，避免把坏输出当作正文存盘。
//! 误判是预期内的，被拒绝的响应会隔离保存供人工检查。

use std::fmt;

/// 接受的最小字符数（去除首尾空白后）
pub const MIN_ACCEPTED_CHARS: usize = 50;

/// 响应开头出现这些模式时直接拒绝（小写匹配）
const ERROR_PREFIXES: [&str; 5] = [
    "i'm sorry, but",
    "i cannot",
    "error:",
    "api error",
    "rate limit",
];

/// 校验结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// 空响应或纯空白
    Empty,
    /// 响应过短
    TooShort { chars: usize },
    /// 以错误/拒绝模式开头
    ErrorPrefix { pattern: &'static str },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "响应为空"),
            RejectReason::TooShort { chars } => write!(f, "响应过短 ({} 字符)", chars),
            RejectReason::ErrorPrefix { pattern } => {
                write!(f, "响应以错误模式开头: '{}'", pattern)
            }
        }
    }
}

/// 响应校验器
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    min_chars: usize,
}

impl ResponseValidator {
    pub fn new() -> Self {
        Self {
            min_chars: MIN_ACCEPTED_CHARS,
        }
    }

    /// 使用自定义最小长度创建
    pub fn with_min_chars(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// 校验一段候选响应
    ///
    /// 检查顺序：空 → 过短 → 错误前缀；全部通过则接受
    pub fn validate(&self, text: &str) -> Verdict {
        let trimmed = text.trim();

        if trimmed.is_empty() {
            return Verdict::Rejected(RejectReason::Empty);
        }

        let chars = trimmed.chars().count();
        if chars < self.min_chars {
            return Verdict::Rejected(RejectReason::TooShort { chars });
        }

        let lower = trimmed.to_lowercase();
        for pattern in ERROR_PREFIXES {
            if lower.starts_with(pattern) {
                return Verdict::Rejected(RejectReason::ErrorPrefix { pattern });
            }
        }

        Verdict::Accepted
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace_rejected() {
        let validator = ResponseValidator::new();
        assert_eq!(validator.validate(""), Verdict::Rejected(RejectReason::Empty));
        assert_eq!(
            validator.validate("   \n\t  "),
            Verdict::Rejected(RejectReason::Empty)
        );
    }

    #[test]
    fn test_length_boundary() {
        let validator = ResponseValidator::new();

        // 49 个字符 → 拒绝
        let short = "a".repeat(49);
        assert_eq!(
            validator.validate(&short),
            Verdict::Rejected(RejectReason::TooShort { chars: 49 })
        );

        // 恰好 50 个字符 → 接受
        let enough = "a".repeat(50);
        assert_eq!(validator.validate(&enough), Verdict::Accepted);
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        let validator = ResponseValidator::new();
        // 50 个汉字（150 字节）应该按字符数接受
        let chinese = "章".repeat(50);
        assert_eq!(validator.validate(&chinese), Verdict::Accepted);
    }

    #[test]
    fn test_error_prefix_rejected_any_case() {
        let validator = ResponseValidator::new();
        let padding = "x".repeat(100);

        let text = format!("Error: something went wrong. {}", padding);
        assert_eq!(
            validator.validate(&text),
            Verdict::Rejected(RejectReason::ErrorPrefix { pattern: "error:" })
        );

        let text = format!("ERROR: all caps. {}", padding);
        assert!(matches!(validator.validate(&text), Verdict::Rejected(_)));

        let text = format!("I cannot help with that request. {}", padding);
        assert_eq!(
            validator.validate(&text),
            Verdict::Rejected(RejectReason::ErrorPrefix { pattern: "i cannot" })
        );

        let text = format!("Rate limit exceeded, please slow down. {}", padding);
        assert!(matches!(validator.validate(&text), Verdict::Rejected(_)));
    }

    #[test]
    fn test_error_word_in_middle_is_accepted() {
        let validator = ResponseValidator::new();
        let text = format!(
            "本章讲述了主角的成长历程。{}虽然路上 sorry 和 error 都出现过，但都被克服了。",
            "正文".repeat(30)
        );
        assert_eq!(validator.validate(&text), Verdict::Accepted);
    }
}

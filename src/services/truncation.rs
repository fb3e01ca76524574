//! 启发式截断判定 - 业务能力层
//!
//! 尽力而为的分类器：从文本形态猜测一个响应是否被截断。
//! 批处理主流程只信服务端返回的 finish_reason 信号，
//! 这里的启发式只用于审计来源结果未知的既有响应文件（修复流程）。

/// 判断一段响应文本是否疑似被截断
///
/// 四个迹象，命中任意一个即认为疑似截断：
/// 1. 较长文本却不以句末标点收尾
/// 2. 以字母数字结尾且最后 20 个字符里没有空格（疑似断在单词中间）
/// 3. 超长文本（> 5000 字符）且不以完整句子收尾
/// 4. 未闭合的 ``` 代码块或 ** 加粗标记
pub fn is_likely_truncated(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let sentence_endings = ['.', '!', '?', '"', '\'', ')', ']', '}'];
    let ends_with_sentence = trimmed.ends_with(sentence_endings);
    let mid_sentence = !ends_with_sentence && trimmed.chars().count() > 100;

    let last_char_alnum = trimmed
        .chars()
        .last()
        .map(|c| c.is_alphanumeric())
        .unwrap_or(false);
    let tail: String = trimmed
        .chars()
        .rev()
        .take(20)
        .collect();
    let mid_word = last_char_alnum && !tail.contains(' ');

    let full_stop_endings = [".", "!", "?", ".\"", ".'", "?\"", "?'"];
    let abrupt_long = text.chars().count() > 5000
        && !full_stop_endings.iter().any(|e| trimmed.ends_with(e));

    let unbalanced_markers =
        text.matches("```").count() % 2 != 0 || text.matches("**").count() % 2 != 0;

    mid_sentence || mid_word || abrupt_long || unbalanced_markers
}

//! 对话历史模型
//!
//! 封装与 DeepSeek 交换的完整轮次历史。
//! 对话从单条用户消息开始，每检测到一次截断，
//! 续写引擎就追加一条 assistant 轮和一条"请继续"的用户轮。
//! 轮次只增不减，由处理该章节的引擎实例独占。

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// 线上协议中的角色字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 对话中的一轮
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// 一个章节的对话历史
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// 以初始提示词创建对话（唯一的用户轮）
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::User,
                text: prompt.into(),
            }],
        }
    }

    /// 追加一条 assistant 轮（服务返回的部分文本）
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    /// 追加一条用户轮（续写指令）
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

pub mod chapter;
pub mod conversation;

pub use chapter::{parse_chapter_list, resolve_chapter_jobs, ChapterJob};
pub use conversation::{Conversation, Role, Turn};

pub mod batch_processor;
pub mod extract_processor;
pub mod repair_processor;

pub use batch_processor::{App, BatchReport};
pub use extract_processor::{ExtractReport, MarkdownExtractor};
pub use repair_processor::{RepairProcessor, RepairReport};

//! 翻译管道模块
//!
//! 文本进入队列前后的处理步骤：分段、过滤、语言与代码识别、分批

pub mod batch;
pub mod code;
pub mod filters;
pub mod language;
pub mod segmenter;

// 重新导出主要类型
pub use batch::{create_smart_batches, estimate_tokens, BatchSizeController};
pub use code::{CodeAnalysis, CodeDetector, HeuristicCodeDetector};
pub use filters::{FilterReason, TextFilter};
pub use language::{HeuristicLanguageDetector, LanguageDetector};
pub use segmenter::{ExclusionReason, NodeKind, Segmenter, TextGroup};

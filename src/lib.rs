//! # Transor Library
//!
//! 网页内容的原位翻译：把 HTML 文档分段为文本组，合并请求后分批发送给翻译后端，
//! 再按所选样式把译文写回页面。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量
//! - `parsers` - HTML 解析、DOM 操作与序列化
//! - `translation` - 翻译功能

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
pub use translation::{PageTranslator, TranslationSettings};

//! 翻译系统核心模块
//!
//! ## 模块依赖关系
//!
//! ```text
//! PageTranslator (service.rs)
//!     ├── Segmenter (pipeline/segmenter.rs)
//!     ├── TranslationQueue (queue.rs)
//!     │       ├── TranslationCache (storage/cache.rs)
//!     │       ├── LanguageDetector / CodeDetector (pipeline/)
//!     │       └── Messenger (messenger.rs)
//!     └── apply_translation (renderer.rs)
//! ```
//!
//! 各组件共享的依赖由 [`TranslationContext`] 显式传入，会话结束时通过其中的
//! 取消令牌统一关闭。

pub mod context;
pub mod messenger;
pub mod queue;
pub mod renderer;
pub mod service;

pub use context::TranslationContext;
pub use messenger::{BatchRequest, BatchResponse, HttpMessenger, Messenger};
pub use queue::{PendingTranslation, QueueStats, QueueStatsSnapshot, TranslationQueue};
pub use renderer::{apply_translation, resolve_style, ApplyOutcome};
pub use service::{PageReport, PageTranslator};
